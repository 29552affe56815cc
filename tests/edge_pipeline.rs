/// Integration tests for the edge detection pipeline: tracker, buffer, and
/// the durable CSV log working together.
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use detector_node::buffer::{DetectionBuffer, FlushConfig};
use detector_node::pipeline::{FramePipeline, PipelineConfig};
use detector_node::roi::RoiGate;
use detector_node::tracker::{PlateTracker, TrackerConfig};
use detector_node::transport::TransportQueue;
use detector_node::vision::{
    BoundingBox, Frame, PlateCandidate, PlateRecognizer, VehicleClass, VehicleDetection,
    VehicleDetector,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct OneCarDetector;

#[async_trait]
impl VehicleDetector for OneCarDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<VehicleDetection>> {
        Ok(vec![VehicleDetection {
            class: VehicleClass::Car,
            confidence: 0.9,
            bbox: BoundingBox {
                x: frame.width / 4,
                y: frame.height / 4,
                width: frame.width / 2,
                height: frame.height / 2,
            },
        }])
    }
}

struct ScriptedRecognizer {
    script: Mutex<VecDeque<Vec<PlateCandidate>>>,
}

impl ScriptedRecognizer {
    fn new(readings: Vec<Vec<(&str, f32)>>) -> Self {
        let script = readings
            .into_iter()
            .map(|frame| {
                frame
                    .into_iter()
                    .map(|(text, confidence)| PlateCandidate {
                        text: text.to_string(),
                        confidence,
                        corners: vec![],
                    })
                    .collect()
            })
            .collect();
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait]
impl PlateRecognizer for ScriptedRecognizer {
    async fn recognize(&self, _frame: &Frame, _region: &BoundingBox) -> Result<Vec<PlateCandidate>> {
        Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_754_500_000 + secs, 0).unwrap()
}

fn frame(sequence: u64) -> Frame {
    Frame {
        sequence,
        width: 1280,
        height: 720,
        data: vec![],
    }
}

fn pipeline(dir: &TempDir, recognizer: ScriptedRecognizer) -> FramePipeline {
    FramePipeline::new(
        Arc::new(OneCarDetector),
        Arc::new(recognizer),
        RoiGate::default(),
        PlateTracker::new(TrackerConfig::default()),
        DetectionBuffer::new(FlushConfig {
            output_path: dir.path().join("plates.csv"),
            ..FlushConfig::default()
        }),
        TransportQueue::new(64),
        PipelineConfig {
            fps: 30.0,
            flush_interval_frames: 0,
        },
    )
}

fn read_log(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("plates.csv")).unwrap_or_default()
}

#[tokio::test]
async fn test_admitted_short_plate_is_excluded_from_durable_log() {
    let dir = TempDir::new().unwrap();
    // AB12 passes admission (length 4, mixed, confident) but is shorter than
    // the reporting length bound; DEF4567 qualifies for both
    let recognizer = ScriptedRecognizer::new(vec![
        vec![("AB12", 0.95)],
        vec![("DEF4567", 0.88)],
    ]);
    let mut pipeline = pipeline(&dir, recognizer);

    let r0 = pipeline.process_frame(&frame(0), at(0)).await;
    let r1 = pipeline.process_frame(&frame(1), at(1)).await;
    assert_eq!(r0.tracked, 1, "short plate is tracked");
    assert_eq!(r1.tracked, 1);

    pipeline.finish().unwrap();

    let log = read_log(&dir);
    assert!(!log.contains("AB12"));
    assert!(log.contains("DEF4567"));
}

#[tokio::test]
async fn test_one_pass_yields_one_row_with_best_confidence() {
    let dir = TempDir::new().unwrap();
    let recognizer = ScriptedRecognizer::new(vec![
        vec![("ABC1234", 0.72)],
        vec![("ABC1234", 0.81)],
        vec![("ABC1234", 0.65)],
    ]);
    let mut pipeline = pipeline(&dir, recognizer);

    pipeline.process_frame(&frame(0), at(0)).await;
    pipeline.process_frame(&frame(90), at(3)).await;
    pipeline.process_frame(&frame(270), at(9)).await;

    let rows = pipeline.finish().unwrap();
    assert_eq!(rows, 1);

    let log = read_log(&dir);
    let data_lines: Vec<&str> = log.lines().skip(1).collect();
    assert_eq!(data_lines.len(), 1);
    assert!(data_lines[0].contains("ABC1234,0.81"));
}

#[tokio::test]
async fn test_return_after_window_is_reported_twice() {
    let dir = TempDir::new().unwrap();
    let recognizer = ScriptedRecognizer::new(vec![
        vec![("XYZ9870", 0.9)],
        vec![("XYZ9870", 0.85)],
    ]);
    let mut pipeline = pipeline(&dir, recognizer);

    pipeline.process_frame(&frame(0), at(0)).await;
    pipeline.finish().unwrap();

    // the vehicle leaves and returns 45 seconds later
    pipeline.process_frame(&frame(1350), at(45)).await;
    pipeline.finish().unwrap();

    let log = read_log(&dir);
    let plate_rows = log.lines().filter(|l| l.contains("XYZ9870")).count();
    assert_eq!(plate_rows, 2);
    // header appears exactly once across both flushes
    assert_eq!(log.lines().filter(|l| l.starts_with("date,")).count(), 1);
}
