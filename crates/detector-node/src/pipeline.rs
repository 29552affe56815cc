//! Per-frame orchestration: detect vehicles, gate regions, recognize plates,
//! track duplicates, buffer and forward reportable detections.
//!
//! The loop is sequential per frame. Capability and transport failures are
//! logged and never abort frame processing.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use common::detections::{DetectionEvent, DetectionRecord};

use crate::buffer::DetectionBuffer;
use crate::roi::RoiGate;
use crate::tracker::{PlateTracker, Sighting, TrackOutcome};
use crate::transport::TransportQueue;
use crate::vision::{Frame, PlateRecognizer, VehicleDetector};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Nominal frame rate, used to derive the stream-position timestamp
    pub fps: f64,

    /// Flush the detection buffer every N frames (and always at stream end)
    pub flush_interval_frames: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            flush_interval_frames: 300,
        }
    }
}

/// Per-frame processing summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameReport {
    pub vehicles: usize,
    pub admitted_regions: usize,
    pub tracked: usize,
    pub amended: usize,
}

pub struct FramePipeline {
    detector: Arc<dyn VehicleDetector>,
    recognizer: Arc<dyn PlateRecognizer>,
    gate: RoiGate,
    tracker: PlateTracker,
    buffer: DetectionBuffer,
    transport: TransportQueue,
    config: PipelineConfig,
}

impl FramePipeline {
    pub fn new(
        detector: Arc<dyn VehicleDetector>,
        recognizer: Arc<dyn PlateRecognizer>,
        gate: RoiGate,
        tracker: PlateTracker,
        buffer: DetectionBuffer,
        transport: TransportQueue,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            recognizer,
            gate,
            tracker,
            buffer,
            transport,
            config,
        }
    }

    /// Run one frame through the pipeline.
    pub async fn process_frame(&mut self, frame: &Frame, now: DateTime<Utc>) -> FrameReport {
        let mut report = FrameReport::default();
        telemetry::metrics::DETECTOR_FRAMES_PROCESSED.inc();

        let detections = match self.detector.detect(frame).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!(sequence = frame.sequence, error = %e, "vehicle detection failed");
                return report;
            }
        };
        report.vehicles = detections.len();

        for detection in &detections {
            if !self.gate.admit(&detection.bbox, frame.width, frame.height) {
                continue;
            }
            report.admitted_regions += 1;

            let candidates = match self.recognizer.recognize(frame, &detection.bbox).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(sequence = frame.sequence, error = %e, "plate recognition failed");
                    continue;
                }
            };

            for candidate in candidates {
                let sighting = Sighting {
                    plate_text: candidate.text,
                    text_confidence: candidate.confidence,
                    vehicle_class: detection.class,
                    vehicle_confidence: detection.confidence,
                    bbox: detection.bbox,
                    frame_number: frame.sequence,
                    observed_at: now,
                };

                let outcome = self.tracker.observe(&sighting);
                telemetry::metrics::DETECTOR_TRACK_OUTCOMES
                    .with_label_values(&[outcome.as_str()])
                    .inc();

                match outcome {
                    TrackOutcome::Tracked => {
                        let record = self.record_from(&sighting, now);
                        info!(
                            plate = %record.license_plate,
                            confidence = record.text_confidence,
                            "detected plate"
                        );
                        self.buffer.push(record.clone());
                        self.transport.push(DetectionEvent::from(record));
                        report.tracked += 1;
                    }
                    TrackOutcome::Improved => {
                        let record = self.record_from(&sighting, now);
                        debug!(
                            plate = %record.license_plate,
                            confidence = record.text_confidence,
                            "improved buffered detection"
                        );
                        self.buffer.amend(record.clone());
                        self.transport.push(DetectionEvent::from(record));
                        report.amended += 1;
                    }
                    TrackOutcome::Duplicate | TrackOutcome::Rejected => {}
                }
            }
        }

        telemetry::metrics::DETECTOR_TRACKED_PLATES.set(self.tracker.len() as i64);

        if self.config.flush_interval_frames > 0
            && frame.sequence > 0
            && frame.sequence % self.config.flush_interval_frames == 0
        {
            self.flush_and_sweep(now);
        }

        report
    }

    fn flush_and_sweep(&mut self, now: DateTime<Utc>) {
        match self.buffer.flush() {
            Ok(rows) => {
                telemetry::metrics::DETECTOR_ROWS_FLUSHED.inc_by(rows as u64);
            }
            Err(e) => {
                error!(error = %e, "detection log flush failed, buffered detections dropped");
            }
        }

        let evicted = self.tracker.evict_stale(now);
        if evicted > 0 {
            debug!(evicted, "swept stale tracker entries");
        }
        telemetry::metrics::DETECTOR_TRACKED_PLATES.set(self.tracker.len() as i64);
    }

    /// Mandatory last-chance flush at stream end.
    pub fn finish(&mut self) -> Result<usize> {
        let rows = self.buffer.flush()?;
        telemetry::metrics::DETECTOR_ROWS_FLUSHED.inc_by(rows as u64);
        Ok(rows)
    }

    pub fn tracked_plates(&self) -> usize {
        self.tracker.len()
    }

    pub fn buffered_detections(&self) -> usize {
        self.buffer.len()
    }

    fn record_from(&self, sighting: &Sighting, now: DateTime<Utc>) -> DetectionRecord {
        let position = if self.config.fps > 0.0 {
            sighting.frame_number as f64 / self.config.fps
        } else {
            0.0
        };

        DetectionRecord {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            license_plate: sighting.plate_text.clone(),
            text_confidence: round2_f32(sighting.text_confidence),
            vehicle_type: sighting.vehicle_class.to_string(),
            vehicle_confidence: round2_f32(sighting.vehicle_confidence),
            frame_number: sighting.frame_number,
            timestamp: round2(position),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round2_f32(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FlushConfig;
    use crate::tracker::TrackerConfig;
    use crate::vision::{
        BoundingBox, PlateCandidate, VehicleClass, VehicleDetection,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;
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
        async fn recognize(
            &self,
            _frame: &Frame,
            _region: &BoundingBox,
        ) -> Result<Vec<PlateCandidate>> {
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_754_000_000 + secs, 0).unwrap()
    }

    fn frame(sequence: u64) -> Frame {
        Frame {
            sequence,
            width: 1280,
            height: 720,
            data: vec![],
        }
    }

    fn pipeline_with(
        dir: &TempDir,
        recognizer: ScriptedRecognizer,
        flush_interval_frames: u64,
    ) -> (FramePipeline, TransportQueue) {
        let queue = TransportQueue::new(64);
        let pipeline = FramePipeline::new(
            Arc::new(OneCarDetector),
            Arc::new(recognizer),
            RoiGate::default(),
            PlateTracker::new(TrackerConfig::default()),
            DetectionBuffer::new(FlushConfig {
                output_path: dir.path().join("plates.csv"),
                ..FlushConfig::default()
            }),
            queue.clone(),
            PipelineConfig {
                fps: 30.0,
                flush_interval_frames,
            },
        );
        (pipeline, queue)
    }

    #[tokio::test]
    async fn test_window_duplicates_collapse_to_best_confidence() {
        let dir = TempDir::new().unwrap();
        let recognizer = ScriptedRecognizer::new(vec![
            vec![("ABC1234", 0.72)],
            vec![("ABC1234", 0.81)],
            vec![("ABC1234", 0.65)],
        ]);
        let (mut pipeline, queue) = pipeline_with(&dir, recognizer, 0);

        let r0 = pipeline.process_frame(&frame(0), at(0)).await;
        let r1 = pipeline.process_frame(&frame(1), at(4)).await;
        let r2 = pipeline.process_frame(&frame(2), at(9)).await;

        assert_eq!(r0.tracked, 1);
        assert_eq!(r1.amended, 1);
        assert_eq!(r2.tracked + r2.amended, 0);

        // exactly one buffered detection, carrying the best confidence
        assert_eq!(pipeline.buffered_detections(), 1);
        let rows = pipeline.finish().unwrap();
        assert_eq!(rows, 1);

        let log = std::fs::read_to_string(dir.path().join("plates.csv")).unwrap();
        assert!(log.contains("ABC1234,0.81"));

        // transport saw the initial report and the amendment, not the duplicate
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_reappearance_after_window_is_new_detection() {
        let dir = TempDir::new().unwrap();
        let recognizer = ScriptedRecognizer::new(vec![
            vec![("XYZ9876", 0.9)],
            vec![("XYZ9876", 0.7)],
        ]);
        let (mut pipeline, _queue) = pipeline_with(&dir, recognizer, 0);

        let r0 = pipeline.process_frame(&frame(0), at(0)).await;
        let r1 = pipeline.process_frame(&frame(1350), at(45)).await;

        assert_eq!(r0.tracked, 1);
        assert_eq!(r1.tracked, 1, "strictly past the window: independent event");
        assert_eq!(pipeline.buffered_detections(), 2);
    }

    #[tokio::test]
    async fn test_flush_cadence_writes_and_clears() {
        let dir = TempDir::new().unwrap();
        let recognizer = ScriptedRecognizer::new(vec![
            vec![("ABC1234", 0.9)],
            vec![],
            vec![],
            vec![],
        ]);
        let (mut pipeline, _queue) = pipeline_with(&dir, recognizer, 3);

        for seq in 0..4u64 {
            pipeline.process_frame(&frame(seq), at(seq as i64)).await;
        }

        // cadence flush fired at frame 3
        let log = std::fs::read_to_string(dir.path().join("plates.csv")).unwrap();
        assert!(log.contains("ABC1234"));
        assert_eq!(pipeline.buffered_detections(), 0);
    }

    #[tokio::test]
    async fn test_recognizer_failure_does_not_abort_frame_loop() {
        struct FailingRecognizer;

        #[async_trait]
        impl PlateRecognizer for FailingRecognizer {
            async fn recognize(
                &self,
                _frame: &Frame,
                _region: &BoundingBox,
            ) -> Result<Vec<PlateCandidate>> {
                anyhow::bail!("recognizer offline")
            }
        }

        let dir = TempDir::new().unwrap();
        let queue = TransportQueue::new(8);
        let mut pipeline = FramePipeline::new(
            Arc::new(OneCarDetector),
            Arc::new(FailingRecognizer),
            RoiGate::default(),
            PlateTracker::new(TrackerConfig::default()),
            DetectionBuffer::new(FlushConfig {
                output_path: dir.path().join("plates.csv"),
                ..FlushConfig::default()
            }),
            queue,
            PipelineConfig::default(),
        );

        let report = pipeline.process_frame(&frame(0), at(0)).await;
        assert_eq!(report.vehicles, 1);
        assert_eq!(report.tracked, 0);

        // the loop keeps going on later frames
        let report = pipeline.process_frame(&frame(1), at(1)).await;
        assert_eq!(report.vehicles, 1);
    }

    #[tokio::test]
    async fn test_record_timestamp_derived_from_frame_number() {
        let dir = TempDir::new().unwrap();
        let recognizer = ScriptedRecognizer::new(vec![vec![("DEF4567", 0.9)]]);
        let (mut pipeline, queue) = pipeline_with(&dir, recognizer, 0);

        pipeline.process_frame(&frame(45), at(0)).await;
        let event = queue.pop().unwrap();
        assert_eq!(event.record.frame_number, 45);
        assert_eq!(event.record.timestamp, 1.5);
        assert_eq!(event.is_entry, None);
    }
}
