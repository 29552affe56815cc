use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::buffer::FlushConfig;
use crate::pipeline::PipelineConfig;
use crate::roi::{RoiGate, DEFAULT_MIN_AREA_RATIO};
use crate::tracker::TrackerConfig;
use crate::transport::TransportConfig;

#[derive(Debug, Clone)]
pub struct DetectorNodeConfig {
    /// Base URL of the ingest service
    pub ingest_url: String,

    /// Durable CSV detection log path
    pub output_path: PathBuf,

    /// Nominal source frame rate
    pub fps: f64,

    /// Frames the synthetic demo source produces before ending
    pub total_frames: u64,

    /// Source frame dimensions
    pub frame_width: u32,
    pub frame_height: u32,

    /// Minimum bbox/frame area ratio admitted to recognition
    pub roi_min_area_ratio: f64,

    /// Duplicate suppression window in seconds
    pub duplicate_window_secs: i64,

    /// OCR confidence floor for tracking admission
    pub admission_confidence: f32,

    /// Confidence floor for the durable log
    pub report_confidence: f32,

    /// Shortest plate text written to the durable log
    pub report_min_plate_len: usize,

    /// Flush the detection buffer every N frames
    pub flush_interval_frames: u64,

    /// Transport queue capacity
    pub queue_capacity: usize,

    /// Seconds between status heartbeats
    pub status_interval_secs: u64,
}

impl DetectorNodeConfig {
    pub fn from_env() -> Result<Self> {
        let ingest_url =
            env::var("INGEST_URL").unwrap_or_else(|_| "http://127.0.0.1:8086".to_string());

        let output_path = env::var("DETECTIONS_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("output/plate_detections.csv"));

        let fps = parse_env("SOURCE_FPS", 30.0)?;
        let total_frames = parse_env("SOURCE_TOTAL_FRAMES", 900u64)?;
        let frame_width = parse_env("SOURCE_WIDTH", 1280u32)?;
        let frame_height = parse_env("SOURCE_HEIGHT", 720u32)?;
        let roi_min_area_ratio = parse_env("ROI_MIN_AREA_RATIO", DEFAULT_MIN_AREA_RATIO)?;
        let duplicate_window_secs = parse_env("DUPLICATE_WINDOW_SECS", 30i64)?;
        let admission_confidence = parse_env("ADMISSION_CONFIDENCE", 0.6f32)?;
        let report_confidence = parse_env("REPORT_CONFIDENCE", 0.7f32)?;
        let report_min_plate_len = parse_env("REPORT_MIN_PLATE_LEN", 7usize)?;
        let flush_interval_frames = parse_env("FLUSH_INTERVAL_FRAMES", 300u64)?;
        let queue_capacity = parse_env("TRANSPORT_QUEUE_CAPACITY", 256usize)?;
        let status_interval_secs = parse_env("STATUS_INTERVAL_SECS", 10u64)?;

        Ok(Self {
            ingest_url,
            output_path,
            fps,
            total_frames,
            frame_width,
            frame_height,
            roi_min_area_ratio,
            duplicate_window_secs,
            admission_confidence,
            report_confidence,
            report_min_plate_len,
            flush_interval_frames,
            queue_capacity,
            status_interval_secs,
        })
    }

    pub fn detections_endpoint(&self) -> String {
        format!("{}/v1/detections", self.ingest_url.trim_end_matches('/'))
    }

    pub fn status_endpoint(&self) -> String {
        format!("{}/v1/status", self.ingest_url.trim_end_matches('/'))
    }

    pub fn roi_gate(&self) -> RoiGate {
        RoiGate::new(self.roi_min_area_ratio)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            duplicate_window_secs: self.duplicate_window_secs,
            admission_confidence: self.admission_confidence,
            ..TrackerConfig::default()
        }
    }

    pub fn flush_config(&self) -> FlushConfig {
        FlushConfig {
            report_confidence: self.report_confidence,
            report_min_len: self.report_min_plate_len,
            output_path: self.output_path.clone(),
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            endpoint: self.detections_endpoint(),
            capacity: self.queue_capacity,
            ..TransportConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fps: self.fps,
            flush_interval_frames: self.flush_interval_frames,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
