//! Wire contracts shared between the detector node and the ingest service.
//!
//! A [`DetectionRecord`] is the unit reported per plate per duplicate window;
//! the same field set and ordering is used on the wire and in the CSV log.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed CSV column order for the durable detection log.
pub const CSV_HEADER: &str =
    "date,time,license_plate,text_confidence,vehicle_type,vehicle_confidence,frame_number,timestamp";

/// One reportable plate detection.
///
/// Created when a plate is first tracked inside a duplicate window and amended
/// in place when a higher-confidence sighting of the same plate arrives within
/// that window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Observation date, `YYYY-MM-DD` (UTC)
    pub date: String,

    /// Observation time of day, `HH:MM:SS` (UTC)
    pub time: String,

    /// Recognized plate text
    pub license_plate: String,

    /// OCR confidence, 0.0 to 1.0
    pub text_confidence: f32,

    /// Vehicle class name (car, motorcycle, bus, truck)
    pub vehicle_type: String,

    /// Vehicle detector confidence, 0.0 to 1.0
    pub vehicle_confidence: f32,

    /// Source frame index
    pub frame_number: u64,

    /// Position in the stream, seconds (frame_number / fps)
    pub timestamp: f64,
}

impl DetectionRecord {
    /// Compose the observation instant from the `date` and `time` fields.
    pub fn occurred_at(&self) -> Result<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .with_context(|| format!("invalid detection date '{}'", self.date))?;
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M:%S")
            .with_context(|| format!("invalid detection time '{}'", self.time))?;
        Ok(date.and_time(time).and_utc())
    }

    /// Render the record as one CSV row, matching [`CSV_HEADER`] column order.
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.date,
            self.time,
            self.license_plate,
            self.text_confidence,
            self.vehicle_type,
            self.vehicle_confidence,
            self.frame_number,
            self.timestamp
        )
    }
}

/// A detection as transported to the ingest service.
///
/// `is_entry` and `confidence` are only populated on the batched channel; a
/// bare record sent on the single-event channel is treated as an entry by the
/// server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(flatten)]
    pub record: DetectionRecord,

    /// Entry/exit disposition; events without one are skipped by the batched
    /// ingest path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_entry: Option<bool>,

    /// Overall confidence override; falls back to the record's OCR confidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl From<DetectionRecord> for DetectionEvent {
    fn from(record: DetectionRecord) -> Self {
        Self {
            record,
            is_entry: None,
            confidence: None,
        }
    }
}

/// Batched ingest request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub detections: Vec<DetectionEvent>,

    /// Reported processing rate of the sender, informational
    #[serde(default)]
    pub fps: f64,
}

/// Periodic heartbeat from a detector node. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorStatus {
    pub fps: f64,
    pub running: bool,
}

/// Ingest acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAck {
    pub status: String,
    pub applied: usize,
    pub skipped: usize,
}

/// Current occupancy as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub total_spaces: i32,
    pub occupied_spaces: i32,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DetectionRecord {
        DetectionRecord {
            date: "2026-08-06".to_string(),
            time: "14:03:21".to_string(),
            license_plate: "ABC1234".to_string(),
            text_confidence: 0.81,
            vehicle_type: "car".to_string(),
            vehicle_confidence: 0.92,
            frame_number: 300,
            timestamp: 10.0,
        }
    }

    #[test]
    fn test_occurred_at_composes_date_and_time() {
        let at = record().occurred_at().unwrap();
        assert_eq!(at.to_rfc3339(), "2026-08-06T14:03:21+00:00");
    }

    #[test]
    fn test_occurred_at_rejects_malformed_fields() {
        let mut bad = record();
        bad.time = "14:03".to_string();
        assert!(bad.occurred_at().is_err());

        let mut bad = record();
        bad.date = "06-08-2026".to_string();
        assert!(bad.occurred_at().is_err());
    }

    #[test]
    fn test_csv_line_matches_header_order() {
        let line = record().csv_line();
        assert_eq!(line, "2026-08-06,14:03:21,ABC1234,0.81,car,0.92,300,10");
        assert_eq!(
            CSV_HEADER.split(',').count(),
            line.split(',').count(),
            "row arity must match the header"
        );
    }

    #[test]
    fn test_event_flattens_record_fields() {
        let event = DetectionEvent {
            record: record(),
            is_entry: Some(true),
            confidence: Some(0.85),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["license_plate"], "ABC1234");
        assert_eq!(json["is_entry"], true);
        assert_eq!(json["frame_number"], 300);

        let back: DetectionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.record, event.record);
        assert_eq!(back.is_entry, Some(true));
    }

    #[test]
    fn test_bare_record_deserializes_as_event() {
        let json = serde_json::to_value(record()).unwrap();
        let event: DetectionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.is_entry, None);
        assert_eq!(event.confidence, None);
    }

    #[test]
    fn test_batch_defaults_fps() {
        let batch: DetectionBatch = serde_json::from_str(r#"{"detections": []}"#).unwrap();
        assert_eq!(batch.fps, 0.0);
        assert!(batch.detections.is_empty());
    }
}
