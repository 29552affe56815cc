//! In-memory accumulation of reported detections and the periodic flush to
//! the durable CSV log.
//!
//! The flush filter (persistence predicate) is independent from the tracker's
//! admission predicate and may be stricter: a plate can be tracked yet never
//! reach the durable log.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use common::detections::{DetectionRecord, CSV_HEADER};

#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Confidence floor a buffered detection must meet to be persisted
    pub report_confidence: f32,

    /// Shortest plate text eligible for the durable log
    pub report_min_len: usize,

    /// CSV log path; opened in append mode, header written only on creation
    pub output_path: PathBuf,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            report_confidence: 0.7,
            report_min_len: 7,
            output_path: PathBuf::from("output/plate_detections.csv"),
        }
    }
}

pub struct DetectionBuffer {
    config: FlushConfig,
    pending: Vec<DetectionRecord>,
}

impl DetectionBuffer {
    pub fn new(config: FlushConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
        }
    }

    /// Buffer a newly reported detection.
    pub fn push(&mut self, record: DetectionRecord) {
        self.pending.push(record);
    }

    /// Replace the buffered detection for this plate with an improved one.
    ///
    /// Returns false when no detection for the plate is buffered (it was
    /// already flushed); the improvement is then lost locally, which is the
    /// accepted divergence between the local log and the remote store.
    pub fn amend(&mut self, updated: DetectionRecord) -> bool {
        match self
            .pending
            .iter_mut()
            .find(|r| r.license_plate == updated.license_plate)
        {
            Some(existing) => {
                *existing = updated;
                true
            }
            None => {
                debug!(
                    plate = %updated.license_plate,
                    "amended detection no longer buffered, skipping local update"
                );
                false
            }
        }
    }

    fn meets_persistence_predicate(&self, record: &DetectionRecord) -> bool {
        record.text_confidence >= self.config.report_confidence
            && record.license_plate.chars().count() >= self.config.report_min_len
    }

    /// Append the deduplicated, confidence-filtered pending detections to the
    /// CSV log and clear the buffer.
    ///
    /// The buffer is cleared unconditionally, including detections that failed
    /// the persistence predicate; they are dropped, not retried.
    pub fn flush(&mut self) -> Result<usize> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(0);
        }

        let mut best: HashMap<String, DetectionRecord> = HashMap::new();
        for record in pending
            .into_iter()
            .filter(|r| self.meets_persistence_predicate(r))
        {
            match best.get(&record.license_plate) {
                Some(existing) if existing.text_confidence >= record.text_confidence => {}
                _ => {
                    best.insert(record.license_plate.clone(), record);
                }
            }
        }

        if best.is_empty() {
            info!("no buffered detections met the reporting threshold");
            return Ok(0);
        }

        let mut rows: Vec<DetectionRecord> = best.into_values().collect();
        rows.sort_by(|a, b| {
            a.frame_number
                .cmp(&b.frame_number)
                .then_with(|| a.license_plate.cmp(&b.license_plate))
        });

        let write_header = !self.config.output_path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.output_path)
            .with_context(|| {
                format!(
                    "failed to open detection log {}",
                    self.config.output_path.display()
                )
            })?;

        if write_header {
            writeln!(file, "{}", CSV_HEADER).context("failed to write detection log header")?;
        }
        for row in &rows {
            writeln!(file, "{}", row.csv_line()).context("failed to append detection row")?;
        }

        info!(
            rows = rows.len(),
            path = %self.config.output_path.display(),
            "flushed unique high-confidence plate detections"
        );
        Ok(rows.len())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(plate: &str, confidence: f32, frame: u64) -> DetectionRecord {
        DetectionRecord {
            date: "2026-08-06".to_string(),
            time: "12:00:00".to_string(),
            license_plate: plate.to_string(),
            text_confidence: confidence,
            vehicle_type: "car".to_string(),
            vehicle_confidence: 0.9,
            frame_number: frame,
            timestamp: frame as f64 / 30.0,
        }
    }

    fn buffer_in(dir: &TempDir) -> DetectionBuffer {
        DetectionBuffer::new(FlushConfig {
            output_path: dir.path().join("plates.csv"),
            ..FlushConfig::default()
        })
    }

    fn read_log(dir: &TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("plates.csv"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_flush_collapses_to_best_per_plate() {
        let dir = TempDir::new().unwrap();
        let mut buffer = buffer_in(&dir);
        buffer.push(record("ABC1234", 0.72, 10));
        buffer.push(record("ABC1234", 0.81, 20));
        buffer.push(record("XYZ5678", 0.75, 15));

        let written = buffer.flush().unwrap();
        assert_eq!(written, 2);

        let lines = read_log(&dir);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().any(|l| l.contains("ABC1234,0.81")));
    }

    #[test]
    fn test_persistence_predicate_independent_of_admission() {
        let dir = TempDir::new().unwrap();
        let mut buffer = buffer_in(&dir);
        // tracked upstream, but short of the 7-char reporting bound
        buffer.push(record("AB12", 0.95, 5));
        // long enough, but below the reporting confidence
        buffer.push(record("DEF4567", 0.65, 6));

        let written = buffer.flush().unwrap();
        assert_eq!(written, 0);
        assert!(read_log(&dir).is_empty(), "no file when nothing qualifies");
        assert!(buffer.is_empty(), "buffer cleared regardless");
    }

    #[test]
    fn test_buffer_cleared_after_every_flush() {
        let dir = TempDir::new().unwrap();
        let mut buffer = buffer_in(&dir);
        buffer.push(record("ABC1234", 0.9, 1));
        buffer.flush().unwrap();
        assert!(buffer.is_empty());

        buffer.push(record("AB12", 0.9, 2));
        buffer.flush().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_header_written_only_once_across_flushes() {
        let dir = TempDir::new().unwrap();
        let mut buffer = buffer_in(&dir);
        buffer.push(record("ABC1234", 0.9, 1));
        buffer.flush().unwrap();
        buffer.push(record("XYZ5678", 0.9, 2));
        buffer.flush().unwrap();

        let lines = read_log(&dir);
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines.iter().filter(|l| *l == &CSV_HEADER.to_string()).count(),
            1
        );
        // repeated flushes append, never overwrite
        assert!(lines[1].contains("ABC1234"));
        assert!(lines[2].contains("XYZ5678"));
    }

    #[test]
    fn test_amend_updates_in_place_until_flushed() {
        let dir = TempDir::new().unwrap();
        let mut buffer = buffer_in(&dir);
        buffer.push(record("ABC1234", 0.72, 10));
        assert!(buffer.amend(record("ABC1234", 0.88, 22)));
        assert_eq!(buffer.len(), 1);

        buffer.flush().unwrap();
        // already flushed: amendment is a local no-op
        assert!(!buffer.amend(record("ABC1234", 0.93, 30)));
    }
}
