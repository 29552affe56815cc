//! Per-plate-text duplicate suppression.
//!
//! A plate re-read across consecutive frames of one pass is a single logical
//! event: the tracker keeps one entry per plate text and only reports a plate
//! again once the duplicate window has elapsed. Within the window, a
//! higher-confidence re-read improves the already-reported detection instead
//! of producing a new one.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::vision::{BoundingBox, VehicleClass};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Seconds during which repeat sightings of a plate collapse into one event
    pub duplicate_window_secs: i64,

    /// Shortest plate text admitted into tracking
    pub min_plate_len: usize,

    /// Longest plate text admitted into tracking
    pub max_plate_len: usize,

    /// OCR confidence floor for admission
    pub admission_confidence: f32,

    /// Entries older than `duplicate_window_secs * eviction_factor` are swept
    pub eviction_factor: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            duplicate_window_secs: 30,
            min_plate_len: 4,
            max_plate_len: 10,
            admission_confidence: 0.6,
            eviction_factor: 10,
        }
    }
}

/// One validated per-frame plate reading.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub plate_text: String,
    pub text_confidence: f32,
    pub vehicle_class: VehicleClass,
    pub vehicle_confidence: f32,
    pub bbox: BoundingBox,
    pub frame_number: u64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TrackerEntry {
    first_seen_at: DateTime<Utc>,
    best_confidence: f32,
}

/// Tracker decision for one sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// First sighting of this plate text, or a re-appearance after the
    /// window: report a new detection
    Tracked,

    /// Higher-confidence duplicate inside the window: amend the detection
    /// already reported for this window
    Improved,

    /// Duplicate inside the window with no better confidence: drop
    Duplicate,

    /// Failed the admission predicate: drop
    Rejected,
}

impl TrackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackOutcome::Tracked => "tracked",
            TrackOutcome::Improved => "improved",
            TrackOutcome::Duplicate => "duplicate",
            TrackOutcome::Rejected => "rejected",
        }
    }
}

/// Plate-text keyed duplicate-window state machine.
///
/// The key is the plate text alone: two vehicles sharing a misread identical
/// text inside the window are indistinguishable and collapse into one entry.
pub struct PlateTracker {
    config: TrackerConfig,
    entries: HashMap<String, TrackerEntry>,
}

impl PlateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    fn admits(&self, sighting: &Sighting) -> bool {
        let text = &sighting.plate_text;
        let len = text.chars().count();
        len >= self.config.min_plate_len
            && len <= self.config.max_plate_len
            && text.chars().any(|c| c.is_ascii_alphabetic())
            && text.chars().any(|c| c.is_ascii_digit())
            && sighting.text_confidence >= self.config.admission_confidence
    }

    /// Apply one sighting to the tracker state.
    pub fn observe(&mut self, sighting: &Sighting) -> TrackOutcome {
        if !self.admits(sighting) {
            return TrackOutcome::Rejected;
        }

        match self.entries.get_mut(&sighting.plate_text) {
            None => {
                self.entries.insert(
                    sighting.plate_text.clone(),
                    TrackerEntry {
                        first_seen_at: sighting.observed_at,
                        best_confidence: sighting.text_confidence,
                    },
                );
                TrackOutcome::Tracked
            }
            Some(entry) => {
                let elapsed = (sighting.observed_at - entry.first_seen_at).num_seconds();
                if elapsed <= self.config.duplicate_window_secs {
                    if sighting.text_confidence > entry.best_confidence {
                        entry.best_confidence = sighting.text_confidence;
                        TrackOutcome::Improved
                    } else {
                        TrackOutcome::Duplicate
                    }
                } else {
                    // window elapsed: the plate left and came back
                    entry.first_seen_at = sighting.observed_at;
                    entry.best_confidence = sighting.text_confidence;
                    TrackOutcome::Tracked
                }
            }
        }
    }

    /// Sweep entries whose window has long expired so the map stays bounded.
    ///
    /// Returns the number of entries removed. An evicted plate re-sighted
    /// later is simply tracked as a fresh occurrence, the same as a window
    /// reset.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.config.duplicate_window_secs * self.config.eviction_factor;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| (now - entry.first_seen_at).num_seconds() <= ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
