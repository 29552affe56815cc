//! Region-of-interest gate.
//!
//! Plate recognition is only worth running on vehicles that fill enough of the
//! frame for the plate to be legible. The gate compares the detection box area
//! against the frame area and admits boxes above a fixed ratio.

use crate::vision::BoundingBox;

pub const DEFAULT_MIN_AREA_RATIO: f64 = 0.03;

#[derive(Debug, Clone, Copy)]
pub struct RoiGate {
    min_area_ratio: f64,
}

impl RoiGate {
    pub fn new(min_area_ratio: f64) -> Self {
        Self { min_area_ratio }
    }

    /// Whether the detection box is large enough, relative to the frame, to
    /// warrant recognition.
    pub fn admit(&self, bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> bool {
        let frame_area = frame_width as u64 * frame_height as u64;
        if frame_area == 0 {
            return false;
        }
        bbox.area() as f64 / frame_area as f64 > self.min_area_ratio
    }
}

impl Default for RoiGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_AREA_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_box_admitted() {
        let gate = RoiGate::default();
        let bbox = BoundingBox {
            x: 100,
            y: 100,
            width: 640,
            height: 360,
        };
        assert!(gate.admit(&bbox, 1280, 720));
    }

    #[test]
    fn test_small_box_rejected() {
        let gate = RoiGate::default();
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            width: 64,
            height: 36,
        };
        // 64*36 / (1280*720) = 0.0025
        assert!(!gate.admit(&bbox, 1280, 720));
    }

    #[test]
    fn test_ratio_at_threshold_rejected() {
        // exactly 3% of the frame: predicate is strictly-greater-than
        let gate = RoiGate::new(0.03);
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            width: 192,
            height: 144,
        };
        assert!(!gate.admit(&bbox, 1280, 720));
    }

    #[test]
    fn test_degenerate_frame_rejected() {
        let gate = RoiGate::default();
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(!gate.admit(&bbox, 0, 0));
    }
}
