/// Mock vehicle detector and plate recognizer for testing and demonstration
use super::{
    BoundingBox, Frame, PlateCandidate, PlatePoint, PlateRecognizer, VehicleClass,
    VehicleDetection, VehicleDetector,
};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockDetectorConfig {
    /// Lowest confidence the mock will report
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,

    /// Classes to cycle through
    #[serde(default = "default_classes")]
    pub classes: Vec<VehicleClass>,
}

fn default_confidence_floor() -> f32 {
    0.5
}

fn default_classes() -> Vec<VehicleClass> {
    vec![
        VehicleClass::Car,
        VehicleClass::Truck,
        VehicleClass::Motorcycle,
    ]
}

impl Default for MockDetectorConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            classes: default_classes(),
        }
    }
}

/// Deterministic fake vehicle detector.
///
/// Every frame yields one large, ROI-passing vehicle; every other frame adds a
/// second, distant vehicle too small to pass the ROI gate. Results depend only
/// on the frame sequence number, so repeated runs are reproducible.
pub struct MockVehicleDetector {
    config: MockDetectorConfig,
}

impl MockVehicleDetector {
    pub fn new() -> Self {
        Self {
            config: MockDetectorConfig::default(),
        }
    }

    pub fn with_config(config: MockDetectorConfig) -> Self {
        Self { config }
    }
}

impl Default for MockVehicleDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleDetector for MockVehicleDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<VehicleDetection>> {
        let seed = frame.sequence.wrapping_mul(7);
        let class_idx = (frame.sequence % self.config.classes.len() as u64) as usize;
        let confidence = self.config.confidence_floor
            + ((seed % 40) as f32 / 100.0).min(1.0 - self.config.confidence_floor);

        let mut detections = vec![VehicleDetection {
            class: self.config.classes[class_idx],
            confidence,
            bbox: BoundingBox {
                x: frame.width / 4,
                y: frame.height / 4,
                width: frame.width / 2,
                height: frame.height / 2,
            },
        }];

        if frame.sequence % 2 == 1 {
            // far-away vehicle, below the ROI threshold
            detections.push(VehicleDetection {
                class: VehicleClass::Car,
                confidence: self.config.confidence_floor,
                bbox: BoundingBox {
                    x: (seed % frame.width.max(1) as u64) as u32,
                    y: 0,
                    width: frame.width / 20,
                    height: frame.height / 20,
                },
            });
        }

        Ok(detections)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockRecognizerConfig {
    /// Plate texts to cycle through by frame sequence
    #[serde(default = "default_plate_pool")]
    pub plate_pool: Vec<String>,

    /// Base OCR confidence before the per-frame jitter
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f32,
}

fn default_plate_pool() -> Vec<String> {
    vec![
        "ABC1234".to_string(),
        "XYZ5678".to_string(),
        "LMN2468".to_string(),
    ]
}

fn default_base_confidence() -> f32 {
    0.68
}

impl Default for MockRecognizerConfig {
    fn default() -> Self {
        Self {
            plate_pool: default_plate_pool(),
            base_confidence: default_base_confidence(),
        }
    }
}

/// Deterministic fake plate recognizer.
///
/// Picks a plate from the pool by frame sequence and jitters the confidence so
/// consecutive sightings of the same plate exercise the amend-in-place path.
pub struct MockPlateRecognizer {
    config: MockRecognizerConfig,
}

impl MockPlateRecognizer {
    pub fn new() -> Self {
        Self {
            config: MockRecognizerConfig::default(),
        }
    }

    pub fn with_config(config: MockRecognizerConfig) -> Self {
        Self { config }
    }
}

impl Default for MockPlateRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlateRecognizer for MockPlateRecognizer {
    async fn recognize(&self, frame: &Frame, region: &BoundingBox) -> Result<Vec<PlateCandidate>> {
        if self.config.plate_pool.is_empty() {
            return Ok(vec![]);
        }

        let idx = (frame.sequence % self.config.plate_pool.len() as u64) as usize;
        let jitter = (frame.sequence.wrapping_mul(13) % 25) as f32 / 100.0;
        let confidence = (self.config.base_confidence + jitter).min(0.99);

        let corners = vec![
            PlatePoint {
                x: region.x as i32,
                y: (region.y + region.height / 2) as i32,
            },
            PlatePoint {
                x: (region.x + region.width / 3) as i32,
                y: (region.y + region.height / 2) as i32,
            },
            PlatePoint {
                x: (region.x + region.width / 3) as i32,
                y: (region.y + region.height) as i32,
            },
            PlatePoint {
                x: region.x as i32,
                y: (region.y + region.height) as i32,
            },
        ];

        Ok(vec![PlateCandidate {
            text: self.config.plate_pool[idx].clone(),
            confidence,
            corners,
        }])
    }
}
