//! Capability interfaces for the external vision models.
//!
//! The node does not run inference itself; it consumes a vehicle detector and
//! a plate recognizer through these narrow traits so either can be swapped for
//! a deterministic stub in tests.

pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One captured video frame handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame sequence number within the stream
    pub sequence: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Encoded frame data
    pub data: Vec<u8>,
}

/// Bounding box coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Vehicle classes the detector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "car" => Ok(VehicleClass::Car),
            "motorcycle" => Ok(VehicleClass::Motorcycle),
            "bus" => Ok(VehicleClass::Bus),
            "truck" => Ok(VehicleClass::Truck),
            _ => Err(format!("Invalid vehicle class: {}", s)),
        }
    }
}

/// One vehicle located in a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDetection {
    pub class: VehicleClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Corner point of a recognized plate quadrilateral
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlatePoint {
    pub x: i32,
    pub y: i32,
}

/// One plate reading from the recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateCandidate {
    pub text: String,
    pub confidence: f32,
    pub corners: Vec<PlatePoint>,
}

/// Locates vehicles in a frame.
#[async_trait]
pub trait VehicleDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<VehicleDetection>>;
}

/// Reads plate text from a vehicle region of a frame.
///
/// Returns zero or more candidates; callers decide which, if any, to admit.
#[async_trait]
pub trait PlateRecognizer: Send + Sync {
    async fn recognize(&self, frame: &Frame, region: &BoundingBox) -> Result<Vec<PlateCandidate>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bounding_box_area() {
        let bbox = BoundingBox {
            x: 10,
            y: 10,
            width: 120,
            height: 40,
        };
        assert_eq!(bbox.area(), 4800);
    }

    #[test]
    fn test_vehicle_class_round_trip() {
        for class in [
            VehicleClass::Car,
            VehicleClass::Motorcycle,
            VehicleClass::Bus,
            VehicleClass::Truck,
        ] {
            assert_eq!(VehicleClass::from_str(class.as_str()).unwrap(), class);
        }
        assert!(VehicleClass::from_str("bicycle").is_err());
    }
}
