//! Frame acquisition seam.
//!
//! Real capture (camera, RTSP, file decode) lives outside this crate; the
//! pipeline only needs something that yields frames in order. The synthetic
//! source exists for demonstration runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time;

use crate::vision::Frame;

#[async_trait]
pub trait FrameSource: Send {
    /// Next frame in the stream, or `None` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Nominal frame rate of the source.
    fn fps(&self) -> f64;
}

/// Deterministic frame generator.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: f64,
    total_frames: u64,
    next_sequence: u64,
    /// Sleep between frames to approximate the nominal rate
    paced: bool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: f64, total_frames: u64) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames,
            next_sequence: 0,
            paced: false,
        }
    }

    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next_sequence >= self.total_frames {
            return Ok(None);
        }

        if self.paced && self.fps > 0.0 {
            time::sleep(Duration::from_secs_f64(1.0 / self.fps)).await;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Ok(Some(Frame {
            sequence,
            width: self.width,
            height: self.height,
            data: vec![(sequence % 251) as u8; 64],
        }))
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}
