//! Periodic `{fps, running}` heartbeat to the ingest service.
//!
//! Informational only; the server logs it and changes no state. Send failures
//! are logged and the loop continues.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::detections::DetectorStatus;

/// Shared counters the frame loop updates and the heartbeat reports.
pub struct HeartbeatState {
    frames: AtomicU64,
    running: AtomicBool,
    started: Instant,
}

impl HeartbeatState {
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            running: AtomicBool::new(true),
            started: Instant::now(),
        }
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Average processing rate since startup.
    pub fn fps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.frames.load(Ordering::Relaxed) as f64 / elapsed
    }
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the heartbeat loop posting status on an interval until cancelled.
///
/// A final `running: false` status is sent best-effort on shutdown.
pub fn spawn_heartbeat(
    state: Arc<HeartbeatState>,
    endpoint: String,
    interval_secs: u64,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        info!(endpoint = %endpoint, interval_secs, "starting status heartbeat");
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let status = DetectorStatus {
                        fps: state.fps(),
                        running: false,
                    };
                    if let Err(e) = post_status(&client, &endpoint, &status).await {
                        debug!(error = %e, "final status not delivered");
                    }
                    break;
                }
                _ = interval.tick() => {
                    let status = DetectorStatus {
                        fps: state.fps(),
                        running: state.is_running(),
                    };
                    if let Err(e) = post_status(&client, &endpoint, &status).await {
                        warn!(error = %e, "failed to post detector status");
                    }
                }
            }
        }

        info!("status heartbeat stopped");
    })
}

async fn post_status(
    client: &reqwest::Client,
    endpoint: &str,
    status: &DetectorStatus,
) -> anyhow::Result<()> {
    let response = client.post(endpoint).json(status).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("status endpoint returned {}", response.status());
    }
    Ok(())
}
