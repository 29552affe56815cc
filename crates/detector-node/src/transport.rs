//! Best-effort forwarding of reported detections to the ingest service.
//!
//! The frame loop never blocks on the network: detections go into a bounded
//! queue with a drop-oldest-on-full policy, and a background task drains the
//! queue and POSTs each event. At-most-once — a failed send is logged and the
//! event dropped; there is no retry and no ordering guarantee relative to the
//! local CSV flush.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::detections::DetectionEvent;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Ingest endpoint receiving single detection events
    pub endpoint: String,

    /// Queue capacity; the oldest queued event is dropped when full
    pub capacity: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8086/v1/detections".to_string(),
            capacity: 256,
            request_timeout_secs: 10,
        }
    }
}

/// Bounded dispatch queue between the frame loop and the sender task.
#[derive(Clone)]
pub struct TransportQueue {
    inner: Arc<Mutex<VecDeque<DetectionEvent>>>,
    notify: Arc<Notify>,
    capacity: usize,
}

impl TransportQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            notify: Arc::new(Notify::new()),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue an event, dropping the oldest queued event when full.
    pub fn push(&self, event: DetectionEvent) {
        {
            let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= self.capacity {
                if let Some(dropped) = queue.pop_front() {
                    telemetry::metrics::DETECTOR_TRANSPORT_EVENTS
                        .with_label_values(&["dropped"])
                        .inc();
                    warn!(
                        plate = %dropped.record.license_plate,
                        capacity = self.capacity,
                        "transport queue full, dropping oldest event"
                    );
                }
            }
            queue.push_back(event);
        }
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<DetectionEvent> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Spawn the background sender draining the queue into the ingest endpoint.
pub fn spawn_sender(
    queue: TransportQueue,
    config: TransportConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        info!(endpoint = %config.endpoint, "starting detection transport");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let remaining = queue.len();
                    if remaining > 0 {
                        warn!(remaining, "transport stopped with events still queued");
                    }
                    break;
                }
                _ = queue.notified() => {
                    while let Some(event) = queue.pop() {
                        send_event(&client, &config.endpoint, &event).await;
                    }
                }
            }
        }

        info!("detection transport stopped");
    })
}

async fn send_event(client: &reqwest::Client, endpoint: &str, event: &DetectionEvent) {
    match client.post(endpoint).json(event).send().await {
        Ok(response) if response.status().is_success() => {
            telemetry::metrics::DETECTOR_TRANSPORT_EVENTS
                .with_label_values(&["sent"])
                .inc();
            debug!(plate = %event.record.license_plate, "forwarded detection");
        }
        Ok(response) => {
            telemetry::metrics::DETECTOR_TRANSPORT_EVENTS
                .with_label_values(&["failed"])
                .inc();
            warn!(
                plate = %event.record.license_plate,
                status = %response.status(),
                "ingest endpoint rejected detection"
            );
        }
        Err(e) => {
            telemetry::metrics::DETECTOR_TRANSPORT_EVENTS
                .with_label_values(&["failed"])
                .inc();
            warn!(
                plate = %event.record.license_plate,
                error = %e,
                "failed to forward detection"
            );
        }
    }
}
