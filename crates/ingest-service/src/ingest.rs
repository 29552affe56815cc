//! Batch ingestion of transported detections.
//!
//! Per-event validation failures skip the event without failing the batch;
//! vehicle-type resolution commits independently; entry rows and occupancy
//! updates commit atomically per batch through the store.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use common::detections::{DetectionBatch, DetectionEvent};

use crate::resolver::VehicleTypeResolver;
use crate::store::{NewParkingEntry, ParkingStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct IngestHandler {
    store: Arc<dyn ParkingStore>,
    resolver: VehicleTypeResolver,
}

impl IngestHandler {
    pub fn new(store: Arc<dyn ParkingStore>) -> Self {
        let resolver = VehicleTypeResolver::new(store.clone());
        Self { store, resolver }
    }

    /// Ingest a batch from an event source that knows entry/exit dispositions.
    ///
    /// Events without an `is_entry` flag, or with unparseable fields, are
    /// skipped; the remaining events commit atomically.
    pub async fn ingest_batch(&self, batch: &DetectionBatch) -> Result<BatchOutcome> {
        let timer = telemetry::metrics::INGEST_BATCH_SECONDS.start_timer();
        let mut outcome = BatchOutcome::default();
        let mut staged = Vec::with_capacity(batch.detections.len());

        for event in &batch.detections {
            let Some(is_entry) = event.is_entry else {
                warn!(
                    plate = %event.record.license_plate,
                    "skipping detection without entry/exit disposition"
                );
                outcome.skipped += 1;
                continue;
            };

            match self.stage(event, is_entry).await? {
                Some(entry) => staged.push(entry),
                None => outcome.skipped += 1,
            }
        }

        if !staged.is_empty() {
            let occupancy = match self.store.apply_events(&staged).await {
                Ok(occupancy) => occupancy,
                Err(e) => {
                    telemetry::metrics::INGEST_BATCHES
                        .with_label_values(&["rolled_back"])
                        .inc();
                    return Err(e).context("batch persistence failed, no events applied");
                }
            };
            outcome.applied = staged.len();

            telemetry::metrics::INGEST_OCCUPIED_SPACES.set(occupancy.occupied_spaces as i64);
            info!(
                applied = outcome.applied,
                skipped = outcome.skipped,
                fps = batch.fps,
                occupied = occupancy.occupied_spaces,
                total = occupancy.total_spaces,
                "processed detection batch"
            );
        }

        telemetry::metrics::INGEST_BATCHES
            .with_label_values(&["committed"])
            .inc();
        telemetry::metrics::INGEST_EVENTS
            .with_label_values(&["applied"])
            .inc_by(outcome.applied as u64);
        telemetry::metrics::INGEST_EVENTS
            .with_label_values(&["skipped"])
            .inc_by(outcome.skipped as u64);
        timer.observe_duration();

        Ok(outcome)
    }

    /// Ingest one detection from the single-event channel.
    ///
    /// The edge cannot determine entry/exit from a single camera, so a missing
    /// flag defaults to an entry.
    pub async fn ingest_single(&self, event: &DetectionEvent) -> Result<BatchOutcome> {
        let is_entry = event.is_entry.unwrap_or(true);
        let Some(entry) = self.stage(event, is_entry).await? else {
            bail!(
                "detection for '{}' is missing required fields",
                event.record.license_plate
            );
        };

        let occupancy = self.store.apply_events(&[entry]).await?;
        telemetry::metrics::INGEST_OCCUPIED_SPACES.set(occupancy.occupied_spaces as i64);
        telemetry::metrics::INGEST_EVENTS
            .with_label_values(&["applied"])
            .inc();

        info!(
            plate = %event.record.license_plate,
            is_entry,
            occupied = occupancy.occupied_spaces,
            total = occupancy.total_spaces,
            "processed detection"
        );

        Ok(BatchOutcome {
            applied: 1,
            skipped: 0,
        })
    }

    /// Validate and resolve one event. `Ok(None)` means a semantic skip.
    async fn stage(
        &self,
        event: &DetectionEvent,
        is_entry: bool,
    ) -> Result<Option<NewParkingEntry>> {
        let record = &event.record;
        if record.license_plate.is_empty() || record.vehicle_type.is_empty() {
            warn!("skipping detection with empty plate or vehicle type");
            return Ok(None);
        }

        let timestamp = match record.occurred_at() {
            Ok(timestamp) => timestamp,
            Err(e) => {
                warn!(
                    plate = %record.license_plate,
                    error = %e,
                    "skipping detection with malformed timestamp"
                );
                return Ok(None);
            }
        };

        // dimension rows commit independently of the batch transaction
        let vehicle_type_id = self.resolver.resolve(&record.vehicle_type).await?;

        Ok(Some(NewParkingEntry {
            license_plate: record.license_plate.clone(),
            timestamp,
            is_entry,
            vehicle_type_id,
            confidence: event.confidence.unwrap_or(record.text_confidence) as f64,
        }))
    }
}
