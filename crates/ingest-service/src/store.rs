//! Persistence seam for the ingest service.
//!
//! The store owns the three parking tables. `apply_events` is the only write
//! path for entries and occupancy and must be atomic per call: either every
//! staged entry and its occupancy update commits, or none do.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

pub const DEFAULT_TOTAL_SPACES: i32 = 100;

/// A validated, resolved event ready to persist.
#[derive(Debug, Clone)]
pub struct NewParkingEntry {
    pub license_plate: String,
    pub timestamp: DateTime<Utc>,
    pub is_entry: bool,
    pub vehicle_type_id: i64,
    pub confidence: f64,
}

/// Current occupancy row.
#[derive(Debug, Clone)]
pub struct OccupancyRow {
    pub id: i64,
    pub total_spaces: i32,
    pub occupied_spaces: i32,
    pub last_updated: DateTime<Utc>,
}

#[async_trait]
pub trait ParkingStore: Send + Sync {
    /// Look up or create a vehicle type by name.
    ///
    /// Must behave as if serialized per name: concurrent first sightings of a
    /// new name converge on a single row.
    async fn get_or_create_vehicle_type(&self, name: &str) -> Result<i64>;

    /// Persist a batch of entries and their occupancy updates atomically.
    ///
    /// Returns the occupancy after the batch. Entries apply in slice order;
    /// an exit never takes the occupied count below zero.
    async fn apply_events(&self, events: &[NewParkingEntry]) -> Result<OccupancyRow>;

    /// The most recently updated occupancy row, if any event was ever applied.
    async fn latest_occupancy(&self) -> Result<Option<OccupancyRow>>;

    /// Backing-store connectivity check.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(Default)]
struct StoreInner {
    vehicle_types: HashMap<String, i64>,
    next_type_id: i64,
    entries: Vec<(i64, NewParkingEntry)>,
    next_entry_id: i64,
    occupancy: Option<OccupancyRow>,
}

/// In-memory store for tests and single-process deployments.
pub struct MemoryParkingStore {
    inner: RwLock<StoreInner>,
    total_spaces: i32,
}

impl MemoryParkingStore {
    pub fn new(total_spaces: i32) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            total_spaces,
        }
    }

    /// All persisted entries, oldest first. Test/diagnostic helper.
    pub async fn entries(&self) -> Vec<NewParkingEntry> {
        let inner = self.inner.read().await;
        inner.entries.iter().map(|(_, e)| e.clone()).collect()
    }

    pub async fn vehicle_type_count(&self) -> usize {
        self.inner.read().await.vehicle_types.len()
    }
}

impl Default for MemoryParkingStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_SPACES)
    }
}

fn apply_occupancy(row: &mut OccupancyRow, is_entry: bool, now: DateTime<Utc>) {
    if is_entry {
        row.occupied_spaces += 1;
        if row.occupied_spaces > row.total_spaces {
            warn!(
                occupied = row.occupied_spaces,
                total = row.total_spaces,
                "occupancy exceeds configured capacity"
            );
        }
    } else {
        row.occupied_spaces = (row.occupied_spaces - 1).max(0);
    }
    row.last_updated = now;
}

#[async_trait]
impl ParkingStore for MemoryParkingStore {
    async fn get_or_create_vehicle_type(&self, name: &str) -> Result<i64> {
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.vehicle_types.get(name) {
            return Ok(*id);
        }
        inner.next_type_id += 1;
        let id = inner.next_type_id;
        inner.vehicle_types.insert(name.to_string(), id);
        Ok(id)
    }

    async fn apply_events(&self, events: &[NewParkingEntry]) -> Result<OccupancyRow> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let mut occupancy = inner.occupancy.clone().unwrap_or(OccupancyRow {
            id: 1,
            total_spaces: self.total_spaces,
            occupied_spaces: 0,
            last_updated: now,
        });

        let mut staged = Vec::with_capacity(events.len());
        for event in events {
            staged.push(event.clone());
            apply_occupancy(&mut occupancy, event.is_entry, now);
        }

        // single lock scope: the whole batch lands or none of it does
        for event in staged {
            inner.next_entry_id += 1;
            let id = inner.next_entry_id;
            inner.entries.push((id, event));
        }
        inner.occupancy = Some(occupancy.clone());

        Ok(occupancy)
    }

    async fn latest_occupancy(&self) -> Result<Option<OccupancyRow>> {
        Ok(self.inner.read().await.occupancy.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
