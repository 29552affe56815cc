//! Vehicle-type dimension resolution with a process-lifetime cache.
//!
//! The cache only ever stores ids the store has committed, so a hit can never
//! reference a row that lost a creation race.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::ParkingStore;

#[derive(Clone)]
pub struct VehicleTypeResolver {
    store: Arc<dyn ParkingStore>,
    cache: Arc<RwLock<HashMap<String, i64>>>,
}

impl VehicleTypeResolver {
    pub fn new(store: Arc<dyn ParkingStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve a type name to its dimension id, creating the row on first use.
    pub async fn resolve(&self, name: &str) -> Result<i64> {
        {
            let cache = self.cache.read().await;
            if let Some(id) = cache.get(name) {
                return Ok(*id);
            }
        }

        let id = self.store.get_or_create_vehicle_type(name).await?;
        debug!(name, id, "resolved vehicle type");

        let mut cache = self.cache.write().await;
        cache.insert(name.to_string(), id);
        Ok(id)
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
