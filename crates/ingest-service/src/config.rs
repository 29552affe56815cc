use anyhow::{Context, Result};
use std::env;

use crate::store::DEFAULT_TOTAL_SPACES;

#[derive(Clone, Debug, PartialEq)]
pub enum ParkingStoreType {
    Memory,
    Postgres,
}

#[derive(Clone, Debug)]
pub struct IngestServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Backing store selection
    pub store_type: ParkingStoreType,

    /// Postgres connection string, required for the postgres store
    pub database_url: Option<String>,

    /// Capacity used when initializing the occupancy row
    pub total_spaces: i32,

    /// Connection pool size for the postgres store
    pub max_connections: u32,
}

impl IngestServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("INGEST_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:8086".to_string());

        let store_type_str =
            env::var("PARKING_STORE_TYPE").unwrap_or_else(|_| "memory".to_string());
        let store_type = match store_type_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => ParkingStoreType::Postgres,
            _ => ParkingStoreType::Memory,
        };

        let database_url = if store_type == ParkingStoreType::Postgres {
            Some(env::var("DATABASE_URL").context("DATABASE_URL required for Postgres store")?)
        } else {
            env::var("DATABASE_URL").ok()
        };

        let total_spaces = env::var("TOTAL_SPACES")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(DEFAULT_TOTAL_SPACES);

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        Ok(Self {
            bind_addr,
            store_type,
            database_url,
            total_spaces,
            max_connections,
        })
    }
}
