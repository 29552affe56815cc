pub mod config;
pub mod ingest;
pub mod pg_store;
pub mod resolver;
pub mod routes;
pub mod store;

// Re-export commonly used types
pub use config::{IngestServiceConfig, ParkingStoreType};
pub use ingest::{BatchOutcome, IngestHandler};
pub use pg_store::PgParkingStore;
pub use resolver::VehicleTypeResolver;
pub use routes::{create_router, AppState};
pub use store::{MemoryParkingStore, NewParkingEntry, OccupancyRow, ParkingStore};
