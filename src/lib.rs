//! Facade crate for the Plateypus vehicle index.
//!
//! This crate re-exports the core domain types and exposes the SQLite store
//! and the register synchronisation pipeline behind feature flags.

#![forbid(unsafe_code)]

pub use plateypus_core::{
    CountryCode, CountryCodeError, LookupError, StoreError, StoredVehicle, Vehicle, VehicleId,
    VehicleStore, WatermarkStore, get_vehicle,
};

/// Search request validation, query building, and ranking.
pub mod search {
    pub use plateypus_core::search::*;
}

#[cfg(feature = "store-sqlite")]
pub use plateypus_core::SqliteStore;

#[cfg(feature = "etl")]
pub use plateypus_data::etl::{SyncError, SyncOutcome, SyncPipeline, SyncSettings};
#[cfg(feature = "etl")]
pub use plateypus_data::remote::{FtpConnector, HttpDiscoveryClient};
