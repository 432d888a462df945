//! Core domain types for the Plateypus vehicle registry.
//!
//! Responsibilities:
//! - Model vehicle records, country partitions and synchronisation watermarks.
//! - Turn validated search requests into fuzzy boolean queries and rank hits.
//! - Define the store traits the ETL pipeline writes through and the search
//!   surfaces read from.
//!
//! Boundaries:
//! - No network or archive handling (lives in `plateypus-data`).
//! - No process configuration or logging backend (lives in `plateypus-cli`).

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod country;
pub mod search;
pub mod store;
mod vehicle;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use country::{CountryCode, CountryCodeError};
pub use store::{LookupError, StoreError, VehicleStore, WatermarkStore, get_vehicle};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;
pub use vehicle::{StoredVehicle, Vehicle, VehicleId, Watermark, minimum_timestamp};
