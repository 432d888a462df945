//! Data access traits for vehicle documents and synchronisation watermarks.
//!
//! The ETL pipeline is the only writer; search and lookup surfaces only read.
//! Both traits are implemented by [`SqliteStore`] and, for tests, by
//! [`MemoryStore`](crate::test_support::MemoryStore).

#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::search::{SearchHit, VehicleQuery};
use crate::{CountryCode, StoredVehicle, Vehicle, VehicleId};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::{SCHEMA_VERSION, initialise_schema};
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStore;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Opening the backing database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open vehicle store at {path:?}")]
    Open {
        /// Database location.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A database statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("vehicle store failed to {operation}")]
    Sqlite {
        /// What the store was doing.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The schema on disk does not match this build.
    #[error(
        "expected vehicle store schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version this build writes.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
    /// A persisted row could not be decoded.
    #[error("stored {what} is corrupt: {detail}")]
    Corrupt {
        /// Kind of value that failed to decode.
        what: &'static str,
        /// Decoder message.
        detail: String,
    },
    /// A count did not fit the store's integer type.
    #[error("{what} count {count} exceeds the store's range")]
    OutOfRange {
        /// Name of the value.
        what: &'static str,
        /// Value that failed the conversion.
        count: usize,
    },
}

/// Failure to fetch a single vehicle by identifier.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No vehicle carries the identifier.
    #[error("vehicle {id:?} not found")]
    NotFound {
        /// The identifier as supplied by the caller.
        id: String,
    },
    /// The store failed while looking the vehicle up.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LookupError {
    /// HTTP status a serving layer should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Store(_) => 500,
        }
    }
}

/// Document sink and query engine for vehicle records.
pub trait VehicleStore {
    /// Remove every vehicle belonging to `country`, returning how many went.
    fn delete_country(&mut self, country: &CountryCode) -> Result<u64, StoreError>;

    /// Persist `vehicles`, assigning fresh identifiers. Returns the count.
    fn insert_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<u64, StoreError>;

    /// Replace the `country` partition with `vehicles`.
    ///
    /// The default deletes and then inserts as two separate operations; if
    /// the insert fails the partition stays empty until the next successful
    /// load. Stores able to do better should override this with an atomic
    /// swap.
    ///
    /// Returns `(deleted, inserted)`.
    fn replace_country(
        &mut self,
        country: &CountryCode,
        vehicles: &[Vehicle],
    ) -> Result<(u64, u64), StoreError> {
        let deleted = self.delete_country(country)?;
        let inserted = self.insert_vehicles(vehicles)?;
        Ok((deleted, inserted))
    }

    /// Fetch a vehicle by identifier.
    fn get_vehicle(&self, id: VehicleId) -> Result<Option<StoredVehicle>, StoreError>;

    /// Evaluate `query` and return at most `size` ranked hits.
    fn search(&self, query: &VehicleQuery, size: usize) -> Result<Vec<SearchHit>, StoreError>;
}

/// Persisted per-country synchronisation watermarks.
pub trait WatermarkStore {
    /// Timestamp of the last dump loaded for `country`, if any.
    fn watermark(&self, country: &CountryCode) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Record `last_updated` for `country`, updating an existing row in place.
    fn upsert_watermark(
        &mut self,
        country: &CountryCode,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Look up a vehicle by its textual identifier.
///
/// Identifiers that do not parse cannot name a stored vehicle, so they are
/// reported as [`LookupError::NotFound`] just like unknown ones.
///
/// # Examples
/// ```
/// # #[cfg(feature = "test-support")]
/// # {
/// use plateypus_core::store::{LookupError, get_vehicle};
/// use plateypus_core::test_support::MemoryStore;
///
/// let store = MemoryStore::default();
/// let err = get_vehicle(&store, "xyz").expect_err("unknown id");
/// assert!(matches!(err, LookupError::NotFound { .. }));
/// assert_eq!(err.status_code(), 404);
/// # }
/// ```
pub fn get_vehicle<S>(store: &S, id: &str) -> Result<StoredVehicle, LookupError>
where
    S: VehicleStore + ?Sized,
{
    let not_found = || LookupError::NotFound { id: id.to_owned() };
    let parsed: VehicleId = id.parse().map_err(|_| not_found())?;
    store.get_vehicle(parsed)?.ok_or_else(not_found)
}

#[cfg(all(test, feature = "store-sqlite"))]
mod tests;
