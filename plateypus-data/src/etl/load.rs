//! Replaces a country's vehicles and records the new watermark.

use chrono::{DateTime, Utc};
use plateypus_core::{CountryCode, StoreError, Vehicle, VehicleStore, WatermarkStore};
use thiserror::Error;

/// Counts from a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Vehicles removed from the previous load.
    pub deleted: u64,
    /// Vehicles written by this load.
    pub inserted: u64,
}

/// Failure during a load, naming the step that failed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Replacing the country's vehicles failed.
    #[error("failed to replace {country} vehicles ({attempted} prepared): {source}")]
    Replace {
        /// Country being loaded.
        country: CountryCode,
        /// Number of vehicles the load tried to write.
        attempted: usize,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// Vehicles were written but the watermark was not.
    #[error("loaded {inserted} {country} vehicles but failed to record the watermark: {source}")]
    Watermark {
        /// Country being loaded.
        country: CountryCode,
        /// Vehicles already written.
        inserted: u64,
        /// Store failure.
        #[source]
        source: StoreError,
    },
}

/// Replace every stored vehicle for `country` with `entities`, then upsert
/// the watermark to `observed`.
///
/// The watermark is written last: if anything before it fails the next run
/// sees the same dump as newer and retries it.
pub fn load_vehicles<S>(
    store: &mut S,
    country: &CountryCode,
    entities: &[Vehicle],
    observed: DateTime<Utc>,
) -> Result<LoadReport, LoadError>
where
    S: VehicleStore + WatermarkStore + ?Sized,
{
    let (deleted, inserted) =
        store
            .replace_country(country, entities)
            .map_err(|source| LoadError::Replace {
                country: country.clone(),
                attempted: entities.len(),
                source,
            })?;
    log::info!("deleted {deleted} and inserted {inserted} {country} vehicles");

    store
        .upsert_watermark(country, observed)
        .map_err(|source| LoadError::Watermark {
            country: country.clone(),
            inserted,
            source,
        })?;
    log::info!("{country} watermark set to {observed}");

    Ok(LoadReport { deleted, inserted })
}
