//! Decides whether a remote dump is newer than the one last loaded.

use chrono::{DateTime, Utc};
use plateypus_core::{CountryCode, StoreError, WatermarkStore, minimum_timestamp};

/// Whether `candidate` is strictly newer than the stored watermark for
/// `country`. Countries without a watermark compare against
/// [`minimum_timestamp`], so their first synchronisation always proceeds.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use plateypus_core::test_support::MemoryStore;
/// use plateypus_core::{CountryCode, WatermarkStore};
/// use plateypus_data::etl::is_newer;
///
/// let dk = CountryCode::denmark();
/// let mut store = MemoryStore::default();
/// let june = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
/// assert!(is_newer(&store, &dk, june)?);
///
/// store.upsert_watermark(&dk, june)?;
/// assert!(!is_newer(&store, &dk, june)?);
/// # Ok::<(), plateypus_core::StoreError>(())
/// ```
pub fn is_newer<S>(
    store: &S,
    country: &CountryCode,
    candidate: DateTime<Utc>,
) -> Result<bool, StoreError>
where
    S: WatermarkStore + ?Sized,
{
    let watermark = store.watermark(country)?.unwrap_or_else(minimum_timestamp);
    Ok(candidate > watermark)
}
