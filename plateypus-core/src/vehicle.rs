//! Vehicle records and the per-country synchronisation watermark.

use std::{fmt, num::ParseIntError, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CountryCode;

/// One registered vehicle, normalised from a national register dump.
///
/// Records are created in bulk for a single country and replaced wholesale on
/// the next successful synchronisation; they are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Register the record was loaded from.
    pub country: CountryCode,
    /// Registration plate.
    pub plate: String,
    /// First registration date exactly as the register reports it.
    pub first_reg: String,
    /// Vehicle identification number.
    pub vin: String,
    /// Manufacturer name.
    pub maker: String,
    /// Model and variant.
    pub model: String,
    /// Fuel or propulsion type.
    pub fuel_type: String,
    /// Colour name.
    pub colour: String,
    /// Markup fragment the record was derived from.
    pub raw_xml: String,
}

impl Vehicle {
    /// Create a record for `country` with every attribute empty.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::{CountryCode, Vehicle};
    ///
    /// let mut vehicle = Vehicle::empty(CountryCode::denmark());
    /// vehicle.plate = "AB12345".into();
    /// assert_eq!(vehicle.country.as_str(), "dk");
    /// assert!(vehicle.maker.is_empty());
    /// ```
    #[must_use]
    pub fn empty(country: CountryCode) -> Self {
        Self {
            country,
            plate: String::new(),
            first_reg: String::new(),
            vin: String::new(),
            maker: String::new(),
            model: String::new(),
            fuel_type: String::new(),
            colour: String::new(),
            raw_xml: String::new(),
        }
    }
}

/// Store-assigned identifier of a persisted [`Vehicle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(i64);

impl VehicleId {
    /// Wrap a raw store identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw identifier as stored.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl FromStr for VehicleId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A [`Vehicle`] together with the identifier the store gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVehicle {
    /// Store-assigned identifier.
    pub id: VehicleId,
    /// The persisted record.
    #[serde(flatten)]
    pub vehicle: Vehicle,
}

/// Timestamp of the most recently loaded dump for a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Partition the watermark belongs to.
    pub country: CountryCode,
    /// Modification time of the dump that was last loaded.
    pub last_updated: DateTime<Utc>,
}

/// The earliest representable timestamp.
///
/// Countries without a watermark compare against this value, so their first
/// synchronisation always proceeds.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use plateypus_core::minimum_timestamp;
///
/// assert!(Utc::now() > minimum_timestamp());
/// ```
#[must_use]
pub const fn minimum_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}
