//! Source-country partition key.

use std::{fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two-letter code identifying the national register a record came from.
///
/// Codes are normalised to lower case so `"DK"` and `"dk"` name the same
/// partition.
///
/// # Examples
/// ```
/// use plateypus_core::CountryCode;
///
/// # fn main() -> Result<(), plateypus_core::CountryCodeError> {
/// let country = CountryCode::new("DK")?;
/// assert_eq!(country.as_str(), "dk");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

/// Errors returned by [`CountryCode::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CountryCodeError {
    /// The code did not consist of exactly two ASCII letters.
    #[error("country code {value:?} must be exactly two ASCII letters")]
    Malformed {
        /// Input that failed validation.
        value: String,
    },
}

impl CountryCode {
    /// Validate and normalise a country code.
    pub fn new(value: impl AsRef<str>) -> Result<Self, CountryCodeError> {
        let raw = value.as_ref().trim();
        if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(CountryCodeError::Malformed {
                value: value.as_ref().to_owned(),
            })
        }
    }

    /// Code for the Danish Motor Register.
    #[must_use]
    pub fn denmark() -> Self {
        Self("dk".to_owned())
    }

    /// Borrow the normalised code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CountryCode {
    type Err = CountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CountryCode> for String {
    fn from(value: CountryCode) -> Self {
        value.0
    }
}

impl AsRef<str> for CountryCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for CountryCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
