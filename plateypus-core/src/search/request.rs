//! Validation of inbound search requests.
//!
//! Requests are checked against a JSON Schema before anything is built from
//! them, so every violated constraint can be reported at once and malformed
//! payloads never reach a store.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use super::query::SearchField;

/// Number of hits returned when a request does not specify `size`.
pub const DEFAULT_SEARCH_SIZE: usize = 10;
/// Largest `size` a request may ask for.
pub const MAX_SEARCH_SIZE: usize = 100;

/// A validated multi-field search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    fields: BTreeMap<SearchField, String>,
    size: usize,
}

/// Errors raised while accepting a search request.
///
/// Both variants are the caller's fault and map to HTTP 400.
#[derive(Debug, Error)]
pub enum SearchRequestError {
    /// The body was not JSON at all.
    #[error("search request is not valid JSON: {source}")]
    Malformed {
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The body violated the request schema.
    #[error("search request is invalid: {}", violations.join("; "))]
    Invalid {
        /// One entry per violated constraint.
        violations: Vec<String>,
    },
}

impl SearchRequestError {
    /// HTTP status a serving layer should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        400
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSearchRequest {
    fields: BTreeMap<SearchField, String>,
    #[serde(default)]
    size: Option<usize>,
}

impl SearchRequest {
    /// Parse and validate a request body.
    pub fn parse(body: &str) -> Result<Self, SearchRequestError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|source| SearchRequestError::Malformed { source })?;
        Self::from_json(&value)
    }

    /// Validate an already decoded request body.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::search::{SearchRequest, SearchRequestError};
    /// use serde_json::json;
    ///
    /// let ok = SearchRequest::from_json(&json!({ "fields": { "country": "dk" } }));
    /// assert!(ok.is_ok());
    ///
    /// let err = SearchRequest::from_json(&json!({ "foo": "bar", "baz": 42 }))
    ///     .expect_err("unknown keys are rejected");
    /// assert_eq!(err.status_code(), 400);
    /// assert!(matches!(err, SearchRequestError::Invalid { .. }));
    /// ```
    pub fn from_json(value: &Value) -> Result<Self, SearchRequestError> {
        let violations = schema_violations(value);
        if !violations.is_empty() {
            return Err(SearchRequestError::Invalid { violations });
        }
        let raw: RawSearchRequest = serde_json::from_value(value.clone()).map_err(|err| {
            SearchRequestError::Invalid {
                violations: vec![err.to_string()],
            }
        })?;
        Ok(Self {
            fields: raw.fields,
            size: raw.size.unwrap_or(DEFAULT_SEARCH_SIZE),
        })
    }

    /// Requested field values.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<SearchField, String> {
        &self.fields
    }

    /// Maximum number of hits to return.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

fn request_schema() -> Value {
    let field_schema = json!({ "type": "string", "minLength": 1 });
    let fields: serde_json::Map<String, Value> = SearchField::ALL
        .into_iter()
        .map(|field| (field.name().to_owned(), field_schema.clone()))
        .collect();
    json!({
        "type": "object",
        "required": ["fields"],
        "additionalProperties": false,
        "properties": {
            "fields": {
                "type": "object",
                "minProperties": 1,
                "additionalProperties": false,
                "properties": fields
            },
            "size": { "type": "integer", "minimum": 1, "maximum": MAX_SEARCH_SIZE }
        }
    })
}

fn schema_violations(value: &Value) -> Vec<String> {
    match jsonschema::validator_for(&request_schema()) {
        Ok(validator) => validator
            .iter_errors(value)
            .map(|error| {
                let path = error.instance_path.to_string();
                let location = if path.is_empty() { "/" } else { path.as_str() };
                format!("{location}: {error}")
            })
            .collect(),
        Err(error) => vec![format!("request schema failed to compile: {error}")],
    }
}
