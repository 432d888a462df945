//! Query builder turning validated search requests into boolean queries.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use super::request::SearchRequest;
use crate::Vehicle;

/// Edit distance applied to plate matches.
pub const PLATE_FUZZINESS: u8 = 2;

/// Vehicle attributes that can be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    /// Source country; matched exactly.
    Country,
    /// Registration plate.
    Plate,
    /// Vehicle identification number.
    Vin,
    /// Manufacturer.
    Maker,
    /// Model and variant.
    Model,
}

impl SearchField {
    /// Every searchable field, in query order.
    pub const ALL: [Self; 5] = [
        Self::Country,
        Self::Plate,
        Self::Vin,
        Self::Maker,
        Self::Model,
    ];

    /// Field name as used in requests and stored documents.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Plate => "plate",
            Self::Vin => "vin",
            Self::Maker => "maker",
            Self::Model => "model",
        }
    }

    /// Look a field up by its request name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// How values for this field are matched.
    #[must_use]
    pub const fn match_mode(self) -> MatchMode {
        match self {
            Self::Country => MatchMode::Term,
            Self::Plate => MatchMode::Fuzzy(Fuzziness::Fixed(PLATE_FUZZINESS)),
            Self::Vin | Self::Maker | Self::Model => MatchMode::Fuzzy(Fuzziness::Auto),
        }
    }

    /// Read this field from a vehicle record.
    #[must_use]
    pub fn value_of(self, vehicle: &Vehicle) -> &str {
        match self {
            Self::Country => vehicle.country.as_str(),
            Self::Plate => &vehicle.plate,
            Self::Vin => &vehicle.vin,
            Self::Maker => &vehicle.maker,
            Self::Model => &vehicle.model,
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Matching strategy for a [`SearchField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Exact keyword filter without scoring.
    Term,
    /// Analysed text match tolerating edits.
    Fuzzy(Fuzziness),
}

/// Edit-distance tolerance of a fuzzy match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    /// A fixed number of edits regardless of token length.
    Fixed(u8),
    /// Distance scales with token length: none up to two characters, one up
    /// to five, two beyond.
    Auto,
}

impl Fuzziness {
    /// Maximum number of edits tolerated for `token`.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::search::Fuzziness;
    ///
    /// assert_eq!(Fuzziness::Auto.max_edits("vw"), 0);
    /// assert_eq!(Fuzziness::Auto.max_edits("audi"), 1);
    /// assert_eq!(Fuzziness::Auto.max_edits("toyota"), 2);
    /// assert_eq!(Fuzziness::Fixed(2).max_edits("a"), 2);
    /// ```
    #[must_use]
    pub fn max_edits(self, token: &str) -> usize {
        match self {
            Self::Fixed(edits) => usize::from(edits),
            Self::Auto => match token.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }
}

impl Serialize for Fuzziness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fixed(edits) => serializer.serialize_u8(*edits),
            Self::Auto => serializer.serialize_str("AUTO"),
        }
    }
}

/// One fragment of a [`VehicleQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryClause {
    /// Exact keyword match.
    Term {
        /// Field the filter applies to.
        field: SearchField,
        /// Value the field must equal.
        value: String,
    },
    /// Fuzzy analysed-text match.
    Match {
        /// Field the match applies to.
        field: SearchField,
        /// Text to look for.
        query: String,
        /// Tolerated edits per token.
        fuzziness: Fuzziness,
    },
}

impl QueryClause {
    /// Field the clause targets.
    #[must_use]
    pub const fn field(&self) -> SearchField {
        match self {
            Self::Term { field, .. } | Self::Match { field, .. } => *field,
        }
    }

    /// Render the clause in the search-engine query DSL.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Term { field, value } => json!({ "term": { field.name(): value } }),
            Self::Match {
                field,
                query,
                fuzziness,
            } => json!({
                "match": { field.name(): { "query": query, "fuzziness": fuzziness } }
            }),
        }
    }
}

impl Serialize for QueryClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Build the fuzzy match fragment for `field_name` from the request fields.
///
/// Returns `None` when the field is not recognised or was not supplied.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use plateypus_core::search::{Fuzziness, QueryClause, SearchField, build_query};
///
/// let fields = BTreeMap::from([(SearchField::Maker, "AUDI".to_owned())]);
/// let clause = build_query("maker", &fields, Fuzziness::Auto);
/// assert_eq!(
///     clause,
///     Some(QueryClause::Match {
///         field: SearchField::Maker,
///         query: "AUDI".into(),
///         fuzziness: Fuzziness::Auto,
///     })
/// );
/// assert_eq!(build_query("vin", &fields, Fuzziness::Auto), None);
/// ```
#[must_use]
pub fn build_query(
    field_name: &str,
    request_fields: &std::collections::BTreeMap<SearchField, String>,
    fuzziness: Fuzziness,
) -> Option<QueryClause> {
    let field = SearchField::from_name(field_name)?;
    let query = request_fields.get(&field)?;
    Some(QueryClause::Match {
        field,
        query: query.clone(),
        fuzziness,
    })
}

/// Conjunctive query over vehicle documents.
///
/// Term clauses filter without contributing to the score; match clauses must
/// all succeed and their scores rank the hits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleQuery {
    filter: Vec<QueryClause>,
    must: Vec<QueryClause>,
}

impl VehicleQuery {
    /// Build the query for a validated request.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::search::{SearchRequest, VehicleQuery};
    /// use serde_json::json;
    ///
    /// # fn main() -> Result<(), plateypus_core::search::SearchRequestError> {
    /// let request = SearchRequest::from_json(&json!({
    ///     "fields": { "country": "dk", "maker": "AUDI" }
    /// }))?;
    /// let query = VehicleQuery::from_request(&request);
    /// assert_eq!(
    ///     query.to_json(),
    ///     json!({ "bool": {
    ///         "filter": [{ "term": { "country": "dk" } }],
    ///         "must": [{ "match": { "maker": { "query": "AUDI", "fuzziness": "AUTO" } } }]
    ///     }})
    /// );
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn from_request(request: &SearchRequest) -> Self {
        let fields = request.fields();
        let mut query = Self::default();
        for field in SearchField::ALL {
            match field.match_mode() {
                MatchMode::Term => {
                    if let Some(value) = fields.get(&field) {
                        query.filter.push(QueryClause::Term {
                            field,
                            value: value.clone(),
                        });
                    }
                }
                MatchMode::Fuzzy(fuzziness) => {
                    if let Some(clause) = build_query(field.name(), fields, fuzziness) {
                        query.must.push(clause);
                    }
                }
            }
        }
        query
    }

    /// Exact filters.
    #[must_use]
    pub fn filters(&self) -> &[QueryClause] {
        &self.filter
    }

    /// Scored match clauses.
    #[must_use]
    pub fn matches(&self) -> &[QueryClause] {
        &self.must
    }

    /// Country the query is restricted to, if any.
    #[must_use]
    pub fn country_filter(&self) -> Option<&str> {
        self.filter.iter().find_map(|clause| match clause {
            QueryClause::Term {
                field: SearchField::Country,
                value,
            } => Some(value.as_str()),
            _ => None,
        })
    }

    /// Render the query in the search-engine query DSL.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "bool": { "filter": self.filter, "must": self.must } })
    }
}

impl Serialize for VehicleQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
