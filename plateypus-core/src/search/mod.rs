//! Fuzzy multi-field vehicle search.
//!
//! A raw request is validated into a [`SearchRequest`], turned into a
//! [`VehicleQuery`] by the query builder, and evaluated by a
//! [`VehicleStore`](crate::store::VehicleStore) into ranked [`SearchHit`]s.

mod matching;
mod query;
mod request;

pub use matching::{Score, SearchHit, TopHits, analyse};
pub use query::{
    Fuzziness, MatchMode, PLATE_FUZZINESS, QueryClause, SearchField, VehicleQuery, build_query,
};
pub use request::{DEFAULT_SEARCH_SIZE, MAX_SEARCH_SIZE, SearchRequest, SearchRequestError};
