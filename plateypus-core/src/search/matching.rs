//! Evaluation of [`VehicleQuery`] values against vehicle records.
//!
//! Text is analysed the way a standard search analyser would: lower-cased and
//! split on anything that is not alphanumeric. Tokens are compared using the
//! optimal string alignment distance so adjacent transpositions count as a
//! single edit.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::Serialize;
use strsim::osa_distance;

use super::query::{QueryClause, VehicleQuery};
use crate::{StoredVehicle, Vehicle, VehicleId};

/// Relevance of a hit; larger is better.
pub type Score = u32;

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Relevance of the match.
    pub score: Score,
    /// The matching document.
    pub vehicle: StoredVehicle,
}

/// Split `text` into lower-case alphanumeric tokens.
#[must_use]
pub fn analyse(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl QueryClause {
    /// Score `vehicle` against this clause, or `None` when it does not match.
    ///
    /// Term clauses compare the stored keyword exactly and score zero.
    #[must_use]
    pub fn score(&self, vehicle: &Vehicle) -> Option<Score> {
        match self {
            Self::Term { field, value } => (field.value_of(vehicle) == value).then_some(0),
            Self::Match {
                field,
                query,
                fuzziness,
            } => {
                let document = analyse(field.value_of(vehicle));
                let mut total: Option<Score> = None;
                for token in analyse(query) {
                    let allowed = fuzziness.max_edits(&token);
                    let best = document
                        .iter()
                        .map(|candidate| osa_distance(&token, candidate))
                        .filter(|distance| *distance <= allowed)
                        .min();
                    if let Some(distance) = best {
                        let length = token.chars().count();
                        let gained = Score::try_from(length.saturating_sub(distance))
                            .unwrap_or(Score::MAX);
                        total = Some(total.unwrap_or(0).saturating_add(gained));
                    }
                }
                total
            }
        }
    }
}

impl VehicleQuery {
    /// Score `vehicle` against every clause; `None` unless all of them match.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::search::{SearchRequest, VehicleQuery};
    /// use plateypus_core::{CountryCode, Vehicle};
    /// use serde_json::json;
    ///
    /// # fn main() -> Result<(), plateypus_core::search::SearchRequestError> {
    /// let request = SearchRequest::from_json(&json!({ "fields": { "maker": "AUID" } }))?;
    /// let query = VehicleQuery::from_request(&request);
    /// let mut audi = Vehicle::empty(CountryCode::denmark());
    /// audi.maker = "AUDI".into();
    /// assert!(query.score(&audi).is_some());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn score(&self, vehicle: &Vehicle) -> Option<Score> {
        self.filters()
            .iter()
            .chain(self.matches())
            .try_fold(0, |total: Score, clause| {
                clause.score(vehicle).map(|score| total.saturating_add(score))
            })
    }

    /// Score and rank `candidates`, keeping at most `size` hits.
    ///
    /// Hits are ordered by descending score, then ascending identifier.
    /// Candidates are consumed one at a time and only the best `size` are
    /// retained.
    pub fn rank<I>(&self, candidates: I, size: usize) -> Vec<SearchHit>
    where
        I: IntoIterator<Item = StoredVehicle>,
    {
        let mut top = TopHits::new(size);
        for vehicle in candidates {
            if let Some(score) = self.score(&vehicle.vehicle) {
                top.offer(score, vehicle.id, vehicle);
            }
        }
        top.into_ranked()
            .into_iter()
            .map(|(score, _, vehicle)| SearchHit { score, vehicle })
            .collect()
    }
}

/// The `capacity` best scored items seen so far.
///
/// Better means a higher score, then a lower identifier. Memory stays
/// bounded by `capacity` however many items are offered.
#[derive(Debug)]
pub struct TopHits<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<T>>>,
}

#[derive(Debug)]
struct Ranked<T> {
    score: Score,
    id: VehicleId,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<T> TopHits<T> {
    /// Keep at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::new(),
        }
    }

    /// Consider `item`, evicting the current worst when full.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::VehicleId;
    /// use plateypus_core::search::TopHits;
    ///
    /// let mut top = TopHits::new(2);
    /// for (score, id) in [(3, 1), (9, 2), (5, 3), (9, 4)] {
    ///     top.offer(score, VehicleId::new(id), id);
    /// }
    /// let kept: Vec<i64> = top.into_ranked().into_iter().map(|(_, _, id)| id).collect();
    /// assert_eq!(kept, [2, 4]);
    /// ```
    pub fn offer(&mut self, score: Score, id: VehicleId, item: T) {
        if self.capacity == 0 {
            return;
        }
        let candidate = Ranked { score, id, item };
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(candidate));
            return;
        }
        if let Some(mut worst) = self.heap.peek_mut()
            && candidate > worst.0
        {
            *worst = Reverse(candidate);
        }
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing has been kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Kept items, best first.
    #[must_use]
    pub fn into_ranked(self) -> Vec<(Score, VehicleId, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| (ranked.score, ranked.id, ranked.item))
            .collect()
    }
}
