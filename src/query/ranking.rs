//! Cross-index score reconstruction and merge.
//!
//! Every index ranks its own hits, but nothing orders hits from different
//! indexes against each other. The merge scores each hit, sorts the whole
//! set once, and only then lets callers take a window.

use crate::engine::{Hit, SearchResponse};
use crate::model::FieldBoostMap;
use crate::types::RecordId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub id: RecordId,
    pub score: f64,
    pub index: String,
}

fn serialized_len(positions: &serde_json::Value) -> usize {
    serde_json::to_string(positions).map(|s| s.len()).unwrap_or(0)
}

/// Sum over matched fields of serialized match-position length times the
/// field's boost.
pub fn fallback_score(hit: &Hit, boosts: &FieldBoostMap) -> f64 {
    hit.matches_position
        .iter()
        .flatten()
        .map(|(field, positions)| serialized_len(positions) as f64 * boosts.weight(field))
        .sum()
}

/// The engine's own ranking score when it sent one, the fallback otherwise.
pub fn score_hit(hit: &Hit, boosts: &FieldBoostMap) -> f64 {
    hit.ranking_score
        .unwrap_or_else(|| fallback_score(hit, boosts))
}

/// Hits from every index in one global order: score descending, then record
/// id ascending. A record appearing twice keeps its best position.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    hits: Vec<RankedHit>,
    positions: HashMap<RecordId, usize>,
}

impl Ranking {
    pub fn from_hits(mut hits: Vec<RankedHit>) -> Self {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));

        let mut seen = HashSet::with_capacity(hits.len());
        hits.retain(|h| seen.insert(h.id));

        let positions = hits.iter().enumerate().map(|(i, h)| (h.id, i)).collect();
        Self { hits, positions }
    }

    /// Score and merge per-index responses. `boosts` is keyed by index label;
    /// an index without an entry weighs every field 1.
    pub fn merge<'a, I>(responses: I, boosts: &HashMap<String, FieldBoostMap>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a SearchResponse)>,
    {
        let default_boosts = FieldBoostMap::default();
        let mut hits = Vec::new();
        for (label, response) in responses {
            let weights = boosts.get(label).unwrap_or(&default_boosts);
            hits.extend(response.hits.iter().map(|hit| RankedHit {
                id: hit.id,
                score: score_hit(hit, weights),
                index: label.to_string(),
            }));
        }
        Self::from_hits(hits)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[RankedHit] {
        &self.hits
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.hits.iter().map(|h| h.id).collect()
    }

    /// Ids at sorted positions `start..stop`, clamped to the ranking.
    pub fn window(&self, start: usize, stop: Option<usize>) -> Vec<RecordId> {
        let stop = stop.unwrap_or(self.hits.len()).min(self.hits.len());
        if start >= stop {
            return Vec::new();
        }
        self.hits[start..stop].iter().map(|h| h.id).collect()
    }

    /// Rank position of `id`, 0 being the best.
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn score(&self, id: RecordId) -> Option<f64> {
        self.position(id).map(|i| self.hits[i].score)
    }
}
