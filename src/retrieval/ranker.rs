//! Retrieval ranker
//!
//! Picks the highest-scoring entry of one scoring round. Ties go to the
//! entry that comes first in knowledge-store order.

use crate::models::ScoreResult;

/// Winner of a scoring round
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub entry_id: String,
    /// Position in the scored (= knowledge store) order
    pub index: usize,
    pub score: f64,
    /// Every score was zero: the pick is arbitrary and must not be
    /// presented as a real match
    pub low_confidence: bool,
}

pub struct RetrievalRanker;

impl RetrievalRanker {
    /// `None` only for an empty round
    pub fn select(results: &[ScoreResult]) -> Option<Ranking> {
        let mut best: Option<(usize, &ScoreResult)> = None;

        for (index, result) in results.iter().enumerate() {
            // strictly greater keeps the earliest entry on ties
            let better = match best {
                None => true,
                Some((_, current)) => result.score > current.score,
            };
            if better {
                best = Some((index, result));
            }
        }

        let low_confidence = results.iter().all(|r| r.score <= 0.0);

        best.map(|(index, result)| Ranking {
            entry_id: result.entry_id.clone(),
            index,
            score: result.score,
            low_confidence,
        })
    }
}
