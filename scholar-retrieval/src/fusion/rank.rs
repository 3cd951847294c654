//! Score ranking for deduplicated candidates.
//!
//! Scores are compared on their native scales; nothing is rescaled across
//! sources. A candidate without a usable score ranks as [`MISSING_SCORE`],
//! which places unscored graph/relational hits after every scored hit.
//!
//! # Ordering
//!
//! ```text
//! effective = score if finite, else MISSING_SCORE
//! sort descending by effective (stable: ties keep first-seen order)
//! truncate to top_k
//! ```

use std::cmp::Ordering;

use crate::types::Candidate;

/// Score substituted for a missing or non-finite score.
pub const MISSING_SCORE: f64 = 0.0;

/// The score used for ordering `candidate`.
///
/// `None`, `NaN` and infinities all map to [`MISSING_SCORE`] so the order
/// stays total.
pub fn effective_score(candidate: &Candidate) -> f64 {
    candidate
        .score
        .filter(|s| s.is_finite())
        .unwrap_or(MISSING_SCORE)
}

/// Sort `candidates` by descending effective score and keep the first `top_k`.
///
/// The sort is stable: candidates with equal effective scores keep the
/// order they arrived in.
pub fn rank(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
    candidates.sort_by(compare_desc);
    candidates.truncate(top_k);
    candidates
}

fn compare_desc(a: &Candidate, b: &Candidate) -> Ordering {
    effective_score(b).total_cmp(&effective_score(a))
}
