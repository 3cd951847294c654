//! Cross-source deduplication by resolved identity.
//!
//! Walks the result set source by source (in plan order), each source in
//! its native ranking order, and keeps the first candidate seen for every
//! identity. Later duplicates are dropped along with their scores.

use std::collections::HashSet;

use crate::types::{Candidate, ResultSet};

use super::identity::identity_of;

/// Deduplicate the candidates in `results`.
///
/// The output preserves the relative order of first occurrences, and no two
/// output candidates share an [`IdentityKey`](super::IdentityKey).
pub fn deduplicate(results: &ResultSet) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(results.total_len());

    for (source, candidates) in results.iter() {
        let before = kept.len();
        for candidate in candidates {
            if seen.insert(identity_of(candidate)) {
                kept.push(candidate.clone());
            }
        }
        tracing::trace!(
            %source,
            offered = candidates.len(),
            kept = kept.len() - before,
            "deduplicated source"
        );
    }

    kept
}
