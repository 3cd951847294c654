//! Fusion: cross-source deduplication followed by score ranking.
//!
//! Every step here is pure and total. Missing identities fall back to a
//! content fingerprint and missing scores fall back to a sentinel, so
//! fusion never fails on malformed candidates.

pub mod dedup;
pub mod identity;
pub mod rank;

use crate::types::{FusedResult, ResultSet};

pub use dedup::deduplicate;
pub use identity::{identity_of, IdentityKey};
pub use rank::{effective_score, rank, MISSING_SCORE};

/// Deduplicate `results` across sources, rank by score and keep `top_k`.
///
/// Running this twice on the same [`ResultSet`] yields the same
/// [`FusedResult`].
pub fn fuse(results: &ResultSet, top_k: usize) -> FusedResult {
    let deduped = deduplicate(results);
    let ranked = rank(deduped, top_k);
    tracing::debug!(
        input = results.total_len(),
        output = ranked.len(),
        top_k,
        "fused result set"
    );
    FusedResult::new(ranked)
}
