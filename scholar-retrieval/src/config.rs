//! Retrieval configuration with sensible defaults.
//!
//! [`RetrievalConfig`] controls how many candidates each backend is asked
//! for, how long an adapter may run, and how many fused results survive.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RetrievalError;

/// Configuration for one orchestration pass.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum number of fused results returned after dedup and ranking.
    pub top_k: usize,
    /// Maximum number of candidates requested from each backend.
    pub per_source_limit: usize,
    /// Per-adapter deadline in milliseconds. A backend that misses it
    /// contributes no candidates for that request.
    pub adapter_timeout_ms: u64,
    /// Row count for the "most recently published" relational query.
    pub recent_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            per_source_limit: 5,
            adapter_timeout_ms: 8_000,
            recent_limit: 10,
        }
    }
}

impl RetrievalConfig {
    /// The per-adapter deadline as a [`Duration`].
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `top_k` must be greater than 0
    /// - `per_source_limit` must be greater than 0
    /// - `adapter_timeout_ms` must be greater than 0
    /// - `recent_limit` must be greater than 0
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.top_k == 0 {
            return Err(RetrievalError::Config(
                "top_k must be greater than 0".into(),
            ));
        }
        if self.per_source_limit == 0 {
            return Err(RetrievalError::Config(
                "per_source_limit must be greater than 0".into(),
            ));
        }
        if self.adapter_timeout_ms == 0 {
            return Err(RetrievalError::Config(
                "adapter_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.recent_limit == 0 {
            return Err(RetrievalError::Config(
                "recent_limit must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
