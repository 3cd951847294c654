//! Identity resolution: deciding whether two candidates are the same entity.
//!
//! A candidate carrying a natural key is identified by that key. Otherwise
//! the whole candidate is serialised to JSON (object keys come out sorted,
//! so the bytes are deterministic) and hashed with BLAKE3.

use std::fmt;

use crate::types::Candidate;

/// The resolved identity of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    /// A key supplied by the backend (e.g. an arXiv id or document id).
    Natural(String),
    /// Hex-encoded BLAKE3 hash of the candidate's canonical JSON form.
    Fingerprint(String),
}

impl IdentityKey {
    /// The underlying key string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Natural(key) | Self::Fingerprint(key) => key,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Natural(key) => write!(f, "id:{key}"),
            Self::Fingerprint(hash) => write!(f, "fp:{hash}"),
        }
    }
}

/// Resolve the identity of `candidate`.
///
/// Natural keys and fingerprints live in separate namespaces, so a natural
/// key that happens to look like a hash never collides with a fingerprint.
pub fn identity_of(candidate: &Candidate) -> IdentityKey {
    match candidate.identity_key.as_deref() {
        Some(key) if !key.is_empty() => IdentityKey::Natural(key.to_owned()),
        _ => IdentityKey::Fingerprint(fingerprint(candidate)),
    }
}

/// Hash the canonical JSON form of `candidate`.
fn fingerprint(candidate: &Candidate) -> String {
    // Serialising plain data into a Vec cannot fail; an empty buffer would
    // still hash to a stable value.
    let bytes = serde_json::to_vec(candidate).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
