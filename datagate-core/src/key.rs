//! Source-scoped cache keys.
//!
//! A `CacheKey` can only be built from a `(SourceId, SpecificDataRequest)`
//! pair, so two callers with different identities never share an entry or a
//! refresh ticket.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::request::{SourceId, SpecificDataRequest};

/// Prefix shared by every encoded key.
const KEY_PREFIX: &str = "sd";

/// Deterministic cache identity for a query.
///
/// # Format
///
/// `sd:{source_id}:{data_type}:{sha256(normalized request) as hex}`
///
/// The digest is computed over the normalized request, so the key is stable
/// across process restarts and independent of parameter ordering. The source
/// id and data type stay readable so store scans can be scoped by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    encoded: String,
}

impl CacheKey {
    /// Derive the key for a query issued by `source_id`.
    pub fn derive(source_id: &SourceId, request: &SpecificDataRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source_id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(request.normalized().as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self {
            encoded: format!(
                "{}:{}:{}:{}",
                KEY_PREFIX,
                source_id.as_str(),
                request.data_type.trim(),
                digest
            ),
        }
    }

    /// Wrap an already-encoded key, e.g. one read back from a store scan.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }

    /// Prefix matching every key of a source.
    pub fn source_prefix(source_id: &SourceId) -> String {
        format!("{}:{}:", KEY_PREFIX, source_id.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.encoded.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}
