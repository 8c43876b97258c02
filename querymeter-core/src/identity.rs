//! Query identity
//!
//! Runtime state (last execution time) is keyed by the identity of a query
//! definition, never by the compiled pipeline, so recompiling an unchanged
//! definition finds its previous state again.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Name plus content hash of a query definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryIdentity {
    pub name: String,
    pub digest: String,
}

impl QueryIdentity {
    /// Identity of a raw definition. `serde_json` maps are ordered, so the
    /// serialized form is canonical for equal definitions.
    pub fn of(name: &str, definition: &serde_json::Value) -> Self {
        let canonical = definition.to_string();
        Self {
            name: name.to_string(),
            digest: hex::encode(compute_content_hash(canonical.as_bytes())),
        }
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, &self.digest[..12.min(self.digest.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash() {
        let hash = compute_content_hash(b"hello world");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, compute_content_hash(b"hello world"));
        assert_ne!(hash, compute_content_hash(b"hello world!"));
    }

    #[test]
    fn test_identity_ignores_key_order() {
        let a = json!({"name": "q", "query": "foo", "columns": []});
        let b = json!({"columns": [], "query": "foo", "name": "q"});
        assert_eq!(QueryIdentity::of("q", &a), QueryIdentity::of("q", &b));
    }

    #[test]
    fn test_identity_changes_with_definition() {
        let a = json!({"name": "q", "query": "foo"});
        let b = json!({"name": "q", "query": "bar"});
        assert_ne!(QueryIdentity::of("q", &a), QueryIdentity::of("q", &b));
    }
}
