//! Content fingerprinting for quiz definitions.

use sha2::{Digest, Sha256};

/// Fingerprint a serialized quiz definition.
///
/// Stable across runs for identical input; any author edit to the definition
/// produces a different digest. Stored on the attempt at save time and
/// recomputed from the current definition at load time.
pub fn content_hash(serialized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_for_identical_input() {
        let a = content_hash("{\"title\":\"t\"}");
        let b = content_hash("{\"title\":\"t\"}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn any_edit_changes_the_digest() {
        assert_ne!(content_hash("{\"title\":\"t\"}"), content_hash("{\"title\":\"u\"}"));
        assert_ne!(content_hash(""), content_hash(" "));
    }
}
