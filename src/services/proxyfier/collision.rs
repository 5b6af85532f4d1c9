use std::collections::HashSet;

use super::identity::hex_hash;
use crate::models::Track;

/// Identifiers issued during one rewrite pass
///
/// Candidates that win are recorded in `issued`. Collision fallbacks are kept
/// apart in `fallbacks` so they never count as issued candidates, but a
/// fallback is still never handed out twice.
#[derive(Debug, Default)]
pub struct IdentifierSet {
    issued: HashSet<String>,
    fallbacks: HashSet<String>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final identifier for the track at `index`. Must be called in playlist
    /// order.
    pub fn assign(&mut self, candidate: Option<String>, index: usize, track: &Track) -> String {
        let Some(candidate) = candidate else {
            return index.to_string();
        };

        if !self.is_taken(&candidate) {
            self.issued.insert(candidate.clone());
            return candidate;
        }

        let mut fallback = hex_hash(&track.uri);
        if self.is_taken(&fallback) {
            // Byte-identical URIs hash to the same fallback
            fallback = format!("{}-{}", fallback, index);
        }

        tracing::debug!(
            track = %track.name,
            index,
            "identifier collision, using fallback {}",
            fallback
        );
        self.fallbacks.insert(fallback.clone());
        fallback
    }

    pub fn issued_len(&self) -> usize {
        self.issued.len()
    }

    fn is_taken(&self, id: &str) -> bool {
        self.issued.contains(id) || self.fallbacks.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(uri: &str) -> Track {
        Track {
            uri: uri.to_string(),
            name: "Ch".to_string(),
            length: -1,
            tags: vec![],
        }
    }

    #[test]
    fn test_missing_candidate_uses_position() {
        let mut set = IdentifierSet::new();
        let t = track("http://up.example/a.ts");

        assert_eq!(set.assign(None, 0, &t), "0");
        assert_eq!(set.assign(None, 17, &t), "17");
        assert_eq!(set.issued_len(), 0);
    }

    #[test]
    fn test_unique_candidate_is_kept() {
        let mut set = IdentifierSet::new();
        let t = track("http://up.example/a.ts");

        assert_eq!(set.assign(Some("abc".into()), 0, &t), "abc");
        assert_eq!(set.issued_len(), 1);
    }

    #[test]
    fn test_collision_falls_back_to_uri_hash() {
        let mut set = IdentifierSet::new();
        let a = track("http://up.example/a.ts");
        let b = track("http://up.example/b.ts");

        assert_eq!(set.assign(Some("same".into()), 0, &a), "same");
        assert_eq!(set.assign(Some("same".into()), 1, &b), hex_hash(&b.uri));
        // fallback is not an issued candidate
        assert_eq!(set.issued_len(), 1);
    }

    #[test]
    fn test_identical_uris_get_distinct_identifiers() {
        let mut set = IdentifierSet::new();
        let a = track("http://up.example/a.ts");
        let b = track("http://up.example/a.ts");
        let c = track("http://up.example/a.ts");

        let first = set.assign(Some(hex_hash(&a.uri)), 0, &a);
        let second = set.assign(Some(hex_hash(&b.uri)), 1, &b);
        let third = set.assign(Some(hex_hash(&c.uri)), 2, &c);

        assert_eq!(first, hex_hash(&a.uri));
        assert_eq!(second, format!("{}-1", hex_hash(&a.uri)));
        assert_eq!(third, format!("{}-2", hex_hash(&a.uri)));
    }

    #[test]
    fn test_candidate_equal_to_earlier_fallback_is_not_reused() {
        let mut set = IdentifierSet::new();
        let a = track("http://up.example/a.ts");
        let b = track("http://up.example/b.ts");

        set.assign(Some("x".into()), 0, &a);
        let fallback = set.assign(Some("x".into()), 1, &b);
        let later = set.assign(Some(fallback.clone()), 2, &track("http://up.example/c.ts"));

        assert_ne!(later, fallback);
    }
}
