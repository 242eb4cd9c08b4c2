//! Content digests for drift detection. Not an integrity mechanism.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Lower-case hex SHA-256 of some content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    pub fn of(content: impl AsRef<[u8]>) -> Self {
        let mut h = Sha256::new();
        h.update(content.as_ref());
        Digest(format!("{:x}", h.finalize()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn digest(content: impl AsRef<[u8]>) -> Digest { Digest::of(content) }

pub fn equal(a: &Digest, b: &Digest) -> bool { a.0 == b.0 }

/// Text form a fetched body takes inside the sink. Drift is always computed
/// over this representation so stored and fetched content compare like for like.
pub fn stored_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_fixed_length() {
        let a = digest("hello");
        let b = digest(b"hello".to_vec());
        assert!(equal(&a, &b));
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.as_str(), "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    }

    #[test]
    fn distinct_fixtures_do_not_collide() {
        let fixtures = ["", "hello", "world", "hello ", "Hello", "{\"a\":1}", "{\"a\":2}"];
        for (i, x) in fixtures.iter().enumerate() {
            for y in fixtures.iter().skip(i + 1) {
                assert!(!equal(&digest(x), &digest(y)), "{:?} vs {:?}", x, y);
            }
        }
    }

    #[test]
    fn stored_text_matches_utf8_and_replaces_invalid() {
        assert_eq!(stored_text(b"plain"), "plain");
        let lossy = stored_text(&[0x66, 0xff, 0x6f]);
        assert_eq!(lossy, "f\u{fffd}o");
        // Re-digesting the stored form is stable.
        assert!(equal(&digest(stored_text(&[0xff])), &digest(stored_text(&[0xff]))));
    }
}
