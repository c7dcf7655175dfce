//! Per-query authorization token.
//!
//! The map backend rejects or silently empties any query whose `s` field does
//! not match its own hash of the `sql` field. The scheme was worked out from
//! live traffic, not documentation, so it sits behind [`TokenDeriver`] and can
//! be checked against a captured pair with [`TokenProbe`].

use crate::scrapers::traits::TokenDeriver;
use md5::{Digest, Md5};
use std::env;
use tracing::{info, warn};

/// Lowercase hex MD5 of the UTF-8 query text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5TokenDeriver;

impl TokenDeriver for Md5TokenDeriver {
    fn derive(&self, query_text: &str) -> String {
        hex::encode(Md5::digest(query_text.as_bytes()))
    }
}

/// Known-good query/token pair captured from the live site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenProbe {
    pub sql: String,
    pub expected: String,
}

impl TokenProbe {
    /// Read `ZEALTY_PROBE_SQL` / `ZEALTY_PROBE_TOKEN`. Both must be set.
    pub fn from_env() -> Option<Self> {
        let sql = env::var("ZEALTY_PROBE_SQL").ok()?;
        let expected = env::var("ZEALTY_PROBE_TOKEN").ok()?;
        Some(Self {
            sql,
            expected: expected.trim().to_ascii_lowercase(),
        })
    }

    /// Compare the deriver against the captured pair.
    pub fn check(&self, deriver: &dyn TokenDeriver) -> bool {
        let actual = deriver.derive(&self.sql);
        if actual == self.expected {
            info!("Token self-check passed");
            true
        } else {
            warn!(
                "Token self-check FAILED: derived {} but site sent {}; results will likely be empty",
                actual, self.expected
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_md5_digests() {
        let d = Md5TokenDeriver;
        assert_eq!(d.derive(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(d.derive("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            d.derive("The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn deterministic_and_input_sensitive() {
        let d = Md5TokenDeriver;
        let a = "SELECT * FROM *** WHERE (latitude BETWEEN 49.0 AND 49.5)";
        let b = "SELECT * FROM *** WHERE (latitude BETWEEN 49.0 AND 49.6)";
        assert_eq!(d.derive(a), d.derive(a));
        assert_ne!(d.derive(a), d.derive(b));
        assert_eq!(d.derive(a).len(), 32);
    }

    #[test]
    fn probe_detects_drift() {
        let good = TokenProbe {
            sql: "abc".into(),
            expected: "900150983cd24fb0d6963f7d28e17f72".into(),
        };
        let drifted = TokenProbe {
            sql: "abc".into(),
            expected: "0".repeat(32),
        };
        assert!(good.check(&Md5TokenDeriver));
        assert!(!drifted.check(&Md5TokenDeriver));
    }
}
