//! Release-tag parsing and ordering.
//!
//! Tags of the form `vMAJOR.MINOR[.PATCH][-rcN]` are folded into a single
//! integer whose ordering matches release ordering: every release candidate
//! of a version sorts before that version's final release, and the final
//! release sorts before the next patch level. Minor and patch numbers must be
//! below 1000 and rc numbers below 100 for the ordering to hold.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Leading version token, anchored at the start of the input. Anything after
/// the match is ignored so `git describe` output such as `v5.54-12-gabcdef`
/// parses as `v5.54`.
fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^v?([0-9]+)\.([0-9]+)(?:\.([0-9]+))?(?:-rc([0-9]+))?")
            .unwrap_or_else(|e| panic!("version pattern failed to compile: {e}"))
    })
}

/// Numeric components of a release tag.
///
/// The default value is the zero key, which stands for "unknown" and is never
/// judged to be included in anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionKey {
    pub major: u32,
    pub minor: u32,
    /// `0` when the tag has no patch component.
    pub patch: u32,
    /// `0` for a final release.
    pub rc: u32,
}

impl VersionKey {
    /// Parse the leading version token of `tag`, returning `None` if there
    /// is none.
    pub fn try_parse(tag: &str) -> Option<Self> {
        let caps = version_regex().captures(tag.trim_start())?;
        let number = |idx: usize| -> Option<u32> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        Some(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            rc: number(4)?,
        })
    }

    /// Parse `tag`, degrading to the zero key when it carries no version.
    pub fn parse(tag: &str) -> Self {
        Self::try_parse(tag).unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Fold the key into its comparable integer.
    pub fn to_number(&self) -> i64 {
        let mut total = i64::from(self.major) * 1_000_000_000
            + i64::from(self.minor) * 1_000_000
            + i64::from(self.patch) * 1_000;
        if self.rc != 0 {
            total -= 100 - i64::from(self.rc);
        }
        total
    }

}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)?;
        if self.patch != 0 {
            write!(f, ".{}", self.patch)?;
        }
        if self.rc != 0 {
            write!(f, "-rc{}", self.rc)?;
        }
        Ok(())
    }
}

/// Comparable integer for a tag string; `0` if the tag has no version.
pub fn version_to_number(tag: &str) -> i64 {
    VersionKey::parse(tag).to_number()
}

/// The literal version token at the start of `text`, e.g. `v5.54-rc2` out of
/// `v5.54-rc2-3-g0123abc`.
pub fn version_token(text: &str) -> Option<&str> {
    let text = text.trim_start();
    version_regex().find(text).map(|m| m.as_str())
}

/// Whether `candidate` is already part of the history described by
/// `reference`.
///
/// A candidate or reference without a version is never included; in
/// particular the `HEAD` target sentinel includes nothing.
pub fn compare_included(candidate: &str, reference: &str) -> bool {
    let known = |tag: &str| VersionKey::try_parse(tag).filter(|key| !key.is_zero());
    match (known(candidate), known(reference)) {
        (Some(candidate), Some(reference)) => reference.to_number() >= candidate.to_number(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let key = VersionKey::parse("v5.4.12-rc3");
        assert_eq!(
            key,
            VersionKey {
                major: 5,
                minor: 4,
                patch: 12,
                rc: 3
            }
        );

        let key = VersionKey::parse("v5.54");
        assert_eq!(key.patch, 0);
        assert_eq!(key.rc, 0);
    }

    #[test]
    fn test_parse_ignores_describe_suffix() {
        assert_eq!(
            VersionKey::parse("v5.54-12-gabcdef"),
            VersionKey::parse("v5.54")
        );
        assert_eq!(version_token("v5.54-rc2-3-g0123abc\n"), Some("v5.54-rc2"));
        assert_eq!(version_token("v4.19.12~3"), Some("v4.19.12"));
    }

    #[test]
    fn test_parse_accepts_missing_prefix() {
        assert_eq!(VersionKey::parse("5.54"), VersionKey::parse("v5.54"));
    }

    #[test]
    fn test_unparseable_is_zero() {
        assert!(VersionKey::parse("").is_zero());
        assert!(VersionKey::parse("HEAD").is_zero());
        assert!(VersionKey::parse("v5").is_zero());
        assert!(VersionKey::parse("release-5.4").is_zero());
        assert_eq!(version_to_number("garbage"), 0);
        assert_eq!(version_token("HEAD"), None);
    }

    #[test]
    fn test_oversized_component_is_zero() {
        assert!(VersionKey::parse("v99999999999.1").is_zero());
    }

    #[test]
    fn test_number_encoding() {
        assert_eq!(version_to_number("v5.4"), 5_004_000_000);
        assert_eq!(version_to_number("v5.4.12"), 5_004_012_000);
        assert_eq!(version_to_number("v5.4-rc1"), 5_004_000_000 - 99);
    }

    #[test]
    fn test_release_ordering() {
        let ordered = [
            "v4.19",
            "v4.19.1",
            "v4.19.250",
            "v5.0-rc1",
            "v5.0-rc7",
            "v5.0",
            "v5.0.1-rc1",
            "v5.0.1",
            "v5.1-rc1",
            "v5.1",
            "v5.10",
            "v6.1",
        ];
        for pair in ordered.windows(2) {
            assert!(
                version_to_number(pair[0]) < version_to_number(pair[1]),
                "{} should sort before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_release_candidates_precede_release() {
        let release = version_to_number("v5.10");
        let mut previous = i64::MIN;
        for rc in 1..100 {
            let n = version_to_number(&format!("v5.10-rc{rc}"));
            assert!(n < release);
            assert!(n > previous);
            previous = n;
        }
        assert!(release > version_to_number("v5.9.999"));
    }

    #[test]
    fn test_compare_included() {
        assert!(compare_included("v5.4", "v5.4"));
        assert!(compare_included("v5.4-rc3", "v5.4"));
        assert!(compare_included("v5.3.7", "v5.4-rc1"));
        assert!(!compare_included("v5.4", "v5.4-rc7"));
        assert!(!compare_included("v5.5", "v5.4.200"));
    }

    #[test]
    fn test_compare_included_requires_versions() {
        assert!(!compare_included("", "v5.4"));
        assert!(!compare_included("", ""));
        assert!(!compare_included("v5.4", ""));
        assert!(!compare_included("v5.4", "HEAD"));
        assert!(!compare_included("v0.0", "v5.4"));
    }

    #[test]
    fn test_display() {
        let key = VersionKey::parse("v5.4.12-rc3");
        assert_eq!(key.to_string(), "v5.4.12-rc3");
        assert_eq!(VersionKey::parse("v6.1").to_string(), "v6.1");
    }
}
