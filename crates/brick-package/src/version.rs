//! Release versions and partial-version pin selectors
//!
//! Release identifiers are always three components (`v1.2.3`). One- and
//! two-component forms (`v1`, `v1.2`) only ever select cache pins.

use std::fmt;
use std::str::FromStr;

use crate::PackageError;

/// Normalize version text: `_` becomes `.` and a trailing `.` is dropped.
pub fn normalize(text: &str) -> String {
    let swapped = text.trim().replace('_', ".");
    match swapped.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => swapped,
    }
}

fn strip_v(text: &str) -> &str {
    text.strip_prefix('v')
        .or_else(|| text.strip_prefix('V'))
        .unwrap_or(text)
}

/// True if `text` has one of the allowed component counts and every
/// component is made only of decimal digits.
pub fn is_valid(text: &str, places: &[usize]) -> bool {
    let normalized = normalize(text);
    let parts: Vec<&str> = strip_v(&normalized).split('.').collect();

    if !places.contains(&parts.len()) {
        return false;
    }

    parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// A `major.minor.patch` release version.
///
/// Ordering is lexicographic on the three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Version of a block that has never been released.
    pub const ZERO: Version = Version::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Tolerant parse: never fails. Missing or non-numeric components are 0.
    pub fn parse(text: &str) -> Self {
        let normalized = normalize(text);
        let mut parts = strip_v(&normalized)
            .split('.')
            .map(|p| p.parse::<u32>().unwrap_or(0));

        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    /// Strict parse of a three-component release identifier.
    pub fn parse_release(text: &str) -> crate::Result<Self> {
        if !is_valid(text, &[3]) {
            return Err(PackageError::InvalidVersion(text.to_string()));
        }
        Ok(Self::parse(text))
    }

    /// Returns the higher of `lhs` and `rhs`; equal versions return `rhs`.
    ///
    /// Callers that gate on "strictly higher" pass the existing version as
    /// `rhs` and test whether the result is the candidate.
    pub fn higher<'a>(lhs: &'a Version, rhs: &'a Version) -> &'a Version {
        if lhs > rhs {
            lhs
        } else {
            rhs
        }
    }

    /// Canonical text `vMAJOR.MINOR.PATCH`.
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Text without the leading `v`, as stored in the marker file.
    pub fn bare(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// Truncate to a pin selector with `places` components (1..=3).
    pub fn truncate(&self, places: usize) -> PartialVersion {
        let all = [self.major, self.minor, self.patch];
        let places = places.clamp(1, 3);
        PartialVersion {
            parts: all[..places].to_vec(),
        }
    }

    /// Next version for a bump keyword.
    pub fn bump(&self, bump: Bump) -> Version {
        match bump {
            Bump::Major => Version::new(self.major + 1, 0, 0),
            Bump::Minor => Version::new(self.major, self.minor + 1, 0),
            Bump::Patch => Version::new(self.major, self.minor, self.patch + 1),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Format components; with `zero_extend` a missing trailing component
/// is written as `0`, otherwise it is omitted.
pub fn format(major: u32, minor: Option<u32>, patch: Option<u32>, zero_extend: bool) -> String {
    let mut text = format!("v{}", major);
    match (minor, zero_extend) {
        (Some(m), _) => text.push_str(&format!(".{}", m)),
        (None, true) => text.push_str(".0"),
        (None, false) => return text,
    }
    match (patch, zero_extend) {
        (Some(p), _) => text.push_str(&format!(".{}", p)),
        (None, true) => text.push_str(".0"),
        (None, false) => {}
    }
    text
}

/// Release bump keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    Major,
    Minor,
    Patch,
}

/// Requested next release point: a bump keyword or an explicit version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextVersion {
    Bump(Bump),
    Exact(Version),
}

impl FromStr for NextVersion {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(NextVersion::Bump(Bump::Major)),
            "minor" => Ok(NextVersion::Bump(Bump::Minor)),
            "patch" => Ok(NextVersion::Bump(Bump::Patch)),
            _ => Version::parse_release(s)
                .map(NextVersion::Exact)
                .map_err(|_| PackageError::InvalidVersion(s.to_string())),
        }
    }
}

/// A 1-, 2-, or 3-component version prefix naming a cache pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartialVersion {
    parts: Vec<u32>,
}

impl PartialVersion {
    /// Parse `v1`, `v1.2`, or `v1.2.3`; anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        if !is_valid(text, &[1, 2, 3]) {
            return None;
        }
        let normalized = normalize(text);
        let parts = strip_v(&normalized)
            .split('.')
            .map(|p| p.parse::<u32>().unwrap_or(0))
            .collect();
        Some(Self { parts })
    }

    /// Number of components (1..=3).
    pub fn precision(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    /// True if `version` starts with this prefix.
    pub fn matches(&self, version: &Version) -> bool {
        let full = [version.major, version.minor, version.patch];
        self.parts.iter().zip(full.iter()).all(|(a, b)| a == b)
    }

    /// True if this pin is at least as specific as `prefix` and shares it.
    pub fn starts_with(&self, prefix: &PartialVersion) -> bool {
        prefix.parts.len() <= self.parts.len()
            && prefix.parts.iter().zip(self.parts.iter()).all(|(a, b)| a == b)
    }

    /// Suffix appended to unit names inside a pinned copy (`_v1_2`).
    pub fn unit_suffix(&self) -> String {
        format!("_{}", self.to_string().replace('.', "_"))
    }

    /// Zero-extended release version.
    pub fn to_version(&self) -> Version {
        Version::new(
            self.parts.first().copied().unwrap_or(0),
            self.parts.get(1).copied().unwrap_or(0),
            self.parts.get(2).copied().unwrap_or(0),
        )
    }
}

impl fmt::Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "v{}", text.join("."))
    }
}

impl From<Version> for PartialVersion {
    fn from(v: Version) -> Self {
        v.truncate(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2", &[1], false)]
    #[case("1.2", &[2], true)]
    #[case("v1.2.3", &[3], true)]
    #[case("1.a.3", &[3], false)]
    #[case("v1_2_3", &[3], true)]
    #[case("v1.2.", &[2], true)]
    #[case("v", &[1], false)]
    #[case("", &[1, 2, 3], false)]
    #[case("v1..3", &[3], false)]
    fn test_is_valid(#[case] text: &str, #[case] places: &[usize], #[case] expected: bool) {
        assert_eq!(is_valid(text, places), expected);
    }

    #[rstest]
    #[case("v1.2.3", Version::new(1, 2, 3))]
    #[case("1_4_0", Version::new(1, 4, 0))]
    #[case("v2", Version::new(2, 0, 0))]
    #[case("v2.7.", Version::new(2, 7, 0))]
    #[case("garbage", Version::new(0, 0, 0))]
    #[case("v1.x.9", Version::new(1, 0, 9))]
    fn test_tolerant_parse(#[case] text: &str, #[case] expected: Version) {
        assert_eq!(Version::parse(text), expected);
    }

    #[test]
    fn test_higher_prefers_larger() {
        let a = Version::new(1, 2, 3);
        let b = Version::new(1, 10, 0);
        assert_eq!(Version::higher(&a, &b), &b);
        assert_eq!(Version::higher(&b, &a), &b);
    }

    #[test]
    fn test_higher_tie_returns_second_argument() {
        let first = Version::new(2, 0, 0);
        let second = Version::new(2, 0, 0);
        assert!(std::ptr::eq(Version::higher(&first, &second), &second));
    }

    #[test]
    fn test_format_zero_extend() {
        assert_eq!(format(1, None, None, false), "v1");
        assert_eq!(format(1, Some(2), None, false), "v1.2");
        assert_eq!(format(1, None, None, true), "v1.0.0");
        assert_eq!(format(1, Some(2), Some(3), true), "v1.2.3");
    }

    #[test]
    fn test_bump() {
        let v = Version::new(1, 4, 2);
        assert_eq!(v.bump(Bump::Major), Version::new(2, 0, 0));
        assert_eq!(v.bump(Bump::Minor), Version::new(1, 5, 0));
        assert_eq!(v.bump(Bump::Patch), Version::new(1, 4, 3));
    }

    #[test]
    fn test_next_version_from_str() {
        assert_eq!("MINOR".parse::<NextVersion>().unwrap(), NextVersion::Bump(Bump::Minor));
        assert_eq!(
            "v3.0.1".parse::<NextVersion>().unwrap(),
            NextVersion::Exact(Version::new(3, 0, 1))
        );
        assert!("v3.0".parse::<NextVersion>().is_err());
        assert!("later".parse::<NextVersion>().is_err());
    }

    #[test]
    fn test_partial_version_matching() {
        let pin = PartialVersion::parse("v1.2").unwrap();
        assert_eq!(pin.precision(), 2);
        assert!(pin.matches(&Version::new(1, 2, 9)));
        assert!(!pin.matches(&Version::new(1, 3, 0)));
        assert_eq!(pin.to_string(), "v1.2");
        assert_eq!(pin.unit_suffix(), "_v1_2");
        assert!(PartialVersion::parse("v1.2.3.4").is_none());
    }

    #[test]
    fn test_partial_version_prefix() {
        let v1 = PartialVersion::parse("v1").unwrap();
        let v12 = PartialVersion::parse("v1.2").unwrap();
        let v123 = PartialVersion::parse("v1.2.3").unwrap();
        assert!(v123.starts_with(&v1));
        assert!(v123.starts_with(&v12));
        assert!(!v1.starts_with(&v12));
    }

    proptest! {
        #[test]
        fn prop_format_parse_round_trip(a in 0u32..10_000, b in 0u32..10_000, c in 0u32..10_000) {
            let text = format(a, Some(b), Some(c), false);
            prop_assert!(is_valid(&text, &[3]));
            prop_assert_eq!(Version::parse(&text), Version::new(a, b, c));
            prop_assert_eq!(Version::parse(&text).format(), text);
        }

        #[test]
        fn prop_higher_matches_ordering(a in any::<(u8, u8, u8)>(), b in any::<(u8, u8, u8)>()) {
            let x = Version::new(a.0 as u32, a.1 as u32, a.2 as u32);
            let y = Version::new(b.0 as u32, b.1 as u32, b.2 as u32);
            let high = *Version::higher(&x, &y);
            prop_assert_eq!(high, std::cmp::max(x, y));
        }
    }
}
