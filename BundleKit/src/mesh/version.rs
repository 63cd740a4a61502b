//! Engine version strings (`2019.4.31f1`)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// A parsed engine version. Ordering compares `major.minor.patch` only;
/// build type and number are kept for the few gates that need them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnityVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// `a` (alpha), `b` (beta), `f` (final), `p` (patch), `x` (experimental)
    pub build_type: String,
    pub build: u32,
}

impl UnityVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build_type: "f".to_string(),
            build: 1,
        }
    }

    /// `true` for `version >= major.minor`.
    #[must_use]
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    #[must_use]
    pub fn before(&self, major: u32, minor: u32) -> bool {
        !self.at_least(major, minor)
    }

    /// Versions written with stripped version info read `0.0.0`.
    #[must_use]
    pub fn is_stripped(&self) -> bool {
        self.major == 0
    }

    #[must_use]
    pub fn is_patch_build(&self) -> bool {
        self.build_type == "p"
    }
}

impl Default for UnityVersion {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl PartialOrd for UnityVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnityVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}{}",
            self.major, self.minor, self.patch, self.build_type, self.build
        )
    }
}

/// Split a leading run of ASCII digits from `s`.
fn leading_number(s: &str) -> (Option<u32>, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (s[..end].parse().ok(), &s[end..])
}

impl FromStr for UnityVersion {
    type Err = Error;

    /// Accepts `2019.4.31f1`, `5.6.0p3`, `2021.3.5`, `2022.1`, and `0.0.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidUnityVersion(s.to_string());
        let mut parts = s.trim().splitn(3, '.');

        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

        let (patch, build_type, build) = match parts.next() {
            None => (0, "f".to_string(), 0),
            Some(rest) => {
                let (patch, tail) = leading_number(rest);
                let patch = patch.ok_or_else(invalid)?;
                let type_end = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
                let (build_type, tail) = tail.split_at(type_end);
                let (build, _) = leading_number(tail);
                (patch, build_type.to_string(), build.unwrap_or(0))
            }
        };

        Ok(Self {
            major,
            minor,
            patch,
            build_type,
            build,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_version() {
        let v: UnityVersion = "2019.4.31f1".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch, v.build), (2019, 4, 31, 1));
        assert_eq!(v.build_type, "f");
        assert_eq!(v.to_string(), "2019.4.31f1");
    }

    #[test]
    fn test_parse_patch_and_short_versions() {
        let v: UnityVersion = "2017.3.1p2".parse().unwrap();
        assert!(v.is_patch_build());
        assert_eq!(v.build, 2);

        let short: UnityVersion = "2022.1".parse().unwrap();
        assert!(short.at_least(2022, 1));

        let stripped: UnityVersion = "0.0.0".parse().unwrap();
        assert!(stripped.is_stripped());
    }

    #[test]
    fn test_placeholder_version_is_rejected() {
        assert!("5.x.x".parse::<UnityVersion>().is_err());
        assert!("".parse::<UnityVersion>().is_err());
    }

    #[test]
    fn test_ordering_ignores_build() {
        let a: UnityVersion = "2018.2.0b3".parse().unwrap();
        let b: UnityVersion = "2018.2.0f1".parse().unwrap();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert!(a.at_least(2018, 2));
        assert!(a.before(2018, 3));
        assert!(UnityVersion::new(4, 7, 2) < UnityVersion::new(5, 0, 0));
    }
}
