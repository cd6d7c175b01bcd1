use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version string: {0:?}")]
pub struct ParseVersionError(pub String);

/// Potree file format version, `major.minor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// `self >= other`
    pub fn at_least(&self, other: Version) -> bool {
        *self >= other
    }

    /// `self > other`
    pub fn newer_than(&self, other: Version) -> bool {
        *self > other
    }

    /// `self < other`
    pub fn below(&self, other: Version) -> bool {
        *self < other
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError(s.to_string());

        let trimmed = s.trim();
        let (major, minor) = match trimmed.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (trimmed, "0"),
        };

        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        assert_eq!("1.7".parse::<Version>().unwrap(), Version::new(1, 7));
        assert_eq!("2".parse::<Version>().unwrap(), Version::new(2, 0));
        assert!("one.two".parse::<Version>().is_err());
    }

    #[test]
    fn compares_numerically() {
        let v = Version::new(1, 10);
        assert!(v.at_least(Version::new(1, 4)));
        assert!(v.newer_than(Version::new(1, 9)));
        assert!(Version::new(1, 4).below(Version::new(1, 5)));
        assert!(!Version::new(1, 5).below(Version::new(1, 5)));
    }
}
