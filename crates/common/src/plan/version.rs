//! Dotted `major.minor` plan versions

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanVersion {
    pub major: u32,
    pub minor: u32,
}

impl PlanVersion {
    pub const FIRST: PlanVersion = PlanVersion { major: 1, minor: 0 };

    /// Version for a fresh generation: next major after every existing one
    pub fn next_major<'a>(existing: impl IntoIterator<Item = &'a str>) -> Self {
        let max_major = existing
            .into_iter()
            .filter_map(|v| v.parse::<PlanVersion>().ok())
            .map(|v| v.major)
            .max();

        match max_major {
            Some(major) => PlanVersion {
                major: major + 1,
                minor: 0,
            },
            None => Self::FIRST,
        }
    }

    /// Version for a clone or refresh of `self`: next minor within its major
    pub fn next_minor<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let max_minor = existing
            .into_iter()
            .filter_map(|v| v.parse::<PlanVersion>().ok())
            .filter(|v| v.major == self.major)
            .map(|v| v.minor)
            .max()
            .unwrap_or(self.minor)
            .max(self.minor);

        PlanVersion {
            major: self.major,
            minor: max_minor + 1,
        }
    }
}

impl fmt::Display for PlanVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PlanVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .unwrap_or((s.trim(), "0"));
        let major = major
            .parse()
            .map_err(|_| format!("invalid plan version: {}", s))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid plan version: {}", s))?;
        Ok(PlanVersion { major, minor })
    }
}

impl PartialOrd for PlanVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlanVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_plan() {
        assert_eq!(PlanVersion::next_major([]).to_string(), "1.0");
    }

    #[test]
    fn test_fresh_generation_bumps_major() {
        let existing = ["1.0", "1.3", "2.1", "garbage"];
        assert_eq!(PlanVersion::next_major(existing).to_string(), "3.0");
    }

    #[test]
    fn test_clone_takes_next_minor_in_major() {
        let existing = ["1.0", "1.1", "1.2", "2.0"];
        let base: PlanVersion = "1.0".parse().unwrap();
        assert_eq!(base.next_minor(existing).to_string(), "1.3");

        let base: PlanVersion = "2.0".parse().unwrap();
        assert_eq!(base.next_minor(existing).to_string(), "2.1");
    }

    #[test]
    fn test_parse_and_order() {
        let a: PlanVersion = "1.10".parse().unwrap();
        let b: PlanVersion = "1.9".parse().unwrap();
        assert!(a > b);
        assert_eq!("4".parse::<PlanVersion>().unwrap(), PlanVersion { major: 4, minor: 0 });
        assert!("one.two".parse::<PlanVersion>().is_err());
    }
}
