//! DXIL validator version strings (`<major>.<minor>`).

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

pub const MAX_DXIL_MAJOR: u64 = 1;
pub const MAX_DXIL_MINOR: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorVersionError {
    #[error("Format of validator version is \"<major>.<minor>\" (ex:\"1.4\").")]
    Format,
    #[error("Validator version must be less than or equal to current internal version.")]
    TooNew,
    #[error("If validator major version is 0, minor version must also be 0.")]
    ZeroMajorWithMinor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidatorVersion {
    pub major: u64,
    pub minor: u64,
}

impl ValidatorVersion {
    /// Version assumed when the user does not pass one.
    pub const DEFAULT: ValidatorVersion = ValidatorVersion {
        major: MAX_DXIL_MAJOR,
        minor: MAX_DXIL_MINOR,
    };

    pub fn parse(s: &str) -> Result<Self, ValidatorVersionError> {
        let (major, minor) = s.split_once('.').unwrap_or((s, ""));
        let (Ok(major), Ok(minor)) = (parse_unsigned(major), parse_unsigned(minor)) else {
            return Err(ValidatorVersionError::Format);
        };

        if major > MAX_DXIL_MAJOR || (major == MAX_DXIL_MAJOR && minor > MAX_DXIL_MINOR) {
            return Err(ValidatorVersionError::TooNew);
        }
        if major == 0 && minor != 0 {
            return Err(ValidatorVersionError::ZeroMajorWithMinor);
        }
        Ok(Self { major, minor })
    }
}

impl Default for ValidatorVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for ValidatorVersion {
    type Err = ValidatorVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ValidatorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// Out-of-range values saturate so that e.g. `99999999999999999999.0` reports "too new" rather
// than a format error.
fn parse_unsigned(s: &str) -> Result<u64, ()> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    Ok(s.parse::<u64>().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_versions() {
        assert_eq!(
            ValidatorVersion::parse("1.4"),
            Ok(ValidatorVersion { major: 1, minor: 4 })
        );
        assert_eq!(
            ValidatorVersion::parse("0.0"),
            Ok(ValidatorVersion { major: 0, minor: 0 })
        );
        assert_eq!(ValidatorVersion::parse("1.7"), Ok(ValidatorVersion::DEFAULT));
    }

    #[test]
    fn rejects_malformed_versions() {
        for s in ["", "1", "1.", ".4", "a.b", "1.4.2", "-1.0"] {
            assert_eq!(
                ValidatorVersion::parse(s),
                Err(ValidatorVersionError::Format),
                "{s:?}"
            );
        }
    }

    #[test]
    fn rejects_newer_than_internal() {
        assert_eq!(
            ValidatorVersion::parse("1.8"),
            Err(ValidatorVersionError::TooNew)
        );
        assert_eq!(
            ValidatorVersion::parse("2.0"),
            Err(ValidatorVersionError::TooNew)
        );
        assert_eq!(
            ValidatorVersion::parse("99999999999999999999.0"),
            Err(ValidatorVersionError::TooNew)
        );
    }

    #[test]
    fn zero_major_needs_zero_minor() {
        assert_eq!(
            ValidatorVersion::parse("0.1"),
            Err(ValidatorVersionError::ZeroMajorWithMinor)
        );
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(ValidatorVersion::DEFAULT.to_string(), "1.7");
    }
}
