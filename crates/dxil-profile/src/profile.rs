//! Shader profile tokens (`cs_6_0`, `lib_6_x`, ...) and the DXIL target triples they map to.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Numeric value the offline library minor version (`x`) takes when rendered into a triple.
pub const OFFLINE_LIB_MINOR: u8 = 0xF;

/// Highest shader model 6 minor version accepted by the parser.
pub const MAX_SHADER_MODEL_6_MINOR: u8 = 7;

const TRIPLE_ARCH: &str = "dxil";
const TRIPLE_VENDOR: &str = "unknown";
const TRIPLE_OS: &str = "shadermodel";

/// Pipeline stage a profile targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Pixel,
    Vertex,
    Geometry,
    Hull,
    Domain,
    Compute,
    Library,
    Mesh,
    Amplification,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 9] = [
        ShaderStage::Pixel,
        ShaderStage::Vertex,
        ShaderStage::Geometry,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Compute,
        ShaderStage::Library,
        ShaderStage::Mesh,
        ShaderStage::Amplification,
    ];

    /// Looks up the stage for a profile stage code (`ps`, `vs`, `lib`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "ps" => ShaderStage::Pixel,
            "vs" => ShaderStage::Vertex,
            "gs" => ShaderStage::Geometry,
            "hs" => ShaderStage::Hull,
            "ds" => ShaderStage::Domain,
            "cs" => ShaderStage::Compute,
            "lib" => ShaderStage::Library,
            "ms" => ShaderStage::Mesh,
            "as" => ShaderStage::Amplification,
            _ => return None,
        })
    }

    pub fn code(self) -> &'static str {
        match self {
            ShaderStage::Pixel => "ps",
            ShaderStage::Vertex => "vs",
            ShaderStage::Geometry => "gs",
            ShaderStage::Hull => "hs",
            ShaderStage::Domain => "ds",
            ShaderStage::Compute => "cs",
            ShaderStage::Library => "lib",
            ShaderStage::Mesh => "ms",
            ShaderStage::Amplification => "as",
        }
    }

    /// Environment component of the target triple.
    pub fn environment_name(self) -> &'static str {
        match self {
            ShaderStage::Pixel => "pixel",
            ShaderStage::Vertex => "vertex",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Hull => "hull",
            ShaderStage::Domain => "domain",
            ShaderStage::Compute => "compute",
            ShaderStage::Library => "library",
            ShaderStage::Mesh => "mesh",
            ShaderStage::Amplification => "amplification",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.environment_name())
    }
}

/// Minor component of a profile version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinorVersion {
    Numeric(u8),
    /// `x`: offline library linking target, only legal for `lib_6_x`.
    Offline,
}

impl MinorVersion {
    /// Value used in the triple's OS version (`Offline` renders as 15).
    pub fn value(self) -> u8 {
        match self {
            MinorVersion::Numeric(v) => v,
            MinorVersion::Offline => OFFLINE_LIB_MINOR,
        }
    }
}

impl fmt::Display for MinorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinorVersion::Numeric(v) => write!(f, "{v}"),
            MinorVersion::Offline => f.write_str("x"),
        }
    }
}

/// Reasons a profile token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("expected `<stage>_<major>_<minor>`, got {0} field(s)")]
    FieldCount(usize),
    #[error("unknown shader stage code {0:?}")]
    UnknownStage(String),
    #[error("invalid major version {0:?}")]
    InvalidMajor(String),
    #[error("invalid minor version {0:?}")]
    InvalidMinor(String),
    #[error("shader model {major}.{minor} is not supported for {stage} shaders")]
    Unsupported {
        stage: ShaderStage,
        major: u8,
        minor: MinorVersion,
    },
}

/// A validated `(stage, major, minor)` profile.
///
/// Fields are private: every value of this type is inside the supported
/// stage/version matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderProfile {
    stage: ShaderStage,
    major: u8,
    minor: MinorVersion,
}

impl ShaderProfile {
    /// Builds a profile, rejecting combinations outside the supported matrix.
    pub fn new(stage: ShaderStage, major: u8, minor: MinorVersion) -> Result<Self, ProfileError> {
        if is_legal_shader_model(stage, major, minor) {
            Ok(Self {
                stage,
                major,
                minor,
            })
        } else {
            Err(ProfileError::Unsupported {
                stage,
                major,
                minor,
            })
        }
    }

    /// Parses a `stage_major_minor` token such as `cs_6_0` or `lib_6_x`.
    pub fn parse(token: &str) -> Result<Self, ProfileError> {
        let parts: Vec<&str> = token.split('_').collect();
        let [stage, major, minor] = parts[..] else {
            return Err(ProfileError::FieldCount(parts.len()));
        };

        let stage =
            ShaderStage::from_code(stage).ok_or_else(|| ProfileError::UnknownStage(stage.into()))?;

        let major = match parse_digits(major) {
            Some(v @ 4..=6) => v,
            _ => return Err(ProfileError::InvalidMajor(major.into())),
        };

        let minor = match minor {
            "x" => MinorVersion::Offline,
            digits => match parse_digits(digits) {
                Some(v) if v <= MAX_SHADER_MODEL_6_MINOR => MinorVersion::Numeric(v),
                _ => return Err(ProfileError::InvalidMinor(digits.into())),
            },
        };

        Self::new(stage, major, minor)
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> MinorVersion {
        self.minor
    }

    pub fn is_offline_library(&self) -> bool {
        self.minor == MinorVersion::Offline
    }

    /// Canonical token for this profile (inverse of [`ShaderProfile::parse`]).
    pub fn token(&self) -> String {
        format!("{}_{}_{}", self.stage.code(), self.major, self.minor)
    }

    pub fn triple(&self) -> TargetTriple {
        TargetTriple {
            major: self.major,
            minor: self.minor.value(),
            stage: self.stage,
        }
    }
}

impl FromStr for ShaderProfile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ShaderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// `dxil-unknown-shadermodel<major>.<minor>-<stage>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetTriple {
    pub major: u8,
    pub minor: u8,
    pub stage: ShaderStage,
}

impl TargetTriple {
    pub fn arch(&self) -> &'static str {
        TRIPLE_ARCH
    }

    pub fn vendor(&self) -> &'static str {
        TRIPLE_VENDOR
    }

    /// OS component including the shader model version (`shadermodel6.0`).
    pub fn os(&self) -> String {
        format!("{TRIPLE_OS}{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TRIPLE_ARCH}-{TRIPLE_VENDOR}-{}-{}",
            self.os(),
            self.stage.environment_name()
        )
    }
}

/// Parses `token` and returns the canonical triple string, or `None` if the token is not a
/// supported profile.
pub fn try_parse_profile(token: &str) -> Option<String> {
    ShaderProfile::parse(token)
        .ok()
        .map(|profile| profile.triple().to_string())
}

fn is_legal_version(major: u8, minor: u8, want_major: u8, min_minor: u8, max_minor: u8) -> bool {
    major == want_major && (min_minor..=max_minor).contains(&minor)
}

fn is_legal_shader_model(stage: ShaderStage, major: u8, minor: MinorVersion) -> bool {
    let minor = match (stage, minor) {
        (ShaderStage::Library, MinorVersion::Offline) => return major == 6,
        (_, MinorVersion::Offline) => return false,
        (_, MinorVersion::Numeric(minor)) => minor,
    };

    match stage {
        ShaderStage::Pixel
        | ShaderStage::Vertex
        | ShaderStage::Geometry
        | ShaderStage::Hull
        | ShaderStage::Domain
        | ShaderStage::Compute => {
            is_legal_version(major, minor, 4, 0, 1)
                || is_legal_version(major, minor, 5, 0, 1)
                || is_legal_version(major, minor, 6, 0, MAX_SHADER_MODEL_6_MINOR)
        }
        ShaderStage::Library => is_legal_version(major, minor, 6, 3, MAX_SHADER_MODEL_6_MINOR),
        ShaderStage::Amplification | ShaderStage::Mesh => {
            is_legal_version(major, minor, 6, 5, MAX_SHADER_MODEL_6_MINOR)
        }
    }
}

/// Unsigned decimal field; signs and whitespace are not accepted.
fn parse_digits(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_6_0() {
        let profile = ShaderProfile::parse("cs_6_0").unwrap();
        assert_eq!(profile.stage(), ShaderStage::Compute);
        assert_eq!(profile.major(), 6);
        assert_eq!(profile.minor(), MinorVersion::Numeric(0));
        assert_eq!(
            profile.triple().to_string(),
            "dxil-unknown-shadermodel6.0-compute"
        );
    }

    #[test]
    fn offline_library() {
        let profile = ShaderProfile::parse("lib_6_x").unwrap();
        assert!(profile.is_offline_library());
        assert_eq!(profile.token(), "lib_6_x");
        assert_eq!(
            profile.triple().to_string(),
            "dxil-unknown-shadermodel6.15-library"
        );
    }

    #[test]
    fn rejects_bad_fields() {
        assert_eq!(
            ShaderProfile::parse("cs_6"),
            Err(ProfileError::FieldCount(2))
        );
        assert_eq!(
            ShaderProfile::parse("cs_6_0_1"),
            Err(ProfileError::FieldCount(4))
        );
        assert_eq!(
            ShaderProfile::parse("xs_6_0"),
            Err(ProfileError::UnknownStage("xs".into()))
        );
        assert_eq!(
            ShaderProfile::parse("ps_3_0"),
            Err(ProfileError::InvalidMajor("3".into()))
        );
        assert_eq!(
            ShaderProfile::parse("ps_6_8"),
            Err(ProfileError::InvalidMinor("8".into()))
        );
        assert_eq!(
            ShaderProfile::parse("ps_6_"),
            Err(ProfileError::InvalidMinor("".into()))
        );
        assert_eq!(
            ShaderProfile::parse("ps_+6_0"),
            Err(ProfileError::InvalidMajor("+6".into()))
        );
        assert_eq!(
            ShaderProfile::parse("ps_6_+1"),
            Err(ProfileError::InvalidMinor("+1".into()))
        );
    }

    #[test]
    fn rejects_cross_field_combinations() {
        assert!(matches!(
            ShaderProfile::parse("ps_4_2"),
            Err(ProfileError::Unsupported { .. })
        ));
        assert!(matches!(
            ShaderProfile::parse("as_6_4"),
            Err(ProfileError::Unsupported { .. })
        ));
        assert!(matches!(
            ShaderProfile::parse("lib_6_2"),
            Err(ProfileError::Unsupported { .. })
        ));
        assert!(matches!(
            ShaderProfile::parse("cs_6_x"),
            Err(ProfileError::Unsupported { .. })
        ));
        assert!(matches!(
            ShaderProfile::parse("lib_5_x"),
            Err(ProfileError::Unsupported { .. })
        ));
    }

    #[test]
    fn try_parse_profile_returns_triple_or_none() {
        assert_eq!(
            try_parse_profile("ms_6_5").as_deref(),
            Some("dxil-unknown-shadermodel6.5-mesh")
        );
        assert_eq!(try_parse_profile("ms_6_4"), None);
    }
}
