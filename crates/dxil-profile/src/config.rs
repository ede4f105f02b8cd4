use core::fmt;

use tracing::{debug, warn};

use crate::profile::ShaderProfile;
use crate::validator::ValidatorVersion;

/// Option name reported in diagnostics for the target profile.
pub const TARGET_PROFILE_OPTION: &str = "-T";
/// Option name reported in diagnostics for the validator version.
pub const VALIDATOR_VERSION_OPTION: &str = "--validator-version";
/// Triple used when no (valid) profile is given.
pub const DEFAULT_TRIPLE: &str = "dxil-unknown-shadermodel";

/// Target-related compiler options as they arrive from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOptions {
    pub profile: Option<String>,
    pub validator_version: Option<String>,
    /// Triple substituted when `profile` is absent or invalid.
    pub default_triple: String,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            profile: None,
            validator_version: None,
            default_triple: DEFAULT_TRIPLE.to_owned(),
        }
    }
}

/// A recoverable problem with one option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub option: &'static str,
    pub value: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid value '{}' for '{}': {}",
            self.value, self.option, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub triple: String,
    pub profile: Option<ShaderProfile>,
    pub validator_version: ValidatorVersion,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedTarget {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl TargetOptions {
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_validator_version(mut self, version: impl Into<String>) -> Self {
        self.validator_version = Some(version.into());
        self
    }

    /// Resolves the options, substituting defaults for invalid values.
    ///
    /// Never fails: every rejected value is reported in
    /// [`ResolvedTarget::diagnostics`] and compilation can continue with the fallback.
    pub fn resolve(&self) -> ResolvedTarget {
        let mut diagnostics = Vec::new();

        let mut profile = None;
        let mut triple = self.default_triple.clone();
        if let Some(token) = &self.profile {
            match ShaderProfile::parse(token) {
                Ok(parsed) => {
                    triple = parsed.triple().to_string();
                    debug!(profile = %parsed, %triple, "resolved target profile");
                    profile = Some(parsed);
                }
                Err(err) => {
                    warn!(
                        profile = %token,
                        error = %err,
                        fallback = %triple,
                        "invalid DirectX shader profile"
                    );
                    diagnostics.push(Diagnostic {
                        option: TARGET_PROFILE_OPTION,
                        value: token.clone(),
                        message: format!("invalid profile: {err}"),
                    });
                }
            }
        }

        let mut validator_version = ValidatorVersion::DEFAULT;
        if let Some(value) = &self.validator_version {
            match ValidatorVersion::parse(value) {
                Ok(parsed) => validator_version = parsed,
                Err(err) => {
                    warn!(
                        validator_version = %value,
                        error = %err,
                        "invalid DXIL validator version, using default"
                    );
                    diagnostics.push(Diagnostic {
                        option: VALIDATOR_VERSION_OPTION,
                        value: value.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        ResolvedTarget {
            triple,
            profile,
            validator_version,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShaderStage;

    #[test]
    fn defaults_without_options() {
        let resolved = TargetOptions::default().resolve();
        assert_eq!(resolved.triple, DEFAULT_TRIPLE);
        assert_eq!(resolved.profile, None);
        assert_eq!(resolved.validator_version, ValidatorVersion::DEFAULT);
        assert!(!resolved.has_diagnostics());
    }

    #[test]
    fn valid_profile_sets_triple() {
        let resolved = TargetOptions::default()
            .with_profile("ps_6_2")
            .with_validator_version("1.4")
            .resolve();
        assert_eq!(resolved.triple, "dxil-unknown-shadermodel6.2-pixel");
        assert_eq!(resolved.profile.map(|p| p.stage()), Some(ShaderStage::Pixel));
        assert_eq!(resolved.validator_version.to_string(), "1.4");
        assert!(!resolved.has_diagnostics());
    }

    #[test]
    fn invalid_values_fall_back_with_diagnostics() {
        let resolved = TargetOptions {
            default_triple: "dxil-unknown-shadermodel6.0-library".into(),
            ..TargetOptions::default()
        }
        .with_profile("as_6_4")
        .with_validator_version("0.3")
        .resolve();

        assert_eq!(resolved.triple, "dxil-unknown-shadermodel6.0-library");
        assert_eq!(resolved.validator_version, ValidatorVersion::DEFAULT);
        assert_eq!(resolved.diagnostics.len(), 2);
        assert_eq!(resolved.diagnostics[0].option, TARGET_PROFILE_OPTION);
        assert_eq!(resolved.diagnostics[0].value, "as_6_4");
        assert_eq!(resolved.diagnostics[1].option, VALIDATOR_VERSION_OPTION);
        assert_eq!(
            resolved.diagnostics[1].message,
            "If validator major version is 0, minor version must also be 0."
        );
    }
}
