//! Shader profile and DXIL target handling.
//!
//! - [`ShaderProfile`] parses `-T` profile tokens (`ps_6_0`, `lib_6_x`, ...) and only admits
//!   stage/version combinations that DXIL supports.
//! - [`ValidatorVersion`] parses `<major>.<minor>` validator version strings.
//! - [`TargetOptions`] resolves both into a target triple, reporting bad values as
//!   recoverable [`Diagnostic`]s.

#![forbid(unsafe_code)]

mod config;
mod profile;
mod validator;

pub use crate::config::{
    Diagnostic, ResolvedTarget, TargetOptions, DEFAULT_TRIPLE, TARGET_PROFILE_OPTION,
    VALIDATOR_VERSION_OPTION,
};
pub use crate::profile::{
    try_parse_profile, MinorVersion, ProfileError, ShaderProfile, ShaderStage, TargetTriple,
    MAX_SHADER_MODEL_6_MINOR, OFFLINE_LIB_MINOR,
};
pub use crate::validator::{
    ValidatorVersion, ValidatorVersionError, MAX_DXIL_MAJOR, MAX_DXIL_MINOR,
};
