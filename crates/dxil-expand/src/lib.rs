//! Intrinsic expansion for DXIL code generation.
//!
//! High-level math and logic intrinsics (`abs`, `exp`, `log`, `log10`, `pow`, `dx.any`,
//! `dx.clamp`, `dx.uclamp`, `dx.lerp`, `dx.sdot`, `dx.udot`) are rewritten into primitive
//! operations the DXIL backend can lower directly, and calls through automatic
//! differentiation wrappers are lowered to Enzyme entry points with flattened arguments.
//!
//! Any inconsistency found while rewriting is reported as an [`ExpansionError`]; the module
//! may be partially rewritten at that point and compilation must not continue.

#![forbid(unsafe_code)]

mod diff;
mod error;
mod intrinsics;
mod pass;

pub use crate::diff::{ArgTag, DiffMode, AUTODIFF_PREFIX, FWDDIFF_PREFIX};
pub use crate::error::ExpansionError;
pub use crate::intrinsics::{expandable_intrinsics, is_expandable};
pub use crate::pass::{expand_intrinsics, IntrinsicExpansion, PreservedAnalyses};
