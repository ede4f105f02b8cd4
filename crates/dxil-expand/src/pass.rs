use dxil_ir::{Module, Value};
use tracing::debug;

use crate::diff::{self, DiffMode};
use crate::error::ExpansionError;
use crate::intrinsics;

/// Rewrites every expandable intrinsic call and lowers differentiation wrappers.
///
/// Works over a snapshot of the module's functions, so declarations created while expanding
/// (`llvm.exp2`, `llvm.smax`, `__enzyme_fwddiff_*`, ...) are never revisited. Returns whether
/// the module changed.
pub fn expand_intrinsics(module: &mut Module) -> Result<bool, ExpansionError> {
    let mut changed = false;
    let mut wrappers = Vec::new();

    for func in module.functions() {
        let f = module.function(func);
        if let Some(mode) = DiffMode::of_wrapper(&f.name) {
            if module.has_users(Value::Func(func)) {
                wrappers.push((func, mode));
            } else {
                debug!(wrapper = %f.name, "removing unused differentiation wrapper");
                module.erase_function(func);
                changed = true;
            }
            continue;
        }
        if let Some(intrinsic) = f.intrinsic() {
            changed |= intrinsics::expand_calls(module, func, intrinsic)?;
        }
    }

    for (func, mode) in wrappers {
        diff::lower_wrapper(module, func, mode)?;
        changed = true;
    }
    Ok(changed)
}

/// What a pass leaves intact for later passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservedAnalyses {
    All,
    None,
}

/// Pass-manager entry point for [`expand_intrinsics`].
#[derive(Debug, Default, Clone, Copy)]
pub struct IntrinsicExpansion;

impl IntrinsicExpansion {
    pub const NAME: &'static str = "dxil-intrinsic-expansion";

    pub fn run(&self, module: &mut Module) -> Result<PreservedAnalyses, ExpansionError> {
        let changed = expand_intrinsics(module)?;
        debug!(pass = Self::NAME, module = %module.name, changed, "pass finished");
        Ok(if changed {
            PreservedAnalyses::None
        } else {
            PreservedAnalyses::All
        })
    }
}
