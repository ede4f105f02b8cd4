//! Rewrite rules for high-level math intrinsics.
//!
//! Each rule receives a call instruction, emits its replacement immediately in front of it
//! and returns the value that stands in for the call's result. The driver then redirects
//! every use of the call and erases it.

use std::f64::consts::{LN_10, LN_2, LOG2_E};

use dxil_ir::{
    Builder, FloatPredicate, FuncId, InstId, InstKind, IntPredicate, Intrinsic, Module, Type, Value,
};
use tracing::{debug, trace};

use crate::error::ExpansionError;

type ExpandFn = fn(&mut Module, InstId) -> Result<Value, ExpansionError>;

const EXPANSIONS: &[(Intrinsic, ExpandFn)] = &[
    (Intrinsic::Abs, expand_abs),
    (Intrinsic::Exp, expand_exp),
    (Intrinsic::Log, expand_log),
    (Intrinsic::Log10, expand_log10),
    (Intrinsic::Pow, expand_pow),
    (Intrinsic::DxAny, expand_any),
    (Intrinsic::DxClamp, expand_clamp),
    (Intrinsic::DxUClamp, expand_uclamp),
    (Intrinsic::DxLerp, expand_lerp),
    (Intrinsic::DxSDot, expand_sdot),
    (Intrinsic::DxUDot, expand_udot),
];

/// Whether calls to `intrinsic` are rewritten by [`crate::expand_intrinsics`].
pub fn is_expandable(intrinsic: Intrinsic) -> bool {
    rule(intrinsic).is_some()
}

/// The intrinsics this pass rewrites, in dispatch order.
pub fn expandable_intrinsics() -> impl Iterator<Item = Intrinsic> {
    EXPANSIONS.iter().map(|&(intrinsic, _)| intrinsic)
}

fn rule(intrinsic: Intrinsic) -> Option<ExpandFn> {
    EXPANSIONS
        .iter()
        .find(|&&(i, _)| i == intrinsic)
        .map(|&(_, f)| f)
}

/// Expands every direct call of the intrinsic declaration `func`.
///
/// The declaration is erased once nothing refers to it; other users (the function's address
/// stored or passed somewhere) keep it alive. Returns whether any call was rewritten.
pub(crate) fn expand_calls(
    module: &mut Module,
    func: FuncId,
    intrinsic: Intrinsic,
) -> Result<bool, ExpansionError> {
    let Some(expand) = rule(intrinsic) else {
        return Ok(false);
    };

    let mut expanded = false;
    for user in module.users(Value::Func(func)) {
        if module.called_function(user) != Some(func) {
            trace!(callee = %module.function(func).name, ?user, "skipping non-call user");
            continue;
        }
        let replacement = expand(module, user)?;
        module.replace_all_uses_with(Value::Inst(user), replacement);
        module.erase_instruction(user);
        expanded = true;
        debug!(callee = %module.function(func).name, ?user, "expanded intrinsic call");
    }

    if expanded && !module.has_users(Value::Func(func)) {
        debug!(function = %module.function(func).name, "removing expanded intrinsic declaration");
        module.erase_function(func);
    }
    Ok(expanded)
}

fn call_operands<const N: usize>(
    module: &Module,
    call: InstId,
) -> Result<[Value; N], ExpansionError> {
    let args: &[Value] = match &module.inst(call).kind {
        InstKind::Call { args, .. } => args.as_slice(),
        _ => &[],
    };
    <[Value; N]>::try_from(args).map_err(|_| ExpansionError::OperandCount {
        callee: module
            .called_function(call)
            .map(|f| module.function(f).name.clone())
            .unwrap_or_default(),
        expected: N,
        found: args.len(),
    })
}

fn unsupported(module: &Module, intrinsic: &'static str, ty: Type) -> ExpansionError {
    ExpansionError::UnsupportedOperand {
        intrinsic,
        ty: module.display_type(ty),
    }
}

fn require_float(module: &Module, intrinsic: &'static str, ty: Type) -> Result<(), ExpansionError> {
    if ty.is_float_or_float_vector() {
        Ok(())
    } else {
        Err(unsupported(module, intrinsic, ty))
    }
}

/// Gives the instruction behind `value` the tail-call marker of the call being replaced.
fn copy_tail_marker(module: &mut Module, from: InstId, value: Value) {
    let tail = module.is_tail_call(from);
    if let Value::Inst(inst) = value {
        module.set_tail_call(inst, tail);
    }
}

fn expand_abs(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x] = call_operands(module, call)?;
    let ty = module.value_type(x);
    if !ty.is_int_or_int_vector() {
        return Err(unsupported(module, "abs", ty));
    }
    let zero = module.const_int(ty, 0);
    let mut b = Builder::before(module, call);
    let negated = b.sub(zero, x);
    Ok(b.call_intrinsic(Intrinsic::SMax, ty, &[x, negated])?)
}

fn expand_exp(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x] = call_operands(module, call)?;
    let ty = module.value_type(x);
    require_float(module, "exp", ty)?;
    let log2e = module.const_float(ty, LOG2_E);
    let mut b = Builder::before(module, call);
    let scaled = b.fmul(log2e, x);
    let exp2 = b.call_intrinsic(Intrinsic::Exp2, ty, &[scaled])?;
    copy_tail_marker(module, call, exp2);
    Ok(exp2)
}

/// `log2(x)` scaled by `factor`; `ln(2)` for natural log, `ln(2)/ln(10)` for base 10.
fn expand_scaled_log2(
    module: &mut Module,
    call: InstId,
    intrinsic: &'static str,
    factor: f64,
) -> Result<Value, ExpansionError> {
    let [x] = call_operands(module, call)?;
    let ty = module.value_type(x);
    require_float(module, intrinsic, ty)?;
    let factor = module.const_float(ty, factor);
    let mut b = Builder::before(module, call);
    let log2 = b.call_intrinsic(Intrinsic::Log2, ty, &[x])?;
    let scaled = b.fmul(factor, log2);
    copy_tail_marker(module, call, log2);
    Ok(scaled)
}

fn expand_log(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    expand_scaled_log2(module, call, "log", LN_2)
}

fn expand_log10(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    expand_scaled_log2(module, call, "log10", LN_2 / LN_10)
}

fn expand_pow(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x, y] = call_operands(module, call)?;
    let ty = module.value_type(x);
    require_float(module, "pow", ty)?;
    let mut b = Builder::before(module, call);
    let log2 = b.call_intrinsic(Intrinsic::Log2, ty, &[x])?;
    let product = b.fmul(log2, y);
    let exp2 = b.call_intrinsic(Intrinsic::Exp2, ty, &[product])?;
    copy_tail_marker(module, call, exp2);
    Ok(exp2)
}

fn expand_any(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x] = call_operands(module, call)?;
    let ty = module.value_type(x);
    let Some(elem) = ty.scalar_type() else {
        return Err(unsupported(module, "dx.any", ty));
    };
    let zero = if elem.is_float() {
        module.const_float(ty, 0.0)
    } else {
        module.const_int(ty, 0)
    };

    let mut b = Builder::before(module, call);
    let nonzero = if elem.is_float() {
        b.fcmp(FloatPredicate::Une, x, zero)
    } else {
        b.icmp(IntPredicate::Ne, x, zero)
    };
    let Type::Vector(_, lanes) = ty else {
        return Ok(nonzero);
    };
    let mut any = b.extract_element(nonzero, 0);
    for lane in 1..lanes {
        let next = b.extract_element(nonzero, lane);
        any = b.or(any, next);
    }
    Ok(any)
}

fn expand_min_max(
    module: &mut Module,
    call: InstId,
    max: Intrinsic,
    min: Intrinsic,
) -> Result<Value, ExpansionError> {
    let [x, lo, hi] = call_operands(module, call)?;
    let ty = module.value_type(x);
    let mut b = Builder::before(module, call);
    let raised = b.call_intrinsic(max, ty, &[x, lo])?;
    Ok(b.call_intrinsic(min, ty, &[raised, hi])?)
}

fn expand_clamp(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x, _, _] = call_operands(module, call)?;
    let ty = module.value_type(x);
    match ty.scalar_type() {
        Some(elem) if elem.is_float() => {
            expand_min_max(module, call, Intrinsic::MaxNum, Intrinsic::MinNum)
        }
        Some(_) => expand_min_max(module, call, Intrinsic::SMax, Intrinsic::SMin),
        None => Err(unsupported(module, "dx.clamp", ty)),
    }
}

fn expand_uclamp(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x, _, _] = call_operands(module, call)?;
    let ty = module.value_type(x);
    if !ty.is_int_or_int_vector() {
        return Err(unsupported(module, "dx.uclamp", ty));
    }
    expand_min_max(module, call, Intrinsic::UMax, Intrinsic::UMin)
}

fn expand_lerp(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    let [x, y, s] = call_operands(module, call)?;
    require_float(module, "dx.lerp", module.value_type(x))?;
    let mut b = Builder::before(module, call);
    let delta = b.fsub(y, x);
    let scaled = b.fmul(s, delta);
    Ok(b.fadd(x, scaled))
}

/// `a0*b0`, then one multiply-add per remaining lane.
fn expand_integer_dot(
    module: &mut Module,
    call: InstId,
    intrinsic: &'static str,
    mad: Intrinsic,
) -> Result<Value, ExpansionError> {
    let [a, b] = call_operands(module, call)?;
    let ty = module.value_type(a);
    let Type::Vector(elem, lanes) = ty else {
        return Err(unsupported(module, intrinsic, ty));
    };
    if !elem.is_int() || lanes == 0 {
        return Err(unsupported(module, intrinsic, ty));
    }

    let mut builder = Builder::before(module, call);
    let a0 = builder.extract_element(a, 0);
    let b0 = builder.extract_element(b, 0);
    let mut acc = builder.mul(a0, b0);
    for lane in 1..lanes {
        let ai = builder.extract_element(a, lane);
        let bi = builder.extract_element(b, lane);
        acc = builder.call_intrinsic(mad, Type::Scalar(elem), &[ai, bi, acc])?;
    }
    Ok(acc)
}

fn expand_sdot(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    expand_integer_dot(module, call, "dx.sdot", Intrinsic::DxIMad)
}

fn expand_udot(module: &mut Module, call: InstId) -> Result<Value, ExpansionError> {
    expand_integer_dot(module, call, "dx.udot", Intrinsic::DxUMad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxil_ir::{FunctionType, ScalarType};

    /// `ret intrinsic(args...)` inside a function taking `params`.
    fn single_call(intrinsic: Intrinsic, overload: Type, params: &[Type]) -> (Module, InstId) {
        let mut m = Module::new("t");
        let sig = intrinsic.signature(overload);
        let f = m
            .add_function("f", FunctionType::new(sig.ret, params.to_vec()))
            .unwrap();
        let entry = m.append_block(f);
        let args: Vec<Value> = (0..params.len() as u32).map(|i| Value::Arg(f, i)).collect();
        let mut b = Builder::at_end(&mut m, entry);
        let call = b.call_intrinsic(intrinsic, overload, &args).unwrap();
        b.ret(Some(call));
        let Value::Inst(call) = call else {
            panic!("call should be an instruction");
        };
        (m, call)
    }

    fn called_names(m: &Module) -> Vec<String> {
        let f = m.get_function("f").unwrap();
        let entry = m.function(f).blocks()[0];
        m.block(entry)
            .insts()
            .iter()
            .filter_map(|&i| m.called_function(i))
            .map(|c| m.function(c).name.clone())
            .collect()
    }

    #[test]
    fn table_covers_the_expandable_set() {
        let names: Vec<&str> = expandable_intrinsics().map(|i| i.base_name()).collect();
        assert_eq!(
            names,
            [
                "llvm.abs",
                "llvm.exp",
                "llvm.log",
                "llvm.log10",
                "llvm.pow",
                "llvm.dx.any",
                "llvm.dx.clamp",
                "llvm.dx.uclamp",
                "llvm.dx.lerp",
                "llvm.dx.sdot",
                "llvm.dx.udot",
            ]
        );
        assert!(!is_expandable(Intrinsic::Exp2));
        assert!(!is_expandable(Intrinsic::SMax));
    }

    #[test]
    fn clamp_variants_pick_their_min_max() {
        let cases = [
            (Intrinsic::DxUClamp, Type::I32, ["llvm.umax.i32", "llvm.umin.i32"]),
            (Intrinsic::DxClamp, Type::I32, ["llvm.smax.i32", "llvm.smin.i32"]),
            (Intrinsic::DxClamp, Type::F32, ["llvm.maxnum.f32", "llvm.minnum.f32"]),
        ];
        for (intrinsic, ty, expected) in cases {
            let (mut m, call) = single_call(intrinsic, ty, &[ty, ty, ty]);
            let value = rule(intrinsic).unwrap()(&mut m, call).unwrap();
            assert_eq!(m.value_type(value), ty);
            assert_eq!(called_names(&m)[..2], expected, "{intrinsic:?} on {ty:?}");
        }
    }

    #[test]
    fn tail_marker_moves_to_the_final_call() {
        let (mut m, call) = single_call(Intrinsic::Pow, Type::F32, &[Type::F32, Type::F32]);
        m.set_tail_call(call, true);
        let value = expand_pow(&mut m, call).unwrap();
        let Value::Inst(exp2) = value else {
            panic!("pow should expand to a call");
        };
        assert!(m.is_tail_call(exp2));
        let f = m.get_function("f").unwrap();
        let log2 = m.block(m.function(f).blocks()[0]).insts()[0];
        assert!(!m.is_tail_call(log2));
    }

    #[test]
    fn float_only_rules_reject_integers() {
        let (mut m, call) = single_call(Intrinsic::Exp, Type::I32, &[Type::I32]);
        let err = expand_exp(&mut m, call).unwrap_err();
        assert_eq!(
            err.to_string(),
            "`exp` cannot be expanded for operand type i32"
        );
    }

    #[test]
    fn integer_dot_needs_a_vector() {
        let v4 = Type::Vector(ScalarType::I32, 4);
        let (mut m, call) = single_call(Intrinsic::DxUDot, v4, &[v4, v4]);
        let acc = expand_udot(&mut m, call).unwrap();
        assert_eq!(m.value_type(acc), Type::I32);
        assert_eq!(
            called_names(&m)[..3],
            ["llvm.dx.umad.i32", "llvm.dx.umad.i32", "llvm.dx.umad.i32"]
        );

        let (mut m, call) = single_call(Intrinsic::DxSDot, Type::I32, &[Type::I32, Type::I32]);
        assert!(matches!(
            expand_sdot(&mut m, call),
            Err(ExpansionError::UnsupportedOperand { .. })
        ));
    }
}
