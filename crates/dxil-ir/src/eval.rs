//! Reference interpreter.
//!
//! Executes straight-line function bodies, including calls to known intrinsics, so that a
//! rewritten module can be checked against the original for the same inputs.

use std::collections::HashMap;

use thiserror::Error;

use crate::intrinsic::Intrinsic;
use crate::module::{
    sign_extend, truncate, BinaryOp, BlockId, ConstId, Constant, FloatPredicate, FuncId, GlobalId, InstId,
    InstKind, IntPredicate, Module, Value,
};
use crate::types::{ScalarType, Type};

const MAX_CALL_DEPTH: usize = 64;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Int { ty: ScalarType, bits: u64 },
    Float { ty: ScalarType, value: f64 },
    Vector(Vec<Val>),
    Struct(Vec<Val>),
    Ptr(Pointer),
    Func(FuncId),
    /// Contents of memory that was never written, and null pointers.
    Undef,
}

/// Address of a memory slot, narrowed to a (possibly nested) struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    slot: usize,
    path: Vec<u32>,
}

impl Val {
    pub fn int(ty: ScalarType, value: i64) -> Self {
        Val::Int {
            ty,
            bits: truncate(value as u64, ty.bits()),
        }
    }

    pub fn i32(value: i32) -> Self {
        Val::int(ScalarType::I32, value.into())
    }

    pub fn bool(value: bool) -> Self {
        Val::int(ScalarType::I1, value.into())
    }

    pub fn float(ty: ScalarType, value: f64) -> Self {
        Val::Float {
            ty,
            value: round_float(ty, value),
        }
    }

    pub fn f32(value: f32) -> Self {
        Val::float(ScalarType::F32, value.into())
    }

    /// Signed interpretation of an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Val::Int { ty, bits } => Some(sign_extend(*bits, ty.bits())),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Val::Int { bits, .. } => Some(*bits),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Float { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Int {
                ty: ScalarType::I1,
                bits,
            } => Some(*bits != 0),
            _ => None,
        }
    }

    pub fn lanes(&self) -> Option<&[Val]> {
        match self {
            Val::Vector(lanes) => Some(lanes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("function `{0}` has no body and is not a known intrinsic")]
    UnresolvedCall(String),
    #[error("`{function}` takes {expected} arguments, got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("operand type mismatch in {0}")]
    TypeMismatch(&'static str),
    #[error("`{0}` finished without returning")]
    MissingReturn(String),
    #[error("instruction {0:?} used before it was evaluated")]
    Undefined(InstId),
    #[error("invalid memory access")]
    BadPointer,
    #[error("call depth exceeds {MAX_CALL_DEPTH}")]
    CallDepth,
}

fn round_float(ty: ScalarType, value: f64) -> f64 {
    match ty {
        ScalarType::F16 => half::f16::from_f64(value).to_f64(),
        ScalarType::F32 => value as f32 as f64,
        _ => value,
    }
}

fn lanewise1(a: &Val, f: impl Fn(&Val) -> Result<Val, EvalError>) -> Result<Val, EvalError> {
    match a {
        Val::Vector(lanes) => lanes
            .iter()
            .map(|l| f(l))
            .collect::<Result<_, _>>()
            .map(Val::Vector),
        scalar => f(scalar),
    }
}

fn lanewise2(
    a: &Val,
    b: &Val,
    f: impl Fn(&Val, &Val) -> Result<Val, EvalError>,
) -> Result<Val, EvalError> {
    match (a, b) {
        (Val::Vector(x), Val::Vector(y)) if x.len() == y.len() => x
            .iter()
            .zip(y)
            .map(|(x, y)| f(x, y))
            .collect::<Result<_, _>>()
            .map(Val::Vector),
        (Val::Vector(_), _) | (_, Val::Vector(_)) => Err(EvalError::TypeMismatch("vector shape")),
        (x, y) => f(x, y),
    }
}

fn lanewise3(
    a: &Val,
    b: &Val,
    c: &Val,
    f: impl Fn(&Val, &Val, &Val) -> Result<Val, EvalError>,
) -> Result<Val, EvalError> {
    match (a, b, c) {
        (Val::Vector(x), Val::Vector(y), Val::Vector(z))
            if x.len() == y.len() && y.len() == z.len() =>
        {
            x.iter()
                .zip(y)
                .zip(z)
                .map(|((x, y), z)| f(x, y, z))
                .collect::<Result<_, _>>()
                .map(Val::Vector)
        }
        (Val::Vector(_), _, _) | (_, Val::Vector(_), _) | (_, _, Val::Vector(_)) => {
            Err(EvalError::TypeMismatch("vector shape"))
        }
        (x, y, z) => f(x, y, z),
    }
}

fn int_op(
    what: &'static str,
    a: &Val,
    b: &Val,
    op: impl Fn(u64, u64, u32) -> u64,
) -> Result<Val, EvalError> {
    match (a, b) {
        (Val::Int { ty, bits: x }, Val::Int { ty: ty2, bits: y }) if ty == ty2 => Ok(Val::Int {
            ty: *ty,
            bits: truncate(op(*x, *y, ty.bits()), ty.bits()),
        }),
        _ => Err(EvalError::TypeMismatch(what)),
    }
}

fn float_op(
    what: &'static str,
    a: &Val,
    b: &Val,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Val, EvalError> {
    match (a, b) {
        (Val::Float { ty, value: x }, Val::Float { ty: ty2, value: y }) if ty == ty2 => {
            Ok(Val::float(*ty, op(*x, *y)))
        }
        _ => Err(EvalError::TypeMismatch(what)),
    }
}

fn float_unary(what: &'static str, a: &Val, op: impl Fn(f64) -> f64) -> Result<Val, EvalError> {
    match a {
        Val::Float { ty, value } => Ok(Val::float(*ty, op(*value))),
        _ => Err(EvalError::TypeMismatch(what)),
    }
}

fn signed(width: u32, bits: u64) -> i64 {
    sign_extend(bits, width)
}

fn eval_binary(op: BinaryOp, a: &Val, b: &Val) -> Result<Val, EvalError> {
    lanewise2(a, b, |a, b| match op {
        BinaryOp::Add => int_op("add", a, b, |x, y, _| x.wrapping_add(y)),
        BinaryOp::Sub => int_op("sub", a, b, |x, y, _| x.wrapping_sub(y)),
        BinaryOp::Mul => int_op("mul", a, b, |x, y, _| x.wrapping_mul(y)),
        BinaryOp::And => int_op("and", a, b, |x, y, _| x & y),
        BinaryOp::Or => int_op("or", a, b, |x, y, _| x | y),
        BinaryOp::FAdd => float_op("fadd", a, b, |x, y| x + y),
        BinaryOp::FSub => float_op("fsub", a, b, |x, y| x - y),
        BinaryOp::FMul => float_op("fmul", a, b, |x, y| x * y),
    })
}

fn eval_intrinsic(intrinsic: Intrinsic, args: &[Val]) -> Result<Val, EvalError> {
    let arg = |i: usize| args.get(i).ok_or(EvalError::TypeMismatch("intrinsic arity"));
    match intrinsic {
        Intrinsic::Abs => lanewise1(arg(0)?, |x| match x {
            Val::Int { ty, bits } => Ok(Val::int(*ty, signed(ty.bits(), *bits).wrapping_abs())),
            other => float_unary("abs", other, f64::abs),
        }),
        Intrinsic::Exp => lanewise1(arg(0)?, |x| float_unary("exp", x, f64::exp)),
        Intrinsic::Exp2 => lanewise1(arg(0)?, |x| float_unary("exp2", x, f64::exp2)),
        Intrinsic::Log => lanewise1(arg(0)?, |x| float_unary("log", x, f64::ln)),
        Intrinsic::Log2 => lanewise1(arg(0)?, |x| float_unary("log2", x, f64::log2)),
        Intrinsic::Log10 => lanewise1(arg(0)?, |x| float_unary("log10", x, f64::log10)),
        Intrinsic::Pow => lanewise2(arg(0)?, arg(1)?, |x, y| float_op("pow", x, y, f64::powf)),
        Intrinsic::SMax => lanewise2(arg(0)?, arg(1)?, |x, y| {
            int_op("smax", x, y, |a, b, w| {
                if signed(w, a) >= signed(w, b) {
                    a
                } else {
                    b
                }
            })
        }),
        Intrinsic::SMin => lanewise2(arg(0)?, arg(1)?, |x, y| {
            int_op("smin", x, y, |a, b, w| {
                if signed(w, a) <= signed(w, b) {
                    a
                } else {
                    b
                }
            })
        }),
        Intrinsic::UMax => lanewise2(arg(0)?, arg(1)?, |x, y| int_op("umax", x, y, |a, b, _| a.max(b))),
        Intrinsic::UMin => lanewise2(arg(0)?, arg(1)?, |x, y| int_op("umin", x, y, |a, b, _| a.min(b))),
        Intrinsic::MaxNum => lanewise2(arg(0)?, arg(1)?, |x, y| float_op("maxnum", x, y, f64::max)),
        Intrinsic::MinNum => lanewise2(arg(0)?, arg(1)?, |x, y| float_op("minnum", x, y, f64::min)),
        Intrinsic::DxAny => {
            let lanes = match arg(0)? {
                Val::Vector(lanes) => lanes.as_slice(),
                scalar => std::slice::from_ref(scalar),
            };
            let mut any = false;
            for lane in lanes {
                any |= match lane {
                    Val::Int { bits, .. } => *bits != 0,
                    Val::Float { value, .. } => *value != 0.0,
                    _ => return Err(EvalError::TypeMismatch("dx.any")),
                };
            }
            Ok(Val::bool(any))
        }
        Intrinsic::DxClamp => {
            let (x, lo, hi) = (arg(0)?, arg(1)?, arg(2)?);
            let (max, min) = match x.lanes().and_then(|l| l.first()).unwrap_or(x) {
                Val::Float { .. } => (Intrinsic::MaxNum, Intrinsic::MinNum),
                _ => (Intrinsic::SMax, Intrinsic::SMin),
            };
            let raised = eval_intrinsic(max, &[x.clone(), lo.clone()])?;
            eval_intrinsic(min, &[raised, hi.clone()])
        }
        Intrinsic::DxUClamp => {
            let raised = eval_intrinsic(Intrinsic::UMax, &[arg(0)?.clone(), arg(1)?.clone()])?;
            eval_intrinsic(Intrinsic::UMin, &[raised, arg(2)?.clone()])
        }
        Intrinsic::DxLerp => lanewise3(arg(0)?, arg(1)?, arg(2)?, |x, y, s| {
            let delta = float_op("lerp", y, x, |y, x| y - x)?;
            let scaled = float_op("lerp", s, &delta, |s, d| s * d)?;
            float_op("lerp", x, &scaled, |x, v| x + v)
        }),
        Intrinsic::DxSDot | Intrinsic::DxUDot => {
            let (Val::Vector(a), Val::Vector(b)) = (arg(0)?, arg(1)?) else {
                return Err(EvalError::TypeMismatch("integer dot"));
            };
            if a.is_empty() || a.len() != b.len() {
                return Err(EvalError::TypeMismatch("integer dot"));
            }
            let mut acc = int_op("integer dot", &a[0], &b[0], |x, y, _| x.wrapping_mul(y))?;
            for (x, y) in a.iter().zip(b).skip(1) {
                let product = int_op("integer dot", x, y, |x, y, _| x.wrapping_mul(y))?;
                acc = int_op("integer dot", &acc, &product, |x, y, _| x.wrapping_add(y))?;
            }
            Ok(acc)
        }
        Intrinsic::DxIMad | Intrinsic::DxUMad => lanewise3(arg(0)?, arg(1)?, arg(2)?, |a, b, c| {
            let product = int_op("mad", a, b, |x, y, _| x.wrapping_mul(y))?;
            int_op("mad", &product, c, |x, y, _| x.wrapping_add(y))
        }),
    }
}

/// Interpreter state: memory for allocas and globals.
pub struct Interpreter<'m> {
    module: &'m Module,
    memory: Vec<Val>,
    globals: HashMap<GlobalId, usize>,
    depth: usize,
}

struct Frame<'a> {
    func: FuncId,
    args: &'a [Val],
    values: HashMap<InstId, Val>,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            memory: Vec::new(),
            globals: HashMap::new(),
            depth: 0,
        }
    }

    /// Calls `func` with `args`; `None` for void functions.
    pub fn call(&mut self, func: FuncId, args: &[Val]) -> Result<Option<Val>, EvalError> {
        let f = self.module.function(func);
        if f.ty.params.len() != args.len() {
            return Err(EvalError::ArgumentCount {
                function: f.name.clone(),
                expected: f.ty.params.len(),
                found: args.len(),
            });
        }
        if let Some(intrinsic) = f.intrinsic() {
            return eval_intrinsic(intrinsic, args).map(Some);
        }
        let Some(&entry) = f.blocks().first() else {
            return Err(EvalError::UnresolvedCall(f.name.clone()));
        };
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth);
        }

        self.depth += 1;
        let mut frame = Frame {
            func,
            args,
            values: HashMap::new(),
        };
        let result = self.run_block(&mut frame, entry);
        self.depth -= 1;
        result
    }

    /// Current contents of a global variable.
    pub fn read_global(&mut self, global: GlobalId) -> Val {
        let slot = self.global_slot(global);
        self.memory[slot].clone()
    }

    fn run_block(
        &mut self,
        frame: &mut Frame<'_>,
        block: BlockId,
    ) -> Result<Option<Val>, EvalError> {
        let m = self.module;
        for &inst in m.block(block).insts() {
            let i = m.inst(inst);
            let result = match &i.kind {
                InstKind::Binary { op, lhs, rhs } => {
                    let (a, b) = (self.operand(frame, *lhs)?, self.operand(frame, *rhs)?);
                    eval_binary(*op, &a, &b)?
                }
                InstKind::ICmp { pred, lhs, rhs } => {
                    let (a, b) = (self.operand(frame, *lhs)?, self.operand(frame, *rhs)?);
                    let pred = *pred;
                    lanewise2(&a, &b, |x, y| match (x.as_u64(), y.as_u64()) {
                        (Some(x), Some(y)) => Ok(Val::bool(match pred {
                            IntPredicate::Eq => x == y,
                            IntPredicate::Ne => x != y,
                        })),
                        _ => Err(EvalError::TypeMismatch("icmp")),
                    })?
                }
                InstKind::FCmp { pred, lhs, rhs } => {
                    let (a, b) = (self.operand(frame, *lhs)?, self.operand(frame, *rhs)?);
                    let pred = *pred;
                    lanewise2(&a, &b, |x, y| match (x.as_f64(), y.as_f64()) {
                        (Some(x), Some(y)) => Ok(Val::bool(match pred {
                            FloatPredicate::Oeq => x == y,
                            FloatPredicate::Une => x != y || x.is_nan() || y.is_nan(),
                        })),
                        _ => Err(EvalError::TypeMismatch("fcmp")),
                    })?
                }
                InstKind::ExtractElement { vector, index } => match self.operand(frame, *vector)? {
                    Val::Vector(lanes) => lanes
                        .get(*index as usize)
                        .cloned()
                        .ok_or(EvalError::TypeMismatch("extractelement"))?,
                    _ => return Err(EvalError::TypeMismatch("extractelement")),
                },
                InstKind::ExtractValue { aggregate, index } => {
                    match self.operand(frame, *aggregate)? {
                        Val::Struct(fields) => fields
                            .get(*index as usize)
                            .cloned()
                            .ok_or(EvalError::TypeMismatch("extractvalue"))?,
                        _ => return Err(EvalError::TypeMismatch("extractvalue")),
                    }
                }
                InstKind::Call { callee, args, .. } => {
                    let Val::Func(callee) = self.operand(frame, *callee)? else {
                        return Err(EvalError::TypeMismatch("call target"));
                    };
                    let args = args
                        .iter()
                        .map(|&a| self.operand(frame, a))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.call(callee, &args)?.unwrap_or(Val::Undef)
                }
                InstKind::Alloca { allocated } => {
                    let contents = self.zero(*allocated);
                    self.memory.push(contents);
                    Val::Ptr(Pointer {
                        slot: self.memory.len() - 1,
                        path: Vec::new(),
                    })
                }
                InstKind::StructGep { ptr, field, .. } => match self.operand(frame, *ptr)? {
                    Val::Ptr(mut p) => {
                        p.path.push(*field);
                        Val::Ptr(p)
                    }
                    _ => return Err(EvalError::BadPointer),
                },
                InstKind::Load { ptr } => {
                    let Val::Ptr(p) = self.operand(frame, *ptr)? else {
                        return Err(EvalError::BadPointer);
                    };
                    self.place(&p)?.clone()
                }
                InstKind::Store { value, ptr } => {
                    let value = self.operand(frame, *value)?;
                    let Val::Ptr(p) = self.operand(frame, *ptr)? else {
                        return Err(EvalError::BadPointer);
                    };
                    *self.place(&p)? = value;
                    continue;
                }
                InstKind::Ret { value } => {
                    return value.map(|v| self.operand(frame, v)).transpose();
                }
            };
            frame.values.insert(inst, result);
        }
        Err(EvalError::MissingReturn(
            self.module.function(frame.func).name.clone(),
        ))
    }

    fn operand(&mut self, frame: &Frame<'_>, value: Value) -> Result<Val, EvalError> {
        match value {
            Value::Inst(id) => frame
                .values
                .get(&id)
                .cloned()
                .ok_or(EvalError::Undefined(id)),
            Value::Arg(_, n) => frame
                .args
                .get(n as usize)
                .cloned()
                .ok_or(EvalError::TypeMismatch("argument")),
            Value::Const(id) => Ok(self.constant(id)),
            Value::Func(f) => Ok(Val::Func(f)),
            Value::Global(g) => Ok(Val::Ptr(Pointer {
                slot: self.global_slot(g),
                path: Vec::new(),
            })),
        }
    }

    fn constant(&self, id: ConstId) -> Val {
        match self.module.constant(id) {
            Constant::Int { ty, bits } => Val::Int {
                ty: *ty,
                bits: *bits,
            },
            Constant::Float { ty, value } => Val::float(*ty, *value),
            Constant::Vector { elements, .. } => {
                Val::Vector(elements.iter().map(|&e| self.constant(e)).collect())
            }
            Constant::Zero(ty) => self.zero(*ty),
        }
    }

    fn zero(&self, ty: Type) -> Val {
        match ty {
            Type::Scalar(s) if s.is_float() => Val::float(s, 0.0),
            Type::Scalar(s) => Val::int(s, 0),
            Type::Vector(s, n) => Val::Vector(vec![self.zero(Type::Scalar(s)); n as usize]),
            Type::Struct(id) => Val::Struct(
                self.module
                    .struct_type(id)
                    .fields
                    .iter()
                    .map(|&f| self.zero(f))
                    .collect(),
            ),
            Type::Void | Type::Ptr => Val::Undef,
        }
    }

    fn global_slot(&mut self, global: GlobalId) -> usize {
        if let Some(&slot) = self.globals.get(&global) {
            return slot;
        }
        let g = self.module.global(global);
        let init = match g.initializer {
            Some(c) => self.constant(c),
            None => self.zero(g.ty),
        };
        self.memory.push(init);
        let slot = self.memory.len() - 1;
        self.globals.insert(global, slot);
        slot
    }

    fn place(&mut self, pointer: &Pointer) -> Result<&mut Val, EvalError> {
        let mut place = self.memory.get_mut(pointer.slot).ok_or(EvalError::BadPointer)?;
        for &field in &pointer.path {
            place = match place {
                Val::Struct(fields) => fields.get_mut(field as usize).ok_or(EvalError::BadPointer)?,
                _ => return Err(EvalError::BadPointer),
            };
        }
        Ok(place)
    }
}

/// Runs the function named `name` in a fresh interpreter.
pub fn run_function(module: &Module, name: &str, args: &[Val]) -> Result<Option<Val>, EvalError> {
    let func = module
        .get_function(name)
        .ok_or_else(|| EvalError::UnresolvedCall(name.to_owned()))?;
    Interpreter::new(module).call(func, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionType;
    use crate::Builder;

    #[test]
    fn abstract_intrinsics() {
        let v = |xs: &[i32]| Val::Vector(xs.iter().map(|&x| Val::i32(x)).collect());
        assert_eq!(eval_intrinsic(Intrinsic::Abs, &[Val::i32(-5)]), Ok(Val::i32(5)));
        assert_eq!(
            eval_intrinsic(Intrinsic::DxClamp, &[Val::i32(10), Val::i32(0), Val::i32(5)]),
            Ok(Val::i32(5))
        );
        assert_eq!(
            eval_intrinsic(Intrinsic::DxUClamp, &[Val::i32(-1), Val::i32(0), Val::i32(5)]),
            Ok(Val::i32(5))
        );
        assert_eq!(
            eval_intrinsic(Intrinsic::DxSDot, &[v(&[1, 2, 3]), v(&[4, -5, 6])]),
            Ok(Val::i32(12))
        );
        assert_eq!(
            eval_intrinsic(Intrinsic::DxAny, &[v(&[0, 0, 1])]),
            Ok(Val::bool(true))
        );
        assert_eq!(
            eval_intrinsic(Intrinsic::DxAny, &[Val::f32(0.0)]),
            Ok(Val::bool(false))
        );
        assert_eq!(
            eval_intrinsic(
                Intrinsic::DxLerp,
                &[Val::f32(2.0), Val::f32(4.0), Val::f32(0.25)]
            ),
            Ok(Val::f32(2.5))
        );
    }

    #[test]
    fn memory_through_struct_fields() {
        let mut m = Module::new("t");
        let pair = m.named_struct("struct.Pair", vec![Type::F32, Type::F32]).unwrap();
        let f = m
            .add_function("swap_sum", FunctionType::new(Type::F32, [Type::F32]))
            .unwrap();
        let entry = m.append_block(f);
        let mut b = Builder::at_end(&mut m, entry);
        let slot = b.alloca(Type::Struct(pair));
        let second = b.struct_gep(pair, slot, 1);
        b.store(Value::Arg(f, 0), second);
        let loaded = b.load(Type::F32, second);
        let first = b.struct_gep(pair, slot, 0);
        let zero = b.load(Type::F32, first);
        let sum = b.fadd(loaded, zero);
        b.ret(Some(sum));
        m.verify().unwrap();

        assert_eq!(
            run_function(&m, "swap_sum", &[Val::f32(1.5)]),
            Ok(Some(Val::f32(1.5)))
        );
    }

    #[test]
    fn unresolved_declarations_are_reported() {
        let mut m = Module::new("t");
        m.add_function("ext", FunctionType::new(Type::Void, []))
            .unwrap();
        assert_eq!(
            run_function(&m, "ext", &[]),
            Err(EvalError::UnresolvedCall("ext".to_owned()))
        );
    }
}
