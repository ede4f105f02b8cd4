use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use crate::arena::{Arena, Id};
use crate::intrinsic::Intrinsic;
use crate::types::{FunctionType, ScalarType, StructId, StructType, Type};

pub type FuncId = Id<Function>;
pub type BlockId = Id<Block>;
pub type InstId = Id<Instruction>;
pub type ConstId = Id<Constant>;
pub type GlobalId = Id<Global>;

/// An operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Inst(InstId),
    /// Parameter `n` of a function.
    Arg(FuncId, u32),
    Const(ConstId),
    /// Address of a function.
    Func(FuncId),
    /// Address of a global variable.
    Global(GlobalId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Integer stored zero-extended from the type's width.
    Int { ty: ScalarType, bits: u64 },
    Float { ty: ScalarType, value: f64 },
    Vector { elem: ScalarType, elements: Vec<ConstId> },
    /// All-zero value of any type.
    Zero(Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub linkage: Linkage,
    pub constant: bool,
    pub initializer: Option<ConstId>,
    pub dso_local: bool,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub ty: FunctionType,
    pub(crate) blocks: Vec<BlockId>,
    pub(crate) intrinsic: Option<Intrinsic>,
    pub(crate) erased: bool,
}

impl Function {
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn intrinsic(&self) -> Option<Intrinsic> {
        self.intrinsic
    }

    pub fn is_erased(&self) -> bool {
        self.erased
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) func: FuncId,
    pub(crate) insts: Vec<InstId>,
}

impl Block {
    pub fn function(&self) -> FuncId {
        self.func
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FAdd,
    FSub,
    FMul,
    And,
    Or,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    /// Ordered and equal.
    Oeq,
    /// Unordered or not equal.
    Une,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    ExtractElement {
        vector: Value,
        index: u32,
    },
    ExtractValue {
        aggregate: Value,
        index: u32,
    },
    Call {
        callee: Value,
        args: Vec<Value>,
        tail: bool,
    },
    Alloca {
        allocated: Type,
    },
    /// Address of field `field` of the struct `ty` stored at `ptr`.
    StructGep {
        ty: StructId,
        ptr: Value,
        field: u32,
    },
    Load {
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    Ret {
        value: Option<Value>,
    },
}

impl InstKind {
    pub fn operands(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.for_each_operand(|v| out.push(v));
        out
    }

    fn for_each_operand(&self, mut f: impl FnMut(Value)) {
        match self {
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            InstKind::ExtractElement { vector: v, .. }
            | InstKind::ExtractValue { aggregate: v, .. }
            | InstKind::StructGep { ptr: v, .. }
            | InstKind::Load { ptr: v } => f(*v),
            InstKind::Call { callee, args, .. } => {
                f(*callee);
                args.iter().copied().for_each(f);
            }
            InstKind::Store { value, ptr } => {
                f(*value);
                f(*ptr);
            }
            InstKind::Ret { value } => {
                if let Some(v) = value {
                    f(*v);
                }
            }
            InstKind::Alloca { .. } => {}
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::ExtractElement { vector: v, .. }
            | InstKind::ExtractValue { aggregate: v, .. }
            | InstKind::StructGep { ptr: v, .. }
            | InstKind::Load { ptr: v } => vec![v],
            InstKind::Call { callee, args, .. } => {
                let mut out = vec![callee];
                out.extend(args.iter_mut());
                out
            }
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Ret { value } => value.iter_mut().collect(),
            InstKind::Alloca { .. } => Vec::new(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, InstKind::Ret { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: InstKind,
    pub ty: Type,
    pub(crate) block: Option<BlockId>,
}

impl Instruction {
    /// Containing block, or `None` once erased.
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("symbol `{0}` is already defined")]
    DuplicateSymbol(String),
    #[error("function `{name}` is declared as {existing} but was requested as {requested}")]
    SignatureMismatch {
        name: String,
        existing: String,
        requested: String,
    },
    #[error("struct type `{0}` is already defined with different fields")]
    StructRedefinition(String),
    #[error("call to `{callee}` passes {found} arguments, expected {expected}")]
    CallArity {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("in `{function}`: {message}")]
    Verify { function: String, message: String },
}

/// A translation unit: functions, globals, constants and types, with def-use tracking.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    structs: Arena<StructType>,
    struct_names: HashMap<String, StructId>,
    literal_structs: HashMap<Vec<Type>, StructId>,
    constants: Arena<Constant>,
    globals: Arena<Global>,
    global_names: HashMap<String, GlobalId>,
    functions: Arena<Function>,
    function_names: HashMap<String, FuncId>,
    blocks: Arena<Block>,
    insts: Arena<Instruction>,
    /// One entry per operand slot that refers to the key.
    uses: HashMap<Value, Vec<InstId>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // --- types ---

    /// Returns the struct named `name`, creating it with `fields` if it does not exist.
    pub fn named_struct(&mut self, name: &str, fields: Vec<Type>) -> Result<StructId, IrError> {
        if let Some(&id) = self.struct_names.get(name) {
            if self.structs[id].fields != fields {
                return Err(IrError::StructRedefinition(name.to_owned()));
            }
            return Ok(id);
        }
        let id = self.structs.push(StructType {
            name: Some(name.to_owned()),
            fields,
        });
        self.struct_names.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Unnamed struct with exactly `fields`; equal field lists yield the same type.
    pub fn literal_struct(&mut self, fields: Vec<Type>) -> StructId {
        if let Some(&id) = self.literal_structs.get(&fields) {
            return id;
        }
        let id = self.structs.push(StructType {
            name: None,
            fields: fields.clone(),
        });
        self.literal_structs.insert(fields, id);
        id
    }

    pub fn struct_type(&self, id: StructId) -> &StructType {
        &self.structs[id]
    }

    pub fn get_struct(&self, name: &str) -> Option<StructId> {
        self.struct_names.get(name).copied()
    }

    pub fn named_structs(&self) -> impl Iterator<Item = (StructId, &StructType)> {
        self.structs.iter().filter(|(_, s)| s.name.is_some())
    }

    // --- constants ---

    pub fn add_constant(&mut self, constant: Constant) -> Value {
        Value::Const(self.push_constant(constant))
    }

    /// Like [`Module::add_constant`], for places that need the handle itself (initializers).
    pub fn push_constant(&mut self, constant: Constant) -> ConstId {
        self.constants.push(constant)
    }

    pub fn constant(&self, id: ConstId) -> &Constant {
        &self.constants[id]
    }

    /// Integer constant of type `ty`; vector types get a splat.
    pub fn const_int(&mut self, ty: Type, value: i64) -> Value {
        let elem = ty.scalar_type().unwrap_or(ScalarType::I32);
        let scalar = Constant::Int {
            ty: elem,
            bits: truncate(value as u64, elem.bits()),
        };
        self.splat(ty, scalar)
    }

    /// Float constant of type `ty`; vector types get a splat.
    pub fn const_float(&mut self, ty: Type, value: f64) -> Value {
        let elem = ty.scalar_type().unwrap_or(ScalarType::F32);
        self.splat(ty, Constant::Float { ty: elem, value })
    }

    pub fn const_int_vector(&mut self, elem: ScalarType, values: &[i64]) -> Value {
        let elements = values
            .iter()
            .map(|&v| {
                self.constants.push(Constant::Int {
                    ty: elem,
                    bits: truncate(v as u64, elem.bits()),
                })
            })
            .collect();
        self.add_constant(Constant::Vector { elem, elements })
    }

    pub fn const_float_vector(&mut self, elem: ScalarType, values: &[f64]) -> Value {
        let elements = values
            .iter()
            .map(|&value| self.constants.push(Constant::Float { ty: elem, value }))
            .collect();
        self.add_constant(Constant::Vector { elem, elements })
    }

    fn splat(&mut self, ty: Type, scalar: Constant) -> Value {
        match ty {
            Type::Vector(elem, n) => {
                let element = self.constants.push(scalar);
                self.add_constant(Constant::Vector {
                    elem,
                    elements: vec![element; n as usize],
                })
            }
            _ => self.add_constant(scalar),
        }
    }

    pub fn constant_type(&self, id: ConstId) -> Type {
        match &self.constants[id] {
            Constant::Int { ty, .. } | Constant::Float { ty, .. } => Type::Scalar(*ty),
            Constant::Vector { elem, elements } => Type::Vector(*elem, elements.len() as u32),
            Constant::Zero(ty) => *ty,
        }
    }

    // --- globals ---

    pub fn get_global(&self, name: &str) -> Option<GlobalId> {
        self.global_names.get(name).copied()
    }

    pub fn add_global(&mut self, global: Global) -> Result<GlobalId, IrError> {
        if self.global_names.contains_key(&global.name)
            || self.function_names.contains_key(&global.name)
        {
            return Err(IrError::DuplicateSymbol(global.name));
        }
        let name = global.name.clone();
        let id = self.globals.push(global);
        self.global_names.insert(name, id);
        Ok(id)
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals.iter()
    }

    // --- functions ---

    /// Adds a function declaration. Intrinsic identity is derived from the name.
    pub fn add_function(&mut self, name: &str, ty: FunctionType) -> Result<FuncId, IrError> {
        if self.function_names.contains_key(name) || self.global_names.contains_key(name) {
            return Err(IrError::DuplicateSymbol(name.to_owned()));
        }
        let id = self.functions.push(Function {
            name: name.to_owned(),
            ty,
            blocks: Vec::new(),
            intrinsic: Intrinsic::from_name(name),
            erased: false,
        });
        self.function_names.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.function_names.get(name).copied()
    }

    /// Returns the function named `name`, declaring it with `ty` if absent.
    ///
    /// An existing function with a different signature is an error.
    pub fn get_or_insert_function(
        &mut self,
        name: &str,
        ty: FunctionType,
    ) -> Result<FuncId, IrError> {
        match self.get_function(name) {
            Some(id) if self.functions[id].ty == ty => Ok(id),
            Some(id) => Err(IrError::SignatureMismatch {
                name: name.to_owned(),
                existing: self.display_function_type(&self.functions[id].ty),
                requested: self.display_function_type(&ty),
            }),
            None => self.add_function(name, ty),
        }
    }

    /// Declaration of `intrinsic` overloaded on `overload`.
    pub fn get_or_insert_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        overload: Type,
    ) -> Result<FuncId, IrError> {
        let name = intrinsic.mangled_name(overload);
        self.get_or_insert_function(&name, intrinsic.signature(overload))
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }

    /// Snapshot of the live functions, in creation order.
    pub fn functions(&self) -> Vec<FuncId> {
        self.functions
            .iter()
            .filter(|(_, f)| !f.erased)
            .map(|(id, _)| id)
            .collect()
    }

    /// Appends an empty block to `func`, turning a declaration into a definition.
    pub fn append_block(&mut self, func: FuncId) -> BlockId {
        let block = self.blocks.push(Block {
            func,
            insts: Vec::new(),
        });
        self.functions[func].blocks.push(block);
        block
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Erases `func` and its body.
    ///
    /// # Panics
    ///
    /// If anything outside the function still refers to it.
    pub fn erase_function(&mut self, func: FuncId) {
        let remaining = self.users(Value::Func(func));
        let body: Vec<InstId> = self.functions[func]
            .blocks
            .iter()
            .flat_map(|&b| self.blocks[b].insts.iter().copied())
            .collect();
        assert!(
            remaining.iter().all(|u| body.contains(u)),
            "erasing function `{}` that still has users",
            self.functions[func].name
        );

        for &inst in &body {
            self.unregister_operands(inst);
            self.insts[inst].block = None;
        }
        let blocks = std::mem::take(&mut self.functions[func].blocks);
        for block in blocks {
            self.blocks[block].insts.clear();
        }

        let f = &mut self.functions[func];
        f.erased = true;
        self.function_names.remove(&f.name);
        trace!(function = %f.name, "erased function");
    }

    // --- instructions ---

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id]
    }

    pub fn is_tail_call(&self, id: InstId) -> bool {
        matches!(self.insts[id].kind, InstKind::Call { tail: true, .. })
    }

    /// Sets the tail-call marker of a call; other instructions are left alone.
    pub fn set_tail_call(&mut self, id: InstId, tail: bool) {
        if let InstKind::Call { tail: t, .. } = &mut self.insts[id].kind {
            *t = tail;
        }
    }

    pub fn inst_function(&self, id: InstId) -> Option<FuncId> {
        self.insts[id].block.map(|b| self.blocks[b].func)
    }

    pub(crate) fn insert_inst(
        &mut self,
        kind: InstKind,
        ty: Type,
        block: BlockId,
        before: Option<InstId>,
    ) -> InstId {
        let inst = self.insts.push(Instruction {
            kind,
            ty,
            block: Some(block),
        });
        for operand in self.insts[inst].kind.operands() {
            self.uses.entry(operand).or_default().push(inst);
        }
        let insts = &mut self.blocks[block].insts;
        let at = before
            .and_then(|b| insts.iter().position(|&i| i == b))
            .unwrap_or(insts.len());
        insts.insert(at, inst);
        inst
    }

    /// Distinct instructions using `value`, in the order their uses were recorded.
    pub fn users(&self, value: Value) -> Vec<InstId> {
        let mut out: Vec<InstId> = Vec::new();
        for &user in self.uses.get(&value).into_iter().flatten() {
            if !out.contains(&user) {
                out.push(user);
            }
        }
        out
    }

    pub fn has_users(&self, value: Value) -> bool {
        self.uses.get(&value).is_some_and(|u| !u.is_empty())
    }

    /// Rewrites every operand equal to `old` to `new`.
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) {
        if old == new {
            return;
        }
        let users = self.uses.remove(&old).unwrap_or_default();
        let mut moved = Vec::with_capacity(users.len());
        for user in dedup(users) {
            for slot in self.insts[user].kind.operands_mut() {
                if *slot == old {
                    *slot = new;
                    moved.push(user);
                }
            }
        }
        self.uses.entry(new).or_default().extend(moved);
    }

    /// Removes `inst` from its block.
    ///
    /// # Panics
    ///
    /// If the instruction's result still has users.
    pub fn erase_instruction(&mut self, inst: InstId) {
        assert!(
            !self.has_users(Value::Inst(inst)),
            "erasing instruction {inst:?} that still has users"
        );
        let Some(block) = self.insts[inst].block.take() else {
            return;
        };
        self.blocks[block].insts.retain(|&i| i != inst);
        self.unregister_operands(inst);
    }

    fn unregister_operands(&mut self, inst: InstId) {
        for operand in self.insts[inst].kind.operands() {
            if let Some(list) = self.uses.get_mut(&operand) {
                if let Some(pos) = list.iter().position(|&u| u == inst) {
                    list.swap_remove(pos);
                }
                if list.is_empty() {
                    self.uses.remove(&operand);
                }
            }
        }
    }

    // --- values ---

    pub fn value_type(&self, value: Value) -> Type {
        match value {
            Value::Inst(id) => self.insts[id].ty,
            Value::Arg(func, index) => self.functions[func]
                .ty
                .params
                .get(index as usize)
                .copied()
                .unwrap_or(Type::Void),
            Value::Const(id) => self.constant_type(id),
            Value::Func(_) | Value::Global(_) => Type::Ptr,
        }
    }

    /// The function a call instruction targets, if it is a direct call.
    pub fn called_function(&self, inst: InstId) -> Option<FuncId> {
        match &self.insts[inst].kind {
            InstKind::Call {
                callee: Value::Func(f),
                ..
            } => Some(*f),
            _ => None,
        }
    }

    pub(crate) fn display_function_type(&self, ty: &FunctionType) -> String {
        let params: Vec<String> = ty.params.iter().map(|&p| self.display_type(p)).collect();
        format!("{} ({})", self.display_type(ty.ret), params.join(", "))
    }
}

fn dedup(mut users: Vec<InstId>) -> Vec<InstId> {
    users.sort();
    users.dedup();
    users
}

pub(crate) fn sign_extend(bits: u64, width: u32) -> i64 {
    if width >= 64 {
        bits as i64
    } else {
        let shift = 64 - width;
        ((bits << shift) as i64) >> shift
    }
}

pub(crate) fn truncate(bits: u64, width: u32) -> u64 {
    if width >= 64 {
        bits
    } else {
        bits & ((1u64 << width) - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    fn unary_i32(module: &mut Module, name: &str) -> FuncId {
        module
            .add_function(name, FunctionType::new(Type::I32, [Type::I32]))
            .unwrap()
    }

    #[test]
    fn use_lists_follow_rauw_and_erasure() {
        let mut m = Module::new("t");
        let callee = unary_i32(&mut m, "ext");
        let main = unary_i32(&mut m, "main");
        let entry = m.append_block(main);

        let mut b = Builder::at_end(&mut m, entry);
        let x = Value::Arg(main, 0);
        let sum = b.add(x, x);
        let call = b.call(callee, &[sum]).unwrap();
        b.ret(Some(call));

        assert_eq!(m.users(x).len(), 1);
        assert_eq!(m.users(Value::Func(callee)).len(), 1);

        let Value::Inst(call_inst) = call else {
            panic!("call should be an instruction");
        };
        m.replace_all_uses_with(call, sum);
        assert!(!m.has_users(call));
        m.erase_instruction(call_inst);
        assert!(!m.has_users(Value::Func(callee)));
        assert_eq!(m.users(sum).len(), 1);

        m.erase_function(callee);
        assert_eq!(m.functions(), vec![main]);
        assert_eq!(m.get_function("ext"), None);
    }

    #[test]
    #[should_panic(expected = "still has users")]
    fn erasing_used_function_panics() {
        let mut m = Module::new("t");
        let callee = unary_i32(&mut m, "ext");
        let main = unary_i32(&mut m, "main");
        let entry = m.append_block(main);
        let mut b = Builder::at_end(&mut m, entry);
        let r = b.call(callee, &[Value::Arg(main, 0)]).unwrap();
        b.ret(Some(r));
        m.erase_function(callee);
    }

    #[test]
    fn get_or_insert_checks_signature() {
        let mut m = Module::new("t");
        let a = m
            .get_or_insert_function("f", FunctionType::new(Type::Void, []))
            .unwrap();
        let b = m
            .get_or_insert_function("f", FunctionType::new(Type::Void, []))
            .unwrap();
        assert_eq!(a, b);
        let err = m
            .get_or_insert_function("f", FunctionType::new(Type::I32, []))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "function `f` is declared as void () but was requested as i32 ()"
        );
    }

    #[test]
    fn intrinsic_identity_comes_from_the_name() {
        let mut m = Module::new("t");
        let smax = m
            .get_or_insert_intrinsic(Intrinsic::SMax, Type::Vector(ScalarType::I32, 3))
            .unwrap();
        assert_eq!(m.function(smax).name, "llvm.smax.v3i32");
        assert_eq!(m.function(smax).intrinsic(), Some(Intrinsic::SMax));
        let plain = unary_i32(&mut m, "helper");
        assert_eq!(m.function(plain).intrinsic(), None);
    }

    #[test]
    fn struct_types() {
        let mut m = Module::new("t");
        let a = m.named_struct("struct.A", vec![Type::F32, Type::F32]).unwrap();
        assert_eq!(
            m.named_struct("struct.A", vec![Type::F32, Type::F32]),
            Ok(a)
        );
        assert!(m.named_struct("struct.A", vec![Type::F32]).is_err());
        let lit = m.literal_struct(vec![Type::F32]);
        assert_eq!(m.literal_struct(vec![Type::F32]), lit);
        assert_ne!(lit, a);
        assert_eq!(m.get_struct("struct.A"), Some(a));
    }

    #[test]
    fn constants_truncate_and_splat() {
        let mut m = Module::new("t");
        let Value::Const(c) = m.const_int(Type::I32, -1) else {
            panic!("expected a constant");
        };
        assert_eq!(
            m.constant(c),
            &Constant::Int {
                ty: ScalarType::I32,
                bits: 0xffff_ffff
            }
        );
        let v = m.const_float(Type::Vector(ScalarType::F32, 4), 0.5);
        assert_eq!(m.value_type(v), Type::Vector(ScalarType::F32, 4));
    }
}
