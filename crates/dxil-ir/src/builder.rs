use crate::intrinsic::Intrinsic;
use crate::module::{
    BinaryOp, BlockId, FloatPredicate, FuncId, InstId, InstKind, IntPredicate, IrError, Module,
    Value,
};
use crate::types::{ScalarType, StructId, Type};

/// Creates instructions at an insertion point.
///
/// Positioned either before an existing instruction (every new instruction goes in front of
/// it, so a sequence of calls lands in order) or at the end of a block.
pub struct Builder<'m> {
    module: &'m mut Module,
    block: BlockId,
    before: Option<InstId>,
}

impl<'m> Builder<'m> {
    pub fn at_end(module: &'m mut Module, block: BlockId) -> Self {
        Self {
            module,
            block,
            before: None,
        }
    }

    /// Inserts in front of `inst`.
    ///
    /// # Panics
    ///
    /// If `inst` has been erased.
    pub fn before(module: &'m mut Module, inst: InstId) -> Self {
        let block = module
            .inst(inst)
            .block()
            .unwrap_or_else(|| panic!("cannot insert before erased instruction {inst:?}"));
        Self {
            module,
            block,
            before: Some(inst),
        }
    }

    pub fn module(&mut self) -> &mut Module {
        &mut *self.module
    }

    fn push(&mut self, kind: InstKind, ty: Type) -> Value {
        Value::Inst(self.push_inst(kind, ty))
    }

    fn push_inst(&mut self, kind: InstKind, ty: Type) -> InstId {
        self.module.insert_inst(kind, ty, self.block, self.before)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs);
        self.push(InstKind::Binary { op, lhs, rhs }, ty)
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn fadd(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::FAdd, lhs, rhs)
    }

    pub fn fsub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::FSub, lhs, rhs)
    }

    pub fn fmul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::FMul, lhs, rhs)
    }

    pub fn or(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs).with_scalar(ScalarType::I1);
        self.push(InstKind::ICmp { pred, lhs, rhs }, ty)
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs).with_scalar(ScalarType::I1);
        self.push(InstKind::FCmp { pred, lhs, rhs }, ty)
    }

    pub fn extract_element(&mut self, vector: Value, index: u32) -> Value {
        let ty = self
            .module
            .value_type(vector)
            .scalar_type()
            .map_or(Type::Void, Type::Scalar);
        self.push(InstKind::ExtractElement { vector, index }, ty)
    }

    pub fn extract_value(&mut self, aggregate: Value, index: u32) -> Value {
        let ty = match self.module.value_type(aggregate) {
            Type::Struct(id) => self
                .module
                .struct_type(id)
                .fields
                .get(index as usize)
                .copied()
                .unwrap_or(Type::Void),
            _ => Type::Void,
        };
        self.push(InstKind::ExtractValue { aggregate, index }, ty)
    }

    /// Direct call of `callee`.
    pub fn call(&mut self, callee: FuncId, args: &[Value]) -> Result<Value, IrError> {
        let func = self.module.function(callee);
        if func.ty.params.len() != args.len() {
            return Err(IrError::CallArity {
                callee: func.name.clone(),
                expected: func.ty.params.len(),
                found: args.len(),
            });
        }
        let ty = func.ty.ret;
        Ok(self.push(
            InstKind::Call {
                callee: Value::Func(callee),
                args: args.to_vec(),
                tail: false,
            },
            ty,
        ))
    }

    /// Calls the `overload` instance of `intrinsic`, declaring it if needed.
    pub fn call_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        overload: Type,
        args: &[Value],
    ) -> Result<Value, IrError> {
        let callee = self.module.get_or_insert_intrinsic(intrinsic, overload)?;
        self.call(callee, args)
    }

    pub fn alloca(&mut self, allocated: Type) -> Value {
        self.push(InstKind::Alloca { allocated }, Type::Ptr)
    }

    pub fn struct_gep(&mut self, ty: StructId, ptr: Value, field: u32) -> Value {
        self.push(InstKind::StructGep { ty, ptr, field }, Type::Ptr)
    }

    pub fn load(&mut self, ty: Type, ptr: Value) -> Value {
        self.push(InstKind::Load { ptr }, ty)
    }

    pub fn store(&mut self, value: Value, ptr: Value) -> InstId {
        self.push_inst(InstKind::Store { value, ptr }, Type::Void)
    }

    pub fn ret(&mut self, value: Option<Value>) -> InstId {
        self.push_inst(InstKind::Ret { value }, Type::Void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionType;

    #[test]
    fn before_inserts_in_order_ahead_of_the_anchor() {
        let mut m = Module::new("t");
        let f = m
            .add_function("f", FunctionType::new(Type::I32, [Type::I32]))
            .unwrap();
        let entry = m.append_block(f);
        let x = Value::Arg(f, 0);
        let ret = Builder::at_end(&mut m, entry).ret(Some(x));

        let mut b = Builder::before(&mut m, ret);
        let a = b.add(x, x);
        let c = b.mul(a, x);

        let order: Vec<Value> = m
            .block(entry)
            .insts()
            .iter()
            .map(|&i| Value::Inst(i))
            .collect();
        assert_eq!(order, vec![a, c, Value::Inst(ret)]);
    }

    #[test]
    fn result_types() {
        let mut m = Module::new("t");
        let v3f = Type::Vector(ScalarType::F32, 3);
        let f = m.add_function("f", FunctionType::new(Type::Void, [v3f])).unwrap();
        let entry = m.append_block(f);
        let x = Value::Arg(f, 0);
        let zero = m.const_float(v3f, 0.0);

        let mut b = Builder::at_end(&mut m, entry);
        let cmp = b.fcmp(FloatPredicate::Une, x, zero);
        let lane = b.extract_element(cmp, 2);
        let any = b.call_intrinsic(Intrinsic::DxAny, v3f, &[x]).unwrap();
        assert!(b.call_intrinsic(Intrinsic::DxAny, v3f, &[]).is_err());

        assert_eq!(m.value_type(cmp), Type::Vector(ScalarType::I1, 3));
        assert_eq!(m.value_type(lane), Type::I1);
        assert_eq!(m.value_type(any), Type::I1);
    }
}
