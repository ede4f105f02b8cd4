use crate::module::{FuncId, InstId, InstKind, IrError, Module, Value};
use crate::types::Type;

impl Module {
    /// Checks structural well-formedness of every live function.
    ///
    /// Verified: block termination, operand liveness and scope, use-list consistency, call
    /// signatures, and the operand types of arithmetic, memory and return instructions.
    pub fn verify(&self) -> Result<(), IrError> {
        for func in self.functions() {
            Verifier { module: self, func }.run()?;
        }
        Ok(())
    }
}

struct Verifier<'a> {
    module: &'a Module,
    func: FuncId,
}

impl Verifier<'_> {
    fn fail(&self, message: impl Into<String>) -> IrError {
        IrError::Verify {
            function: self.module.function(self.func).name.clone(),
            message: message.into(),
        }
    }

    fn run(&self) -> Result<(), IrError> {
        let m = self.module;
        for (n, &block) in m.function(self.func).blocks().iter().enumerate() {
            let insts = m.block(block).insts();
            let Some((&last, body)) = insts.split_last() else {
                return Err(self.fail(format!("block bb{n} is empty")));
            };
            if !m.inst(last).kind.is_terminator() {
                return Err(self.fail(format!("block bb{n} does not end in a terminator")));
            }
            for &inst in body {
                if m.inst(inst).kind.is_terminator() {
                    return Err(self.fail(format!("terminator in the middle of bb{n}")));
                }
            }
            for &inst in insts {
                if m.inst(inst).block() != Some(block) {
                    return Err(self.fail(format!("instruction {inst:?} has a stale parent")));
                }
                self.check_inst(inst)?;
            }
        }
        Ok(())
    }

    fn check_operand(&self, inst: InstId, value: Value) -> Result<(), IrError> {
        let m = self.module;
        match value {
            Value::Inst(def) => {
                if m.inst_function(def) != Some(self.func) {
                    return Err(self.fail(format!("{inst:?} uses {def:?} from outside the function")));
                }
            }
            Value::Arg(f, n) => {
                if f != self.func || n as usize >= m.function(f).ty.params.len() {
                    return Err(self.fail(format!("{inst:?} uses invalid argument %{n}")));
                }
            }
            Value::Func(f) => {
                if m.function(f).is_erased() {
                    return Err(self.fail(format!("{inst:?} refers to an erased function")));
                }
            }
            Value::Const(_) | Value::Global(_) => {}
        }
        if !m.users(value).contains(&inst) {
            return Err(self.fail(format!("{inst:?} is missing from its operand's use list")));
        }
        Ok(())
    }

    fn check_inst(&self, inst: InstId) -> Result<(), IrError> {
        let m = self.module;
        let i = m.inst(inst);
        for operand in i.kind.operands() {
            self.check_operand(inst, operand)?;
        }
        let ty = |v: Value| m.value_type(v);

        match &i.kind {
            InstKind::Binary { op, lhs, rhs } => {
                if ty(*lhs) != ty(*rhs) || ty(*lhs) != i.ty {
                    return Err(self.fail(format!("{} operands disagree on type", op.name())));
                }
                let ok = if op.is_float() {
                    i.ty.is_float_or_float_vector()
                } else {
                    i.ty.is_int_or_int_vector()
                };
                if !ok {
                    return Err(self.fail(format!(
                        "{} on {}",
                        op.name(),
                        m.display_type(i.ty)
                    )));
                }
            }
            InstKind::ICmp { lhs, rhs, .. } | InstKind::FCmp { lhs, rhs, .. } => {
                if ty(*lhs) != ty(*rhs) {
                    return Err(self.fail("comparison operands disagree on type"));
                }
            }
            InstKind::ExtractElement { vector, index } => match ty(*vector) {
                Type::Vector(_, n) if *index < n => {}
                other => {
                    return Err(self.fail(format!(
                        "extractelement {index} from {}",
                        m.display_type(other)
                    )))
                }
            },
            InstKind::ExtractValue { aggregate, index } => match ty(*aggregate) {
                Type::Struct(s) if (*index as usize) < m.struct_type(s).fields.len() => {}
                other => {
                    return Err(self.fail(format!(
                        "extractvalue {index} from {}",
                        m.display_type(other)
                    )))
                }
            },
            InstKind::Call { callee, args, .. } => {
                let Value::Func(callee) = callee else {
                    return Err(self.fail("indirect calls are not supported"));
                };
                let sig = &m.function(*callee).ty;
                let arg_types: Vec<Type> = args.iter().map(|&a| ty(a)).collect();
                if arg_types != sig.params || sig.ret != i.ty {
                    return Err(self.fail(format!(
                        "call to `{}` does not match its signature",
                        m.function(*callee).name
                    )));
                }
            }
            InstKind::StructGep { ty: st, ptr, field } => {
                if ty(*ptr) != Type::Ptr
                    || *field as usize >= m.struct_type(*st).fields.len()
                {
                    return Err(self.fail(format!("invalid getelementptr field {field}")));
                }
            }
            InstKind::Load { ptr } | InstKind::Store { ptr, .. } => {
                if ty(*ptr) != Type::Ptr {
                    return Err(self.fail("memory access through a non-pointer"));
                }
            }
            InstKind::Ret { value } => {
                let ret = m.function(self.func).ty.ret;
                let found = value.map_or(Type::Void, ty);
                if found != ret {
                    return Err(self.fail(format!(
                        "returns {} from a function returning {}",
                        m.display_type(found),
                        m.display_type(ret)
                    )));
                }
            }
            InstKind::Alloca { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionType;
    use crate::Builder;

    #[test]
    fn unterminated_block_is_rejected() {
        let mut m = Module::new("t");
        let f = m.add_function("f", FunctionType::new(Type::Void, [])).unwrap();
        m.append_block(f);
        let err = m.verify().unwrap_err();
        assert_eq!(err.to_string(), "in `f`: block bb0 is empty");
    }

    #[test]
    fn return_type_is_checked() {
        let mut m = Module::new("t");
        let f = m
            .add_function("f", FunctionType::new(Type::I32, [Type::F32]))
            .unwrap();
        let entry = m.append_block(f);
        Builder::at_end(&mut m, entry).ret(Some(Value::Arg(f, 0)));
        let err = m.verify().unwrap_err();
        assert_eq!(
            err.to_string(),
            "in `f`: returns float from a function returning i32"
        );
    }

    #[test]
    fn well_formed_function_passes() {
        let mut m = Module::new("t");
        let f = m
            .add_function("f", FunctionType::new(Type::F32, [Type::F32, Type::F32]))
            .unwrap();
        let entry = m.append_block(f);
        let mut b = Builder::at_end(&mut m, entry);
        let s = b.fadd(Value::Arg(f, 0), Value::Arg(f, 1));
        b.ret(Some(s));
        m.verify().unwrap();
    }
}
