//! LLVM-flavoured textual form of a [`Module`].

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::module::{
    sign_extend, ConstId, Constant, FloatPredicate, FuncId, InstId, InstKind, IntPredicate,
    Linkage, Module, Value,
};
use crate::types::{ScalarType, Type};

impl Module {
    pub fn display_type(&self, ty: Type) -> String {
        match ty {
            Type::Void => "void".to_owned(),
            Type::Scalar(s) => s.name().to_owned(),
            Type::Vector(s, n) => format!("<{n} x {}>", s.name()),
            Type::Ptr => "ptr".to_owned(),
            Type::Struct(id) => {
                let st = self.struct_type(id);
                match &st.name {
                    Some(name) => format!("%{name}"),
                    None if st.fields.is_empty() => "{}".to_owned(),
                    None => {
                        let fields: Vec<String> =
                            st.fields.iter().map(|&f| self.display_type(f)).collect();
                        format!("{{ {} }}", fields.join(", "))
                    }
                }
            }
        }
    }

    pub fn display_constant(&self, id: ConstId) -> String {
        match self.constant(id) {
            Constant::Int {
                ty: ScalarType::I1,
                bits,
            } => String::from(if *bits != 0 { "true" } else { "false" }),
            Constant::Int { ty, bits } => sign_extend(*bits, ty.bits()).to_string(),
            Constant::Float { ty, value } => format_float(*ty, *value),
            Constant::Vector { elem, elements } => {
                let first = elements.first().map(|&e| self.constant(e));
                if elements.len() > 1 && elements.iter().all(|&e| Some(self.constant(e)) == first)
                {
                    format!("splat ({} {})", elem.name(), self.display_constant(elements[0]))
                } else {
                    let parts: Vec<String> = elements
                        .iter()
                        .map(|&e| format!("{} {}", elem.name(), self.display_constant(e)))
                        .collect();
                    format!("<{}>", parts.join(", "))
                }
            }
            Constant::Zero(_) => "zeroinitializer".to_owned(),
        }
    }
}

/// Rounds `value` to `ty` and prints it with the shortest round-tripping spelling.
fn format_float(ty: ScalarType, value: f64) -> String {
    match ty {
        ScalarType::F16 => format!("{:?}", half::f16::from_f64(value).to_f32()),
        ScalarType::F64 => format!("{value:?}"),
        _ => format!("{:?}", value as f32),
    }
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    numbers: HashMap<InstId, u32>,
}

impl<'a> FunctionPrinter<'a> {
    fn new(module: &'a Module, func: FuncId) -> Self {
        let f = module.function(func);
        let mut next = f.ty.params.len() as u32;
        let mut numbers = HashMap::new();
        for &block in f.blocks() {
            for &inst in module.block(block).insts() {
                if module.inst(inst).ty != Type::Void {
                    numbers.insert(inst, next);
                    next += 1;
                }
            }
        }
        Self { module, numbers }
    }

    fn operand(&self, value: Value) -> String {
        match value {
            Value::Inst(id) => match self.numbers.get(&id) {
                Some(n) => format!("%{n}"),
                None => format!("%<inst{}>", id.index()),
            },
            Value::Arg(_, n) => format!("%{n}"),
            Value::Const(id) => self.module.display_constant(id),
            Value::Func(f) => format!("@{}", self.module.function(f).name),
            Value::Global(g) => format!("@{}", self.module.global(g).name),
        }
    }

    fn typed(&self, value: Value) -> String {
        format!(
            "{} {}",
            self.module.display_type(self.module.value_type(value)),
            self.operand(value)
        )
    }

    fn write_inst(&self, out: &mut String, inst: InstId) -> fmt::Result {
        let m = self.module;
        let i = m.inst(inst);
        out.write_str("  ")?;
        if let Some(n) = self.numbers.get(&inst) {
            write!(out, "%{n} = ")?;
        }
        match &i.kind {
            InstKind::Binary { op, lhs, rhs } => {
                write!(out, "{} {}, {}", op.name(), self.typed(*lhs), self.operand(*rhs))
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                let pred = match pred {
                    IntPredicate::Eq => "eq",
                    IntPredicate::Ne => "ne",
                };
                write!(out, "icmp {pred} {}, {}", self.typed(*lhs), self.operand(*rhs))
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                let pred = match pred {
                    FloatPredicate::Oeq => "oeq",
                    FloatPredicate::Une => "une",
                };
                write!(out, "fcmp {pred} {}, {}", self.typed(*lhs), self.operand(*rhs))
            }
            InstKind::ExtractElement { vector, index } => {
                write!(out, "extractelement {}, i64 {index}", self.typed(*vector))
            }
            InstKind::ExtractValue { aggregate, index } => {
                write!(out, "extractvalue {}, {index}", self.typed(*aggregate))
            }
            InstKind::Call { callee, args, tail } => {
                if *tail {
                    out.write_str("tail ")?;
                }
                let args: Vec<String> = args.iter().map(|&a| self.typed(a)).collect();
                write!(
                    out,
                    "call {} {}({})",
                    m.display_type(i.ty),
                    self.operand(*callee),
                    args.join(", ")
                )
            }
            InstKind::Alloca { allocated } => write!(out, "alloca {}", m.display_type(*allocated)),
            InstKind::StructGep { ty, ptr, field } => write!(
                out,
                "getelementptr {}, {}, i32 0, i32 {field}",
                m.display_type(Type::Struct(*ty)),
                self.typed(*ptr)
            ),
            InstKind::Load { ptr } => {
                write!(out, "load {}, {}", m.display_type(i.ty), self.typed(*ptr))
            }
            InstKind::Store { value, ptr } => {
                write!(out, "store {}, {}", self.typed(*value), self.typed(*ptr))
            }
            InstKind::Ret { value: Some(v) } => write!(out, "ret {}", self.typed(*v)),
            InstKind::Ret { value: None } => out.write_str("ret void"),
        }?;
        out.write_char('\n')
    }
}

fn write_function(out: &mut String, m: &Module, func: FuncId) -> fmt::Result {
    let f = m.function(func);
    let ret = m.display_type(f.ty.ret);
    if f.is_declaration() {
        let params: Vec<String> = f.ty.params.iter().map(|&p| m.display_type(p)).collect();
        return writeln!(out, "declare {ret} @{}({})", f.name, params.join(", "));
    }

    let printer = FunctionPrinter::new(m, func);
    let params: Vec<String> = f
        .ty
        .params
        .iter()
        .enumerate()
        .map(|(i, &p)| format!("{} %{i}", m.display_type(p)))
        .collect();
    writeln!(out, "define {ret} @{}({}) {{", f.name, params.join(", "))?;
    for (n, &block) in f.blocks().iter().enumerate() {
        writeln!(out, "bb{n}:")?;
        for &inst in m.block(block).insts() {
            printer.write_inst(out, inst)?;
        }
    }
    out.write_str("}\n")
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = Vec::new();

        let mut structs = String::new();
        for (_, st) in self.named_structs() {
            let name = st.name.as_deref().unwrap_or_default();
            let fields: Vec<String> = st.fields.iter().map(|&t| self.display_type(t)).collect();
            writeln!(structs, "%{name} = type {{ {} }}", fields.join(", "))?;
        }
        if !structs.is_empty() {
            sections.push(structs);
        }

        let mut globals = String::new();
        for (_, g) in self.globals() {
            let linkage = match (g.initializer, g.linkage) {
                (None, _) => "external ",
                (Some(_), Linkage::External) => "",
                (Some(_), Linkage::Internal) => "internal ",
            };
            let dso = if g.dso_local { "dso_local " } else { "" };
            let kind = if g.constant { "constant" } else { "global" };
            write!(globals, "@{} = {linkage}{dso}{kind} {}", g.name, self.display_type(g.ty))?;
            if let Some(init) = g.initializer {
                write!(globals, " {}", self.display_constant(init))?;
            }
            globals.push('\n');
        }
        if !globals.is_empty() {
            sections.push(globals);
        }

        for func in self.functions() {
            let mut text = String::new();
            write_function(&mut text, self, func)?;
            sections.push(text);
        }

        f.write_str(&sections.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Global;
    use crate::types::FunctionType;
    use crate::Builder;

    #[test]
    fn prints_declarations_definitions_and_globals() {
        let mut m = Module::new("t");
        let zero = m.const_int(Type::I32, 0);
        let Value::Const(zero) = zero else {
            unreachable!()
        };
        m.add_global(Global {
            name: "counter".to_owned(),
            ty: Type::I32,
            linkage: Linkage::External,
            constant: false,
            initializer: Some(zero),
            dso_local: true,
        })
        .unwrap();

        let v3 = Type::Vector(ScalarType::I32, 3);
        let f = m.add_function("neg", FunctionType::new(v3, [v3])).unwrap();
        let entry = m.append_block(f);
        let splat = m.const_int(v3, 0);
        let mut b = Builder::at_end(&mut m, entry);
        let neg = b.sub(splat, Value::Arg(f, 0));
        let max = b
            .call_intrinsic(crate::Intrinsic::SMax, v3, &[Value::Arg(f, 0), neg])
            .unwrap();
        b.ret(Some(max));

        assert_eq!(
            m.to_string(),
            "@counter = dso_local global i32 0\n\
             \n\
             define <3 x i32> @neg(<3 x i32> %0) {\n\
             bb0:\n  \
             %1 = sub <3 x i32> splat (i32 0), %0\n  \
             %2 = call <3 x i32> @llvm.smax.v3i32(<3 x i32> %0, <3 x i32> %1)\n  \
             ret <3 x i32> %2\n\
             }\n\
             \n\
             declare <3 x i32> @llvm.smax.v3i32(<3 x i32>, <3 x i32>)\n"
        );
    }

    #[test]
    fn float_constants_round_to_their_type() {
        let mut m = Module::new("t");
        let Value::Const(c) = m.const_float(Type::F32, std::f64::consts::LOG2_E) else {
            unreachable!()
        };
        assert_eq!(m.display_constant(c), "1.442695");
        let Value::Const(v) = m.const_int_vector(ScalarType::I32, &[-3, 2, -1]) else {
            unreachable!()
        };
        assert_eq!(m.display_constant(v), "<i32 -3, i32 2, i32 -1>");
    }
}
