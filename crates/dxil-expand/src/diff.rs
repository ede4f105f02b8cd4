//! Lowering of automatic-differentiation wrappers to Enzyme entry points.
//!
//! The front end emits calls to wrapper declarations named `??$fwddiff@...` or
//! `??$autodiff@...`. Operand 0 is the function to differentiate; every other operand is an
//! `alloca` of a `struct.hlsl::<Tag>` aggregate describing how the argument participates:
//!
//! | tag                | flattened operands                    |
//! |--------------------|---------------------------------------|
//! | `Duplicated`       | `enzyme_dup`, primal, shadow          |
//! | `DuplicatedNoNeed` | `enzyme_dupnoneed`, primal, shadow    |
//! | `Active`           | `enzyme_out`, primal (reverse only)   |
//! | `Const`            | `enzyme_const`, primal                |
//!
//! Reverse mode returns one aggregate holding a derivative per `Active` argument; each is
//! stored back into field 1 of its argument.

use dxil_ir::{
    Builder, Constant, FuncId, FunctionType, Global, GlobalId, InstId, InstKind, Linkage, Module,
    ScalarType, StructId, Type, Value,
};
use tracing::debug;

use crate::error::ExpansionError;

pub const FWDDIFF_PREFIX: &str = "??$fwddiff@";
pub const AUTODIFF_PREFIX: &str = "??$autodiff@";

const TAG_STRUCT_PREFIX: &str = "struct.hlsl::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Forward,
    Reverse,
}

impl DiffMode {
    /// Mode of a wrapper declaration, from its name.
    pub fn of_wrapper(name: &str) -> Option<Self> {
        if name.starts_with(FWDDIFF_PREFIX) {
            Some(DiffMode::Forward)
        } else if name.starts_with(AUTODIFF_PREFIX) {
            Some(DiffMode::Reverse)
        } else {
            None
        }
    }

    fn entry_point(self) -> &'static str {
        match self {
            DiffMode::Forward => "__enzyme_fwddiff",
            DiffMode::Reverse => "__enzyme_autodiff",
        }
    }
}

/// How one argument of a differentiated call participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTag {
    Duplicated,
    DuplicatedNoNeed,
    Active,
    Const,
}

impl ArgTag {
    /// Parses the tag out of a struct name such as `struct.hlsl::Duplicated<float>`.
    ///
    /// The tag must be a whole identifier: `DuplicatedNoNeed` is never read as `Duplicated`.
    pub fn from_struct_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(TAG_STRUCT_PREFIX)?;
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        match &rest[..end] {
            "Duplicated" => Some(ArgTag::Duplicated),
            "DuplicatedNoNeed" => Some(ArgTag::DuplicatedNoNeed),
            "Active" => Some(ArgTag::Active),
            "Const" => Some(ArgTag::Const),
            _ => None,
        }
    }

    /// Name of the marker global passed ahead of the argument.
    pub fn mode_global(self) -> &'static str {
        match self {
            ArgTag::Duplicated => "enzyme_dup",
            ArgTag::DuplicatedNoNeed => "enzyme_dupnoneed",
            ArgTag::Active => "enzyme_out",
            ArgTag::Const => "enzyme_const",
        }
    }
}

/// Returns the marker global for `tag`, creating it on first use.
fn mode_global(module: &mut Module, tag: ArgTag) -> Result<GlobalId, ExpansionError> {
    let name = tag.mode_global();
    if let Some(global) = module.get_global(name) {
        return Ok(global);
    }
    let zero = module.push_constant(Constant::Int {
        ty: ScalarType::I32,
        bits: 0,
    });
    Ok(module.add_global(Global {
        name: name.to_owned(),
        ty: Type::I32,
        linkage: Linkage::External,
        constant: false,
        initializer: Some(zero),
        dso_local: true,
    })?)
}

/// The struct type, its name and its tag, if `arg` is an `alloca` of a tagged struct.
fn tagged_alloca(module: &Module, arg: Value) -> Option<(StructId, &str, ArgTag)> {
    let Value::Inst(inst) = arg else {
        return None;
    };
    let InstKind::Alloca {
        allocated: Type::Struct(st),
    } = module.inst(inst).kind
    else {
        return None;
    };
    let name = module.struct_type(st).name.as_deref()?;
    Some((st, name, ArgTag::from_struct_name(name)?))
}

/// Lowers every call of the wrapper `func`, then erases the wrapper.
pub(crate) fn lower_wrapper(
    module: &mut Module,
    func: FuncId,
    mode: DiffMode,
) -> Result<(), ExpansionError> {
    for call in module.users(Value::Func(func)) {
        if module.called_function(call) != Some(func) {
            return Err(ExpansionError::NonCallUse {
                wrapper: module.function(func).name.clone(),
            });
        }
        lower_call(module, call, mode)?;
    }
    debug!(wrapper = %module.function(func).name, "removing differentiation wrapper");
    module.erase_function(func);
    Ok(())
}

fn lower_call(module: &mut Module, call: InstId, mode: DiffMode) -> Result<(), ExpansionError> {
    let (wrapper, args) = match &module.inst(call).kind {
        InstKind::Call {
            callee: Value::Func(wrapper),
            args,
            ..
        } => (*wrapper, args.clone()),
        _ => return Ok(()),
    };
    let wrapper_name = module.function(wrapper).name.clone();

    let Some((&target, tagged)) = args.split_first() else {
        return Err(ExpansionError::NonFunctionTarget {
            wrapper: wrapper_name,
        });
    };
    let Value::Func(target_fn) = target else {
        return Err(ExpansionError::NonFunctionTarget {
            wrapper: wrapper_name,
        });
    };
    if mode == DiffMode::Reverse && module.has_users(Value::Inst(call)) {
        return Err(ExpansionError::ReverseResultUsed {
            wrapper: wrapper_name,
        });
    }

    let mut callee_name = mode.entry_point().to_owned();
    let mut operands = vec![target];
    let mut params = vec![Type::Ptr];
    // (derivative type, where to store it) per Active argument.
    let mut outputs: Vec<(Type, Value)> = Vec::new();

    let mut b = Builder::before(module, call);
    for (n, &arg) in tagged.iter().enumerate() {
        let index = n + 1;
        let Some((st, name, tag)) = tagged_alloca(b.module(), arg) else {
            let m = b.module();
            return Err(ExpansionError::UnknownTag {
                wrapper: wrapper_name.clone(),
                index,
                found: m.display_type(m.value_type(arg)),
            });
        };
        callee_name.push('_');
        callee_name.push_str(name);
        let fields = b.module().struct_type(st).fields.clone();
        let field_type = |field: u32| {
            fields
                .get(field as usize)
                .copied()
                .ok_or_else(|| ExpansionError::MissingField {
                    wrapper: wrapper_name.clone(),
                    index,
                    field,
                })
        };

        let marker = mode_global(b.module(), tag)?;
        operands.push(Value::Global(marker));
        params.push(Type::Ptr);

        let loaded_fields: &[u32] = match tag {
            ArgTag::Duplicated | ArgTag::DuplicatedNoNeed => &[0, 1],
            ArgTag::Active if mode == DiffMode::Forward => {
                return Err(ExpansionError::ActiveInForwardMode {
                    wrapper: wrapper_name.clone(),
                    index,
                });
            }
            ArgTag::Active => {
                let shadow = b.struct_gep(st, arg, 1);
                outputs.push((field_type(0)?, shadow));
                &[0]
            }
            ArgTag::Const => &[0],
        };
        for &field in loaded_fields {
            let ty = field_type(field)?;
            let ptr = b.struct_gep(st, arg, field);
            operands.push(b.load(ty, ptr));
            params.push(ty);
        }
    }

    let ret = match mode {
        DiffMode::Forward => b.module().function(target_fn).ty.ret,
        DiffMode::Reverse => {
            let types = outputs.iter().map(|&(ty, _)| ty).collect();
            Type::Struct(b.module().literal_struct(types))
        }
    };
    let callee = b
        .module()
        .get_or_insert_function(&callee_name, FunctionType::new(ret, params))?;
    let lowered = b.call(callee, &operands)?;
    for (i, &(_, shadow)) in outputs.iter().enumerate() {
        let derivative = b.extract_value(lowered, i as u32);
        b.store(derivative, shadow);
    }

    if mode == DiffMode::Forward {
        let old_ret = module.inst(call).ty;
        if old_ret != ret && module.has_users(Value::Inst(call)) {
            return Err(ExpansionError::ResultType {
                wrapper: wrapper_name,
                wrapper_ret: module.display_type(old_ret),
                target_ret: module.display_type(ret),
            });
        }
        module.replace_all_uses_with(Value::Inst(call), lowered);
    }
    module.erase_instruction(call);
    debug!(wrapper = %wrapper_name, callee = %callee_name, "lowered differentiation call");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_whole_identifiers() {
        let cases = [
            ("struct.hlsl::Duplicated<float>", Some(ArgTag::Duplicated)),
            ("struct.hlsl::DuplicatedNoNeed<float>", Some(ArgTag::DuplicatedNoNeed)),
            ("struct.hlsl::Active", Some(ArgTag::Active)),
            ("struct.hlsl::Const<vector<float, 3> >", Some(ArgTag::Const)),
            ("struct.hlsl::Constant<float>", None),
            ("struct.Duplicated<float>", None),
        ];
        for (name, expected) in cases {
            assert_eq!(ArgTag::from_struct_name(name), expected, "{name}");
        }
    }

    #[test]
    fn wrapper_modes() {
        assert_eq!(
            DiffMode::of_wrapper("??$fwddiff@M@@YAMP6AMM@ZU?$Duplicated@M@hlsl@@@Z"),
            Some(DiffMode::Forward)
        );
        assert_eq!(DiffMode::of_wrapper("??$autodiff@M"), Some(DiffMode::Reverse));
        assert_eq!(DiffMode::of_wrapper("__enzyme_fwddiff"), None);
    }

    #[test]
    fn mode_globals_are_created_once() {
        let mut m = Module::new("t");
        let a = mode_global(&mut m, ArgTag::Duplicated).unwrap();
        let b = mode_global(&mut m, ArgTag::Duplicated).unwrap();
        assert_eq!(a, b);
        let g = m.global(a);
        assert_eq!(g.name, "enzyme_dup");
        assert_eq!(g.ty, Type::I32);
        assert_eq!(g.linkage, Linkage::External);
        assert!(g.dso_local);
        assert_eq!(m.globals().count(), 1);
    }
}
