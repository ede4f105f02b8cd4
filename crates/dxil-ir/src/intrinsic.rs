//! Intrinsic function identities.
//!
//! A function declaration is an intrinsic when its name is an intrinsic base name, optionally
//! followed by `.`-separated overload suffixes (`llvm.smax.v3i32`, `llvm.dx.any.f32`).

use crate::types::{FunctionType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Abs,
    Exp,
    Exp2,
    Log,
    Log2,
    Log10,
    Pow,
    SMax,
    SMin,
    UMax,
    UMin,
    MaxNum,
    MinNum,
    DxAny,
    DxClamp,
    DxUClamp,
    DxLerp,
    DxSDot,
    DxUDot,
    DxIMad,
    DxUMad,
}

impl Intrinsic {
    pub const ALL: &'static [Intrinsic] = &[
        Intrinsic::Abs,
        Intrinsic::Exp,
        Intrinsic::Exp2,
        Intrinsic::Log,
        Intrinsic::Log2,
        Intrinsic::Log10,
        Intrinsic::Pow,
        Intrinsic::SMax,
        Intrinsic::SMin,
        Intrinsic::UMax,
        Intrinsic::UMin,
        Intrinsic::MaxNum,
        Intrinsic::MinNum,
        Intrinsic::DxAny,
        Intrinsic::DxClamp,
        Intrinsic::DxUClamp,
        Intrinsic::DxLerp,
        Intrinsic::DxSDot,
        Intrinsic::DxUDot,
        Intrinsic::DxIMad,
        Intrinsic::DxUMad,
    ];

    pub fn base_name(self) -> &'static str {
        match self {
            Intrinsic::Abs => "llvm.abs",
            Intrinsic::Exp => "llvm.exp",
            Intrinsic::Exp2 => "llvm.exp2",
            Intrinsic::Log => "llvm.log",
            Intrinsic::Log2 => "llvm.log2",
            Intrinsic::Log10 => "llvm.log10",
            Intrinsic::Pow => "llvm.pow",
            Intrinsic::SMax => "llvm.smax",
            Intrinsic::SMin => "llvm.smin",
            Intrinsic::UMax => "llvm.umax",
            Intrinsic::UMin => "llvm.umin",
            Intrinsic::MaxNum => "llvm.maxnum",
            Intrinsic::MinNum => "llvm.minnum",
            Intrinsic::DxAny => "llvm.dx.any",
            Intrinsic::DxClamp => "llvm.dx.clamp",
            Intrinsic::DxUClamp => "llvm.dx.uclamp",
            Intrinsic::DxLerp => "llvm.dx.lerp",
            Intrinsic::DxSDot => "llvm.dx.sdot",
            Intrinsic::DxUDot => "llvm.dx.udot",
            Intrinsic::DxIMad => "llvm.dx.imad",
            Intrinsic::DxUMad => "llvm.dx.umad",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|intrinsic| {
            name.strip_prefix(intrinsic.base_name())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Abs
            | Intrinsic::Exp
            | Intrinsic::Exp2
            | Intrinsic::Log
            | Intrinsic::Log2
            | Intrinsic::Log10
            | Intrinsic::DxAny => 1,
            Intrinsic::Pow
            | Intrinsic::SMax
            | Intrinsic::SMin
            | Intrinsic::UMax
            | Intrinsic::UMin
            | Intrinsic::MaxNum
            | Intrinsic::MinNum
            | Intrinsic::DxSDot
            | Intrinsic::DxUDot => 2,
            Intrinsic::DxClamp
            | Intrinsic::DxUClamp
            | Intrinsic::DxLerp
            | Intrinsic::DxIMad
            | Intrinsic::DxUMad => 3,
        }
    }

    /// Declaration name for the `overload` instance, e.g. `llvm.smax.v3i32`.
    pub fn mangled_name(self, overload: Type) -> String {
        format!("{}.{}", self.base_name(), overload.mangled_suffix())
    }

    /// Signature of the `overload` instance.
    ///
    /// `overload` is the operand type; the result type matches it except for `dx.any`
    /// (always `i1`) and the dot products (the element type).
    pub fn signature(self, overload: Type) -> FunctionType {
        let ret = match self {
            Intrinsic::DxAny => Type::I1,
            Intrinsic::DxSDot | Intrinsic::DxUDot => overload
                .scalar_type()
                .map_or(overload, Type::Scalar),
            _ => overload,
        };
        FunctionType::new(ret, vec![overload; self.arity()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;

    #[test]
    fn names_resolve_with_and_without_overloads() {
        assert_eq!(Intrinsic::from_name("llvm.smax.v3i32"), Some(Intrinsic::SMax));
        assert_eq!(Intrinsic::from_name("llvm.dx.any"), Some(Intrinsic::DxAny));
        assert_eq!(Intrinsic::from_name("llvm.exp2.f32"), Some(Intrinsic::Exp2));
        assert_eq!(Intrinsic::from_name("llvm.exp.f32"), Some(Intrinsic::Exp));
        assert_eq!(Intrinsic::from_name("llvm.log10.f32"), Some(Intrinsic::Log10));
        assert_eq!(Intrinsic::from_name("llvm.dx.uclamp.i32"), Some(Intrinsic::DxUClamp));
        assert_eq!(Intrinsic::from_name("llvm.exponent"), None);
        assert_eq!(Intrinsic::from_name("main"), None);
    }

    #[test]
    fn every_mangled_name_maps_back() {
        let v3 = Type::Vector(ScalarType::I32, 3);
        for &intrinsic in Intrinsic::ALL {
            assert_eq!(
                Intrinsic::from_name(&intrinsic.mangled_name(v3)),
                Some(intrinsic)
            );
        }
    }

    #[test]
    fn dot_and_any_signatures() {
        let v3 = Type::Vector(ScalarType::I32, 3);
        assert_eq!(
            Intrinsic::DxSDot.signature(v3),
            FunctionType::new(Type::I32, [v3, v3])
        );
        assert_eq!(Intrinsic::DxAny.signature(v3).ret, Type::I1);
        assert_eq!(Intrinsic::DxClamp.signature(Type::F32).params.len(), 3);
    }
}
