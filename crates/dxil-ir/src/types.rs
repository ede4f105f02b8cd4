use std::fmt;

use crate::arena::Id;

pub type StructId = Id<StructType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I1,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl ScalarType {
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F16 | ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_int(self) -> bool {
        !self.is_float()
    }

    pub fn bits(self) -> u32 {
        match self {
            ScalarType::I1 => 1,
            ScalarType::I16 | ScalarType::F16 => 16,
            ScalarType::I32 | ScalarType::F32 => 32,
            ScalarType::I64 | ScalarType::F64 => 64,
        }
    }

    /// Name used in textual IR and in intrinsic overload suffixes.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::I1 => "i1",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F16 => "half",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
        }
    }

    fn mangled(self) -> &'static str {
        match self {
            ScalarType::F16 => "f16",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            int => int.name(),
        }
    }
}

/// First-class type of a value.
///
/// Aggregates are referenced through [`StructId`] so that `Type` stays `Copy`; resolve them
/// with [`crate::Module::struct_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Scalar(ScalarType),
    /// Fixed-length vector.
    Vector(ScalarType, u32),
    /// Opaque pointer.
    Ptr,
    Struct(StructId),
}

impl Type {
    pub const I1: Type = Type::Scalar(ScalarType::I1);
    pub const I32: Type = Type::Scalar(ScalarType::I32);
    pub const I64: Type = Type::Scalar(ScalarType::I64);
    pub const F32: Type = Type::Scalar(ScalarType::F32);

    /// Element type of a scalar or vector type.
    pub fn scalar_type(self) -> Option<ScalarType> {
        match self {
            Type::Scalar(s) | Type::Vector(s, _) => Some(s),
            _ => None,
        }
    }

    pub fn vector_len(self) -> Option<u32> {
        match self {
            Type::Vector(_, n) => Some(n),
            _ => None,
        }
    }

    pub fn is_vector(self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn is_int_or_int_vector(self) -> bool {
        self.scalar_type().is_some_and(ScalarType::is_int)
    }

    pub fn is_float_or_float_vector(self) -> bool {
        self.scalar_type().is_some_and(ScalarType::is_float)
    }

    /// The same shape with `scalar` elements (`<3 x float>` -> `<3 x i1>`).
    pub fn with_scalar(self, scalar: ScalarType) -> Type {
        match self {
            Type::Vector(_, n) => Type::Vector(scalar, n),
            _ => Type::Scalar(scalar),
        }
    }

    /// Overload suffix used in intrinsic names: `i32`, `f32`, `v3i32`, `v4f16`.
    pub fn mangled_suffix(self) -> String {
        match self {
            Type::Void => "isVoid".to_owned(),
            Type::Scalar(s) => s.mangled().to_owned(),
            Type::Vector(s, n) => format!("v{n}{}", s.mangled()),
            Type::Ptr => "p0".to_owned(),
            Type::Struct(id) => format!("s{}", id.index()),
        }
    }
}

/// A struct type. Named structs are unique by name, literal structs by field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: Option<String>,
    pub fields: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub ret: Type,
    pub params: Vec<Type>,
}

impl FunctionType {
    pub fn new(ret: Type, params: impl Into<Vec<Type>>) -> Self {
        Self {
            ret,
            params: params.into(),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangled_suffixes() {
        assert_eq!(Type::I32.mangled_suffix(), "i32");
        assert_eq!(Type::Vector(ScalarType::I32, 3).mangled_suffix(), "v3i32");
        assert_eq!(Type::Vector(ScalarType::F16, 4).mangled_suffix(), "v4f16");
        assert_eq!(Type::F32.mangled_suffix(), "f32");
    }

    #[test]
    fn shape_helpers() {
        let v = Type::Vector(ScalarType::F32, 3);
        assert!(v.is_float_or_float_vector());
        assert!(!v.is_int_or_int_vector());
        assert_eq!(v.with_scalar(ScalarType::I1), Type::Vector(ScalarType::I1, 3));
        assert_eq!(Type::F32.with_scalar(ScalarType::I1), Type::I1);
        assert_eq!(Type::Ptr.scalar_type(), None);
    }
}
