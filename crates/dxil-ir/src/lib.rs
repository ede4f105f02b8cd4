//! Minimal SSA intermediate representation for shader modules.
//!
//! A [`Module`] owns every function, block, instruction, constant and global in arenas and
//! tracks def-use edges, so passes can ask for the users of a value, replace all uses of one
//! value with another, and erase instructions and functions once nothing refers to them.
//!
//! Instructions are created through a [`Builder`]. [`Module::verify`] checks structural
//! well-formedness, `Display` prints an LLVM-like listing, and the [`Interpreter`] executes
//! straight-line bodies (including known intrinsics) so rewrites can be checked for
//! behavioural equivalence.

#![forbid(unsafe_code)]

mod arena;
mod builder;
mod eval;
mod intrinsic;
mod module;
mod print;
mod types;
mod verify;

pub use crate::arena::{Arena, Id};
pub use crate::builder::Builder;
pub use crate::eval::{run_function, EvalError, Interpreter, Pointer, Val};
pub use crate::intrinsic::Intrinsic;
pub use crate::module::{
    BinaryOp, Block, BlockId, ConstId, Constant, FloatPredicate, FuncId, Function, Global,
    GlobalId, InstId, InstKind, Instruction, IntPredicate, IrError, Linkage, Module, Value,
};
pub use crate::types::{FunctionType, ScalarType, StructId, StructType, Type};
