use dxil_ir::IrError;
use thiserror::Error;

/// A module the pass cannot rewrite consistently. Compilation must stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("call to `{callee}` has {found} operands, expected {expected}")]
    OperandCount {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("`{intrinsic}` cannot be expanded for operand type {ty}")]
    UnsupportedOperand { intrinsic: &'static str, ty: String },
    #[error("`{wrapper}` is referenced by something other than a direct call")]
    NonCallUse { wrapper: String },
    #[error("differentiation target passed to `{wrapper}` is not a function")]
    NonFunctionTarget { wrapper: String },
    #[error("argument {index} of `{wrapper}` is not an alloca of a tagged struct (found {found})")]
    UnknownTag {
        wrapper: String,
        index: usize,
        found: String,
    },
    #[error("tagged argument {index} of `{wrapper}` has no field {field}")]
    MissingField {
        wrapper: String,
        index: usize,
        field: u32,
    },
    #[error("Active argument {index} is not allowed in forward-mode call `{wrapper}`")]
    ActiveInForwardMode { wrapper: String, index: usize },
    #[error("result of reverse-mode call `{wrapper}` is used")]
    ReverseResultUsed { wrapper: String },
    #[error("`{wrapper}` returns {wrapper_ret} but its target returns {target_ret}")]
    ResultType {
        wrapper: String,
        wrapper_ret: String,
        target_ret: String,
    },
    #[error(transparent)]
    Ir(#[from] IrError),
}
