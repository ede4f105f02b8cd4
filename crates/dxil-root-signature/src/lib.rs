//! Root signature model and its 32-bit word container encoding.
//!
//! A [`RootSignatureDesc`] owns its root parameters, static samplers and descriptor ranges by
//! value. [`serialize`] lays them out as little-endian words with a fixed header of counts and
//! word offsets; [`deserialize`] is its bounds-checked inverse. For every description accepted
//! by [`RootSignatureDesc::validate`], `deserialize(&serialize(&desc)) == Ok(desc)`.

#![forbid(unsafe_code)]

mod codec;
mod model;
mod print;
mod types;

pub use crate::codec::{
    deserialize, range_words, serialize, words_from_le_bytes, words_to_le_bytes, DecodeError,
    HEADER_WORDS, PARAMETER_WORDS, STATIC_SAMPLER_WORDS,
};
pub use crate::model::{
    DescriptorRange, DescriptorRangeOffset, DescriptorTable, RootConstants, RootDescriptor,
    RootDescriptorKind, RootParameter, RootParameterKind, RootSignatureDesc, StaticSamplerDesc,
    ValidationError, DESCRIPTOR_RANGE_OFFSET_APPEND, MAX_ANISOTROPY, MIP_LOD_BIAS_MAX,
    MIP_LOD_BIAS_MIN, SYSTEM_RESERVED_REGISTER_SPACE_START,
};
pub use crate::print::print_root_signature;
pub use crate::types::{
    ComparisonFunc, DescriptorRangeFlags, DescriptorRangeType, Filter, RootDescriptorFlags,
    RootParameterType, RootSignatureFlags, RootSignatureVersion, ShaderVisibility,
    StaticBorderColor, TextureAddressMode,
};
