//! Flat 32-bit word encoding of a root signature.
//!
//! Layout (all offsets are in words from the start of the blob):
//!
//! ```text
//! header      version, num_parameters, parameters_offset,
//!             num_static_samplers, static_samplers_offset,
//!             num_ranges, ranges_offset, flags
//! parameters  num_parameters * [type, visibility, payload_offset]
//! samplers    num_static_samplers * 13 words
//! ranges      num_ranges * 5 words (1.0) / 6 words (1.1)
//! payloads    per parameter, in parameter order:
//!               constants   [register, space, num_32bit_values]
//!               descriptor  [register, space] (1.0) / [register, space, flags] (1.1)
//!               table       [range_count, ranges_offset]
//! ```

use thiserror::Error;
use tracing::trace;

use crate::model::{
    DescriptorRange, DescriptorRangeOffset, DescriptorTable, RootConstants, RootDescriptor,
    RootDescriptorKind, RootParameter, RootParameterKind, RootSignatureDesc, StaticSamplerDesc,
};
use crate::types::{
    ComparisonFunc, DescriptorRangeFlags, DescriptorRangeType, Filter, RootDescriptorFlags,
    RootParameterType, RootSignatureFlags, RootSignatureVersion, ShaderVisibility,
    StaticBorderColor, TextureAddressMode,
};

pub const HEADER_WORDS: usize = 8;
pub const PARAMETER_WORDS: usize = 3;
pub const STATIC_SAMPLER_WORDS: usize = 13;
const CONSTANTS_PAYLOAD_WORDS: usize = 3;
const TABLE_PAYLOAD_WORDS: usize = 2;

/// Size in words of one descriptor range entry.
pub fn range_words(version: RootSignatureVersion) -> usize {
    match version {
        RootSignatureVersion::V1_0 => 5,
        RootSignatureVersion::V1_1 => 6,
    }
}

fn descriptor_payload_words(version: RootSignatureVersion) -> usize {
    match version {
        RootSignatureVersion::V1_0 => 2,
        RootSignatureVersion::V1_1 => 3,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{what} at words {offset}..{end} is outside the {available}-word blob")]
    OutOfBounds {
        what: &'static str,
        offset: usize,
        end: usize,
        available: usize,
    },
    #[error("{what} size overflows")]
    Overflow { what: &'static str },
    #[error("unsupported root signature version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid {field} value {value:#x}")]
    InvalidEnum { field: &'static str, value: u32 },
    #[error("invalid {field} flags {value:#x}")]
    InvalidFlags { field: &'static str, value: u32 },
    #[error("parameter {parameter}: descriptor table range offset {offset} (count {count}) does not address the range table")]
    TableRanges {
        parameter: usize,
        offset: u32,
        count: u32,
    },
    #[error("byte length {0} is not a multiple of 4")]
    UnalignedByteLength(usize),
}

/// Encodes `desc` into words.
///
/// Fields that do not exist in the signature's version (1.1 flags in a 1.0 signature) are not
/// written; see [`RootSignatureDesc::validate`] for the inputs that round-trip exactly.
pub fn serialize(desc: &RootSignatureDesc) -> Vec<u32> {
    let version = desc.version;
    let range_stride = range_words(version);

    let parameters_offset = HEADER_WORDS;
    let samplers_offset = parameters_offset + desc.parameters.len() * PARAMETER_WORDS;
    let ranges_offset = samplers_offset + desc.static_samplers.len() * STATIC_SAMPLER_WORDS;
    let payloads_offset = ranges_offset + desc.descriptor_ranges.len() * range_stride;

    let mut out = Vec::with_capacity(payloads_offset + desc.parameters.len() * 3);
    out.extend_from_slice(&[
        version.to_u32(),
        desc.parameters.len() as u32,
        parameters_offset as u32,
        desc.static_samplers.len() as u32,
        samplers_offset as u32,
        desc.descriptor_ranges.len() as u32,
        ranges_offset as u32,
        desc.flags.bits(),
    ]);

    let mut payloads = Vec::new();
    for param in &desc.parameters {
        let payload_offset = payloads_offset + payloads.len();
        out.extend_from_slice(&[
            param.kind.parameter_type().to_u32(),
            param.visibility.to_u32(),
            payload_offset as u32,
        ]);
        match &param.kind {
            RootParameterKind::Constants32Bit(constants) => payloads.extend_from_slice(&[
                constants.shader_register,
                constants.register_space,
                constants.num_32bit_values,
            ]),
            RootParameterKind::Descriptor(descriptor) => {
                payloads.extend_from_slice(&[descriptor.shader_register, descriptor.register_space]);
                if version == RootSignatureVersion::V1_1 {
                    payloads.push(descriptor.flags.unwrap_or_default().bits());
                }
            }
            RootParameterKind::DescriptorTable(table) => {
                let first = ranges_offset + table.first_range as usize * range_stride;
                payloads.extend_from_slice(&[table.range_count, first as u32]);
            }
        }
    }

    for sampler in &desc.static_samplers {
        out.extend_from_slice(&[
            sampler.filter.to_u32(),
            sampler.address_u.to_u32(),
            sampler.address_v.to_u32(),
            sampler.address_w.to_u32(),
            sampler.mip_lod_bias.to_bits(),
            sampler.max_anisotropy,
            sampler.comparison_func.to_u32(),
            sampler.border_color.to_u32(),
            sampler.min_lod.to_bits(),
            sampler.max_lod.to_bits(),
            sampler.shader_register,
            sampler.register_space,
            sampler.visibility.to_u32(),
        ]);
    }

    for range in &desc.descriptor_ranges {
        out.extend_from_slice(&[
            range.range_type.to_u32(),
            range.num_descriptors,
            range.base_shader_register,
            range.register_space,
        ]);
        if version == RootSignatureVersion::V1_1 {
            out.push(range.flags.bits());
        }
        out.push(range.offset.to_u32());
    }

    debug_assert_eq!(out.len(), payloads_offset);
    out.extend_from_slice(&payloads);

    trace!(
        version = version.hlsl_name(),
        parameters = desc.parameters.len(),
        static_samplers = desc.static_samplers.len(),
        ranges = desc.descriptor_ranges.len(),
        words = out.len(),
        "serialized root signature"
    );
    out
}

/// Decodes words produced by [`serialize`].
///
/// The input is treated as untrusted: every count, offset and enumerant is checked, and
/// malformed input yields a [`DecodeError`].
pub fn deserialize(words: &[u32]) -> Result<RootSignatureDesc, DecodeError> {
    let header = slice(words, 0, 1, HEADER_WORDS, "header")?;
    let version = RootSignatureVersion::from_u32(header[0])
        .ok_or(DecodeError::UnsupportedVersion(header[0]))?;
    let (num_parameters, parameters_offset) = (header[1], header[2]);
    let (num_samplers, samplers_offset) = (header[3], header[4]);
    let (num_ranges, ranges_offset) = (header[5], header[6]);
    let flags = header[7];

    let flags = RootSignatureFlags::from_bits(flags).ok_or(DecodeError::InvalidFlags {
        field: "root signature",
        value: flags,
    })?;

    let range_stride = range_words(version);
    let range_words_all = slice(
        words,
        ranges_offset as usize,
        num_ranges as usize,
        range_stride,
        "descriptor ranges",
    )?;
    let descriptor_ranges = range_words_all
        .chunks_exact(range_stride)
        .map(|w| decode_range(version, w))
        .collect::<Result<Vec<_>, _>>()?;

    let sampler_words = slice(
        words,
        samplers_offset as usize,
        num_samplers as usize,
        STATIC_SAMPLER_WORDS,
        "static samplers",
    )?;
    let static_samplers = sampler_words
        .chunks_exact(STATIC_SAMPLER_WORDS)
        .map(decode_sampler)
        .collect::<Result<Vec<_>, _>>()?;

    let parameter_words = slice(
        words,
        parameters_offset as usize,
        num_parameters as usize,
        PARAMETER_WORDS,
        "root parameters",
    )?;
    let mut parameters = Vec::with_capacity(num_parameters as usize);
    for (index, entry) in parameter_words.chunks_exact(PARAMETER_WORDS).enumerate() {
        let ty = RootParameterType::from_u32(entry[0]).ok_or(DecodeError::InvalidEnum {
            field: "root parameter type",
            value: entry[0],
        })?;
        let visibility = decode_visibility(entry[1])?;
        let payload_offset = entry[2] as usize;

        let kind = match ty {
            RootParameterType::Constants32Bit => {
                let p = slice(words, payload_offset, 1, CONSTANTS_PAYLOAD_WORDS, "root constants")?;
                RootParameterKind::Constants32Bit(RootConstants {
                    shader_register: p[0],
                    register_space: p[1],
                    num_32bit_values: p[2],
                })
            }
            RootParameterType::Cbv | RootParameterType::Srv | RootParameterType::Uav => {
                let p = slice(
                    words,
                    payload_offset,
                    1,
                    descriptor_payload_words(version),
                    "root descriptor",
                )?;
                let flags = match version {
                    RootSignatureVersion::V1_0 => None,
                    RootSignatureVersion::V1_1 => Some(
                        RootDescriptorFlags::from_bits(p[2]).ok_or(DecodeError::InvalidFlags {
                            field: "root descriptor",
                            value: p[2],
                        })?,
                    ),
                };
                let kind = RootDescriptorKind::from_parameter_type(ty).ok_or(
                    DecodeError::InvalidEnum {
                        field: "root descriptor type",
                        value: entry[0],
                    },
                )?;
                RootParameterKind::Descriptor(RootDescriptor {
                    kind,
                    shader_register: p[0],
                    register_space: p[1],
                    flags,
                })
            }
            RootParameterType::DescriptorTable => {
                let p = slice(words, payload_offset, 1, TABLE_PAYLOAD_WORDS, "descriptor table")?;
                let (count, offset) = (p[0], p[1]);
                let table = decode_table_ranges(ranges_offset, num_ranges, range_stride, offset, count)
                    .ok_or(DecodeError::TableRanges {
                        parameter: index,
                        offset,
                        count,
                    })?;
                RootParameterKind::DescriptorTable(table)
            }
        };
        parameters.push(RootParameter { visibility, kind });
    }

    Ok(RootSignatureDesc {
        version,
        flags,
        parameters,
        static_samplers,
        descriptor_ranges,
    })
}

/// Returns `count * stride` words starting at `offset`, bounds-checked.
fn slice<'a>(
    words: &'a [u32],
    offset: usize,
    count: usize,
    stride: usize,
    what: &'static str,
) -> Result<&'a [u32], DecodeError> {
    let len = count
        .checked_mul(stride)
        .ok_or(DecodeError::Overflow { what })?;
    let end = offset
        .checked_add(len)
        .ok_or(DecodeError::Overflow { what })?;
    words.get(offset..end).ok_or(DecodeError::OutOfBounds {
        what,
        offset,
        end,
        available: words.len(),
    })
}

/// Maps a serialized `(ranges_offset, count)` back to range indices.
fn decode_table_ranges(
    table_start: u32,
    num_ranges: u32,
    stride: usize,
    offset: u32,
    count: u32,
) -> Option<DescriptorTable> {
    let rel = offset.checked_sub(table_start)? as usize;
    if rel % stride != 0 {
        return None;
    }
    let first_range = u32::try_from(rel / stride).ok()?;
    if u64::from(first_range) + u64::from(count) > u64::from(num_ranges) {
        return None;
    }
    Some(DescriptorTable {
        first_range,
        range_count: count,
    })
}

fn decode_visibility(value: u32) -> Result<ShaderVisibility, DecodeError> {
    ShaderVisibility::from_u32(value).ok_or(DecodeError::InvalidEnum {
        field: "shader visibility",
        value,
    })
}

fn decode_range(version: RootSignatureVersion, w: &[u32]) -> Result<DescriptorRange, DecodeError> {
    let range_type = DescriptorRangeType::from_u32(w[0]).ok_or(DecodeError::InvalidEnum {
        field: "descriptor range type",
        value: w[0],
    })?;
    let (flags, offset) = match version {
        RootSignatureVersion::V1_0 => (DescriptorRangeFlags::empty(), w[4]),
        RootSignatureVersion::V1_1 => (
            DescriptorRangeFlags::from_bits(w[4]).ok_or(DecodeError::InvalidFlags {
                field: "descriptor range",
                value: w[4],
            })?,
            w[5],
        ),
    };
    Ok(DescriptorRange {
        range_type,
        num_descriptors: w[1],
        base_shader_register: w[2],
        register_space: w[3],
        offset: DescriptorRangeOffset::from_u32(offset),
        flags,
    })
}

fn decode_sampler(w: &[u32]) -> Result<StaticSamplerDesc, DecodeError> {
    fn field<T>(value: u32, field: &'static str, f: fn(u32) -> Option<T>) -> Result<T, DecodeError> {
        f(value).ok_or(DecodeError::InvalidEnum { field, value })
    }

    Ok(StaticSamplerDesc {
        filter: field(w[0], "filter", Filter::from_u32)?,
        address_u: field(w[1], "address mode", TextureAddressMode::from_u32)?,
        address_v: field(w[2], "address mode", TextureAddressMode::from_u32)?,
        address_w: field(w[3], "address mode", TextureAddressMode::from_u32)?,
        mip_lod_bias: f32::from_bits(w[4]),
        max_anisotropy: w[5],
        comparison_func: field(w[6], "comparison func", ComparisonFunc::from_u32)?,
        border_color: field(w[7], "border color", StaticBorderColor::from_u32)?,
        min_lod: f32::from_bits(w[8]),
        max_lod: f32::from_bits(w[9]),
        shader_register: w[10],
        register_space: w[11],
        visibility: decode_visibility(w[12])?,
    })
}

/// Little-endian byte image of `words`.
pub fn words_to_le_bytes(words: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 4);
    for w in words {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}

pub fn words_from_le_bytes(bytes: &[u8]) -> Result<Vec<u32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::UnalignedByteLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signature_is_just_a_header() {
        let desc = RootSignatureDesc::new(RootSignatureVersion::V1_0);
        let words = serialize(&desc);
        assert_eq!(words, vec![1, 0, 8, 0, 8, 0, 8, 0]);
        assert_eq!(deserialize(&words).unwrap(), desc);
    }

    #[test]
    fn table_payload_points_at_its_first_range() {
        let mut desc = RootSignatureDesc::new(RootSignatureVersion::V1_1);
        desc.push_descriptor_table(
            ShaderVisibility::All,
            [DescriptorRange::new(DescriptorRangeType::Srv, 0)],
        );
        desc.push_descriptor_table(
            ShaderVisibility::Pixel,
            [
                DescriptorRange::new(DescriptorRangeType::Uav, 0),
                DescriptorRange::new(DescriptorRangeType::Cbv, 3),
            ],
        );
        let words = serialize(&desc);

        let ranges_offset = words[6] as usize;
        assert_eq!(ranges_offset, HEADER_WORDS + 2 * PARAMETER_WORDS);
        let second_payload = words[HEADER_WORDS + PARAMETER_WORDS + 2] as usize;
        assert_eq!(words[second_payload], 2);
        assert_eq!(words[second_payload + 1] as usize, ranges_offset + 6);
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(matches!(
            deserialize(&[2, 0, 8]),
            Err(DecodeError::OutOfBounds { what: "header", .. })
        ));
    }

    #[test]
    fn byte_helpers_check_alignment() {
        let bytes = words_to_le_bytes(&[0x0403_0201, 0xdead_beef]);
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        assert_eq!(words_from_le_bytes(&bytes).unwrap(), vec![0x0403_0201, 0xdead_beef]);
        assert_eq!(
            words_from_le_bytes(&bytes[..5]),
            Err(DecodeError::UnalignedByteLength(5))
        );
    }
}
