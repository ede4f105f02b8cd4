use core::fmt::{self, Write as _};

use crate::model::{
    DescriptorRange, DescriptorRangeOffset, RootParameter, RootParameterKind, RootSignatureDesc,
    StaticSamplerDesc,
};
use crate::types::{flag_names, RootSignatureVersion};

/// Renders `desc` in the HLSL root signature language, on a single line.
///
/// ```text
/// RootFlags(0), CBV(b0, space=0, visibility=SHADER_VISIBILITY_ALL), ...
/// ```
///
/// Descriptor tables whose ranges fall outside the range list are printed with the ranges that
/// exist; run [`RootSignatureDesc::validate`] first to rule that out.
pub fn print_root_signature(desc: &RootSignatureDesc) -> String {
    let mut out = String::new();
    // Writing into a `String` cannot fail.
    let _ = write_root_signature(&mut out, desc);
    out
}

fn write_root_signature(out: &mut impl fmt::Write, desc: &RootSignatureDesc) -> fmt::Result {
    write!(out, "RootFlags({})", flag_names(desc.flags.iter_names()))?;
    for param in &desc.parameters {
        out.write_str(", ")?;
        write_parameter(out, desc, param)?;
    }
    for sampler in &desc.static_samplers {
        out.write_str(", ")?;
        write_sampler(out, sampler)?;
    }
    Ok(())
}

fn write_parameter(
    out: &mut impl fmt::Write,
    desc: &RootSignatureDesc,
    param: &RootParameter,
) -> fmt::Result {
    match &param.kind {
        RootParameterKind::Constants32Bit(c) => write!(
            out,
            "RootConstants(num32BitConstants={}, b{}, space={}, visibility={})",
            c.num_32bit_values,
            c.shader_register,
            c.register_space,
            param.visibility.hlsl_name()
        ),
        RootParameterKind::Descriptor(d) => {
            write!(
                out,
                "{}({}{}, space={}, visibility={}",
                d.kind.parameter_type().hlsl_name(),
                d.kind.register_prefix(),
                d.shader_register,
                d.register_space,
                param.visibility.hlsl_name()
            )?;
            if let Some(flags) = d.flags {
                write!(out, ", flags={}", flag_names(flags.iter_names()))?;
            }
            out.write_char(')')
        }
        RootParameterKind::DescriptorTable(table) => {
            out.write_str("DescriptorTable(")?;
            let ranges = desc
                .descriptor_ranges
                .get(table.first_range as usize..)
                .unwrap_or_default();
            let ranges = &ranges[..ranges.len().min(table.range_count as usize)];
            for range in ranges {
                write_range(out, desc, range)?;
                out.write_str(", ")?;
            }
            write!(out, "visibility={})", param.visibility.hlsl_name())
        }
    }
}

fn write_range(
    out: &mut impl fmt::Write,
    desc: &RootSignatureDesc,
    range: &DescriptorRange,
) -> fmt::Result {
    write!(
        out,
        "{}({}{}, numDescriptors=",
        range.range_type.hlsl_name(),
        range.range_type.register_prefix(),
        range.base_shader_register
    )?;
    match range.num_descriptors {
        u32::MAX => out.write_str("unbounded")?,
        n => write!(out, "{n}")?,
    }
    write!(out, ", space={}, offset=", range.register_space)?;
    match range.offset {
        DescriptorRangeOffset::Append => out.write_str("DESCRIPTOR_RANGE_OFFSET_APPEND")?,
        DescriptorRangeOffset::Explicit(n) => write!(out, "{n}")?,
    }
    if desc.version == RootSignatureVersion::V1_1 {
        write!(out, ", flags={}", flag_names(range.flags.iter_names()))?;
    }
    out.write_char(')')
}

fn write_sampler(out: &mut impl fmt::Write, s: &StaticSamplerDesc) -> fmt::Result {
    write!(
        out,
        "StaticSampler(s{}, filter={}, addressU={}, addressV={}, addressW={}, \
         mipLODBias={:?}, maxAnisotropy={}, comparisonFunc={}, borderColor={}, \
         minLOD={:?}, maxLOD={:?}, space={}, visibility={})",
        s.shader_register,
        s.filter.hlsl_name(),
        s.address_u.hlsl_name(),
        s.address_v.hlsl_name(),
        s.address_w.hlsl_name(),
        s.mip_lod_bias,
        s.max_anisotropy,
        s.comparison_func.hlsl_name(),
        s.border_color.hlsl_name(),
        s.min_lod,
        s.max_lod,
        s.register_space,
        s.visibility.hlsl_name(),
    )
}

impl fmt::Display for RootSignatureDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_root_signature(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RootConstants, RootDescriptor, RootDescriptorKind};
    use crate::types::{
        DescriptorRangeFlags, DescriptorRangeType, RootDescriptorFlags, RootSignatureFlags,
        ShaderVisibility,
    };

    #[test]
    fn empty_signature_prints_zero_flags() {
        let desc = RootSignatureDesc::new(RootSignatureVersion::V1_0);
        assert_eq!(print_root_signature(&desc), "RootFlags(0)");
    }

    #[test]
    fn prints_every_parameter_kind() {
        let mut desc = RootSignatureDesc::new(RootSignatureVersion::V1_1);
        desc.flags = RootSignatureFlags::ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT
            | RootSignatureFlags::DENY_PIXEL_SHADER_ROOT_ACCESS;
        desc.push_constants(
            ShaderVisibility::Vertex,
            RootConstants {
                shader_register: 1,
                register_space: 0,
                num_32bit_values: 4,
            },
        );
        desc.push_descriptor(
            ShaderVisibility::All,
            RootDescriptor {
                kind: RootDescriptorKind::Uav,
                shader_register: 2,
                register_space: 3,
                flags: Some(RootDescriptorFlags::DATA_VOLATILE),
            },
        );
        let mut srv = DescriptorRange::new(DescriptorRangeType::Srv, 0);
        srv.num_descriptors = u32::MAX;
        srv.flags = DescriptorRangeFlags::DESCRIPTORS_VOLATILE;
        desc.push_descriptor_table(ShaderVisibility::Pixel, [srv]);

        assert_eq!(
            print_root_signature(&desc),
            "RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT | DENY_PIXEL_SHADER_ROOT_ACCESS), \
             RootConstants(num32BitConstants=4, b1, space=0, visibility=SHADER_VISIBILITY_VERTEX), \
             UAV(u2, space=3, visibility=SHADER_VISIBILITY_ALL, flags=DATA_VOLATILE), \
             DescriptorTable(SRV(t0, numDescriptors=unbounded, space=0, \
             offset=DESCRIPTOR_RANGE_OFFSET_APPEND, flags=DESCRIPTORS_VOLATILE), \
             visibility=SHADER_VISIBILITY_PIXEL)"
        );
        assert_eq!(desc.to_string(), print_root_signature(&desc));
    }
}
