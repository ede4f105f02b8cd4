//! Enumerations and flag sets shared by the root signature model and its binary encoding.
//!
//! Discriminants are the values stored in the serialized words.

use bitflags::bitflags;

macro_rules! word_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn to_u32(self) -> u32 {
                self as u32
            }

            /// Spelling used by the HLSL root signature language.
            pub fn hlsl_name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }
    };
}

word_enum! {
    pub enum RootSignatureVersion {
        V1_0 = 1 => "1.0",
        V1_1 = 2 => "1.1",
    }
}

word_enum! {
    pub enum RootParameterType {
        DescriptorTable = 0 => "DescriptorTable",
        Constants32Bit = 1 => "RootConstants",
        Cbv = 2 => "CBV",
        Srv = 3 => "SRV",
        Uav = 4 => "UAV",
    }
}

word_enum! {
    pub enum DescriptorRangeType {
        Srv = 0 => "SRV",
        Uav = 1 => "UAV",
        Cbv = 2 => "CBV",
        Sampler = 3 => "Sampler",
    }
}

impl DescriptorRangeType {
    /// Register prefix used in the textual syntax (`t0`, `u0`, `b0`, `s0`).
    pub fn register_prefix(self) -> char {
        match self {
            DescriptorRangeType::Srv => 't',
            DescriptorRangeType::Uav => 'u',
            DescriptorRangeType::Cbv => 'b',
            DescriptorRangeType::Sampler => 's',
        }
    }
}

word_enum! {
    pub enum ShaderVisibility {
        All = 0 => "SHADER_VISIBILITY_ALL",
        Vertex = 1 => "SHADER_VISIBILITY_VERTEX",
        Hull = 2 => "SHADER_VISIBILITY_HULL",
        Domain = 3 => "SHADER_VISIBILITY_DOMAIN",
        Geometry = 4 => "SHADER_VISIBILITY_GEOMETRY",
        Pixel = 5 => "SHADER_VISIBILITY_PIXEL",
        Amplification = 6 => "SHADER_VISIBILITY_AMPLIFICATION",
        Mesh = 7 => "SHADER_VISIBILITY_MESH",
    }
}

impl Default for ShaderVisibility {
    fn default() -> Self {
        ShaderVisibility::All
    }
}

word_enum! {
    pub enum ComparisonFunc {
        Never = 1 => "COMPARISON_NEVER",
        Less = 2 => "COMPARISON_LESS",
        Equal = 3 => "COMPARISON_EQUAL",
        LessEqual = 4 => "COMPARISON_LESS_EQUAL",
        Greater = 5 => "COMPARISON_GREATER",
        NotEqual = 6 => "COMPARISON_NOT_EQUAL",
        GreaterEqual = 7 => "COMPARISON_GREATER_EQUAL",
        Always = 8 => "COMPARISON_ALWAYS",
    }
}

word_enum! {
    pub enum Filter {
        MinMagMipPoint = 0x0 => "FILTER_MIN_MAG_MIP_POINT",
        MinMagPointMipLinear = 0x1 => "FILTER_MIN_MAG_POINT_MIP_LINEAR",
        MinPointMagLinearMipPoint = 0x4 => "FILTER_MIN_POINT_MAG_LINEAR_MIP_POINT",
        MinPointMagMipLinear = 0x5 => "FILTER_MIN_POINT_MAG_MIP_LINEAR",
        MinLinearMagMipPoint = 0x10 => "FILTER_MIN_LINEAR_MAG_MIP_POINT",
        MinLinearMagPointMipLinear = 0x11 => "FILTER_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
        MinMagLinearMipPoint = 0x14 => "FILTER_MIN_MAG_LINEAR_MIP_POINT",
        MinMagMipLinear = 0x15 => "FILTER_MIN_MAG_MIP_LINEAR",
        Anisotropic = 0x55 => "FILTER_ANISOTROPIC",
        ComparisonMinMagMipPoint = 0x80 => "FILTER_COMPARISON_MIN_MAG_MIP_POINT",
        ComparisonMinMagPointMipLinear = 0x81 => "FILTER_COMPARISON_MIN_MAG_POINT_MIP_LINEAR",
        ComparisonMinPointMagLinearMipPoint = 0x84 => "FILTER_COMPARISON_MIN_POINT_MAG_LINEAR_MIP_POINT",
        ComparisonMinPointMagMipLinear = 0x85 => "FILTER_COMPARISON_MIN_POINT_MAG_MIP_LINEAR",
        ComparisonMinLinearMagMipPoint = 0x90 => "FILTER_COMPARISON_MIN_LINEAR_MAG_MIP_POINT",
        ComparisonMinLinearMagPointMipLinear = 0x91 => "FILTER_COMPARISON_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
        ComparisonMinMagLinearMipPoint = 0x94 => "FILTER_COMPARISON_MIN_MAG_LINEAR_MIP_POINT",
        ComparisonMinMagMipLinear = 0x95 => "FILTER_COMPARISON_MIN_MAG_MIP_LINEAR",
        ComparisonAnisotropic = 0xd5 => "FILTER_COMPARISON_ANISOTROPIC",
        MinimumMinMagMipPoint = 0x100 => "FILTER_MINIMUM_MIN_MAG_MIP_POINT",
        MinimumMinMagPointMipLinear = 0x101 => "FILTER_MINIMUM_MIN_MAG_POINT_MIP_LINEAR",
        MinimumMinPointMagLinearMipPoint = 0x104 => "FILTER_MINIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT",
        MinimumMinPointMagMipLinear = 0x105 => "FILTER_MINIMUM_MIN_POINT_MAG_MIP_LINEAR",
        MinimumMinLinearMagMipPoint = 0x110 => "FILTER_MINIMUM_MIN_LINEAR_MAG_MIP_POINT",
        MinimumMinLinearMagPointMipLinear = 0x111 => "FILTER_MINIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
        MinimumMinMagLinearMipPoint = 0x114 => "FILTER_MINIMUM_MIN_MAG_LINEAR_MIP_POINT",
        MinimumMinMagMipLinear = 0x115 => "FILTER_MINIMUM_MIN_MAG_MIP_LINEAR",
        MinimumAnisotropic = 0x155 => "FILTER_MINIMUM_ANISOTROPIC",
        MaximumMinMagMipPoint = 0x180 => "FILTER_MAXIMUM_MIN_MAG_MIP_POINT",
        MaximumMinMagPointMipLinear = 0x181 => "FILTER_MAXIMUM_MIN_MAG_POINT_MIP_LINEAR",
        MaximumMinPointMagLinearMipPoint = 0x184 => "FILTER_MAXIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT",
        MaximumMinPointMagMipLinear = 0x185 => "FILTER_MAXIMUM_MIN_POINT_MAG_MIP_LINEAR",
        MaximumMinLinearMagMipPoint = 0x190 => "FILTER_MAXIMUM_MIN_LINEAR_MAG_MIP_POINT",
        MaximumMinLinearMagPointMipLinear = 0x191 => "FILTER_MAXIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
        MaximumMinMagLinearMipPoint = 0x194 => "FILTER_MAXIMUM_MIN_MAG_LINEAR_MIP_POINT",
        MaximumMinMagMipLinear = 0x195 => "FILTER_MAXIMUM_MIN_MAG_MIP_LINEAR",
        MaximumAnisotropic = 0x1d5 => "FILTER_MAXIMUM_ANISOTROPIC",
    }
}

word_enum! {
    pub enum StaticBorderColor {
        TransparentBlack = 0 => "STATIC_BORDER_COLOR_TRANSPARENT_BLACK",
        OpaqueBlack = 1 => "STATIC_BORDER_COLOR_OPAQUE_BLACK",
        OpaqueWhite = 2 => "STATIC_BORDER_COLOR_OPAQUE_WHITE",
        OpaqueBlackUint = 3 => "STATIC_BORDER_COLOR_OPAQUE_BLACK_UINT",
        OpaqueWhiteUint = 4 => "STATIC_BORDER_COLOR_OPAQUE_WHITE_UINT",
    }
}

word_enum! {
    pub enum TextureAddressMode {
        Wrap = 1 => "TEXTURE_ADDRESS_WRAP",
        Mirror = 2 => "TEXTURE_ADDRESS_MIRROR",
        Clamp = 3 => "TEXTURE_ADDRESS_CLAMP",
        Border = 4 => "TEXTURE_ADDRESS_BORDER",
        MirrorOnce = 5 => "TEXTURE_ADDRESS_MIRROR_ONCE",
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct RootSignatureFlags: u32 {
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 0x1;
        const DENY_VERTEX_SHADER_ROOT_ACCESS = 0x2;
        const DENY_HULL_SHADER_ROOT_ACCESS = 0x4;
        const DENY_DOMAIN_SHADER_ROOT_ACCESS = 0x8;
        const DENY_GEOMETRY_SHADER_ROOT_ACCESS = 0x10;
        const DENY_PIXEL_SHADER_ROOT_ACCESS = 0x20;
        const ALLOW_STREAM_OUTPUT = 0x40;
        const LOCAL_ROOT_SIGNATURE = 0x80;
        const DENY_AMPLIFICATION_SHADER_ROOT_ACCESS = 0x100;
        const DENY_MESH_SHADER_ROOT_ACCESS = 0x200;
        const CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED = 0x400;
        const SAMPLER_HEAP_DIRECTLY_INDEXED = 0x800;
        const ALLOW_LOW_TIER_RESERVED_HW_CB_LIMIT = 0x8000_0000;
    }
}

impl RootSignatureFlags {
    /// Flags a root signature of `version` may carry.
    pub fn valid_for(version: RootSignatureVersion) -> Self {
        match version {
            RootSignatureVersion::V1_0 => {
                Self::all()
                    - Self::CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED
                    - Self::SAMPLER_HEAP_DIRECTLY_INDEXED
            }
            RootSignatureVersion::V1_1 => Self::all(),
        }
    }
}

bitflags! {
    /// Flags on inline root descriptors (root signature 1.1 only).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct RootDescriptorFlags: u32 {
        const DATA_VOLATILE = 0x2;
        const DATA_STATIC_WHILE_SET_AT_EXECUTE = 0x4;
        const DATA_STATIC = 0x8;
    }
}

bitflags! {
    /// Flags on descriptor ranges (root signature 1.1 only).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DescriptorRangeFlags: u32 {
        const DESCRIPTORS_VOLATILE = 0x1;
        const DATA_VOLATILE = 0x2;
        const DATA_STATIC_WHILE_SET_AT_EXECUTE = 0x4;
        const DATA_STATIC = 0x8;
        const DESCRIPTORS_STATIC_KEEPING_BUFFER_BOUNDS_CHECKS = 0x10000;
    }
}

impl DescriptorRangeFlags {
    /// The only flags a sampler range accepts.
    pub const VALID_SAMPLER_FLAGS: Self = Self::DESCRIPTORS_VOLATILE;

    /// The mutually exclusive data-volatility flags.
    pub const DATA_FLAGS: Self = Self::DATA_VOLATILE
        .union(Self::DATA_STATIC_WHILE_SET_AT_EXECUTE)
        .union(Self::DATA_STATIC);
}

/// Renders a flag set as `A | B`, or `0` when empty.
pub(crate) fn flag_names<F>(names: impl Iterator<Item = (&'static str, F)>) -> String {
    let names: Vec<&str> = names.map(|(name, _)| name).collect();
    if names.is_empty() {
        "0".to_owned()
    } else {
        names.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_masks_match_container_constants() {
        assert_eq!(RootSignatureFlags::all().bits(), 0x8000_0fff);
        assert_eq!(RootDescriptorFlags::all().bits(), 0xe);
        assert_eq!(DescriptorRangeFlags::all().bits(), 0x1000f);
        assert_eq!(
            RootSignatureFlags::valid_for(RootSignatureVersion::V1_0).bits(),
            0x8000_03ff
        );
    }

    #[test]
    fn enums_round_trip_through_words() {
        for &filter in Filter::ALL {
            assert_eq!(Filter::from_u32(filter.to_u32()), Some(filter));
        }
        for &vis in ShaderVisibility::ALL {
            assert_eq!(ShaderVisibility::from_u32(vis.to_u32()), Some(vis));
        }
        assert_eq!(Filter::from_u32(0x2), None);
        assert_eq!(TextureAddressMode::from_u32(0), None);
        assert_eq!(RootSignatureVersion::from_u32(3), None);
    }
}
