use thiserror::Error;

use crate::types::{
    ComparisonFunc, DescriptorRangeFlags, DescriptorRangeType, Filter, RootDescriptorFlags,
    RootParameterType, RootSignatureFlags, RootSignatureVersion, ShaderVisibility,
    StaticBorderColor, TextureAddressMode,
};

/// `offset` value meaning "immediately after the previous range".
pub const DESCRIPTOR_RANGE_OFFSET_APPEND: u32 = 0xffff_ffff;
/// First register space reserved for system use.
pub const SYSTEM_RESERVED_REGISTER_SPACE_START: u32 = 0xffff_fff0;
pub const MIP_LOD_BIAS_MIN: f32 = -16.0;
pub const MIP_LOD_BIAS_MAX: f32 = 15.99;
pub const MAX_ANISOTROPY: u32 = 16;

/// In-memory root signature.
///
/// Sub-tables are owned by value; descriptor tables reference their ranges by index into
/// [`RootSignatureDesc::descriptor_ranges`]. Word offsets only exist in the serialized form.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignatureDesc {
    pub version: RootSignatureVersion,
    pub flags: RootSignatureFlags,
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<StaticSamplerDesc>,
    pub descriptor_ranges: Vec<DescriptorRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootParameter {
    pub visibility: ShaderVisibility,
    pub kind: RootParameterKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParameterKind {
    Constants32Bit(RootConstants),
    Descriptor(RootDescriptor),
    DescriptorTable(DescriptorTable),
}

impl RootParameterKind {
    pub fn parameter_type(&self) -> RootParameterType {
        match self {
            RootParameterKind::Constants32Bit(_) => RootParameterType::Constants32Bit,
            RootParameterKind::Descriptor(desc) => desc.kind.parameter_type(),
            RootParameterKind::DescriptorTable(_) => RootParameterType::DescriptorTable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RootConstants {
    pub shader_register: u32,
    pub register_space: u32,
    pub num_32bit_values: u32,
}

/// Which view an inline root descriptor binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootDescriptorKind {
    Cbv,
    Srv,
    Uav,
}

impl RootDescriptorKind {
    pub fn parameter_type(self) -> RootParameterType {
        match self {
            RootDescriptorKind::Cbv => RootParameterType::Cbv,
            RootDescriptorKind::Srv => RootParameterType::Srv,
            RootDescriptorKind::Uav => RootParameterType::Uav,
        }
    }

    pub fn from_parameter_type(ty: RootParameterType) -> Option<Self> {
        match ty {
            RootParameterType::Cbv => Some(RootDescriptorKind::Cbv),
            RootParameterType::Srv => Some(RootDescriptorKind::Srv),
            RootParameterType::Uav => Some(RootDescriptorKind::Uav),
            RootParameterType::DescriptorTable | RootParameterType::Constants32Bit => None,
        }
    }

    pub fn register_prefix(self) -> char {
        match self {
            RootDescriptorKind::Cbv => 'b',
            RootDescriptorKind::Srv => 't',
            RootDescriptorKind::Uav => 'u',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootDescriptor {
    pub kind: RootDescriptorKind,
    pub shader_register: u32,
    pub register_space: u32,
    /// Present exactly when the signature is version 1.1.
    pub flags: Option<RootDescriptorFlags>,
}

/// A contiguous run of `range_count` entries of the signature's range list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorTable {
    pub first_range: u32,
    pub range_count: u32,
}

impl DescriptorTable {
    pub fn range_indices(&self) -> core::ops::Range<usize> {
        let start = self.first_range as usize;
        start..start.saturating_add(self.range_count as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorRangeOffset {
    Append,
    Explicit(u32),
}

impl DescriptorRangeOffset {
    pub fn from_u32(value: u32) -> Self {
        if value == DESCRIPTOR_RANGE_OFFSET_APPEND {
            DescriptorRangeOffset::Append
        } else {
            DescriptorRangeOffset::Explicit(value)
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            DescriptorRangeOffset::Append => DESCRIPTOR_RANGE_OFFSET_APPEND,
            DescriptorRangeOffset::Explicit(value) => value,
        }
    }
}

impl Default for DescriptorRangeOffset {
    fn default() -> Self {
        DescriptorRangeOffset::Append
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub offset: DescriptorRangeOffset,
    /// Must be empty for version 1.0 signatures.
    pub flags: DescriptorRangeFlags,
}

impl DescriptorRange {
    pub fn new(range_type: DescriptorRangeType, base_shader_register: u32) -> Self {
        Self {
            range_type,
            num_descriptors: 1,
            base_shader_register,
            register_space: 0,
            offset: DescriptorRangeOffset::Append,
            flags: DescriptorRangeFlags::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSamplerDesc {
    pub filter: Filter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: ComparisonFunc,
    pub border_color: StaticBorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
    pub shader_register: u32,
    pub register_space: u32,
    pub visibility: ShaderVisibility,
}

impl Default for StaticSamplerDesc {
    fn default() -> Self {
        Self {
            filter: Filter::Anisotropic,
            address_u: TextureAddressMode::Wrap,
            address_v: TextureAddressMode::Wrap,
            address_w: TextureAddressMode::Wrap,
            mip_lod_bias: 0.0,
            max_anisotropy: MAX_ANISOTROPY,
            comparison_func: ComparisonFunc::LessEqual,
            border_color: StaticBorderColor::OpaqueWhite,
            min_lod: 0.0,
            max_lod: f32::MAX,
            shader_register: 0,
            register_space: 0,
            visibility: ShaderVisibility::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("root flags {flags:#x} are not valid for root signature version {version}")]
    RootFlags { flags: u32, version: &'static str },
    #[error("parameter {parameter}: root descriptor flags {reason}")]
    RootDescriptorFlags {
        parameter: usize,
        reason: &'static str,
    },
    #[error("parameter {parameter}: descriptor table ranges {first}..{end} exceed {available} ranges")]
    TableOutOfBounds {
        parameter: usize,
        first: u32,
        end: u64,
        available: usize,
    },
    #[error("parameter {parameter}: descriptor table mixes sampler and non-sampler ranges")]
    MixedSamplerTable { parameter: usize },
    #[error("descriptor range {range}: flags {flags:#x} {reason}")]
    RangeFlags {
        range: usize,
        flags: u32,
        reason: &'static str,
    },
    #[error("{what}: register space {space:#x} is reserved for system use")]
    ReservedRegisterSpace { what: String, space: u32 },
    #[error("static sampler {sampler}: {reason}")]
    StaticSampler { sampler: usize, reason: String },
}

impl RootSignatureDesc {
    pub fn new(version: RootSignatureVersion) -> Self {
        Self {
            version,
            flags: RootSignatureFlags::empty(),
            parameters: Vec::new(),
            static_samplers: Vec::new(),
            descriptor_ranges: Vec::new(),
        }
    }

    pub fn push_constants(&mut self, visibility: ShaderVisibility, constants: RootConstants) {
        self.parameters.push(RootParameter {
            visibility,
            kind: RootParameterKind::Constants32Bit(constants),
        });
    }

    pub fn push_descriptor(&mut self, visibility: ShaderVisibility, descriptor: RootDescriptor) {
        self.parameters.push(RootParameter {
            visibility,
            kind: RootParameterKind::Descriptor(descriptor),
        });
    }

    /// Appends `ranges` to the range list and adds a table parameter covering exactly them.
    pub fn push_descriptor_table(
        &mut self,
        visibility: ShaderVisibility,
        ranges: impl IntoIterator<Item = DescriptorRange>,
    ) -> DescriptorTable {
        let first_range = self.descriptor_ranges.len() as u32;
        self.descriptor_ranges.extend(ranges);
        let table = DescriptorTable {
            first_range,
            range_count: self.descriptor_ranges.len() as u32 - first_range,
        };
        self.parameters.push(RootParameter {
            visibility,
            kind: RootParameterKind::DescriptorTable(table),
        });
        table
    }

    /// Ranges referenced by `table`, or `None` if it points outside the range list.
    pub fn table_ranges(&self, table: &DescriptorTable) -> Option<&[DescriptorRange]> {
        self.descriptor_ranges.get(table.range_indices())
    }

    /// Checks the per-version and per-field constraints of the signature.
    ///
    /// Every signature accepted here survives a serialize/deserialize round trip unchanged.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let valid_flags = RootSignatureFlags::valid_for(self.version);
        if !valid_flags.contains(self.flags) {
            return Err(ValidationError::RootFlags {
                flags: self.flags.bits(),
                version: self.version.hlsl_name(),
            });
        }

        for (index, param) in self.parameters.iter().enumerate() {
            match &param.kind {
                RootParameterKind::Constants32Bit(constants) => {
                    check_register_space(constants.register_space, || {
                        format!("parameter {index}")
                    })?;
                }
                RootParameterKind::Descriptor(desc) => {
                    check_register_space(desc.register_space, || format!("parameter {index}"))?;
                    self.validate_root_descriptor_flags(index, desc.flags)?;
                }
                RootParameterKind::DescriptorTable(table) => {
                    let end = u64::from(table.first_range) + u64::from(table.range_count);
                    if end > self.descriptor_ranges.len() as u64 {
                        return Err(ValidationError::TableOutOfBounds {
                            parameter: index,
                            first: table.first_range,
                            end,
                            available: self.descriptor_ranges.len(),
                        });
                    }
                    let ranges = &self.descriptor_ranges[table.range_indices()];
                    let samplers = ranges
                        .iter()
                        .filter(|r| r.range_type == DescriptorRangeType::Sampler)
                        .count();
                    if samplers != 0 && samplers != ranges.len() {
                        return Err(ValidationError::MixedSamplerTable { parameter: index });
                    }
                }
            }
        }

        for (index, range) in self.descriptor_ranges.iter().enumerate() {
            check_register_space(range.register_space, || format!("descriptor range {index}"))?;
            self.validate_range_flags(index, range)?;
        }

        for (index, sampler) in self.static_samplers.iter().enumerate() {
            check_register_space(sampler.register_space, || format!("static sampler {index}"))?;
            validate_sampler(index, sampler)?;
        }

        Ok(())
    }

    fn validate_root_descriptor_flags(
        &self,
        parameter: usize,
        flags: Option<RootDescriptorFlags>,
    ) -> Result<(), ValidationError> {
        let reason = match (self.version, flags) {
            (RootSignatureVersion::V1_0, None) => return Ok(()),
            (RootSignatureVersion::V1_0, Some(_)) => "are not allowed in version 1.0",
            (RootSignatureVersion::V1_1, None) => "are required in version 1.1",
            (RootSignatureVersion::V1_1, Some(flags)) => {
                if !RootDescriptorFlags::all().contains(flags) {
                    "contain unknown bits"
                } else if flags.bits().count_ones() > 1 {
                    "combine more than one data flag"
                } else {
                    return Ok(());
                }
            }
        };
        Err(ValidationError::RootDescriptorFlags { parameter, reason })
    }

    fn validate_range_flags(
        &self,
        index: usize,
        range: &DescriptorRange,
    ) -> Result<(), ValidationError> {
        let flags = range.flags;
        let reason = if self.version == RootSignatureVersion::V1_0 {
            (!flags.is_empty()).then_some("are not allowed in version 1.0")
        } else if !DescriptorRangeFlags::all().contains(flags) {
            Some("contain unknown bits")
        } else if range.range_type == DescriptorRangeType::Sampler
            && !DescriptorRangeFlags::VALID_SAMPLER_FLAGS.contains(flags)
        {
            Some("are not valid on a sampler range")
        } else if (flags & DescriptorRangeFlags::DATA_FLAGS).bits().count_ones() > 1 {
            Some("combine more than one data flag")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ValidationError::RangeFlags {
                range: index,
                flags: flags.bits(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

fn check_register_space(
    space: u32,
    what: impl FnOnce() -> String,
) -> Result<(), ValidationError> {
    if space >= SYSTEM_RESERVED_REGISTER_SPACE_START {
        return Err(ValidationError::ReservedRegisterSpace {
            what: what(),
            space,
        });
    }
    Ok(())
}

fn validate_sampler(index: usize, sampler: &StaticSamplerDesc) -> Result<(), ValidationError> {
    let err = |reason: String| ValidationError::StaticSampler {
        sampler: index,
        reason,
    };

    if !(MIP_LOD_BIAS_MIN..=MIP_LOD_BIAS_MAX).contains(&sampler.mip_lod_bias) {
        return Err(err(format!(
            "mip LOD bias {} is outside [{MIP_LOD_BIAS_MIN}, {MIP_LOD_BIAS_MAX}]",
            sampler.mip_lod_bias
        )));
    }
    if sampler.max_anisotropy > MAX_ANISOTROPY {
        return Err(err(format!(
            "max anisotropy {} exceeds {MAX_ANISOTROPY}",
            sampler.max_anisotropy
        )));
    }
    if sampler.min_lod.is_nan() || sampler.max_lod.is_nan() {
        return Err(err("LOD bounds must not be NaN".to_owned()));
    }
    Ok(())
}
