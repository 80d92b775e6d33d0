//! Parameter definitions.
//!
//! A parameter definition lives inside a descriptor OBU (audio element or
//! mix presentation) and declares the id, rate and subblock structure of a
//! parameter stream, plus a type-specific default payload.

use iamf_core::{BitWriter, DecodedUleb128, Error, Result};

use crate::demixing::DefaultDemixingInfo;

/// Discriminates the parameter definition payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamDefinitionType {
    MixGain,
    Demixing,
    ReconGain,
    /// Reserved types, carried with an extension payload.
    Reserved(DecodedUleb128),
}

/// First reserved parameter definition type value.
pub const PARAM_DEFINITION_TYPE_RESERVED_START: DecodedUleb128 = 3;

impl ParamDefinitionType {
    /// The `leb128()` value this type serializes as.
    pub fn as_uleb128(self) -> DecodedUleb128 {
        match self {
            ParamDefinitionType::MixGain => 0,
            ParamDefinitionType::Demixing => 1,
            ParamDefinitionType::ReconGain => 2,
            ParamDefinitionType::Reserved(value) => value,
        }
    }
}

/// Fields common to every parameter definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDefinition {
    pub parameter_id: DecodedUleb128,
    /// Ticks per second of the parameter stream. Must be positive.
    pub parameter_rate: DecodedUleb128,
    /// When set, each parameter block carries its own subblock structure.
    pub param_definition_mode: bool,
    pub reserved: u8,
    /// Total duration in ticks. Present iff `param_definition_mode` is clear.
    pub duration: DecodedUleb128,
    /// Duration shared by every subblock; 0 selects explicit durations.
    pub constant_subblock_duration: DecodedUleb128,
    /// Explicit subblock durations, used iff `constant_subblock_duration` is 0.
    pub subblock_durations: Vec<DecodedUleb128>,
}

impl ParamDefinition {
    /// Check the documented invariants.
    pub fn validate(&self) -> Result<()> {
        if self.parameter_rate == 0 {
            return Err(Error::invalid_argument(format!(
                "parameter_rate must be positive for parameter_id {}",
                self.parameter_id
            )));
        }
        if self.param_definition_mode {
            return Ok(());
        }
        if self.duration == 0 {
            return Err(Error::invalid_argument(format!(
                "duration must be positive for parameter_id {}",
                self.parameter_id
            )));
        }
        if self.constant_subblock_duration == 0 {
            let total: u64 = self.subblock_durations.iter().map(|&d| d as u64).sum();
            if total != self.duration as u64 {
                return Err(Error::invalid_argument(format!(
                    "subblock durations sum to {total}, expected duration {}",
                    self.duration
                )));
            }
            if self.subblock_durations.iter().any(|&d| d == 0) {
                return Err(Error::invalid_argument(
                    "subblock durations must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The number of subblocks each parameter block of this stream carries.
    pub fn num_subblocks(&self) -> usize {
        if self.constant_subblock_duration != 0 {
            self.duration.div_ceil(self.constant_subblock_duration) as usize
        } else {
            self.subblock_durations.len()
        }
    }

    /// Validate and serialize the common fields.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_uleb128(self.parameter_id)?;
        writer.write_uleb128(self.parameter_rate)?;
        writer.write_unsigned(self.param_definition_mode as u32, 1)?;
        writer.write_unsigned(self.reserved as u32, 7)?;
        if !self.param_definition_mode {
            writer.write_uleb128(self.duration)?;
            writer.write_uleb128(self.constant_subblock_duration)?;
            if self.constant_subblock_duration == 0 {
                writer.write_uleb128(self.subblock_durations.len() as DecodedUleb128)?;
                for &duration in &self.subblock_durations {
                    writer.write_uleb128(duration)?;
                }
            }
        }
        Ok(())
    }
}

/// Mix gain: the common fields plus the gain applied when the stream is
/// absent, in Q7.8 dB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixGainParamDefinition {
    pub base: ParamDefinition,
    pub default_mix_gain: i16,
}

impl MixGainParamDefinition {
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.base.validate_and_write(writer)?;
        writer.write_signed16(self.default_mix_gain)
    }
}

/// Demixing: the common fields plus the default down-mix selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemixingParamDefinition {
    pub base: ParamDefinition,
    pub default_demixing_info: DefaultDemixingInfo,
}

impl DemixingParamDefinition {
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.base.validate_and_write(writer)?;
        self.default_demixing_info.validate_and_write(writer)
    }
}

/// Recon gain: only the common fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconGainParamDefinition {
    pub base: ParamDefinition,
}

impl ReconGainParamDefinition {
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.base.validate_and_write(writer)
    }
}

/// A reserved parameter definition carried as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedParamDefinition {
    pub param_definition_type: DecodedUleb128,
    pub param_definition_bytes: Vec<u8>,
}

impl ExtendedParamDefinition {
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        if self.param_definition_type < PARAM_DEFINITION_TYPE_RESERVED_START {
            return Err(Error::invalid_argument(format!(
                "extended parameter definitions require a reserved type, got {}",
                self.param_definition_type
            )));
        }
        writer.write_uleb128(self.param_definition_bytes.len() as DecodedUleb128)?;
        writer.write_bytes(&self.param_definition_bytes)
    }
}

/// A parameter definition tagged by its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamDefinitionVariant {
    MixGain(MixGainParamDefinition),
    Demixing(DemixingParamDefinition),
    ReconGain(ReconGainParamDefinition),
    Extended(ExtendedParamDefinition),
}

impl ParamDefinitionVariant {
    /// The discriminating type tag.
    pub fn param_definition_type(&self) -> ParamDefinitionType {
        match self {
            ParamDefinitionVariant::MixGain(_) => ParamDefinitionType::MixGain,
            ParamDefinitionVariant::Demixing(_) => ParamDefinitionType::Demixing,
            ParamDefinitionVariant::ReconGain(_) => ParamDefinitionType::ReconGain,
            ParamDefinitionVariant::Extended(extended) => {
                ParamDefinitionType::Reserved(extended.param_definition_type)
            }
        }
    }

    /// The common fields, when this variant has them.
    pub fn base(&self) -> Option<&ParamDefinition> {
        match self {
            ParamDefinitionVariant::MixGain(p) => Some(&p.base),
            ParamDefinitionVariant::Demixing(p) => Some(&p.base),
            ParamDefinitionVariant::ReconGain(p) => Some(&p.base),
            ParamDefinitionVariant::Extended(_) => None,
        }
    }

    /// Serialize the type tag and the per-type payload.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_uleb128(self.param_definition_type().as_uleb128())?;
        match self {
            ParamDefinitionVariant::MixGain(p) => p.validate_and_write(writer),
            ParamDefinitionVariant::Demixing(p) => p.validate_and_write(writer),
            ParamDefinitionVariant::ReconGain(p) => p.validate_and_write(writer),
            ParamDefinitionVariant::Extended(p) => p.validate_and_write(writer),
        }
    }
}
