//! Parameter Block OBU.
//!
//! The wire shape of a parameter block depends on the parameter definition
//! it references: the definition's mode decides whether the block carries
//! its own subblock structure, and the definition's type decides the shape
//! of each subblock payload. Callers supply that context as
//! [`PerIdParameterMetadata`], typically looked up in a descriptor map.

use iamf_core::{BitWriter, DecodedUleb128, Error, Result};

use crate::demixing::DemixingInfoParameterData;
use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;
use crate::param_definition::{ParamDefinition, ParamDefinitionType};

/// Mix gain animation over one subblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixGainParameterData {
    /// Constant gain.
    Step { start_point_value: i16 },
    /// Linear ramp between two gains.
    Linear { start_point_value: i16, end_point_value: i16 },
    /// Quadratic Bézier ramp.
    Bezier {
        start_point_value: i16,
        end_point_value: i16,
        control_point_value: i16,
        /// Q0.8 position of the control point in the subblock.
        control_point_relative_time: u8,
    },
}

impl MixGainParameterData {
    fn animation_type(&self) -> DecodedUleb128 {
        match self {
            MixGainParameterData::Step { .. } => 0,
            MixGainParameterData::Linear { .. } => 1,
            MixGainParameterData::Bezier { .. } => 2,
        }
    }

    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_uleb128(self.animation_type())?;
        match *self {
            MixGainParameterData::Step { start_point_value } => {
                writer.write_signed16(start_point_value)
            }
            MixGainParameterData::Linear {
                start_point_value,
                end_point_value,
            } => {
                writer.write_signed16(start_point_value)?;
                writer.write_signed16(end_point_value)
            }
            MixGainParameterData::Bezier {
                start_point_value,
                end_point_value,
                control_point_value,
                control_point_relative_time,
            } => {
                writer.write_signed16(start_point_value)?;
                writer.write_signed16(end_point_value)?;
                writer.write_signed16(control_point_value)?;
                writer.write_unsigned(control_point_relative_time as u32, 8)
            }
        }
    }
}

/// Recon gains for one channel audio layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconGainElement {
    /// Bitmask of channels carrying a gain.
    pub recon_gain_flag: DecodedUleb128,
    /// One gain per set bit, in bit order.
    pub recon_gain: Vec<u8>,
}

/// Recon gain payload: one element per layer with recon gain present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconGainInfoParameterData {
    pub recon_gain_elements: Vec<ReconGainElement>,
}

impl ReconGainInfoParameterData {
    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        for element in &self.recon_gain_elements {
            if element.recon_gain_flag.count_ones() as usize != element.recon_gain.len() {
                return Err(Error::invalid_argument(format!(
                    "recon_gain_flag {:#x} expects {} gains, got {}",
                    element.recon_gain_flag,
                    element.recon_gain_flag.count_ones(),
                    element.recon_gain.len()
                )));
            }
            writer.write_uleb128(element.recon_gain_flag)?;
            writer.write_bytes(&element.recon_gain)?;
        }
        Ok(())
    }
}

/// The per-subblock payload, discriminated by the definition's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterData {
    MixGain(MixGainParameterData),
    Demixing(DemixingInfoParameterData),
    ReconGain(ReconGainInfoParameterData),
    /// Reserved types: size-prefixed opaque bytes.
    Extension(Vec<u8>),
}

impl ParameterData {
    fn matches(&self, param_definition_type: ParamDefinitionType) -> bool {
        matches!(
            (self, param_definition_type),
            (ParameterData::MixGain(_), ParamDefinitionType::MixGain)
                | (ParameterData::Demixing(_), ParamDefinitionType::Demixing)
                | (ParameterData::ReconGain(_), ParamDefinitionType::ReconGain)
                | (ParameterData::Extension(_), ParamDefinitionType::Reserved(_))
        )
    }

    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        match self {
            ParameterData::MixGain(data) => data.validate_and_write(writer),
            ParameterData::Demixing(data) => data.validate_and_write(writer),
            ParameterData::ReconGain(data) => data.validate_and_write(writer),
            ParameterData::Extension(bytes) => {
                writer.write_uleb128(bytes.len() as DecodedUleb128)?;
                writer.write_bytes(bytes)
            }
        }
    }
}

/// One subblock of a parameter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSubblock {
    /// Explicit duration; required iff the block carries its own structure
    /// with `constant_subblock_duration == 0`.
    pub subblock_duration: Option<DecodedUleb128>,
    pub param_data: ParameterData,
}

/// The definition context a parameter block serializes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerIdParameterMetadata {
    pub param_definition_type: ParamDefinitionType,
    pub param_definition: ParamDefinition,
}

/// Parameter Block OBU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBlockObu {
    pub header: ObuHeader,
    pub parameter_id: DecodedUleb128,
    /// Used iff the definition's mode is 1.
    pub duration: DecodedUleb128,
    /// Used iff the definition's mode is 1.
    pub constant_subblock_duration: DecodedUleb128,
    pub subblocks: Vec<ParameterSubblock>,
    metadata: PerIdParameterMetadata,
}

impl ParameterBlockObu {
    /// Create a parameter block bound to its definition metadata.
    pub fn new(
        header: ObuHeader,
        parameter_id: DecodedUleb128,
        metadata: PerIdParameterMetadata,
    ) -> Self {
        let (duration, constant_subblock_duration) = if metadata.param_definition.param_definition_mode
        {
            (0, 0)
        } else {
            (
                metadata.param_definition.duration,
                metadata.param_definition.constant_subblock_duration,
            )
        };
        Self {
            header,
            parameter_id,
            duration,
            constant_subblock_duration,
            subblocks: Vec::new(),
            metadata,
        }
    }

    /// The definition metadata this block serializes under.
    pub fn metadata(&self) -> &PerIdParameterMetadata {
        &self.metadata
    }

    fn validate(&self) -> Result<()> {
        if self.subblocks.is_empty() {
            return Err(Error::invalid_argument(format!(
                "parameter block {} has no subblocks",
                self.parameter_id
            )));
        }
        for subblock in &self.subblocks {
            if !subblock
                .param_data
                .matches(self.metadata.param_definition_type)
            {
                return Err(Error::invalid_argument(format!(
                    "subblock payload disagrees with definition type {:?}",
                    self.metadata.param_definition_type
                )));
            }
        }

        let definition = &self.metadata.param_definition;
        if definition.param_definition_mode {
            if self.duration == 0 {
                return Err(Error::invalid_argument(format!(
                    "duration must be positive for parameter block {}",
                    self.parameter_id
                )));
            }
            if self.constant_subblock_duration == 0 {
                let mut total: u64 = 0;
                for subblock in &self.subblocks {
                    let duration = subblock.subblock_duration.ok_or_else(|| {
                        Error::invalid_argument(
                            "explicit subblock durations are required when \
                             constant_subblock_duration is 0"
                                .to_string(),
                        )
                    })?;
                    total += duration as u64;
                }
                if total != self.duration as u64 {
                    return Err(Error::invalid_argument(format!(
                        "subblock durations sum to {total}, expected {}",
                        self.duration
                    )));
                }
            }
        } else {
            let expected = definition.num_subblocks();
            if self.subblocks.len() != expected {
                return Err(Error::invalid_argument(format!(
                    "parameter block {} carries {} subblocks, definition expects {expected}",
                    self.parameter_id,
                    self.subblocks.len()
                )));
            }
        }
        Ok(())
    }
}

impl Obu for ParameterBlockObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::ParameterBlock
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_uleb128(self.parameter_id)?;

        let mode = self.metadata.param_definition.param_definition_mode;
        let explicit_durations = mode && self.constant_subblock_duration == 0;
        if mode {
            writer.write_uleb128(self.duration)?;
            writer.write_uleb128(self.constant_subblock_duration)?;
            if explicit_durations {
                writer.write_uleb128(self.subblocks.len() as DecodedUleb128)?;
            }
        }
        for subblock in &self.subblocks {
            if explicit_durations {
                // Presence was validated above.
                writer.write_uleb128(subblock.subblock_duration.unwrap_or_default())?;
            }
            subblock.param_data.validate_and_write(writer)?;
        }
        Ok(())
    }
}
