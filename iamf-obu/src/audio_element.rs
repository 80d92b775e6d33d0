//! Audio Element OBU.

use std::collections::HashSet;

use iamf_core::{BitWriter, DecodedUleb128, Error, Result};

use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;
use crate::param_definition::{ParamDefinitionType, ParamDefinitionVariant};

/// The 3-bit audio element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioElementType {
    ChannelBased,
    SceneBased,
    /// Reserved types 2..=7, carried with an extension config.
    Reserved(u8),
}

impl AudioElementType {
    fn as_u8(self) -> u8 {
        match self {
            AudioElementType::ChannelBased => 0,
            AudioElementType::SceneBased => 1,
            AudioElementType::Reserved(value) => value,
        }
    }
}

/// The 4-bit loudspeaker layout of one channel audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoudspeakerLayout {
    Mono = 0,
    Stereo = 1,
    Layout5_1 = 2,
    Layout5_1_2 = 3,
    Layout5_1_4 = 4,
    Layout7_1 = 5,
    Layout7_1_2 = 6,
    Layout7_1_4 = 7,
    Layout3_1_2 = 8,
    Binaural = 9,
}

impl LoudspeakerLayout {
    /// Total channel count of the layout.
    pub fn num_channels(self) -> usize {
        match self {
            LoudspeakerLayout::Mono => 1,
            LoudspeakerLayout::Stereo | LoudspeakerLayout::Binaural => 2,
            LoudspeakerLayout::Layout5_1 => 6,
            LoudspeakerLayout::Layout5_1_2 => 8,
            LoudspeakerLayout::Layout5_1_4 => 10,
            LoudspeakerLayout::Layout7_1 => 8,
            LoudspeakerLayout::Layout7_1_2 => 10,
            LoudspeakerLayout::Layout7_1_4 => 12,
            LoudspeakerLayout::Layout3_1_2 => 6,
        }
    }
}

impl TryFrom<u8> for LoudspeakerLayout {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => LoudspeakerLayout::Mono,
            1 => LoudspeakerLayout::Stereo,
            2 => LoudspeakerLayout::Layout5_1,
            3 => LoudspeakerLayout::Layout5_1_2,
            4 => LoudspeakerLayout::Layout5_1_4,
            5 => LoudspeakerLayout::Layout7_1,
            6 => LoudspeakerLayout::Layout7_1_2,
            7 => LoudspeakerLayout::Layout7_1_4,
            8 => LoudspeakerLayout::Layout3_1_2,
            9 => LoudspeakerLayout::Binaural,
            other => {
                return Err(Error::invalid_argument(format!(
                    "reserved loudspeaker_layout {other}"
                )))
            }
        })
    }
}

/// One layer of a scalable channel layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAudioLayerConfig {
    pub loudspeaker_layout: LoudspeakerLayout,
    pub output_gain_is_present: bool,
    pub recon_gain_is_present: bool,
    pub reserved_a: u8,
    pub substream_count: u8,
    pub coupled_substream_count: u8,
    /// 6-bit channel mask; meaningful iff `output_gain_is_present`.
    pub output_gain_flags: u8,
    pub reserved_b: u8,
    /// Q7.8 dB; meaningful iff `output_gain_is_present`.
    pub output_gain: i16,
}

impl ChannelAudioLayerConfig {
    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_unsigned(self.loudspeaker_layout as u32, 4)?;
        writer.write_unsigned(self.output_gain_is_present as u32, 1)?;
        writer.write_unsigned(self.recon_gain_is_present as u32, 1)?;
        writer.write_unsigned(self.reserved_a as u32, 2)?;
        writer.write_unsigned(self.substream_count as u32, 8)?;
        writer.write_unsigned(self.coupled_substream_count as u32, 8)?;
        if self.output_gain_is_present {
            writer.write_unsigned(self.output_gain_flags as u32, 6)?;
            writer.write_unsigned(self.reserved_b as u32, 2)?;
            writer.write_signed16(self.output_gain)?;
        }
        Ok(())
    }
}

/// `scalable_channel_layout_config` for channel-based elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalableChannelLayoutConfig {
    pub reserved: u8,
    pub channel_audio_layer_configs: Vec<ChannelAudioLayerConfig>,
}

impl ScalableChannelLayoutConfig {
    /// Check the layer invariants against the element's substream count.
    pub fn validate(&self, num_substreams: DecodedUleb128) -> Result<()> {
        let num_layers = self.channel_audio_layer_configs.len();
        if num_layers == 0 || num_layers > 6 {
            return Err(Error::invalid_argument(format!(
                "num_layers must be in [1, 6], got {num_layers}"
            )));
        }
        let has_binaural = self
            .channel_audio_layer_configs
            .iter()
            .any(|layer| layer.loudspeaker_layout == LoudspeakerLayout::Binaural);
        if has_binaural && num_layers != 1 {
            return Err(Error::invalid_argument(format!(
                "binaural layouts require exactly one layer, got {num_layers}"
            )));
        }
        let total: u32 = self
            .channel_audio_layer_configs
            .iter()
            .map(|layer| layer.substream_count as u32)
            .sum();
        if total != num_substreams {
            return Err(Error::invalid_argument(format!(
                "layer substream counts sum to {total}, expected {num_substreams}"
            )));
        }
        Ok(())
    }

    fn validate_and_write(&self, num_substreams: DecodedUleb128, writer: &mut BitWriter) -> Result<()> {
        self.validate(num_substreams)?;
        writer.write_unsigned(self.channel_audio_layer_configs.len() as u32, 3)?;
        writer.write_unsigned(self.reserved as u32, 5)?;
        for layer in &self.channel_audio_layer_configs {
            layer.validate_and_write(writer)?;
        }
        Ok(())
    }
}

/// Sentinel mapping an Ambisonics Channel Number to no substream.
pub const INACTIVE_AMBISONICS_CHANNEL_NUMBER: u8 = 255;

fn validate_ambisonics_channel_count(output_channel_count: u8) -> Result<()> {
    // (n + 1)^2 for ambisonics order n <= 14.
    let valid = (1..=15u32).any(|n| n * n == output_channel_count as u32);
    if !valid {
        return Err(Error::invalid_argument(format!(
            "ambisonics output_channel_count {output_channel_count} is not a square"
        )));
    }
    Ok(())
}

/// Mono-mode ambisonics: one ACN per substream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbisonicsMonoConfig {
    pub output_channel_count: u8,
    pub substream_count: u8,
    /// One entry per ACN, mapping it to a substream index or 255.
    pub channel_mapping: Vec<u8>,
}

impl AmbisonicsMonoConfig {
    /// Check the mapping invariants against the element's substream count.
    pub fn validate(&self, num_substreams: DecodedUleb128) -> Result<()> {
        validate_ambisonics_channel_count(self.output_channel_count)?;
        if self.substream_count as u32 != num_substreams {
            return Err(Error::invalid_argument(format!(
                "ambisonics substream_count {} disagrees with the element's {num_substreams}",
                self.substream_count
            )));
        }
        if self.channel_mapping.len() != self.output_channel_count as usize {
            return Err(Error::invalid_argument(format!(
                "channel_mapping holds {} entries, expected {}",
                self.channel_mapping.len(),
                self.output_channel_count
            )));
        }
        let mut used = vec![false; self.substream_count as usize];
        for (acn, &substream_index) in self.channel_mapping.iter().enumerate() {
            if substream_index == INACTIVE_AMBISONICS_CHANNEL_NUMBER {
                continue;
            }
            if substream_index >= self.substream_count {
                return Err(Error::invalid_argument(format!(
                    "ACN {acn} maps to substream {substream_index}, out of range for {} substreams",
                    self.substream_count
                )));
            }
            used[substream_index as usize] = true;
        }
        if let Some(unused) = used.iter().position(|&u| !u) {
            return Err(Error::invalid_argument(format!(
                "substream {unused} has no Ambisonics Channel Number mapped to it"
            )));
        }
        Ok(())
    }

    fn validate_and_write(&self, num_substreams: DecodedUleb128, writer: &mut BitWriter) -> Result<()> {
        self.validate(num_substreams)?;
        writer.write_unsigned(self.output_channel_count as u32, 8)?;
        writer.write_unsigned(self.substream_count as u32, 8)?;
        writer.write_bytes(&self.channel_mapping)
    }
}

/// Projection-mode ambisonics: a demixing matrix over the substreams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbisonicsProjectionConfig {
    pub output_channel_count: u8,
    pub substream_count: u8,
    pub coupled_substream_count: u8,
    /// `(substream_count + coupled_substream_count) * output_channel_count`
    /// entries in Q1.14.
    pub demixing_matrix: Vec<i16>,
}

impl AmbisonicsProjectionConfig {
    /// Check the matrix invariants against the element's substream count.
    pub fn validate(&self, num_substreams: DecodedUleb128) -> Result<()> {
        validate_ambisonics_channel_count(self.output_channel_count)?;
        if self.substream_count as u32 != num_substreams {
            return Err(Error::invalid_argument(format!(
                "ambisonics substream_count {} disagrees with the element's {num_substreams}",
                self.substream_count
            )));
        }
        let rows = self.substream_count as usize + self.coupled_substream_count as usize;
        if rows > self.output_channel_count as usize {
            return Err(Error::invalid_argument(format!(
                "substream_count + coupled_substream_count = {rows} exceeds output_channel_count {}",
                self.output_channel_count
            )));
        }
        let expected = rows * self.output_channel_count as usize;
        if self.demixing_matrix.len() != expected {
            return Err(Error::invalid_argument(format!(
                "demixing_matrix holds {} entries, expected {expected}",
                self.demixing_matrix.len()
            )));
        }
        Ok(())
    }

    fn validate_and_write(&self, num_substreams: DecodedUleb128, writer: &mut BitWriter) -> Result<()> {
        self.validate(num_substreams)?;
        writer.write_unsigned(self.output_channel_count as u32, 8)?;
        writer.write_unsigned(self.substream_count as u32, 8)?;
        writer.write_unsigned(self.coupled_substream_count as u32, 8)?;
        for &value in &self.demixing_matrix {
            writer.write_signed16(value)?;
        }
        Ok(())
    }
}

/// `ambisonics_config` for scene-based elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmbisonicsConfig {
    Mono(AmbisonicsMonoConfig),
    Projection(AmbisonicsProjectionConfig),
}

impl AmbisonicsConfig {
    fn mode(&self) -> DecodedUleb128 {
        match self {
            AmbisonicsConfig::Mono(_) => 0,
            AmbisonicsConfig::Projection(_) => 1,
        }
    }

    fn validate_and_write(&self, num_substreams: DecodedUleb128, writer: &mut BitWriter) -> Result<()> {
        writer.write_uleb128(self.mode())?;
        match self {
            AmbisonicsConfig::Mono(config) => config.validate_and_write(num_substreams, writer),
            AmbisonicsConfig::Projection(config) => {
                config.validate_and_write(num_substreams, writer)
            }
        }
    }
}

/// Opaque config for reserved element types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionConfig {
    pub audio_element_config_bytes: Vec<u8>,
}

/// The type-specific tail of the audio element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioElementConfig {
    ScalableChannel(ScalableChannelLayoutConfig),
    Ambisonics(AmbisonicsConfig),
    Extension(ExtensionConfig),
}

/// One entry of `audio_element_params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioElementParam {
    pub param_definition: ParamDefinitionVariant,
}

/// Audio Element OBU.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioElementObu {
    pub header: ObuHeader,
    pub audio_element_id: DecodedUleb128,
    pub audio_element_type: AudioElementType,
    pub reserved: u8,
    pub codec_config_id: DecodedUleb128,
    pub audio_substream_ids: Vec<DecodedUleb128>,
    pub audio_element_params: Vec<AudioElementParam>,
    pub config: AudioElementConfig,
}

impl AudioElementObu {
    /// The demixing parameter definition of this element, if it has one.
    pub fn demixing_param_definition(
        &self,
    ) -> Option<&crate::param_definition::DemixingParamDefinition> {
        self.audio_element_params
            .iter()
            .find_map(|param| match &param.param_definition {
                ParamDefinitionVariant::Demixing(definition) => Some(definition),
                _ => None,
            })
    }

    fn validate(&self) -> Result<()> {
        if self.audio_substream_ids.is_empty() {
            return Err(Error::invalid_argument(format!(
                "audio element {} declares no substreams",
                self.audio_element_id
            )));
        }
        let mut seen = HashSet::new();
        for &id in &self.audio_substream_ids {
            if !seen.insert(id) {
                return Err(Error::invalid_argument(format!(
                    "duplicate substream id {id} in audio element {}",
                    self.audio_element_id
                )));
            }
        }

        let mut seen_types = HashSet::new();
        for param in &self.audio_element_params {
            let param_type = param.param_definition.param_definition_type();
            if param_type == ParamDefinitionType::MixGain {
                return Err(Error::invalid_argument(
                    "mix gain parameter definitions belong to mix presentations".to_string(),
                ));
            }
            if !seen_types.insert(param_type) {
                return Err(Error::invalid_argument(format!(
                    "duplicate {param_type:?} parameter definition in audio element {}",
                    self.audio_element_id
                )));
            }
        }

        match (&self.audio_element_type, &self.config) {
            (AudioElementType::ChannelBased, AudioElementConfig::ScalableChannel(_))
            | (AudioElementType::SceneBased, AudioElementConfig::Ambisonics(_))
            | (AudioElementType::Reserved(_), AudioElementConfig::Extension(_)) => Ok(()),
            _ => Err(Error::invalid_argument(format!(
                "audio_element_type {:?} disagrees with the config variant",
                self.audio_element_type
            ))),
        }
    }
}

impl Obu for AudioElementObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::AudioElement
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        let num_substreams = self.audio_substream_ids.len() as DecodedUleb128;

        writer.write_uleb128(self.audio_element_id)?;
        writer.write_unsigned(self.audio_element_type.as_u8() as u32, 3)?;
        writer.write_unsigned(self.reserved as u32, 5)?;
        writer.write_uleb128(self.codec_config_id)?;
        writer.write_uleb128(num_substreams)?;
        for &substream_id in &self.audio_substream_ids {
            writer.write_uleb128(substream_id)?;
        }
        writer.write_uleb128(self.audio_element_params.len() as DecodedUleb128)?;
        for param in &self.audio_element_params {
            param.param_definition.validate_and_write(writer)?;
        }
        match &self.config {
            AudioElementConfig::ScalableChannel(config) => {
                config.validate_and_write(num_substreams, writer)
            }
            AudioElementConfig::Ambisonics(config) => {
                config.validate_and_write(num_substreams, writer)
            }
            AudioElementConfig::Extension(config) => {
                writer.write_uleb128(config.audio_element_config_bytes.len() as DecodedUleb128)?;
                writer.write_bytes(&config.audio_element_config_bytes)
            }
        }
    }
}
