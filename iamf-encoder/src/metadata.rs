//! The user metadata surface: everything a caller configures, decodable
//! from JSON or any other serde format.

use serde::{Deserialize, Serialize};

use iamf_core::{DecodedUleb128, Error, GenerationMode, LebGenerator, Result};
use iamf_obu::{ArbitraryObu, InsertionHook, ObuHeader, ObuType};

use crate::channels::ChannelLabel;

/// ULEB128 width policy for the whole sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LebGeneratorMode {
    #[default]
    Minimum,
    Fixed,
}

/// `leb_generator.*` options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LebGeneratorMetadata {
    #[serde(default)]
    pub mode: LebGeneratorMode,
    /// Width in bytes when `mode` is `fixed`.
    #[serde(default)]
    pub fixed_size: Option<u8>,
}

impl LebGeneratorMetadata {
    /// Build the generator these options describe.
    pub fn build(&self) -> Result<LebGenerator> {
        match self.mode {
            LebGeneratorMode::Minimum => Ok(LebGenerator::minimum()),
            LebGeneratorMode::Fixed => {
                let size = self.fixed_size.ok_or_else(|| {
                    Error::invalid_argument(
                        "leb_generator.fixed_size is required when mode is fixed".to_string(),
                    )
                })?;
                LebGenerator::new(GenerationMode::FixedSize(size))
            }
        }
    }
}

fn default_bit_depth() -> u8 {
    16
}

/// Per-element audio frame options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioFrameMetadata {
    pub audio_element_id: DecodedUleb128,
    /// Labels to pull from the PCM source, in provider order.
    pub channel_labels: Vec<ChannelLabel>,
    #[serde(default)]
    pub samples_to_trim_at_start: u32,
    #[serde(default)]
    pub samples_to_trim_at_end: u32,
    /// Bit depth of the provided samples within their 32-bit carriers.
    #[serde(default = "default_bit_depth")]
    pub input_bit_depth: u8,
}

/// A parameter block declared without a descriptor definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterBlockMetadata {
    pub parameter_id: DecodedUleb128,
    pub start_timestamp: i64,
    pub duration: u32,
    #[serde(default)]
    pub constant_subblock_duration: u32,
    #[serde(default)]
    pub num_subblocks: u32,
}

/// Where an arbitrary OBU is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionHookMetadata {
    BeforeDescriptors,
    AfterIaSequenceHeader,
    AfterCodecConfigs,
    AfterAudioElements,
    AfterMixPresentations,
    BeforeParameterBlocks,
    AfterParameterBlocks,
    AfterAudioFrames,
}

impl From<InsertionHookMetadata> for InsertionHook {
    fn from(value: InsertionHookMetadata) -> Self {
        match value {
            InsertionHookMetadata::BeforeDescriptors => InsertionHook::BeforeDescriptors,
            InsertionHookMetadata::AfterIaSequenceHeader => InsertionHook::AfterIaSequenceHeader,
            InsertionHookMetadata::AfterCodecConfigs => InsertionHook::AfterCodecConfigs,
            InsertionHookMetadata::AfterAudioElements => InsertionHook::AfterAudioElements,
            InsertionHookMetadata::AfterMixPresentations => InsertionHook::AfterMixPresentations,
            InsertionHookMetadata::BeforeParameterBlocks => InsertionHook::BeforeParameterBlocks,
            InsertionHookMetadata::AfterParameterBlocks => InsertionHook::AfterParameterBlocks,
            InsertionHookMetadata::AfterAudioFrames => InsertionHook::AfterAudioFrames,
        }
    }
}

/// Extra raw bytes injected at a named hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArbitraryObuMetadata {
    /// The 5-bit `obu_type` value to emit under.
    pub obu_type: u8,
    pub payload: Vec<u8>,
    pub insertion_hook: InsertionHookMetadata,
    /// Temporal unit for the timed hooks.
    #[serde(default)]
    pub insertion_tick: Option<i64>,
}

impl ArbitraryObuMetadata {
    /// Build the OBU this metadata describes.
    pub fn build(&self) -> Result<ArbitraryObu> {
        let hook: InsertionHook = self.insertion_hook.into();
        if hook.is_timed() && self.insertion_tick.is_none() {
            return Err(Error::invalid_argument(format!(
                "insertion hook {hook:?} requires an insertion_tick"
            )));
        }
        Ok(ArbitraryObu {
            header: ObuHeader::default(),
            obu_type: ObuType::try_from(self.obu_type)?,
            payload: self.payload.clone(),
            insertion_hook: hook,
            insertion_tick: self.insertion_tick,
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_aac_signaling_mode() -> i32 {
    2
}

fn default_aac_target_bitrate() -> u32 {
    64000
}

/// Knobs handed to the codec adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodecSettingsMetadata {
    /// Feed libopus float samples instead of 16-bit samples.
    #[serde(default = "default_true")]
    pub opus_use_float_api: bool,
    /// Opus target bitrate in bits per second.
    #[serde(default)]
    pub opus_target_bitrate: Option<i32>,
    /// AAC bitrate mode: 0 = CBR, 1..=5 = VBR presets.
    #[serde(default)]
    pub aac_bitrate_mode: i32,
    /// AAC SBR/PS signaling mode.
    #[serde(default = "default_aac_signaling_mode")]
    pub aac_signaling_mode: i32,
    /// AAC CBR target in bits per second.
    #[serde(default = "default_aac_target_bitrate")]
    pub aac_target_bitrate: u32,
}

impl Default for CodecSettingsMetadata {
    fn default() -> Self {
        Self {
            opus_use_float_api: true,
            opus_target_bitrate: None,
            aac_bitrate_mode: 0,
            aac_signaling_mode: 2,
            aac_target_bitrate: 64000,
        }
    }
}

impl CodecSettingsMetadata {
    /// Build the adapter settings these options describe.
    pub fn build(&self) -> iamf_codecs::EncoderSettings {
        iamf_codecs::EncoderSettings {
            opus: iamf_codecs::OpusEncoderSettings {
                application: iamf_codecs::OpusApplication::Audio,
                use_float_api: self.opus_use_float_api,
                target_bitrate: self.opus_target_bitrate,
            },
            aac: iamf_codecs::AacEncoderSettings {
                bitrate_mode: self.aac_bitrate_mode,
                signaling_mode: self.aac_signaling_mode,
                target_bitrate: self.aac_target_bitrate,
            },
        }
    }
}

/// Sequence-wide switches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequencingMetadata {
    /// Emit a temporal delimiter before each temporal unit.
    #[serde(default)]
    pub include_temporal_delimiters: bool,
    /// Re-emit the descriptors, flagged redundant, at end of stream.
    #[serde(default)]
    pub emit_redundant_descriptors_at_end: bool,
}

/// The options recognized by the encoder core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserMetadata {
    #[serde(default)]
    pub leb_generator: LebGeneratorMetadata,
    #[serde(default)]
    pub audio_frame_metadata: Vec<AudioFrameMetadata>,
    #[serde(default)]
    pub parameter_block_metadata: Vec<ParameterBlockMetadata>,
    #[serde(default)]
    pub arbitrary_obu_metadata: Vec<ArbitraryObuMetadata>,
    #[serde(default)]
    pub codec_settings: CodecSettingsMetadata,
    #[serde(default)]
    pub sequencing: SequencingMetadata,
}
