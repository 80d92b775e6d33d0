//! AAC-LC decoder config.
//!
//! IAMF wraps a fixed-shape MPEG-4 `DecoderConfigDescriptor` whose
//! `DecoderSpecificInfo` carries the AudioSpecificConfig. Only the AAC-LC
//! object type with the 1024-sample GASpecificConfig is representable.

use iamf_core::{BitWriter, Error, Result};

/// MPEG-4 sampling frequency index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleFrequencyIndex {
    Rate96000 = 0,
    Rate88200 = 1,
    Rate64000 = 2,
    Rate48000 = 3,
    Rate44100 = 4,
    Rate32000 = 5,
    Rate24000 = 6,
    Rate22050 = 7,
    Rate16000 = 8,
    Rate12000 = 9,
    Rate11025 = 10,
    Rate8000 = 11,
    Rate7350 = 12,
    ReservedA = 13,
    ReservedB = 14,
    /// The rate is carried explicitly in 24 bits.
    Escape = 15,
}

impl SampleFrequencyIndex {
    /// Get the sample rate for this index, `None` for escape/reserved.
    pub fn to_sample_rate(self) -> Option<u32> {
        match self {
            SampleFrequencyIndex::Rate96000 => Some(96000),
            SampleFrequencyIndex::Rate88200 => Some(88200),
            SampleFrequencyIndex::Rate64000 => Some(64000),
            SampleFrequencyIndex::Rate48000 => Some(48000),
            SampleFrequencyIndex::Rate44100 => Some(44100),
            SampleFrequencyIndex::Rate32000 => Some(32000),
            SampleFrequencyIndex::Rate24000 => Some(24000),
            SampleFrequencyIndex::Rate22050 => Some(22050),
            SampleFrequencyIndex::Rate16000 => Some(16000),
            SampleFrequencyIndex::Rate12000 => Some(12000),
            SampleFrequencyIndex::Rate11025 => Some(11025),
            SampleFrequencyIndex::Rate8000 => Some(8000),
            SampleFrequencyIndex::Rate7350 => Some(7350),
            _ => None,
        }
    }
}

/// MPEG-4 AudioSpecificConfig restricted to the AAC-LC shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub sample_frequency_index: SampleFrequencyIndex,
    /// Explicit rate, required iff the index is [`SampleFrequencyIndex::Escape`].
    pub sampling_frequency: Option<u32>,
    /// MPEG-4 channel configuration (1 = mono, 2 = stereo).
    pub channel_configuration: u8,
}

impl AudioSpecificConfig {
    /// AAC-LC audio object type.
    pub const AUDIO_OBJECT_TYPE: u8 = 2;

    /// The sample rate this config decodes at.
    pub fn sample_rate(&self) -> Result<u32> {
        match self.sample_frequency_index.to_sample_rate() {
            Some(rate) => Ok(rate),
            None => self.sampling_frequency.ok_or_else(|| {
                Error::invalid_argument(
                    "escape sampling_frequency_index without an explicit rate".to_string(),
                )
            }),
        }
    }

    fn validate(&self) -> Result<()> {
        match self.sample_frequency_index {
            SampleFrequencyIndex::ReservedA | SampleFrequencyIndex::ReservedB => {
                return Err(Error::invalid_argument(format!(
                    "reserved sampling_frequency_index {:?}",
                    self.sample_frequency_index
                )))
            }
            SampleFrequencyIndex::Escape => {
                if self.sampling_frequency.is_none() {
                    return Err(Error::invalid_argument(
                        "escape sampling_frequency_index without an explicit rate".to_string(),
                    ));
                }
            }
            _ => {
                if self.sampling_frequency.is_some() {
                    return Err(Error::invalid_argument(
                        "explicit sampling_frequency with a non-escape index".to_string(),
                    ));
                }
            }
        }
        if self.channel_configuration == 0 || self.channel_configuration > 7 {
            return Err(Error::invalid_argument(format!(
                "channel_configuration must be in [1, 7], got {}",
                self.channel_configuration
            )));
        }
        Ok(())
    }

    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_unsigned(Self::AUDIO_OBJECT_TYPE as u32, 5)?;
        writer.write_unsigned(self.sample_frequency_index as u32, 4)?;
        if let Some(rate) = self.sampling_frequency {
            writer.write_unsigned(rate, 24)?;
        }
        writer.write_unsigned(self.channel_configuration as u32, 4)?;
        // GASpecificConfig: frame_length_flag, depends_on_core_coder,
        // extension_flag. IAMF requires the 1024-sample frame length.
        writer.write_unsigned(0, 1)?;
        writer.write_unsigned(0, 1)?;
        writer.write_unsigned(0, 1)
    }
}

/// The `decoder_config` payload for `mp4a` streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacDecoderConfig {
    /// 24-bit decoder buffer size.
    pub buffer_size_db: u32,
    pub max_bitrate: u32,
    pub average_bitrate: u32,
    pub audio_specific_config: AudioSpecificConfig,
}

impl AacDecoderConfig {
    const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
    const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
    const OBJECT_TYPE_INDICATION: u8 = 0x40;
    const STREAM_TYPE: u8 = 0x05;

    /// AAC output is measured at 16 bits.
    pub const BIT_DEPTH: u8 = 16;

    /// The sample rate the stream decodes at.
    pub fn sample_rate(&self) -> Result<u32> {
        self.audio_specific_config.sample_rate()
    }

    /// Validate and serialize.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        if self.buffer_size_db >= (1 << 24) {
            return Err(Error::invalid_argument(format!(
                "buffer_size_db {} does not fit in 24 bits",
                self.buffer_size_db
            )));
        }
        writer.write_unsigned(Self::DECODER_CONFIG_DESCRIPTOR_TAG as u32, 8)?;
        writer.write_unsigned(Self::OBJECT_TYPE_INDICATION as u32, 8)?;
        writer.write_unsigned(Self::STREAM_TYPE as u32, 6)?;
        // upstream, then a reserved bit that must be set.
        writer.write_unsigned(0, 1)?;
        writer.write_unsigned(1, 1)?;
        writer.write_unsigned(self.buffer_size_db, 24)?;
        writer.write_unsigned(self.max_bitrate, 32)?;
        writer.write_unsigned(self.average_bitrate, 32)?;
        writer.write_unsigned(Self::DECODER_SPECIFIC_INFO_TAG as u32, 8)?;
        self.audio_specific_config.validate_and_write(writer)
    }
}
