//! Codec Config OBU.

use iamf_core::{BitReader, BitWriter, DecodedUleb128, Error, Result};

use crate::decoder_config::aac::AacDecoderConfig;
use crate::decoder_config::flac::FlacDecoderConfig;
use crate::decoder_config::lpcm::LpcmDecoderConfig;
use crate::decoder_config::opus::OpusDecoderConfig;
use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;

/// The 4-byte codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// `ipcm`
    Lpcm,
    /// `Opus`
    Opus,
    /// `mp4a`
    AacLc,
    /// `fLaC`
    Flac,
}

impl CodecId {
    /// The FourCC bytes written to the bitstream.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            CodecId::Lpcm => *b"ipcm",
            CodecId::Opus => *b"Opus",
            CodecId::AacLc => *b"mp4a",
            CodecId::Flac => *b"fLaC",
        }
    }

    /// Parse a FourCC, rejecting unknown codecs.
    pub fn from_fourcc(fourcc: [u8; 4]) -> Result<Self> {
        match &fourcc {
            b"ipcm" => Ok(CodecId::Lpcm),
            b"Opus" => Ok(CodecId::Opus),
            b"mp4a" => Ok(CodecId::AacLc),
            b"fLaC" => Ok(CodecId::Flac),
            other => Err(Error::invalid_argument(format!(
                "unknown codec_id {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// The codec-specific tail of the codec config payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderConfig {
    Lpcm(LpcmDecoderConfig),
    Opus(OpusDecoderConfig),
    AacLc(AacDecoderConfig),
    Flac(FlacDecoderConfig),
}

impl DecoderConfig {
    fn codec_id(&self) -> CodecId {
        match self {
            DecoderConfig::Lpcm(_) => CodecId::Lpcm,
            DecoderConfig::Opus(_) => CodecId::Opus,
            DecoderConfig::AacLc(_) => CodecId::AacLc,
            DecoderConfig::Flac(_) => CodecId::Flac,
        }
    }
}

/// The codec config fields, without the OBU framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    pub codec_id: CodecId,
    pub num_samples_per_frame: DecodedUleb128,
    pub audio_roll_distance: i16,
    pub decoder_config: DecoderConfig,
}

impl CodecConfig {
    /// The roll distance the codec requires.
    pub fn required_audio_roll_distance(&self) -> Result<i16> {
        match self.codec_id {
            CodecId::Lpcm | CodecId::Flac => Ok(0),
            CodecId::AacLc => Ok(-1),
            CodecId::Opus => {
                if self.num_samples_per_frame == 0 {
                    return Err(Error::invalid_argument(
                        "num_samples_per_frame must be positive".to_string(),
                    ));
                }
                // 80 ms of pre-roll, rounded up to whole frames.
                Ok(-(3840u32.div_ceil(self.num_samples_per_frame) as i16))
            }
        }
    }
}

/// Codec Config OBU.
///
/// Construct with [`CodecConfigObu::new`], then call
/// [`CodecConfigObu::initialize`] before serializing; writing an
/// uninitialized OBU fails with `FailedPrecondition`.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfigObu {
    pub header: ObuHeader,
    codec_config_id: DecodedUleb128,
    codec_config: CodecConfig,
    initialized: bool,
}

impl CodecConfigObu {
    /// Create an uninitialized OBU.
    pub fn new(
        header: ObuHeader,
        codec_config_id: DecodedUleb128,
        codec_config: CodecConfig,
    ) -> Self {
        Self {
            header,
            codec_config_id,
            codec_config,
            initialized: false,
        }
    }

    /// Validate the cross-field invariants, enabling serialization.
    pub fn initialize(&mut self) -> Result<()> {
        if self.codec_config.codec_id != self.codec_config.decoder_config.codec_id() {
            return Err(Error::invalid_argument(format!(
                "codec_id {:?} disagrees with the decoder_config variant",
                self.codec_config.codec_id
            )));
        }
        if self.codec_config.num_samples_per_frame != 0 {
            let required = self.codec_config.required_audio_roll_distance()?;
            if self.codec_config.audio_roll_distance != required {
                return Err(Error::invalid_argument(format!(
                    "audio_roll_distance must be {required} for {:?}, got {}",
                    self.codec_config.codec_id, self.codec_config.audio_roll_distance
                )));
            }
        }
        match &self.codec_config.decoder_config {
            DecoderConfig::Lpcm(config) => config.validate()?,
            DecoderConfig::Opus(config) => config.validate()?,
            DecoderConfig::AacLc(_) => {}
            DecoderConfig::Flac(config) => {
                config.validate(self.codec_config.num_samples_per_frame)?
            }
        }
        self.initialized = true;
        Ok(())
    }

    pub fn codec_config_id(&self) -> DecodedUleb128 {
        self.codec_config_id
    }

    pub fn codec_config(&self) -> &CodecConfig {
        &self.codec_config
    }

    pub fn num_samples_per_frame(&self) -> DecodedUleb128 {
        self.codec_config.num_samples_per_frame
    }

    /// The sample rate driving timestamp progression.
    pub fn input_sample_rate(&self) -> Result<u32> {
        match &self.codec_config.decoder_config {
            DecoderConfig::Lpcm(config) => Ok(config.sample_rate),
            DecoderConfig::Opus(config) => Ok(config.input_sample_rate),
            DecoderConfig::AacLc(config) => config.sample_rate(),
            DecoderConfig::Flac(config) => Ok(config.stream_info()?.sample_rate),
        }
    }

    /// The sample rate driving loudness measurement.
    pub fn output_sample_rate(&self) -> Result<u32> {
        match &self.codec_config.decoder_config {
            DecoderConfig::Opus(_) => Ok(OpusDecoderConfig::OUTPUT_SAMPLE_RATE),
            _ => self.input_sample_rate(),
        }
    }

    /// The bit depth loudness is measured at.
    pub fn bit_depth_to_measure_loudness(&self) -> Result<u8> {
        match &self.codec_config.decoder_config {
            DecoderConfig::Lpcm(config) => Ok(config.sample_size),
            DecoderConfig::Opus(_) => Ok(32),
            DecoderConfig::AacLc(_) => Ok(AacDecoderConfig::BIT_DEPTH),
            DecoderConfig::Flac(config) => Ok(config.stream_info()?.bits_per_sample),
        }
    }

    /// Deserialize a codec config payload. Only the Opus decoder config
    /// read path is implemented.
    pub fn create_from_buffer(header: ObuHeader, reader: &mut BitReader<'_>) -> Result<Self> {
        let codec_config_id = reader.read_uleb128()?;
        let mut fourcc = [0u8; 4];
        for byte in &mut fourcc {
            *byte = reader.read_unsigned(8)? as u8;
        }
        let codec_id = CodecId::from_fourcc(fourcc)?;
        let num_samples_per_frame = reader.read_uleb128()?;
        let audio_roll_distance = reader.read_signed16()?;
        let decoder_config = match codec_id {
            CodecId::Opus => DecoderConfig::Opus(OpusDecoderConfig::validate_and_read(reader)?),
            other => {
                return Err(Error::unimplemented(format!(
                    "reading {other:?} decoder configs"
                )))
            }
        };
        let mut obu = Self::new(
            header,
            codec_config_id,
            CodecConfig {
                codec_id,
                num_samples_per_frame,
                audio_roll_distance,
                decoder_config,
            },
        );
        obu.initialize()?;
        Ok(obu)
    }
}

impl Obu for CodecConfigObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::CodecConfig
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        if !self.initialized {
            return Err(Error::failed_precondition(format!(
                "codec config {} was not initialized",
                self.codec_config_id
            )));
        }
        if self.codec_config.num_samples_per_frame == 0 {
            return Err(Error::invalid_argument(
                "num_samples_per_frame must be positive".to_string(),
            ));
        }
        writer.write_uleb128(self.codec_config_id)?;
        writer.write_bytes(&self.codec_config.codec_id.fourcc())?;
        writer.write_uleb128(self.codec_config.num_samples_per_frame)?;
        writer.write_signed16(self.codec_config.audio_roll_distance)?;
        match &self.codec_config.decoder_config {
            DecoderConfig::Lpcm(config) => config.validate_and_write(writer),
            DecoderConfig::Opus(config) => config.validate_and_write(writer),
            DecoderConfig::AacLc(config) => config.validate_and_write(writer),
            DecoderConfig::Flac(config) => {
                config.validate_and_write(self.codec_config.num_samples_per_frame, writer)
            }
        }
    }
}
