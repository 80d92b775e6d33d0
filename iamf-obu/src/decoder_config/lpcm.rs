//! LPCM decoder config.

use iamf_core::{BitReader, BitWriter, Error, Result};

/// Sample rates LPCM substreams may use.
pub const LEGAL_SAMPLE_RATES: [u32; 5] = [16000, 32000, 44100, 48000, 96000];

/// Byte order of the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LpcmSampleFormat {
    BigEndian = 0,
    LittleEndian = 1,
}

/// The `decoder_config` payload for `ipcm` streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpcmDecoderConfig {
    pub sample_format_flags: LpcmSampleFormat,
    /// Bits per sample, one of 16, 24, 32.
    pub sample_size: u8,
    pub sample_rate: u32,
}

impl LpcmDecoderConfig {
    /// Check the documented invariants.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.sample_size, 16 | 24 | 32) {
            return Err(Error::invalid_argument(format!(
                "LPCM sample_size must be 16, 24 or 32, got {}",
                self.sample_size
            )));
        }
        if !LEGAL_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(Error::invalid_argument(format!(
                "LPCM sample_rate {} is not one of {LEGAL_SAMPLE_RATES:?}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Validate and serialize.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_unsigned(self.sample_format_flags as u32, 8)?;
        writer.write_unsigned(self.sample_size as u32, 8)?;
        writer.write_unsigned(self.sample_rate, 32)
    }

    /// Deserialize and validate.
    pub fn validate_and_read(reader: &mut BitReader<'_>) -> Result<Self> {
        let flags = match reader.read_unsigned(8)? {
            0 => LpcmSampleFormat::BigEndian,
            1 => LpcmSampleFormat::LittleEndian,
            other => {
                return Err(Error::invalid_argument(format!(
                    "reserved LPCM sample_format_flags {other}"
                )))
            }
        };
        let config = Self {
            sample_format_flags: flags,
            sample_size: reader.read_unsigned(8)? as u8,
            sample_rate: reader.read_unsigned(32)?,
        };
        config.validate()?;
        Ok(config)
    }
}
