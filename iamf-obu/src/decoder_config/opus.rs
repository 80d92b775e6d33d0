//! Opus decoder config.

use iamf_core::{BitReader, BitWriter, Error, Result};

/// The `decoder_config` payload for `Opus` streams.
///
/// IAMF pins the channel count and mapping family; the fields mirror the
/// Ogg Opus identification header without the magic signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpusDecoderConfig {
    pub version: u8,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
    pub output_gain: i16,
    pub mapping_family: u8,
}

impl OpusDecoderConfig {
    /// IAMF requires the stereo channel count.
    pub const OUTPUT_CHANNEL_COUNT: u8 = 2;

    /// IAMF requires mapping family 0.
    pub const MAPPING_FAMILY: u8 = 0;

    /// Opus always decodes at 48 kHz.
    pub const OUTPUT_SAMPLE_RATE: u32 = 48000;

    /// Check the documented invariants.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > 15 {
            return Err(Error::invalid_argument(format!(
                "Opus version must be in [1, 15], got {}",
                self.version
            )));
        }
        if self.output_gain != 0 {
            return Err(Error::invalid_argument(format!(
                "Opus output_gain must be 0, got {}",
                self.output_gain
            )));
        }
        if self.mapping_family != Self::MAPPING_FAMILY {
            return Err(Error::invalid_argument(format!(
                "Opus mapping_family must be {}, got {}",
                Self::MAPPING_FAMILY,
                self.mapping_family
            )));
        }
        Ok(())
    }

    /// Validate and serialize.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_unsigned(self.version as u32, 8)?;
        writer.write_unsigned(Self::OUTPUT_CHANNEL_COUNT as u32, 8)?;
        writer.write_unsigned(self.pre_skip as u32, 16)?;
        writer.write_unsigned(self.input_sample_rate, 32)?;
        writer.write_signed16(self.output_gain)?;
        writer.write_unsigned(self.mapping_family as u32, 8)
    }

    /// Deserialize and validate.
    pub fn validate_and_read(reader: &mut BitReader<'_>) -> Result<Self> {
        let version = reader.read_unsigned(8)? as u8;
        let output_channel_count = reader.read_unsigned(8)? as u8;
        if output_channel_count != Self::OUTPUT_CHANNEL_COUNT {
            return Err(Error::invalid_argument(format!(
                "Opus output_channel_count must be {}, got {output_channel_count}",
                Self::OUTPUT_CHANNEL_COUNT
            )));
        }
        let config = Self {
            version,
            pre_skip: reader.read_unsigned(16)? as u16,
            input_sample_rate: reader.read_unsigned(32)?,
            output_gain: reader.read_signed16()?,
            mapping_family: reader.read_unsigned(8)? as u8,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    #[test]
    fn test_write_default_fields() {
        let config = OpusDecoderConfig {
            version: 1,
            pre_skip: 312,
            input_sample_rate: 48000,
            output_gain: 0,
            mapping_family: 0,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        config.validate_and_write(&mut writer).unwrap();
        assert_eq!(
            writer.data(),
            &[1, 2, 0x01, 0x38, 0x00, 0x00, 0xbb, 0x80, 0, 0, 0]
        );
    }

    #[test]
    fn test_version_zero_rejected() {
        let config = OpusDecoderConfig {
            version: 0,
            pre_skip: 0,
            input_sample_rate: 0,
            output_gain: 0,
            mapping_family: 0,
        };
        assert!(config.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_nonzero_mapping_family_rejected() {
        let config = OpusDecoderConfig {
            version: 1,
            pre_skip: 0,
            input_sample_rate: 0,
            output_gain: 0,
            mapping_family: 1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_rejects_wrong_channel_count() {
        let data = [1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut reader = BitReader::new(&data);
        assert!(OpusDecoderConfig::validate_and_read(&mut reader)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_read_roundtrip() {
        let config = OpusDecoderConfig {
            version: 15,
            pre_skip: 3,
            input_sample_rate: 4,
            output_gain: 0,
            mapping_family: 0,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        config.validate_and_write(&mut writer).unwrap();
        let data = writer.data().to_vec();
        let mut reader = BitReader::new(&data);
        assert_eq!(OpusDecoderConfig::validate_and_read(&mut reader).unwrap(), config);
    }
}
