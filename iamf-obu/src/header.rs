//! OBU header and type tags.
//!
//! Every OBU begins with one byte packing
//! `obu_type << 3 | redundant_copy << 2 | trimming_status << 1 | extension`,
//! followed by a ULEB128 `obu_size` counting every remaining header byte
//! plus the payload.

use iamf_core::{BitWriter, DecodedUleb128, Error, Result};

/// The 5-bit OBU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObuType {
    CodecConfig = 0,
    AudioElement = 1,
    MixPresentation = 2,
    ParameterBlock = 3,
    TemporalDelimiter = 4,
    AudioFrame = 5,
    AudioFrameId0 = 6,
    AudioFrameId1 = 7,
    AudioFrameId2 = 8,
    AudioFrameId3 = 9,
    AudioFrameId4 = 10,
    AudioFrameId5 = 11,
    AudioFrameId6 = 12,
    AudioFrameId7 = 13,
    AudioFrameId8 = 14,
    AudioFrameId9 = 15,
    AudioFrameId10 = 16,
    AudioFrameId11 = 17,
    AudioFrameId12 = 18,
    AudioFrameId13 = 19,
    AudioFrameId14 = 20,
    AudioFrameId15 = 21,
    AudioFrameId16 = 22,
    AudioFrameId17 = 23,
    Reserved24 = 24,
    Reserved25 = 25,
    Reserved26 = 26,
    Reserved27 = 27,
    Reserved28 = 28,
    Reserved29 = 29,
    Reserved30 = 30,
    SequenceHeader = 31,
}

/// Largest substream id carried implicitly by a dedicated OBU type.
pub const MAX_IMPLICIT_SUBSTREAM_ID: DecodedUleb128 =
    (ObuType::AudioFrameId17 as u32) - (ObuType::AudioFrameId0 as u32);

impl ObuType {
    /// Whether this type carries coded audio samples.
    pub fn is_audio_frame(self) -> bool {
        (ObuType::AudioFrame as u8..=ObuType::AudioFrameId17 as u8).contains(&(self as u8))
    }

    /// The OBU type encoding a given substream id: one of the 18 dedicated
    /// tags when the id fits, the generic audio frame type otherwise.
    pub fn for_substream_id(substream_id: DecodedUleb128) -> Self {
        if substream_id > MAX_IMPLICIT_SUBSTREAM_ID {
            return ObuType::AudioFrame;
        }
        Self::try_from(ObuType::AudioFrameId0 as u8 + substream_id as u8)
            .unwrap_or(ObuType::AudioFrame)
    }

    /// The substream id implied by a dedicated audio frame tag.
    pub fn implied_substream_id(self) -> Option<DecodedUleb128> {
        if (ObuType::AudioFrameId0 as u8..=ObuType::AudioFrameId17 as u8).contains(&(self as u8)) {
            Some((self as u8 - ObuType::AudioFrameId0 as u8) as DecodedUleb128)
        } else {
            None
        }
    }
}

impl TryFrom<u8> for ObuType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        use ObuType::*;
        Ok(match value {
            0 => CodecConfig,
            1 => AudioElement,
            2 => MixPresentation,
            3 => ParameterBlock,
            4 => TemporalDelimiter,
            5 => AudioFrame,
            6 => AudioFrameId0,
            7 => AudioFrameId1,
            8 => AudioFrameId2,
            9 => AudioFrameId3,
            10 => AudioFrameId4,
            11 => AudioFrameId5,
            12 => AudioFrameId6,
            13 => AudioFrameId7,
            14 => AudioFrameId8,
            15 => AudioFrameId9,
            16 => AudioFrameId10,
            17 => AudioFrameId11,
            18 => AudioFrameId12,
            19 => AudioFrameId13,
            20 => AudioFrameId14,
            21 => AudioFrameId15,
            22 => AudioFrameId16,
            23 => AudioFrameId17,
            24 => Reserved24,
            25 => Reserved25,
            26 => Reserved26,
            27 => Reserved27,
            28 => Reserved28,
            29 => Reserved29,
            30 => Reserved30,
            31 => SequenceHeader,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "obu_type {value} does not fit in 5 bits"
                )))
            }
        })
    }
}

/// The flags and optional fields shared by every OBU header.
///
/// `obu_size` is not stored; it is computed from the serialized payload at
/// write time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObuHeader {
    /// This OBU repeats an earlier descriptor verbatim.
    pub redundant_copy: bool,
    /// Trim fields follow `obu_size`. Only legal on audio frame OBUs.
    pub trimming_status: bool,
    /// Samples to discard from the end of the frame.
    pub num_samples_to_trim_at_end: DecodedUleb128,
    /// Samples to discard from the start of the frame.
    pub num_samples_to_trim_at_start: DecodedUleb128,
    /// Opaque extension bytes; `Some` sets the extension flag.
    pub extension_header_bytes: Option<Vec<u8>>,
}

impl ObuHeader {
    /// Validate the flags against the OBU type and write the header,
    /// including `obu_size` covering `payload_size` bytes plus the trim
    /// and extension fields.
    pub fn validate_and_write(
        &self,
        obu_type: ObuType,
        payload_size: usize,
        writer: &mut BitWriter,
    ) -> Result<()> {
        if self.trimming_status && !obu_type.is_audio_frame() {
            return Err(Error::invalid_argument(format!(
                "trimming_status_flag is only legal on audio frame OBUs, got {obu_type:?}"
            )));
        }
        if obu_type == ObuType::TemporalDelimiter && self.redundant_copy {
            return Err(Error::invalid_argument(
                "redundant_copy is forbidden on temporal delimiters".to_string(),
            ));
        }

        let generator = writer.leb_generator();
        let mut obu_size = payload_size as u64;
        if self.trimming_status {
            obu_size += generator.uleb128(self.num_samples_to_trim_at_end as u64)?.len() as u64;
            obu_size += generator
                .uleb128(self.num_samples_to_trim_at_start as u64)?
                .len() as u64;
        }
        if let Some(extension) = &self.extension_header_bytes {
            obu_size += generator.uleb128(extension.len() as u64)?.len() as u64;
            obu_size += extension.len() as u64;
        }
        if obu_size > DecodedUleb128::MAX as u64 {
            return Err(Error::invalid_argument(format!(
                "obu_size {obu_size} overflows the 32-bit size field"
            )));
        }

        writer.write_unsigned(obu_type as u32, 5)?;
        writer.write_unsigned(self.redundant_copy as u32, 1)?;
        writer.write_unsigned(self.trimming_status as u32, 1)?;
        writer.write_unsigned(self.extension_header_bytes.is_some() as u32, 1)?;
        writer.write_uleb128(obu_size as DecodedUleb128)?;
        if self.trimming_status {
            writer.write_uleb128(self.num_samples_to_trim_at_end)?;
            writer.write_uleb128(self.num_samples_to_trim_at_start)?;
        }
        if let Some(extension) = &self.extension_header_bytes {
            writer.write_uleb128(extension.len() as DecodedUleb128)?;
            writer.write_bytes(extension)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    #[test]
    fn test_obu_type_for_substream_id() {
        assert_eq!(ObuType::for_substream_id(0), ObuType::AudioFrameId0);
        assert_eq!(ObuType::for_substream_id(3), ObuType::AudioFrameId3);
        assert_eq!(ObuType::for_substream_id(17), ObuType::AudioFrameId17);
        assert_eq!(ObuType::for_substream_id(18), ObuType::AudioFrame);
    }

    #[test]
    fn test_implied_substream_id() {
        assert_eq!(ObuType::AudioFrameId0.implied_substream_id(), Some(0));
        assert_eq!(ObuType::AudioFrameId17.implied_substream_id(), Some(17));
        assert_eq!(ObuType::AudioFrame.implied_substream_id(), None);
        assert_eq!(ObuType::CodecConfig.implied_substream_id(), None);
    }

    #[test]
    fn test_header_byte_packing() {
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let header = ObuHeader {
            redundant_copy: true,
            ..Default::default()
        };
        header
            .validate_and_write(ObuType::CodecConfig, 14, &mut writer)
            .unwrap();
        assert_eq!(writer.data(), &[0b0000_0100, 14]);
    }

    #[test]
    fn test_header_with_extension() {
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let header = ObuHeader {
            extension_header_bytes: Some(b"extra".to_vec()),
            ..Default::default()
        };
        header
            .validate_and_write(ObuType::TemporalDelimiter, 0, &mut writer)
            .unwrap();
        assert_eq!(
            writer.data(),
            &[
                (ObuType::TemporalDelimiter as u8) << 3 | 1,
                6,
                5,
                b'e',
                b'x',
                b't',
                b'r',
                b'a'
            ]
        );
    }

    #[test]
    fn test_trimming_rejected_outside_audio_frames() {
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let header = ObuHeader {
            trimming_status: true,
            ..Default::default()
        };
        assert!(header
            .validate_and_write(ObuType::AudioElement, 0, &mut writer)
            .unwrap_err()
            .is_invalid_argument());
        assert!(header
            .validate_and_write(ObuType::AudioFrameId4, 0, &mut writer)
            .is_ok());
    }

    #[test]
    fn test_redundant_temporal_delimiter_rejected() {
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let header = ObuHeader {
            redundant_copy: true,
            ..Default::default()
        };
        assert!(header
            .validate_and_write(ObuType::TemporalDelimiter, 0, &mut writer)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_obu_size_counts_trim_fields() {
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let header = ObuHeader {
            trimming_status: true,
            num_samples_to_trim_at_end: 128,
            num_samples_to_trim_at_start: 0,
            ..Default::default()
        };
        header
            .validate_and_write(ObuType::AudioFrameId0, 4, &mut writer)
            .unwrap();
        // 128 encodes in two bytes, 0 in one; payload adds four.
        assert_eq!(
            writer.data(),
            &[(ObuType::AudioFrameId0 as u8) << 3 | 0b010, 7, 0x80, 0x01, 0x00]
        );
    }
}
