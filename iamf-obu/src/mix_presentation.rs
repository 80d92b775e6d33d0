//! Mix Presentation OBU.

use iamf_core::{BitWriter, DecodedUleb128, Error, Result};

use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;
use crate::param_definition::MixGainParamDefinition;

/// The 2-bit headphones rendering mode of one sub-mix element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeadphonesRenderingMode {
    Stereo = 0,
    Binaural = 1,
}

/// Per-element rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingConfig {
    pub headphones_rendering_mode: HeadphonesRenderingMode,
    pub reserved: u8,
    pub rendering_config_extension_bytes: Vec<u8>,
}

impl RenderingConfig {
    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_unsigned(self.headphones_rendering_mode as u32, 2)?;
        writer.write_unsigned(self.reserved as u32, 6)?;
        writer.write_uleb128(self.rendering_config_extension_bytes.len() as DecodedUleb128)?;
        writer.write_bytes(&self.rendering_config_extension_bytes)
    }
}

/// The 4-bit sound system of a loudspeaker layout (ITU-R BS.2051 labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundSystem {
    /// Stereo (A: 0+2+0).
    A0_2_0 = 0,
    /// 5.1 (B: 0+5+0).
    B0_5_0 = 1,
    /// 5.1.2 (C: 2+5+0).
    C2_5_0 = 2,
    /// 5.1.4 (D: 4+5+0).
    D4_5_0 = 3,
    /// 22.2 subset (E: 4+5+1).
    E4_5_1 = 4,
    /// 7.1 in BS.2051 terms (F: 3+7+0).
    F3_7_0 = 5,
    /// 9.1.4 (G: 4+9+0).
    G4_9_0 = 6,
    /// 22.2 (H: 9+10+3).
    H9_10_3 = 7,
    /// 7.1 (I: 0+7+0).
    I0_7_0 = 8,
    /// 7.1.4 (J: 4+7+0).
    J4_7_0 = 9,
    /// 7.1.2.
    Ss10_2_7_0 = 10,
    /// 3.1.2.
    Ss11_2_3_0 = 11,
    /// Mono.
    Ss12_0_1_0 = 12,
}

/// A playback layout a sub-mix was authored and measured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `layout_type` 2: loudspeakers following a sound-system convention.
    LoudspeakersSsConvention { sound_system: SoundSystem, reserved: u8 },
    /// `layout_type` 3: binaural playback.
    Binaural { reserved: u8 },
}

impl Layout {
    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        match self {
            Layout::LoudspeakersSsConvention {
                sound_system,
                reserved,
            } => {
                writer.write_unsigned(2, 2)?;
                writer.write_unsigned(*sound_system as u32, 4)?;
                writer.write_unsigned(*reserved as u32, 2)
            }
            Layout::Binaural { reserved } => {
                writer.write_unsigned(3, 2)?;
                writer.write_unsigned(*reserved as u32, 6)
            }
        }
    }
}

/// `info_type` bit for a measured true peak.
pub const LOUDNESS_INFO_TYPE_TRUE_PEAK: u8 = 1;
/// `info_type` bit for anchored loudness entries.
pub const LOUDNESS_INFO_TYPE_ANCHORED: u8 = 2;

/// The anchor an anchored loudness value was measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AnchorElement {
    Unknown = 0,
    Dialogue = 1,
    Album = 2,
}

/// Loudness measurements for one layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoudnessInfo {
    pub info_type: u8,
    /// Q7.8 LKFS.
    pub integrated_loudness: i16,
    /// Q7.8 dBFS.
    pub digital_peak: i16,
    /// Present iff `info_type` has [`LOUDNESS_INFO_TYPE_TRUE_PEAK`].
    pub true_peak: Option<i16>,
    /// Present iff `info_type` has [`LOUDNESS_INFO_TYPE_ANCHORED`].
    pub anchored_loudness: Vec<(AnchorElement, i16)>,
    /// Present iff `info_type` has any reserved bit.
    pub info_type_extension_bytes: Vec<u8>,
}

impl LoudnessInfo {
    /// Pass-through loudness carrying only the mandatory fields.
    pub fn zeroed() -> Self {
        Self {
            info_type: 0,
            integrated_loudness: 0,
            digital_peak: 0,
            true_peak: None,
            anchored_loudness: vec![],
            info_type_extension_bytes: vec![],
        }
    }

    fn validate(&self) -> Result<()> {
        if (self.info_type & LOUDNESS_INFO_TYPE_TRUE_PEAK != 0) != self.true_peak.is_some() {
            return Err(Error::invalid_argument(
                "true_peak presence disagrees with info_type".to_string(),
            ));
        }
        if (self.info_type & LOUDNESS_INFO_TYPE_ANCHORED != 0) != !self.anchored_loudness.is_empty()
        {
            return Err(Error::invalid_argument(
                "anchored_loudness presence disagrees with info_type".to_string(),
            ));
        }
        if (self.info_type & 0b1111_1100 != 0) != !self.info_type_extension_bytes.is_empty() {
            return Err(Error::invalid_argument(
                "loudness extension presence disagrees with info_type".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_unsigned(self.info_type as u32, 8)?;
        writer.write_signed16(self.integrated_loudness)?;
        writer.write_signed16(self.digital_peak)?;
        if let Some(true_peak) = self.true_peak {
            writer.write_signed16(true_peak)?;
        }
        if !self.anchored_loudness.is_empty() {
            writer.write_unsigned(self.anchored_loudness.len() as u32, 8)?;
            for &(anchor_element, anchored_loudness) in &self.anchored_loudness {
                writer.write_unsigned(anchor_element as u32, 8)?;
                writer.write_signed16(anchored_loudness)?;
            }
        }
        if !self.info_type_extension_bytes.is_empty() {
            writer.write_uleb128(self.info_type_extension_bytes.len() as DecodedUleb128)?;
            writer.write_bytes(&self.info_type_extension_bytes)?;
        }
        Ok(())
    }
}

/// One layout + its loudness measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixPresentationLayout {
    pub layout: Layout,
    pub loudness: LoudnessInfo,
}

/// One audio element inside a sub-mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMixAudioElement {
    pub audio_element_id: DecodedUleb128,
    /// One entry per annotation language of the presentation.
    pub localized_element_annotations: Vec<String>,
    pub rendering_config: RenderingConfig,
    pub element_mix_gain: MixGainParamDefinition,
}

/// One sub-mix of a mix presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixPresentationSubMix {
    pub audio_elements: Vec<SubMixAudioElement>,
    pub output_mix_gain: MixGainParamDefinition,
    pub layouts: Vec<MixPresentationLayout>,
}

/// Mix Presentation OBU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixPresentationObu {
    pub header: ObuHeader,
    pub mix_presentation_id: DecodedUleb128,
    /// BCP-47 tags, one per annotation language.
    pub annotations_language: Vec<String>,
    /// Human-readable labels, parallel to `annotations_language`.
    pub localized_presentation_annotations: Vec<String>,
    pub sub_mixes: Vec<MixPresentationSubMix>,
}

impl MixPresentationObu {
    fn validate(&self) -> Result<()> {
        let count_label = self.annotations_language.len();
        if self.localized_presentation_annotations.len() != count_label {
            return Err(Error::invalid_argument(format!(
                "{} presentation annotations for {count_label} languages",
                self.localized_presentation_annotations.len()
            )));
        }
        if self.sub_mixes.is_empty() {
            return Err(Error::invalid_argument(format!(
                "mix presentation {} declares no sub-mixes",
                self.mix_presentation_id
            )));
        }
        for sub_mix in &self.sub_mixes {
            if sub_mix.audio_elements.is_empty() {
                return Err(Error::invalid_argument(
                    "a sub-mix references no audio elements".to_string(),
                ));
            }
            if sub_mix.layouts.is_empty() {
                return Err(Error::invalid_argument(
                    "a sub-mix declares no layouts".to_string(),
                ));
            }
            for element in &sub_mix.audio_elements {
                if element.localized_element_annotations.len() != count_label {
                    return Err(Error::invalid_argument(format!(
                        "{} element annotations for {count_label} languages",
                        element.localized_element_annotations.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Obu for MixPresentationObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::MixPresentation
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_uleb128(self.mix_presentation_id)?;
        writer.write_uleb128(self.annotations_language.len() as DecodedUleb128)?;
        for language in &self.annotations_language {
            writer.write_string(language)?;
        }
        for annotation in &self.localized_presentation_annotations {
            writer.write_string(annotation)?;
        }
        writer.write_uleb128(self.sub_mixes.len() as DecodedUleb128)?;
        for sub_mix in &self.sub_mixes {
            writer.write_uleb128(sub_mix.audio_elements.len() as DecodedUleb128)?;
            for element in &sub_mix.audio_elements {
                writer.write_uleb128(element.audio_element_id)?;
                for annotation in &element.localized_element_annotations {
                    writer.write_string(annotation)?;
                }
                element.rendering_config.validate_and_write(writer)?;
                element.element_mix_gain.validate_and_write(writer)?;
            }
            sub_mix.output_mix_gain.validate_and_write(writer)?;
            writer.write_uleb128(sub_mix.layouts.len() as DecodedUleb128)?;
            for layout in &sub_mix.layouts {
                layout.layout.validate_and_write(writer)?;
                layout.loudness.validate_and_write(writer)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_definition::ParamDefinition;
    use iamf_core::{BitWriter, LebGenerator};

    fn mix_gain(parameter_id: u32) -> MixGainParamDefinition {
        MixGainParamDefinition {
            base: ParamDefinition {
                parameter_id,
                parameter_rate: 48000,
                param_definition_mode: true,
                reserved: 0,
                duration: 0,
                constant_subblock_duration: 0,
                subblock_durations: vec![],
            },
            default_mix_gain: 0,
        }
    }

    fn minimal_obu() -> MixPresentationObu {
        MixPresentationObu {
            header: ObuHeader::default(),
            mix_presentation_id: 10,
            annotations_language: vec!["en-us".to_string()],
            localized_presentation_annotations: vec!["Mix 1".to_string()],
            sub_mixes: vec![MixPresentationSubMix {
                audio_elements: vec![SubMixAudioElement {
                    audio_element_id: 11,
                    localized_element_annotations: vec!["n/a".to_string()],
                    rendering_config: RenderingConfig {
                        headphones_rendering_mode: HeadphonesRenderingMode::Stereo,
                        reserved: 0,
                        rendering_config_extension_bytes: vec![],
                    },
                    element_mix_gain: mix_gain(12),
                }],
                output_mix_gain: mix_gain(13),
                layouts: vec![MixPresentationLayout {
                    layout: Layout::LoudspeakersSsConvention {
                        sound_system: SoundSystem::A0_2_0,
                        reserved: 0,
                    },
                    loudness: LoudnessInfo::zeroed(),
                }],
            }],
        }
    }

    #[test]
    fn test_minimal_payload_bytes() {
        let obu = minimal_obu();
        let mut writer = BitWriter::new(LebGenerator::minimum());
        obu.validate_and_write_payload(&mut writer).unwrap();
        let expected: Vec<u8> = [
            // mix_presentation_id, count_label.
            &[10u8, 1][..],
            &b"en-us\0"[..],
            &b"Mix 1\0"[..],
            // num_sub_mixes, num_audio_elements, audio_element_id.
            &[1, 1, 11],
            &b"n/a\0"[..],
            // rendering_config: stereo mode + reserved, extension size 0.
            &[0x00, 0],
            // element_mix_gain: id 12, rate 48000, mode 1 + reserved, gain 0.
            &[12, 0x80, 0xf7, 0x02, 0x80, 0, 0],
            // output_mix_gain: id 13, same shape.
            &[13, 0x80, 0xf7, 0x02, 0x80, 0, 0],
            // num_layouts, layout_type 2 + sound system A, loudness.
            &[1, 0b10_0000_00, 0, 0, 0, 0, 0],
        ]
        .concat();
        assert_eq!(writer.data(), &expected[..]);
    }

    #[test]
    fn test_annotation_count_mismatch_rejected() {
        let mut obu = minimal_obu();
        obu.localized_presentation_annotations.clear();
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(obu
            .validate_and_write_payload(&mut writer)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_loudness_info_with_true_peak() {
        let loudness = LoudnessInfo {
            info_type: LOUDNESS_INFO_TYPE_TRUE_PEAK,
            integrated_loudness: -960,
            digital_peak: -128,
            true_peak: Some(-100),
            anchored_loudness: vec![],
            info_type_extension_bytes: vec![],
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        loudness.validate_and_write(&mut writer).unwrap();
        assert_eq!(
            writer.data(),
            &[1, 0xfc, 0x40, 0xff, 0x80, 0xff, 0x9c]
        );
    }

    #[test]
    fn test_loudness_info_flag_mismatch_rejected() {
        let loudness = LoudnessInfo {
            info_type: 0,
            integrated_loudness: 0,
            digital_peak: 0,
            true_peak: Some(0),
            anchored_loudness: vec![],
            info_type_extension_bytes: vec![],
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(loudness
            .validate_and_write(&mut writer)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_anchored_loudness() {
        let loudness = LoudnessInfo {
            info_type: LOUDNESS_INFO_TYPE_ANCHORED,
            integrated_loudness: 0,
            digital_peak: 0,
            true_peak: None,
            anchored_loudness: vec![(AnchorElement::Dialogue, -256)],
            info_type_extension_bytes: vec![],
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        loudness.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[2, 0, 0, 0, 0, 1, 1, 0xff, 0x00]);
    }

    #[test]
    fn test_binaural_layout_bits() {
        let layout = Layout::Binaural { reserved: 0 };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        layout.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[0b11_000000]);
    }
}
