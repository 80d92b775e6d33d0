//! The OBU sequencer: interleaves descriptors, temporal delimiters,
//! parameter blocks and audio frames in the order IAMF mandates.
//!
//! Each call serializes into a scratch buffer first; the output writer
//! only sees complete, validated units, so a failure never emits partial
//! bytes.

use iamf_core::{BitWriter, LebGenerator, Result};
use iamf_codecs::AudioFrameWithData;
use iamf_obu::{
    ArbitraryObu, InsertionHook, Obu, ObuHeader, TemporalDelimiterObu,
};
use tracing::debug;

use crate::descriptors::Descriptors;
use crate::params::ParameterBlockWithData;

/// Sequencing options fixed for the life of a stream.
#[derive(Debug, Clone, Copy)]
pub struct ObuSequencer {
    leb_generator: LebGenerator,
    include_temporal_delimiters: bool,
}

impl ObuSequencer {
    pub fn new(leb_generator: LebGenerator, include_temporal_delimiters: bool) -> Self {
        Self {
            leb_generator,
            include_temporal_delimiters,
        }
    }

    fn scratch(&self) -> BitWriter {
        BitWriter::new(self.leb_generator)
    }

    /// Emit the descriptor set: sequence header, codec configs, audio
    /// elements, mix presentations, with arbitrary OBUs at each hook.
    pub fn write_descriptor_obus(
        &self,
        descriptors: &Descriptors,
        arbitrary_obus: &[ArbitraryObu],
        writer: &mut BitWriter,
    ) -> Result<()> {
        self.write_descriptor_obus_internal(descriptors, arbitrary_obus, false, writer)
    }

    /// Emit the descriptor set again, flagged as redundant copies.
    pub fn write_redundant_descriptor_obus(
        &self,
        descriptors: &Descriptors,
        writer: &mut BitWriter,
    ) -> Result<()> {
        self.write_descriptor_obus_internal(descriptors, &[], true, writer)
    }

    fn write_descriptor_obus_internal(
        &self,
        descriptors: &Descriptors,
        arbitrary_obus: &[ArbitraryObu],
        redundant: bool,
        writer: &mut BitWriter,
    ) -> Result<()> {
        let mut scratch = self.scratch();
        let mark_redundant = |header: &mut ObuHeader| {
            if redundant {
                header.redundant_copy = true;
            }
        };

        ArbitraryObu::write_obus_with_hook(
            InsertionHook::BeforeDescriptors,
            None,
            arbitrary_obus,
            &mut scratch,
        )?;

        let mut sequence_header = descriptors.sequence_header.clone();
        mark_redundant(&mut sequence_header.header);
        sequence_header.validate_and_write(&mut scratch)?;
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterIaSequenceHeader,
            None,
            arbitrary_obus,
            &mut scratch,
        )?;

        let mut codec_config_ids: Vec<_> = descriptors.codec_configs.keys().copied().collect();
        codec_config_ids.sort_unstable();
        for id in codec_config_ids {
            let mut obu = descriptors.codec_configs[&id].clone();
            mark_redundant(&mut obu.header);
            obu.validate_and_write(&mut scratch)?;
        }
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterCodecConfigs,
            None,
            arbitrary_obus,
            &mut scratch,
        )?;

        let mut audio_element_ids: Vec<_> = descriptors.audio_elements.keys().copied().collect();
        audio_element_ids.sort_unstable();
        for id in audio_element_ids {
            let mut obu = descriptors.audio_elements[&id].obu.clone();
            mark_redundant(&mut obu.header);
            obu.validate_and_write(&mut scratch)?;
        }
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterAudioElements,
            None,
            arbitrary_obus,
            &mut scratch,
        )?;

        for mix_presentation in &descriptors.mix_presentations {
            let mut obu = mix_presentation.clone();
            mark_redundant(&mut obu.header);
            obu.validate_and_write(&mut scratch)?;
        }
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterMixPresentations,
            None,
            arbitrary_obus,
            &mut scratch,
        )?;

        let bytes = scratch.take_bytes()?;
        debug!(bytes = bytes.len(), redundant, "sequenced descriptor OBUs");
        writer.write_bytes(&bytes)
    }

    /// Emit one temporal unit: optional temporal delimiter, the parameter
    /// blocks starting at `start_tick`, then the unit's audio frames in
    /// ascending substream-id order.
    pub fn write_temporal_unit(
        &self,
        start_tick: i64,
        parameter_blocks: &[&ParameterBlockWithData],
        audio_frames: &[&AudioFrameWithData],
        arbitrary_obus: &[ArbitraryObu],
        writer: &mut BitWriter,
    ) -> Result<()> {
        let mut scratch = self.scratch();
        let tick = Some(start_tick);

        if self.include_temporal_delimiters {
            TemporalDelimiterObu::default().validate_and_write(&mut scratch)?;
        }

        ArbitraryObu::write_obus_with_hook(
            InsertionHook::BeforeParameterBlocks,
            tick,
            arbitrary_obus,
            &mut scratch,
        )?;
        for parameter_block in parameter_blocks {
            parameter_block.obu.validate_and_write(&mut scratch)?;
        }
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterParameterBlocks,
            tick,
            arbitrary_obus,
            &mut scratch,
        )?;

        let mut frames: Vec<_> = audio_frames.to_vec();
        frames.sort_by_key(|frame| frame.obu.substream_id());
        for frame in frames {
            frame.obu.validate_and_write(&mut scratch)?;
        }
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterAudioFrames,
            tick,
            arbitrary_obus,
            &mut scratch,
        )?;

        let bytes = scratch.take_bytes()?;
        debug!(
            start_tick,
            parameter_blocks = parameter_blocks.len(),
            audio_frames = audio_frames.len(),
            bytes = bytes.len(),
            "sequenced temporal unit"
        );
        writer.write_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use iamf_obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmSampleFormat};
    use iamf_obu::{
        AudioFrameObu, CodecConfig, CodecConfigObu, CodecId, DMixPMode, DecoderConfig,
        DownMixingParams, IaSequenceHeaderObu, ObuType, ProfileVersion,
    };

    fn descriptors() -> Descriptors {
        let mut codec_config = CodecConfigObu::new(
            ObuHeader::default(),
            0,
            CodecConfig {
                codec_id: CodecId::Lpcm,
                num_samples_per_frame: 64,
                audio_roll_distance: 0,
                decoder_config: DecoderConfig::Lpcm(LpcmDecoderConfig {
                    sample_format_flags: LpcmSampleFormat::BigEndian,
                    sample_size: 16,
                    sample_rate: 48000,
                }),
            },
        );
        codec_config.initialize().unwrap();
        Descriptors {
            sequence_header: IaSequenceHeaderObu::new(
                ObuHeader::default(),
                ProfileVersion::Simple,
                ProfileVersion::Simple,
            ),
            codec_configs: HashMap::from([(0, codec_config)]),
            audio_elements: HashMap::new(),
            mix_presentations: vec![],
        }
    }

    fn frame(substream_id: u32, payload: Vec<u8>) -> AudioFrameWithData {
        AudioFrameWithData {
            obu: AudioFrameObu::new(ObuHeader::default(), substream_id, payload),
            start_timestamp: 0,
            end_timestamp: 64,
            raw_samples: vec![],
            down_mixing_params: DownMixingParams::from_mode(DMixPMode::Mode1, 0).unwrap(),
            audio_element_id: 0,
        }
    }

    #[test]
    fn test_descriptor_order_starts_with_sequence_header() {
        let sequencer = ObuSequencer::new(LebGenerator::minimum(), false);
        let mut writer = BitWriter::new(LebGenerator::minimum());
        sequencer
            .write_descriptor_obus(&descriptors(), &[], &mut writer)
            .unwrap();
        let bytes = writer.data();
        assert_eq!(bytes[0] >> 3, ObuType::SequenceHeader as u8);
        // Codec config follows the 8-byte sequence header OBU.
        assert_eq!(bytes[8] >> 3, ObuType::CodecConfig as u8);
    }

    #[test]
    fn test_arbitrary_obu_before_descriptors() {
        let arbitrary = ArbitraryObu {
            header: ObuHeader::default(),
            obu_type: ObuType::Reserved26,
            payload: vec![0xde],
            insertion_hook: InsertionHook::BeforeDescriptors,
            insertion_tick: None,
        };
        let sequencer = ObuSequencer::new(LebGenerator::minimum(), false);
        let mut writer = BitWriter::new(LebGenerator::minimum());
        sequencer
            .write_descriptor_obus(&descriptors(), &[arbitrary], &mut writer)
            .unwrap();
        assert_eq!(writer.data()[0] >> 3, 26);
    }

    #[test]
    fn test_redundant_descriptors_flagged() {
        let sequencer = ObuSequencer::new(LebGenerator::minimum(), false);
        let mut writer = BitWriter::new(LebGenerator::minimum());
        sequencer
            .write_redundant_descriptor_obus(&descriptors(), &mut writer)
            .unwrap();
        for &byte0 in &[writer.data()[0], writer.data()[8]] {
            assert_eq!(byte0 & 0b100, 0b100, "redundant_copy flag expected");
        }
    }

    #[test]
    fn test_temporal_unit_frame_ordering() {
        let sequencer = ObuSequencer::new(LebGenerator::minimum(), true);
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let frame_b = frame(9, vec![0xbb]);
        let frame_a = frame(2, vec![0xaa]);
        sequencer
            .write_temporal_unit(0, &[], &[&frame_b, &frame_a], &[], &mut writer)
            .unwrap();

        let bytes = writer.data();
        // Temporal delimiter first.
        assert_eq!(bytes[0] >> 3, ObuType::TemporalDelimiter as u8);
        assert_eq!(bytes[1], 0);
        // Then substream 2 before substream 9 despite push order.
        assert_eq!(bytes[2] >> 3, ObuType::AudioFrameId2 as u8);
        assert_eq!(bytes[4], 0xaa);
        assert_eq!(bytes[5] >> 3, ObuType::AudioFrameId9 as u8);
        assert_eq!(bytes[7], 0xbb);
    }

    #[test]
    fn test_failed_unit_emits_nothing() {
        let sequencer = ObuSequencer::new(LebGenerator::minimum(), false);
        let mut writer = BitWriter::new(LebGenerator::minimum());
        let good_frame = frame(0, vec![0xaa]);
        // An arbitrary OBU carrying a redundant temporal delimiter header
        // fails validation after the frame was already serialized.
        let bad_arbitrary = ArbitraryObu {
            header: ObuHeader {
                redundant_copy: true,
                ..Default::default()
            },
            obu_type: ObuType::TemporalDelimiter,
            payload: vec![],
            insertion_hook: InsertionHook::AfterAudioFrames,
            insertion_tick: Some(0),
        };
        assert!(sequencer
            .write_temporal_unit(0, &[], &[&good_frame], &[bad_arbitrary], &mut writer)
            .is_err());
        assert!(writer.data().is_empty());
    }
}
