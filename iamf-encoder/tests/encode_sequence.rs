//! End-to-end tests: descriptors + labeled PCM + parameter blocks in,
//! a structurally valid OBU stream out.

use std::collections::HashMap;

use iamf_core::BitReader;
use iamf_encoder::{
    AudioElementWithData, AudioFrameMetadata, ChannelLabel, Descriptors, SequenceEncoder,
    UserMetadata,
};
use iamf_obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmSampleFormat};
use iamf_obu::demixing::{DMixPMode, DefaultDemixingInfo};
use iamf_obu::{
    AudioElementConfig, AudioElementObu, AudioElementParam, AudioElementType,
    ChannelAudioLayerConfig, CodecConfig, CodecConfigObu, CodecId, DecoderConfig,
    DemixingInfoParameterData, DemixingParamDefinition, HeadphonesRenderingMode,
    IaSequenceHeaderObu, Layout, LoudnessInfo, LoudspeakerLayout, MixGainParamDefinition,
    MixPresentationLayout, MixPresentationObu, MixPresentationSubMix, ObuHeader, ObuType,
    ParamDefinition, ParamDefinitionType, ParamDefinitionVariant, ParameterBlockObu,
    ParameterData, ParameterSubblock, PerIdParameterMetadata, ProfileVersion, RenderingConfig,
    ScalableChannelLayoutConfig, SoundSystem, SubMixAudioElement,
};

const CODEC_CONFIG_ID: u32 = 0;
const ELEMENT_ID: u32 = 42;
const SUBSTREAM_ID: u32 = 4;
const PARAMETER_ID: u32 = 99;
const FRAME_SIZE: u32 = 8;

fn demixing_definition() -> DemixingParamDefinition {
    DemixingParamDefinition {
        base: ParamDefinition {
            parameter_id: PARAMETER_ID,
            parameter_rate: 48000,
            param_definition_mode: false,
            reserved: 0,
            duration: FRAME_SIZE,
            constant_subblock_duration: FRAME_SIZE,
            subblock_durations: vec![],
        },
        default_demixing_info: DefaultDemixingInfo {
            dmixp_mode: DMixPMode::Mode1,
            reserved: 0,
            default_w: 10,
            reserved_for_future_use: 0,
        },
    }
}

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

fn descriptors() -> Descriptors {
    let mut codec_config = CodecConfigObu::new(
        ObuHeader::default(),
        CODEC_CONFIG_ID,
        CodecConfig {
            codec_id: CodecId::Lpcm,
            num_samples_per_frame: FRAME_SIZE,
            audio_roll_distance: 0,
            decoder_config: DecoderConfig::Lpcm(LpcmDecoderConfig {
                sample_format_flags: LpcmSampleFormat::LittleEndian,
                sample_size: 16,
                sample_rate: 48000,
            }),
        },
    );
    codec_config.initialize().unwrap();

    let element = AudioElementWithData::new(AudioElementObu {
        header: ObuHeader::default(),
        audio_element_id: ELEMENT_ID,
        audio_element_type: AudioElementType::ChannelBased,
        reserved: 0,
        codec_config_id: CODEC_CONFIG_ID,
        audio_substream_ids: vec![SUBSTREAM_ID],
        audio_element_params: vec![AudioElementParam {
            param_definition: ParamDefinitionVariant::Demixing(demixing_definition()),
        }],
        config: AudioElementConfig::ScalableChannel(ScalableChannelLayoutConfig {
            reserved: 0,
            channel_audio_layer_configs: vec![ChannelAudioLayerConfig {
                loudspeaker_layout: LoudspeakerLayout::Stereo,
                output_gain_is_present: false,
                recon_gain_is_present: false,
                reserved_a: 0,
                substream_count: 1,
                coupled_substream_count: 1,
                output_gain_flags: 0,
                reserved_b: 0,
                output_gain: 0,
            }],
        }),
    })
    .unwrap();

    let mix_presentation = MixPresentationObu {
        header: ObuHeader::default(),
        mix_presentation_id: 7,
        annotations_language: vec!["en-us".to_string()],
        localized_presentation_annotations: vec!["test mix".to_string()],
        sub_mixes: vec![MixPresentationSubMix {
            audio_elements: vec![SubMixAudioElement {
                audio_element_id: ELEMENT_ID,
                localized_element_annotations: vec!["bed".to_string()],
                rendering_config: RenderingConfig {
                    headphones_rendering_mode: HeadphonesRenderingMode::Stereo,
                    reserved: 0,
                    rendering_config_extension_bytes: vec![],
                },
                element_mix_gain: mix_gain(100),
            }],
            output_mix_gain: mix_gain(101),
            layouts: vec![MixPresentationLayout {
                layout: Layout::LoudspeakersSsConvention {
                    sound_system: SoundSystem::A0_2_0,
                    reserved: 0,
                },
                loudness: LoudnessInfo::zeroed(),
            }],
        }],
    };

    Descriptors {
        sequence_header: IaSequenceHeaderObu::new(
            ObuHeader::default(),
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        ),
        codec_configs: HashMap::from([(CODEC_CONFIG_ID, codec_config)]),
        audio_elements: HashMap::from([(ELEMENT_ID, element)]),
        mix_presentations: vec![mix_presentation],
    }
}

fn user_metadata(include_temporal_delimiters: bool) -> UserMetadata {
    let mut metadata = UserMetadata {
        audio_frame_metadata: vec![AudioFrameMetadata {
            audio_element_id: ELEMENT_ID,
            channel_labels: vec![ChannelLabel::L2, ChannelLabel::R2],
            samples_to_trim_at_start: 0,
            samples_to_trim_at_end: 0,
            input_bit_depth: 16,
        }],
        ..UserMetadata::default()
    };
    metadata.sequencing.include_temporal_delimiters = include_temporal_delimiters;
    metadata
}

fn demixing_block(dmixp_mode: DMixPMode) -> ParameterBlockObu {
    let mut obu = ParameterBlockObu::new(
        ObuHeader::default(),
        PARAMETER_ID,
        PerIdParameterMetadata {
            param_definition_type: ParamDefinitionType::Demixing,
            param_definition: demixing_definition().base,
        },
    );
    obu.subblocks.push(ParameterSubblock {
        subblock_duration: None,
        param_data: ParameterData::Demixing(DemixingInfoParameterData {
            dmixp_mode,
            reserved: 0,
        }),
    });
    obu
}

/// Walk the stream, returning each OBU's type tag.
fn obu_types(mut data: &[u8]) -> Vec<u8> {
    let mut types = Vec::new();
    while !data.is_empty() {
        let mut reader = BitReader::new(data);
        let obu_type = (reader.read_unsigned(8).unwrap() >> 3) as u8;
        let obu_size = reader.read_uleb128().unwrap() as usize;
        types.push(obu_type);
        let header_len = reader.position() / 8;
        data = &data[header_len + obu_size..];
    }
    types
}

fn encode_two_frames(metadata: UserMetadata) -> Vec<u8> {
    let mut encoder = SequenceEncoder::new(descriptors(), &metadata).unwrap();
    let samples: Vec<i32> = (0..(2 * FRAME_SIZE) as i32).map(|i| i << 16).collect();
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::L2, &samples)
        .unwrap();
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::R2, &samples)
        .unwrap();
    encoder
        .add_parameter_block(demixing_block(DMixPMode::Mode3N), 0)
        .unwrap();
    encoder
        .add_parameter_block(demixing_block(DMixPMode::Mode3N), FRAME_SIZE as i64)
        .unwrap();
    encoder.encode().unwrap()
}

#[test]
fn stream_structure_without_temporal_delimiters() {
    let bytes = encode_two_frames(user_metadata(false));
    assert_eq!(
        obu_types(&bytes),
        vec![
            ObuType::SequenceHeader as u8,
            ObuType::CodecConfig as u8,
            ObuType::AudioElement as u8,
            ObuType::MixPresentation as u8,
            // Two temporal units: parameter block then audio frame.
            ObuType::ParameterBlock as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
            ObuType::ParameterBlock as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
        ]
    );
}

#[test]
fn stream_structure_with_temporal_delimiters() {
    let bytes = encode_two_frames(user_metadata(true));
    assert_eq!(
        obu_types(&bytes),
        vec![
            ObuType::SequenceHeader as u8,
            ObuType::CodecConfig as u8,
            ObuType::AudioElement as u8,
            ObuType::MixPresentation as u8,
            ObuType::TemporalDelimiter as u8,
            ObuType::ParameterBlock as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
            ObuType::TemporalDelimiter as u8,
            ObuType::ParameterBlock as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
        ]
    );
}

#[test]
fn redundant_descriptors_at_end_of_stream() {
    let mut metadata = user_metadata(false);
    metadata.sequencing.emit_redundant_descriptors_at_end = true;
    let bytes = encode_two_frames(metadata);
    let types = obu_types(&bytes);
    assert_eq!(
        &types[types.len() - 4..],
        &[
            ObuType::SequenceHeader as u8,
            ObuType::CodecConfig as u8,
            ObuType::AudioElement as u8,
            ObuType::MixPresentation as u8,
        ]
    );
}

#[test]
fn parameter_stream_stopping_short_is_rejected() {
    let mut encoder = SequenceEncoder::new(descriptors(), &user_metadata(false)).unwrap();
    let samples: Vec<i32> = vec![0; (2 * FRAME_SIZE) as usize];
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::L2, &samples)
        .unwrap();
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::R2, &samples)
        .unwrap();
    // Only the first frame is covered.
    encoder
        .add_parameter_block(demixing_block(DMixPMode::Mode3N), 0)
        .unwrap();
    assert!(encoder.encode().unwrap_err().is_invalid_argument());
}

#[test]
fn out_of_order_parameter_block_is_rejected() {
    let mut encoder = SequenceEncoder::new(descriptors(), &user_metadata(false)).unwrap();
    assert!(encoder
        .add_parameter_block(demixing_block(DMixPMode::Mode3N), FRAME_SIZE as i64)
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn no_parameter_blocks_falls_back_to_defaults() {
    let mut encoder = SequenceEncoder::new(descriptors(), &user_metadata(false)).unwrap();
    let samples: Vec<i32> = vec![0; FRAME_SIZE as usize];
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::L2, &samples)
        .unwrap();
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::R2, &samples)
        .unwrap();
    let bytes = encoder.encode().unwrap();
    assert_eq!(
        obu_types(&bytes),
        vec![
            ObuType::SequenceHeader as u8,
            ObuType::CodecConfig as u8,
            ObuType::AudioElement as u8,
            ObuType::MixPresentation as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
        ]
    );
}

#[test]
fn arbitrary_obu_injected_after_audio_frames() {
    let mut metadata = user_metadata(false);
    metadata.arbitrary_obu_metadata = vec![iamf_encoder::ArbitraryObuMetadata {
        obu_type: 24,
        payload: vec![1, 2, 3],
        insertion_hook: iamf_encoder::metadata::InsertionHookMetadata::AfterAudioFrames,
        insertion_tick: Some(0),
    }];
    let bytes = encode_two_frames(metadata);
    assert_eq!(
        obu_types(&bytes),
        vec![
            ObuType::SequenceHeader as u8,
            ObuType::CodecConfig as u8,
            ObuType::AudioElement as u8,
            ObuType::MixPresentation as u8,
            ObuType::ParameterBlock as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
            // Bound to tick 0 only.
            24,
            ObuType::ParameterBlock as u8,
            ObuType::AudioFrameId0 as u8 + SUBSTREAM_ID as u8,
        ]
    );
}

#[test]
fn user_metadata_decodes_from_json() {
    let json = r#"{
        "leb_generator": {"mode": "fixed", "fixed_size": 2},
        "audio_frame_metadata": [{
            "audio_element_id": 42,
            "channel_labels": ["L2", "R2"],
            "samples_to_trim_at_start": 16
        }],
        "sequencing": {"include_temporal_delimiters": true}
    }"#;
    let metadata: UserMetadata = serde_json::from_str(json).unwrap();
    assert_eq!(metadata.leb_generator.fixed_size, Some(2));
    assert_eq!(metadata.audio_frame_metadata.len(), 1);
    assert_eq!(metadata.audio_frame_metadata[0].samples_to_trim_at_start, 16);
    assert_eq!(metadata.audio_frame_metadata[0].input_bit_depth, 16);
    assert!(metadata.sequencing.include_temporal_delimiters);

    // The fixed-width generator flows into the emitted stream.
    let mut encoder = SequenceEncoder::new(descriptors(), &metadata).unwrap();
    let samples: Vec<i32> = vec![0; (2 * FRAME_SIZE) as usize];
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::L2, &samples)
        .unwrap();
    encoder
        .add_samples(ELEMENT_ID, ChannelLabel::R2, &samples)
        .unwrap();
    let bytes = encoder.encode().unwrap();
    // Sequence header: type byte then a 2-byte obu_size of 6.
    assert_eq!(&bytes[..3], &[31 << 3, 0x86, 0x00]);
}
