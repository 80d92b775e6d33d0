//! # IAMF OBU
//!
//! IAMF Open Bitstream Unit types: per-type validation, payload
//! serialization over a bit buffer, and the shared header/size framing.
//!
//! Every OBU implements [`Obu`]: the payload is serialized to a scratch
//! buffer first so `obu_size` is exact and a failed write never emits
//! partial bytes.

pub mod arbitrary;
pub mod audio_element;
pub mod audio_frame;
pub mod codec_config;
pub mod decoder_config;
pub mod demixing;
pub mod header;
pub mod mix_presentation;
pub mod obu;
pub mod param_definition;
pub mod parameter_block;
pub mod sequence_header;
pub mod temporal_delimiter;

pub use arbitrary::{ArbitraryObu, InsertionHook};
pub use audio_element::{
    AmbisonicsConfig, AmbisonicsMonoConfig, AmbisonicsProjectionConfig, AudioElementConfig,
    AudioElementObu, AudioElementParam, AudioElementType, ChannelAudioLayerConfig,
    ExtensionConfig, LoudspeakerLayout, ScalableChannelLayoutConfig,
    INACTIVE_AMBISONICS_CHANNEL_NUMBER,
};
pub use audio_frame::AudioFrameObu;
pub use codec_config::{CodecConfig, CodecConfigObu, CodecId, DecoderConfig};
pub use demixing::{
    next_w_idx, w_from_w_idx, DMixPMode, DefaultDemixingInfo, DemixingInfoParameterData,
    DownMixingParams, MAX_W_IDX,
};
pub use header::{ObuHeader, ObuType};
pub use mix_presentation::{
    HeadphonesRenderingMode, Layout, LoudnessInfo, MixPresentationLayout, MixPresentationObu,
    MixPresentationSubMix, RenderingConfig, SoundSystem, SubMixAudioElement,
};
pub use obu::Obu;
pub use param_definition::{
    DemixingParamDefinition, ExtendedParamDefinition, MixGainParamDefinition, ParamDefinition,
    ParamDefinitionType, ParamDefinitionVariant, ReconGainParamDefinition,
};
pub use parameter_block::{
    MixGainParameterData, ParameterBlockObu, ParameterData, ParameterSubblock,
    PerIdParameterMetadata, ReconGainElement, ReconGainInfoParameterData,
};
pub use sequence_header::{IaSequenceHeaderObu, ProfileVersion, IA_CODE};
pub use temporal_delimiter::TemporalDelimiterObu;
