//! # IAMF Codecs
//!
//! A uniform encoder abstraction over the audio codecs IAMF carries:
//! LPCM (in-tree passthrough), Opus (libopus), AAC-LC (libfdk-aac) and
//! FLAC (`flacenc`).
//!
//! Every adapter preserves push order: frames come back from `pop` in the
//! order they entered `encode_audio_frame`, wearing the metadata of the
//! partial frame they entered with.

pub mod aac;
pub mod flac;
pub mod frame;
pub mod lpcm;
pub mod opus;
pub mod traits;

pub use aac::{AacEncoderSettings, AacFrameEncoder, AAC_NUM_SAMPLES_PER_FRAME};
pub use flac::FlacFrameEncoder;
pub use frame::AudioFrameWithData;
pub use lpcm::{LpcmDecoder, LpcmEncoder};
pub use opus::{OpusApplication, OpusEncoderSettings, OpusFrameEncoder};
pub use traits::{AudioDecoder, AudioEncoder};

use iamf_core::Result;
use iamf_obu::{CodecConfigObu, CodecId};

/// Per-codec encoder knobs, selected by the codec config's branch.
#[derive(Debug, Clone, Default)]
pub struct EncoderSettings {
    pub opus: OpusEncoderSettings,
    pub aac: AacEncoderSettings,
}

/// Construct the encoder matching a codec config's `codec_id`.
pub fn create_encoder(
    codec_config: &CodecConfigObu,
    num_channels: usize,
    settings: &EncoderSettings,
) -> Result<Box<dyn AudioEncoder>> {
    Ok(match codec_config.codec_config().codec_id {
        CodecId::Lpcm => Box::new(LpcmEncoder::new(codec_config, num_channels)?),
        CodecId::Opus => Box::new(OpusFrameEncoder::new(
            codec_config,
            num_channels,
            settings.opus.clone(),
        )?),
        CodecId::AacLc => Box::new(AacFrameEncoder::new(
            codec_config,
            num_channels,
            settings.aac.clone(),
        )?),
        CodecId::Flac => Box::new(FlacFrameEncoder::new(codec_config, num_channels)?),
    })
}
