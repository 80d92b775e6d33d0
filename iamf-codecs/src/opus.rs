//! Opus encoder adapter over libopus.

use iamf_core::{Error, Result};
use iamf_obu::decoder_config::opus::OpusDecoderConfig;
use iamf_obu::{CodecConfigObu, DecoderConfig};

use crate::frame::AudioFrameWithData;
use crate::traits::{validate_frame_shape, AudioEncoder, EncoderState};

/// Upper bound for one coded Opus packet.
const MAX_OPUS_PACKET_SIZE: usize = 4000;

/// libopus application modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpusApplication {
    #[default]
    Audio,
    Voip,
    LowDelay,
}

/// Caller-tunable encoder knobs, separate from the descriptor fields.
#[derive(Debug, Clone)]
pub struct OpusEncoderSettings {
    pub application: OpusApplication,
    /// Feed libopus float samples instead of 16-bit samples.
    pub use_float_api: bool,
    /// Target bitrate in bits per second; `None` keeps the libopus default.
    pub target_bitrate: Option<i32>,
}

impl Default for OpusEncoderSettings {
    fn default() -> Self {
        Self {
            application: OpusApplication::Audio,
            use_float_api: true,
            target_bitrate: None,
        }
    }
}

fn map_opus_error(context: &str, error: opus::Error) -> Error {
    Error::FailedPrecondition(format!("libopus {context}: {error}"))
}

/// Opus encoder adapter.
pub struct OpusFrameEncoder {
    encoder: opus::Encoder,
    settings: OpusEncoderSettings,
    num_channels: usize,
    num_samples_per_frame: u32,
    pre_skip: u16,
    state: EncoderState,
}

impl OpusFrameEncoder {
    /// Create an encoder for one substream of `codec_config`.
    ///
    /// Opus carries one or two channels per substream.
    pub fn new(
        codec_config: &CodecConfigObu,
        num_channels: usize,
        settings: OpusEncoderSettings,
    ) -> Result<Self> {
        let decoder_config = match &codec_config.codec_config().decoder_config {
            DecoderConfig::Opus(config) => config.clone(),
            other => {
                return Err(Error::invalid_argument(format!(
                    "expected an Opus decoder config, got {other:?}"
                )))
            }
        };
        let channels = match num_channels {
            1 => opus::Channels::Mono,
            2 => opus::Channels::Stereo,
            other => {
                return Err(Error::invalid_argument(format!(
                    "Opus substreams carry 1 or 2 channels, got {other}"
                )))
            }
        };
        let sample_rate = codec_config.input_sample_rate()?;
        if !matches!(sample_rate, 8000 | 12000 | 16000 | 24000 | 48000) {
            return Err(Error::invalid_argument(format!(
                "libopus does not accept an input sample rate of {sample_rate}"
            )));
        }
        let application = match settings.application {
            OpusApplication::Audio => opus::Application::Audio,
            OpusApplication::Voip => opus::Application::Voip,
            OpusApplication::LowDelay => opus::Application::LowDelay,
        };

        let mut encoder = opus::Encoder::new(sample_rate, channels, application)
            .map_err(|e| map_opus_error("initialization", e))?;
        if let Some(bitrate) = settings.target_bitrate {
            encoder
                .set_bitrate(opus::Bitrate::Bits(bitrate))
                .map_err(|e| map_opus_error("set_bitrate", e))?;
        }

        Ok(Self {
            encoder,
            settings,
            num_channels,
            num_samples_per_frame: codec_config.num_samples_per_frame(),
            pre_skip: decoder_config.pre_skip,
            state: EncoderState::default(),
        })
    }

    /// Samples the decoder must discard, straight from the descriptor.
    pub fn pre_skip(&self) -> u16 {
        self.pre_skip
    }
}

impl AudioEncoder for OpusFrameEncoder {
    fn samples_to_delay_at_start(&self) -> u32 {
        self.pre_skip as u32
    }

    fn num_samples_per_frame(&self) -> u32 {
        self.num_samples_per_frame
    }

    fn encode_audio_frame(
        &mut self,
        input_bit_depth: u8,
        samples: &[Vec<i32>],
        mut partial_frame: AudioFrameWithData,
    ) -> Result<()> {
        self.state.check_not_finalized()?;
        validate_frame_shape(
            samples,
            self.num_samples_per_frame,
            self.num_channels,
            input_bit_depth,
        )?;

        let mut payload = vec![0u8; MAX_OPUS_PACKET_SIZE];
        let written = if self.settings.use_float_api {
            let interleaved: Vec<f32> = samples
                .iter()
                .flatten()
                .map(|&s| s as f32 / -(i32::MIN as f32))
                .collect();
            self.encoder
                .encode_float(&interleaved, &mut payload)
                .map_err(|e| map_opus_error("encode_float", e))?
        } else {
            if input_bit_depth != 16 {
                return Err(Error::invalid_argument(format!(
                    "the Opus integer API takes 16-bit input, got {input_bit_depth}"
                )));
            }
            let interleaved: Vec<i16> = samples
                .iter()
                .flatten()
                .map(|&s| (s >> 16) as i16)
                .collect();
            self.encoder
                .encode(&interleaved, &mut payload)
                .map_err(|e| map_opus_error("encode", e))?
        };
        payload.truncate(written);

        partial_frame.obu.audio_frame = payload;
        self.state.push_ready(partial_frame);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.state.finalize();
        Ok(())
    }

    fn finished(&self) -> bool {
        self.state.finished()
    }

    fn pop(&mut self) -> Option<AudioFrameWithData> {
        self.state.pop_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_obu::{CodecConfig, CodecId, ObuHeader};

    fn opus_codec_config(input_sample_rate: u32) -> CodecConfigObu {
        let mut obu = CodecConfigObu::new(
            ObuHeader::default(),
            0,
            CodecConfig {
                codec_id: CodecId::Opus,
                num_samples_per_frame: 960,
                audio_roll_distance: -4,
                decoder_config: DecoderConfig::Opus(OpusDecoderConfig {
                    version: 1,
                    pre_skip: 312,
                    input_sample_rate,
                    output_gain: 0,
                    mapping_family: 0,
                }),
            },
        );
        obu.initialize().unwrap();
        obu
    }

    #[test]
    fn test_rejects_unsupported_sample_rate() {
        let config = opus_codec_config(44100);
        assert!(
            OpusFrameEncoder::new(&config, 2, OpusEncoderSettings::default())
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_rejects_more_than_two_channels() {
        let config = opus_codec_config(48000);
        assert!(
            OpusFrameEncoder::new(&config, 3, OpusEncoderSettings::default())
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_delay_comes_from_pre_skip() {
        let config = opus_codec_config(48000);
        let encoder = OpusFrameEncoder::new(&config, 2, OpusEncoderSettings::default()).unwrap();
        assert_eq!(encoder.samples_to_delay_at_start(), 312);
        assert_eq!(encoder.num_samples_per_frame(), 960);
    }

    #[test]
    fn test_integer_api_requires_16_bit_input() {
        let config = opus_codec_config(48000);
        let settings = OpusEncoderSettings {
            use_float_api: false,
            ..Default::default()
        };
        let mut encoder = OpusFrameEncoder::new(&config, 1, settings).unwrap();
        let samples = vec![vec![0i32]; 960];
        let frame = AudioFrameWithData {
            obu: iamf_obu::AudioFrameObu::new(ObuHeader::default(), 0, vec![]),
            start_timestamp: 0,
            end_timestamp: 960,
            raw_samples: vec![],
            down_mixing_params: iamf_obu::DownMixingParams::from_mode(
                iamf_obu::DMixPMode::Mode1,
                0,
            )
            .unwrap(),
            audio_element_id: 0,
        };
        assert!(encoder
            .encode_audio_frame(24, &samples, frame)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_encode_pops_in_push_order() {
        let config = opus_codec_config(48000);
        let mut encoder =
            OpusFrameEncoder::new(&config, 1, OpusEncoderSettings::default()).unwrap();
        for start in [0i64, 960] {
            let frame = AudioFrameWithData {
                obu: iamf_obu::AudioFrameObu::new(ObuHeader::default(), 0, vec![]),
                start_timestamp: start,
                end_timestamp: start + 960,
                raw_samples: vec![],
                down_mixing_params: iamf_obu::DownMixingParams::from_mode(
                    iamf_obu::DMixPMode::Mode1,
                    0,
                )
                .unwrap(),
                audio_element_id: 0,
            };
            encoder
                .encode_audio_frame(16, &vec![vec![0i32]; 960], frame)
                .unwrap();
        }
        encoder.finalize().unwrap();

        let first = encoder.pop().unwrap();
        let second = encoder.pop().unwrap();
        assert_eq!(first.start_timestamp, 0);
        assert_eq!(second.start_timestamp, 960);
        assert!(!first.obu.audio_frame.is_empty());
        assert!(encoder.pop().is_none());
        assert!(encoder.finished());
    }
}
