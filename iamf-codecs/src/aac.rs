//! AAC-LC encoder adapter over libfdk-aac.

use std::collections::VecDeque;

use fdk_aac::enc::{AudioObjectType, BitRate, ChannelMode, Encoder, EncoderParams, Transport};
use iamf_core::{Error, Result};
use iamf_obu::{CodecConfigObu, DecoderConfig};

use crate::frame::AudioFrameWithData;
use crate::traits::{validate_frame_shape, AudioEncoder, EncoderState};

/// AAC-LC always codes 1024 samples per frame.
pub const AAC_NUM_SAMPLES_PER_FRAME: u32 = 1024;

/// Worst-case AAC output: 6144 bits per channel.
const MAX_OUTPUT_BYTES_PER_CHANNEL: usize = 768;

/// Caller-tunable encoder knobs, separate from the descriptor fields.
#[derive(Debug, Clone)]
pub struct AacEncoderSettings {
    /// 0 selects CBR at `target_bitrate`; 1..=5 select the VBR presets.
    pub bitrate_mode: i32,
    /// SBR/PS signaling; only 0, 1 and 2 are defined.
    pub signaling_mode: i32,
    /// CBR target in bits per second.
    pub target_bitrate: u32,
}

impl Default for AacEncoderSettings {
    fn default() -> Self {
        Self {
            bitrate_mode: 0,
            signaling_mode: 2,
            target_bitrate: 64000,
        }
    }
}

/// AAC-LC encoder adapter.
///
/// libfdk buffers input internally, so coded frames may lag the pushed
/// frames; pending metadata waits in push order until its payload is
/// produced.
pub struct AacFrameEncoder {
    encoder: Encoder,
    num_channels: usize,
    delay: u32,
    pending: VecDeque<AudioFrameWithData>,
    state: EncoderState,
    output_buffer: Vec<u8>,
}

impl AacFrameEncoder {
    /// Create an encoder for one substream of `codec_config`.
    pub fn new(
        codec_config: &CodecConfigObu,
        num_channels: usize,
        settings: AacEncoderSettings,
    ) -> Result<Self> {
        let DecoderConfig::AacLc(decoder_config) = &codec_config.codec_config().decoder_config
        else {
            return Err(Error::invalid_argument(format!(
                "expected an AAC decoder config, got {:?}",
                codec_config.codec_config().decoder_config
            )));
        };
        if codec_config.num_samples_per_frame() != AAC_NUM_SAMPLES_PER_FRAME {
            return Err(Error::invalid_argument(format!(
                "AAC-LC requires {AAC_NUM_SAMPLES_PER_FRAME} samples per frame, got {}",
                codec_config.num_samples_per_frame()
            )));
        }
        if settings.bitrate_mode < 0 {
            return Err(Error::failed_precondition(format!(
                "bitrate_mode must be non-negative, got {}",
                settings.bitrate_mode
            )));
        }
        if !matches!(settings.signaling_mode, 0 | 1 | 2) {
            return Err(Error::invalid_argument(format!(
                "signaling_mode must be 0, 1 or 2, got {}",
                settings.signaling_mode
            )));
        }
        let channels = match num_channels {
            1 => ChannelMode::Mono,
            2 => ChannelMode::Stereo,
            other => {
                return Err(Error::invalid_argument(format!(
                    "AAC substreams carry 1 or 2 channels, got {other}"
                )))
            }
        };
        let bit_rate = match settings.bitrate_mode {
            0 => BitRate::Cbr(settings.target_bitrate),
            1 => BitRate::VbrVeryLow,
            2 => BitRate::VbrLow,
            3 => BitRate::VbrMedium,
            4 => BitRate::VbrHigh,
            5 => BitRate::VbrVeryHigh,
            other => {
                return Err(Error::invalid_argument(format!(
                    "bitrate_mode must be in [0, 5], got {other}"
                )))
            }
        };

        let encoder = Encoder::new(EncoderParams {
            bit_rate,
            sample_rate: decoder_config.sample_rate()?,
            transport: Transport::Raw,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
            channels,
        })
        .map_err(|e| Error::FailedPrecondition(format!("libfdk initialization: {e:?}")))?;

        let delay = encoder
            .info()
            .map_err(|e| Error::FailedPrecondition(format!("libfdk info: {e:?}")))?
            .nDelay;

        Ok(Self {
            encoder,
            num_channels,
            delay,
            pending: VecDeque::new(),
            state: EncoderState::default(),
            output_buffer: vec![0u8; MAX_OUTPUT_BYTES_PER_CHANNEL * num_channels],
        })
    }

    /// Move one coded payload from libfdk onto the oldest pending frame.
    fn attach_output(&mut self, output_size: usize) -> Result<()> {
        let Some(mut frame) = self.pending.pop_front() else {
            return Err(Error::FailedPrecondition(
                "libfdk produced a frame with no pending metadata".to_string(),
            ));
        };
        frame.obu.audio_frame = self.output_buffer[..output_size].to_vec();
        self.state.push_ready(frame);
        Ok(())
    }
}

impl AudioEncoder for AacFrameEncoder {
    fn samples_to_delay_at_start(&self) -> u32 {
        self.delay
    }

    fn num_samples_per_frame(&self) -> u32 {
        AAC_NUM_SAMPLES_PER_FRAME
    }

    fn encode_audio_frame(
        &mut self,
        input_bit_depth: u8,
        samples: &[Vec<i32>],
        partial_frame: AudioFrameWithData,
    ) -> Result<()> {
        self.state.check_not_finalized()?;
        validate_frame_shape(
            samples,
            AAC_NUM_SAMPLES_PER_FRAME,
            self.num_channels,
            input_bit_depth,
        )?;

        let interleaved: Vec<i16> = samples
            .iter()
            .flatten()
            .map(|&s| (s >> 16) as i16)
            .collect();
        self.pending.push_back(partial_frame);

        let mut consumed = 0usize;
        while consumed < interleaved.len() {
            let info = self
                .encoder
                .encode(&interleaved[consumed..], &mut self.output_buffer)
                .map_err(|e| Error::FailedPrecondition(format!("libfdk encode: {e:?}")))?;
            if info.input_consumed == 0 && info.output_size == 0 {
                break;
            }
            consumed += info.input_consumed;
            if info.output_size > 0 {
                self.attach_output(info.output_size)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        // Drain the codec's internal delay line.
        while !self.pending.is_empty() {
            match self.encoder.encode(&[], &mut self.output_buffer) {
                Ok(info) if info.output_size > 0 => self.attach_output(info.output_size)?,
                _ => break,
            }
        }
        // Frames the codec never produced output for are dropped with the
        // stream; surface that loudly.
        if !self.pending.is_empty() {
            tracing::warn!(
                dropped = self.pending.len(),
                "libfdk flushed without draining every pending frame"
            );
            self.pending.clear();
        }
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
    use iamf_obu::decoder_config::aac::{
        AacDecoderConfig, AudioSpecificConfig, SampleFrequencyIndex,
    };
    use iamf_obu::{CodecConfig, CodecId, ObuHeader};

    fn aac_codec_config(num_samples_per_frame: u32) -> CodecConfigObu {
        let mut obu = CodecConfigObu::new(
            ObuHeader::default(),
            0,
            CodecConfig {
                codec_id: CodecId::AacLc,
                num_samples_per_frame,
                audio_roll_distance: -1,
                decoder_config: DecoderConfig::AacLc(AacDecoderConfig {
                    buffer_size_db: 0,
                    max_bitrate: 0,
                    average_bitrate: 0,
                    audio_specific_config: AudioSpecificConfig {
                        sample_frequency_index: SampleFrequencyIndex::Rate48000,
                        sampling_frequency: None,
                        channel_configuration: 2,
                    },
                }),
            },
        );
        obu.initialize().unwrap();
        obu
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let config = aac_codec_config(960);
        assert!(
            AacFrameEncoder::new(&config, 2, AacEncoderSettings::default())
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_negative_bitrate_mode_is_a_precondition_failure() {
        let config = aac_codec_config(1024);
        let settings = AacEncoderSettings {
            bitrate_mode: -1,
            ..Default::default()
        };
        assert!(AacFrameEncoder::new(&config, 2, settings)
            .unwrap_err()
            .is_failed_precondition());
    }

    #[test]
    fn test_bad_signaling_mode_rejected() {
        let config = aac_codec_config(1024);
        let settings = AacEncoderSettings {
            signaling_mode: 3,
            ..Default::default()
        };
        assert!(AacFrameEncoder::new(&config, 2, settings)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_encode_preserves_push_order() {
        let config = aac_codec_config(1024);
        let Ok(mut encoder) = AacFrameEncoder::new(&config, 1, AacEncoderSettings::default())
        else {
            // libfdk may be unavailable in minimal environments.
            return;
        };

        for index in 0..4i64 {
            let frame = AudioFrameWithData {
                obu: iamf_obu::AudioFrameObu::new(ObuHeader::default(), 0, vec![]),
                start_timestamp: index * 1024,
                end_timestamp: (index + 1) * 1024,
                raw_samples: vec![],
                down_mixing_params: iamf_obu::DownMixingParams::from_mode(
                    iamf_obu::DMixPMode::Mode1,
                    0,
                )
                .unwrap(),
                audio_element_id: 0,
            };
            encoder
                .encode_audio_frame(16, &vec![vec![1 << 16]; 1024], frame)
                .unwrap();
        }
        encoder.finalize().unwrap();

        let mut last_start = -1i64;
        while let Some(frame) = encoder.pop() {
            assert!(frame.start_timestamp > last_start, "frames out of order");
            last_start = frame.start_timestamp;
            assert!(!frame.obu.audio_frame.is_empty());
        }
        assert!(encoder.finished());
    }
}
