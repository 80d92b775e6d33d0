//! FLAC encoder adapter over the pure-Rust `flacenc` crate.

use flacenc::component::BitRepr;
use flacenc::error::Verify;
use iamf_core::{Error, Result};
use iamf_obu::decoder_config::flac::FlacStreamInfo;
use iamf_obu::{CodecConfigObu, DecoderConfig};

use crate::frame::AudioFrameWithData;
use crate::traits::{validate_frame_shape, AudioEncoder, EncoderState};

/// FLAC encoder adapter.
///
/// IAMF requires a constant block size equal to the frame size, so each
/// pushed frame is coded as one self-contained FLAC frame.
pub struct FlacFrameEncoder {
    stream_info: FlacStreamInfo,
    num_channels: usize,
    num_samples_per_frame: u32,
    state: EncoderState,
}

impl FlacFrameEncoder {
    /// Create an encoder for one substream of `codec_config`.
    pub fn new(codec_config: &CodecConfigObu, num_channels: usize) -> Result<Self> {
        let DecoderConfig::Flac(decoder_config) = &codec_config.codec_config().decoder_config
        else {
            return Err(Error::invalid_argument(format!(
                "expected a FLAC decoder config, got {:?}",
                codec_config.codec_config().decoder_config
            )));
        };
        decoder_config.validate(codec_config.num_samples_per_frame())?;
        let stream_info = decoder_config.stream_info()?.clone();
        if stream_info.number_of_channels as usize != num_channels {
            return Err(Error::invalid_argument(format!(
                "STREAMINFO declares {} channels, the substream carries {num_channels}",
                stream_info.number_of_channels
            )));
        }
        if num_channels > 2 {
            return Err(Error::invalid_argument(format!(
                "FLAC substreams carry 1 or 2 channels, got {num_channels}"
            )));
        }
        Ok(Self {
            stream_info,
            num_channels,
            num_samples_per_frame: codec_config.num_samples_per_frame(),
            state: EncoderState::default(),
        })
    }
}

impl AudioEncoder for FlacFrameEncoder {
    fn samples_to_delay_at_start(&self) -> u32 {
        0
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
        let bits_per_sample = self.stream_info.bits_per_sample;
        if (input_bit_depth as u32) < bits_per_sample as u32 {
            return Err(Error::invalid_argument(format!(
                "{input_bit_depth}-bit input cannot carry {bits_per_sample}-bit FLAC"
            )));
        }

        // Right-justify to the coded bit depth, interleaved.
        let interleaved: Vec<i32> = samples
            .iter()
            .flatten()
            .map(|&s| s >> (32 - bits_per_sample))
            .collect();

        let config = flacenc::config::Encoder::default()
            .into_verified()
            .map_err(|e| Error::FailedPrecondition(format!("flacenc config: {e:?}")))?;
        let source = flacenc::source::MemSource::from_samples(
            &interleaved,
            self.num_channels,
            bits_per_sample as usize,
            self.stream_info.sample_rate as usize,
        );
        let stream = flacenc::encode_with_fixed_block_size(
            &config,
            source,
            self.num_samples_per_frame as usize,
        )
        .map_err(|e| Error::FailedPrecondition(format!("flacenc encode: {e:?}")))?;

        let frame = stream.frame(0).ok_or_else(|| {
            Error::FailedPrecondition("flacenc produced no frame".to_string())
        })?;
        let mut sink = flacenc::bitsink::ByteSink::new();
        frame
            .write(&mut sink)
            .map_err(|e| Error::FailedPrecondition(format!("flacenc write: {e:?}")))?;

        partial_frame.obu.audio_frame = sink.as_slice().to_vec();
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
