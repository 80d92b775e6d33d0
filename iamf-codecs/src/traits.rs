//! The uniform encoder contract.

use std::collections::VecDeque;

use iamf_core::{Error, Result};

use crate::frame::AudioFrameWithData;

/// Common trait for the per-codec frame encoders.
///
/// Frames pushed via [`AudioEncoder::encode_audio_frame`] come back from
/// [`AudioEncoder::pop`] in push order, each wearing the metadata of the
/// partial frame it entered with; the FIFO lives in the adapters so the
/// ordering is structural.
///
/// The pipeline is single-threaded; adapters wrap codec handles that are
/// not necessarily `Send`.
pub trait AudioEncoder {
    /// Samples the codec buffers before its first real output.
    fn samples_to_delay_at_start(&self) -> u32;

    /// The fixed frame size in samples per channel.
    fn num_samples_per_frame(&self) -> u32;

    /// Push one frame of samples and take ownership of the partial frame
    /// whose `obu.audio_frame` will hold the coded payload.
    ///
    /// `samples` is arranged `[time][channel]`, each value left-justified
    /// in the upper `input_bit_depth` bits of an `i32`.
    fn encode_audio_frame(
        &mut self,
        input_bit_depth: u8,
        samples: &[Vec<i32>],
        partial_frame: AudioFrameWithData,
    ) -> Result<()>;

    /// Signal end of stream; no more frames may be pushed.
    fn finalize(&mut self) -> Result<()>;

    /// Whether the encoder has been finalized and fully drained.
    fn finished(&self) -> bool;

    /// Pop the next ready coded frame, in push order.
    fn pop(&mut self) -> Option<AudioFrameWithData>;
}

/// Common trait for the per-codec frame decoders.
///
/// Only the adapters the encode pipeline needs (LPCM, for recon-gain
/// style comparisons and tests) are implemented; IAMF playback is out of
/// scope.
pub trait AudioDecoder {
    /// Decode one coded frame into samples arranged `[time][channel]`,
    /// left-justified in 32-bit carriers.
    fn decode_audio_frame(&mut self, encoded_frame: &[u8]) -> Result<Vec<Vec<i32>>>;
}

/// Shared push-order FIFO and lifecycle state for the adapters.
#[derive(Debug, Default)]
pub(crate) struct EncoderState {
    ready: VecDeque<AudioFrameWithData>,
    finalized: bool,
}

impl EncoderState {
    pub(crate) fn check_not_finalized(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::failed_precondition(
                "encoder was already finalized".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn push_ready(&mut self, frame: AudioFrameWithData) {
        self.ready.push_back(frame);
    }

    pub(crate) fn pop_ready(&mut self) -> Option<AudioFrameWithData> {
        self.ready.pop_front()
    }

    pub(crate) fn finalize(&mut self) {
        self.finalized = true;
    }

    pub(crate) fn finished(&self) -> bool {
        self.finalized && self.ready.is_empty()
    }
}

/// Validate the `[time][channel]` shape and bit depth of an input frame.
pub(crate) fn validate_frame_shape(
    samples: &[Vec<i32>],
    num_samples_per_frame: u32,
    num_channels: usize,
    input_bit_depth: u8,
) -> Result<()> {
    if !matches!(input_bit_depth, 16 | 24 | 32) {
        return Err(Error::invalid_argument(format!(
            "input_bit_depth must be 16, 24 or 32, got {input_bit_depth}"
        )));
    }
    if samples.len() != num_samples_per_frame as usize {
        return Err(Error::invalid_argument(format!(
            "frame holds {} ticks, expected {num_samples_per_frame}",
            samples.len()
        )));
    }
    for tick in samples {
        if tick.len() != num_channels {
            return Err(Error::invalid_argument(format!(
                "tick holds {} channels, expected {num_channels}",
                tick.len()
            )));
        }
    }
    Ok(())
}
