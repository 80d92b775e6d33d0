//! Audio frames in flight between the codec layer and the sequencer.

use iamf_core::DecodedUleb128;
use iamf_obu::{AudioFrameObu, DownMixingParams};

/// An audio frame OBU together with the pipeline state that produced it.
///
/// The frame is created *partial* (empty `obu.audio_frame`) when its
/// samples enter an encoder, and completed when the codec hands back the
/// coded payload. Entities are referenced by id, never by pointer.
#[derive(Debug, Clone)]
pub struct AudioFrameWithData {
    pub obu: AudioFrameObu,
    /// Start tick from the global timing module.
    pub start_timestamp: i64,
    /// End tick from the global timing module.
    pub end_timestamp: i64,
    /// The original samples, arranged `[time][channel]`.
    pub raw_samples: Vec<Vec<i32>>,
    /// Down-mixing parameters in force when this frame was cut.
    pub down_mixing_params: DownMixingParams,
    /// The audio element owning the substream.
    pub audio_element_id: DecodedUleb128,
}
