//! The global timing module.
//!
//! Tracks a running tick counter per substream and per parameter stream,
//! measured at the input sample rate of the backing codec config, and
//! validates that parameter streams cover the audio frames they apply to.

use std::collections::HashMap;

use iamf_core::{DecodedUleb128, Error, Result};
use iamf_obu::{CodecConfigObu, ParamDefinition};

use crate::descriptors::AudioElementWithData;

#[derive(Debug, Clone, Default)]
struct SubstreamTiming {
    /// Start tick of the next frame.
    next_timestamp: i64,
    /// Earliest tick not yet known to be covered by parameters.
    coverage_start: i64,
}

/// Per-substream and per-parameter-id running timestamps.
#[derive(Debug, Default)]
pub struct GlobalTimingModule {
    /// Parameter ids declared without a definition (stray parameter
    /// blocks), registered at initialization time.
    stray_parameter_ids: Vec<DecodedUleb128>,
    substreams: HashMap<DecodedUleb128, SubstreamTiming>,
    parameter_timestamps: HashMap<DecodedUleb128, i64>,
}

impl GlobalTimingModule {
    /// Create a timing module; `stray_parameter_ids` lists parameter
    /// blocks the caller intends to emit without a descriptor definition.
    pub fn new(stray_parameter_ids: Vec<DecodedUleb128>) -> Self {
        Self {
            stray_parameter_ids,
            ..Default::default()
        }
    }

    /// Register every substream and parameter stream at tick zero.
    ///
    /// Fails with `InvalidArgument` on duplicate substream ids across
    /// audio elements, a zero `parameter_rate`, or stray parameter ids
    /// when there is not exactly one codec config.
    pub fn initialize(
        &mut self,
        audio_elements: &HashMap<DecodedUleb128, AudioElementWithData>,
        codec_configs: &HashMap<DecodedUleb128, CodecConfigObu>,
        param_definitions: &HashMap<DecodedUleb128, ParamDefinition>,
    ) -> Result<()> {
        for element in audio_elements.values() {
            for &substream_id in &element.obu.audio_substream_ids {
                if self
                    .substreams
                    .insert(substream_id, SubstreamTiming::default())
                    .is_some()
                {
                    return Err(Error::invalid_argument(format!(
                        "duplicate substream id {substream_id} across audio elements"
                    )));
                }
            }
        }

        for (&parameter_id, definition) in param_definitions {
            if definition.parameter_rate == 0 {
                return Err(Error::invalid_argument(format!(
                    "parameter_rate is zero for parameter_id {parameter_id}"
                )));
            }
            self.parameter_timestamps.insert(parameter_id, 0);
        }

        for &parameter_id in &self.stray_parameter_ids {
            if self.parameter_timestamps.contains_key(&parameter_id) {
                continue;
            }
            // A stray stream ticks at the sole codec config's sample rate;
            // with several configs the rate would be ambiguous.
            if codec_configs.len() != 1 {
                return Err(Error::invalid_argument(format!(
                    "stray parameter_id {parameter_id} requires exactly one codec config, \
                     found {}",
                    codec_configs.len()
                )));
            }
            self.parameter_timestamps.insert(parameter_id, 0);
        }
        Ok(())
    }

    /// Assign `(start, end)` to the next frame of a substream and advance
    /// its counter by `duration` ticks.
    pub fn get_next_audio_frame_timestamps(
        &mut self,
        substream_id: DecodedUleb128,
        duration: u32,
    ) -> Result<(i64, i64)> {
        let timing = self.substreams.get_mut(&substream_id).ok_or_else(|| {
            Error::invalid_argument(format!("unknown substream id {substream_id}"))
        })?;
        let start = timing.next_timestamp;
        let end = start + duration as i64;
        timing.next_timestamp = end;
        Ok((start, end))
    }

    /// Assign `(start, end)` to the next block of a parameter stream.
    ///
    /// `input_start` is the caller's belief of the stream position; it
    /// must match the running counter.
    pub fn get_next_parameter_block_timestamps(
        &mut self,
        parameter_id: DecodedUleb128,
        input_start: i64,
        duration: u32,
    ) -> Result<(i64, i64)> {
        let timestamp = self.parameter_timestamps.get_mut(&parameter_id).ok_or_else(|| {
            Error::invalid_argument(format!("unknown parameter_id {parameter_id}"))
        })?;
        if input_start != *timestamp {
            return Err(Error::invalid_argument(format!(
                "parameter block for id {parameter_id} starts at {input_start}, \
                 the stream is at {timestamp}"
            )));
        }
        let start = *timestamp;
        let end = start + duration as i64;
        *timestamp = end;
        Ok((start, end))
    }

    /// Assert a parameter block `[p_start, p_end)` covers the frames of a
    /// substream up to its current tick.
    ///
    /// Fails with `InvalidArgument` if the parameter stream starts after
    /// the first uncovered tick or ends before the substream's frames do.
    pub fn validate_parameter_block_covers_audio_frame(
        &mut self,
        parameter_id: DecodedUleb128,
        parameter_start: i64,
        parameter_end: i64,
        substream_id: DecodedUleb128,
    ) -> Result<()> {
        let timing = self.substreams.get_mut(&substream_id).ok_or_else(|| {
            Error::invalid_argument(format!("unknown substream id {substream_id}"))
        })?;
        let frame_start = timing.coverage_start;
        let frame_end = timing.next_timestamp;
        if parameter_start > frame_start || parameter_end < frame_end {
            return Err(Error::invalid_argument(format!(
                "parameter stream {parameter_id} covers [{parameter_start}, {parameter_end}), \
                 audio frames of substream {substream_id} span [{frame_start}, {frame_end})"
            )));
        }
        timing.coverage_start = parameter_end;
        Ok(())
    }
}
