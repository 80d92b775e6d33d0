//! The parameters manager.
//!
//! Holds the set of demixing parameter blocks for the frame currently
//! being encoded and resolves, per audio element, the down-mixing
//! coefficients in force. The recursive weight index starts at 0 on the
//! first frame, moves by the block's `w_idx_offset` on every
//! [`ParametersManager::update_demixing_state`], and is replaced by the
//! definition's `default_w` whenever the stream runs dry.

use std::collections::{HashMap, VecDeque};

use iamf_core::{DecodedUleb128, Error, Result};
use iamf_obu::{
    next_w_idx, DMixPMode, DownMixingParams, ParameterBlockObu, ParameterData,
};

use crate::descriptors::AudioElementWithData;

/// A parameter block OBU plus the timestamps assigned by the global
/// timing module.
#[derive(Debug, Clone)]
pub struct ParameterBlockWithData {
    pub obu: ParameterBlockObu,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
}

impl ParameterBlockWithData {
    /// The demixing mode of the first subblock, when this is a demixing
    /// block.
    fn demixing_mode(&self) -> Option<DMixPMode> {
        self.obu.subblocks.first().and_then(|subblock| {
            match &subblock.param_data {
                ParameterData::Demixing(data) => Some(data.dmixp_mode),
                _ => None,
            }
        })
    }
}

/// The demixing block held for the frame in flight.
#[derive(Debug, Clone, Copy)]
struct PendingDemixingBlock {
    start_timestamp: i64,
    end_timestamp: i64,
    dmixp_mode: DMixPMode,
}

#[derive(Debug, Clone)]
struct DemixingState {
    parameter_id: DecodedUleb128,
    default_dmixp_mode: DMixPMode,
    default_w: u8,
    /// `wIdx(k - 1)`: the index used for the frame just processed.
    previous_w_idx: i32,
    /// `wIdx(k)`: the index to use for the current frame.
    w_idx: i32,
    /// Start timestamp expected of the next block.
    next_timestamp: i64,
    /// The first frame always uses a weight index of 0.
    first_frame: bool,
}

/// Resolves per-frame down-mixing parameters for each audio element.
#[derive(Debug, Default)]
pub struct ParametersManager {
    /// Audio element id -> demixing state.
    demixing_states: HashMap<DecodedUleb128, DemixingState>,
    /// Parameter id -> pending blocks in time order; the front covers the
    /// frame in flight.
    parameter_blocks: HashMap<DecodedUleb128, VecDeque<PendingDemixingBlock>>,
}

impl ParametersManager {
    /// Scan the audio elements' parameter definitions.
    ///
    /// Fails with `InvalidArgument` if an element declares two demixing
    /// parameter definitions.
    pub fn new(
        audio_elements: &HashMap<DecodedUleb128, AudioElementWithData>,
    ) -> Result<Self> {
        let mut demixing_states = HashMap::new();
        for (&audio_element_id, element) in audio_elements {
            let mut demixing = element
                .obu
                .audio_element_params
                .iter()
                .filter_map(|param| match &param.param_definition {
                    iamf_obu::ParamDefinitionVariant::Demixing(definition) => Some(definition),
                    _ => None,
                });
            let Some(definition) = demixing.next() else {
                continue;
            };
            if demixing.next().is_some() {
                return Err(Error::invalid_argument(format!(
                    "audio element {audio_element_id} declares two demixing parameter \
                     definitions"
                )));
            }
            demixing_states.insert(
                audio_element_id,
                DemixingState {
                    parameter_id: definition.base.parameter_id,
                    default_dmixp_mode: definition.default_demixing_info.dmixp_mode,
                    default_w: definition.default_demixing_info.default_w,
                    previous_w_idx: 0,
                    w_idx: 0,
                    next_timestamp: 0,
                    first_frame: true,
                },
            );
        }
        Ok(Self {
            demixing_states,
            parameter_blocks: HashMap::new(),
        })
    }

    /// Whether an audio element declared a demixing parameter definition.
    pub fn demixing_param_definition_available(
        &self,
        audio_element_id: DecodedUleb128,
    ) -> bool {
        self.demixing_states.contains_key(&audio_element_id)
    }

    /// Hold a demixing parameter block for the frame in flight.
    ///
    /// Non-demixing blocks are ignored; the block is held until
    /// [`ParametersManager::update_demixing_state`] pops it.
    pub fn add_demixing_parameter_block(&mut self, parameter_block: &ParameterBlockWithData) {
        let Some(dmixp_mode) = parameter_block.demixing_mode() else {
            return;
        };
        self.parameter_blocks
            .entry(parameter_block.obu.parameter_id)
            .or_default()
            .push_back(PendingDemixingBlock {
                start_timestamp: parameter_block.start_timestamp,
                end_timestamp: parameter_block.end_timestamp,
                dmixp_mode,
            });
    }

    /// The coefficients in force for an audio element's current frame.
    ///
    /// Falls back to the definition's defaults when the stream has no
    /// block for this frame, and to mode-1 defaults for elements without
    /// a demixing definition. Does not consume the block.
    pub fn get_down_mixing_parameters(
        &self,
        audio_element_id: DecodedUleb128,
    ) -> Result<DownMixingParams> {
        let Some(state) = self.demixing_states.get(&audio_element_id) else {
            return DownMixingParams::from_mode(DMixPMode::Mode1, 0);
        };
        match self
            .parameter_blocks
            .get(&state.parameter_id)
            .and_then(|queue| queue.front())
        {
            Some(block) => {
                if block.start_timestamp != state.next_timestamp {
                    return Err(Error::invalid_argument(format!(
                        "audio element {audio_element_id} expects demixing parameters at \
                         {}, the held block starts at {}",
                        state.next_timestamp, block.start_timestamp
                    )));
                }
                let w_idx_used = if state.first_frame { 0 } else { state.w_idx };
                DownMixingParams::from_mode(block.dmixp_mode, w_idx_used)
            }
            None => DownMixingParams::from_mode(state.default_dmixp_mode, state.default_w as i32),
        }
    }

    /// Advance an element past its current frame: validate the held
    /// block's start against `expected_timestamp`, evolve the weight
    /// index, and pop the block.
    ///
    /// With no held block there is nothing to validate and the call
    /// succeeds without changing state.
    pub fn update_demixing_state(
        &mut self,
        audio_element_id: DecodedUleb128,
        expected_timestamp: i64,
    ) -> Result<()> {
        let Some(state) = self.demixing_states.get_mut(&audio_element_id) else {
            return Ok(());
        };
        let Some(block) = self
            .parameter_blocks
            .get(&state.parameter_id)
            .and_then(|queue| queue.front())
            .copied()
        else {
            return Ok(());
        };
        if block.start_timestamp != expected_timestamp {
            return Err(Error::invalid_argument(format!(
                "update for audio element {audio_element_id} expected timestamp \
                 {expected_timestamp}, the held block starts at {}",
                block.start_timestamp
            )));
        }
        let (_, _, _, _, w_idx_offset) = block.dmixp_mode.coefficients()?;
        let w_idx_used = if state.first_frame { 0 } else { state.w_idx };
        state.previous_w_idx = w_idx_used;
        state.w_idx = next_w_idx(w_idx_used, w_idx_offset);
        state.first_frame = false;
        state.next_timestamp = block.end_timestamp;
        if let Some(queue) = self.parameter_blocks.get_mut(&state.parameter_id) {
            queue.pop_front();
        }
        Ok(())
    }
}
