//! # IAMF Encoder
//!
//! The encoder core: ingests labeled, time-aligned PCM together with
//! descriptor OBUs, parameter blocks and user metadata, and produces a
//! well-formed IAMF bitstream.
//!
//! The pipeline is single-threaded and cooperative: samples flow through
//! the [`frames::AudioFrameGenerator`], the [`params::ParametersManager`]
//! resolves the down-mix parameters in force at each frame, the
//! [`timing::GlobalTimingModule`] assigns and validates tick timestamps,
//! and the [`sequencer::ObuSequencer`] emits OBUs through the bit writer.

pub mod channels;
pub mod descriptors;
pub mod frames;
pub mod metadata;
pub mod params;
pub mod sequencer;
pub mod timing;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use iamf_core::{BitWriter, DecodedUleb128, Error, LebGenerator, Result};
use iamf_codecs::AudioFrameWithData;
use iamf_obu::{ArbitraryObu, ParamDefinitionVariant, ParameterBlockObu, PerIdParameterMetadata};

pub use channels::ChannelLabel;
pub use descriptors::{AudioElementWithData, Descriptors};
pub use frames::AudioFrameGenerator;
pub use metadata::{
    ArbitraryObuMetadata, AudioFrameMetadata, CodecSettingsMetadata, LebGeneratorMetadata,
    LebGeneratorMode, ParameterBlockMetadata, SequencingMetadata, UserMetadata,
};
pub use params::{ParameterBlockWithData, ParametersManager};
pub use sequencer::ObuSequencer;
pub use timing::GlobalTimingModule;

/// The encoder core as a pure function from metadata and PCM to bytes.
///
/// ```no_run
/// # fn example(descriptors: iamf_encoder::Descriptors,
/// #            metadata: iamf_encoder::UserMetadata) -> iamf_core::Result<Vec<u8>> {
/// let mut encoder = iamf_encoder::SequenceEncoder::new(descriptors, &metadata)?;
/// encoder.add_samples(42, iamf_encoder::ChannelLabel::L2, &[0; 64])?;
/// encoder.add_samples(42, iamf_encoder::ChannelLabel::R2, &[0; 64])?;
/// encoder.encode()
/// # }
/// ```
pub struct SequenceEncoder {
    descriptors: Descriptors,
    leb_generator: LebGenerator,
    sequencer: ObuSequencer,
    emit_redundant_descriptors_at_end: bool,
    arbitrary_obus: Vec<ArbitraryObu>,
    param_definitions: HashMap<DecodedUleb128, PerIdParameterMetadata>,
    /// Parameter ids each audio element's descriptor references.
    element_parameter_ids: HashMap<DecodedUleb128, Vec<DecodedUleb128>>,
    timing: GlobalTimingModule,
    parameters_manager: ParametersManager,
    frame_generator: AudioFrameGenerator,
    parameter_blocks: Vec<ParameterBlockWithData>,
}

impl SequenceEncoder {
    /// Initialize the pipeline against immutable descriptors.
    pub fn new(descriptors: Descriptors, user_metadata: &UserMetadata) -> Result<Self> {
        let leb_generator = user_metadata.leb_generator.build()?;
        let param_definitions = descriptors.collect_param_definitions()?;

        let stray_parameter_ids: Vec<DecodedUleb128> = user_metadata
            .parameter_block_metadata
            .iter()
            .map(|metadata| metadata.parameter_id)
            .filter(|id| !param_definitions.contains_key(id))
            .collect();

        let mut timing = GlobalTimingModule::new(stray_parameter_ids);
        let base_definitions: HashMap<_, _> = param_definitions
            .iter()
            .map(|(&id, metadata)| (id, metadata.param_definition.clone()))
            .collect();
        timing.initialize(
            &descriptors.audio_elements,
            &descriptors.codec_configs,
            &base_definitions,
        )?;

        let parameters_manager = ParametersManager::new(&descriptors.audio_elements)?;
        let frame_generator = AudioFrameGenerator::new(
            &descriptors,
            &user_metadata.audio_frame_metadata,
            &user_metadata.codec_settings.build(),
        )?;

        let arbitrary_obus = user_metadata
            .arbitrary_obu_metadata
            .iter()
            .map(|metadata| metadata.build())
            .collect::<Result<Vec<_>>>()?;

        let element_parameter_ids = descriptors
            .audio_elements
            .iter()
            .map(|(&element_id, element)| {
                let ids = element
                    .obu
                    .audio_element_params
                    .iter()
                    .filter_map(|param| match &param.param_definition {
                        ParamDefinitionVariant::Demixing(definition) => {
                            Some(definition.base.parameter_id)
                        }
                        ParamDefinitionVariant::ReconGain(definition) => {
                            Some(definition.base.parameter_id)
                        }
                        _ => None,
                    })
                    .collect();
                (element_id, ids)
            })
            .collect();

        Ok(Self {
            sequencer: ObuSequencer::new(
                leb_generator,
                user_metadata.sequencing.include_temporal_delimiters,
            ),
            emit_redundant_descriptors_at_end: user_metadata
                .sequencing
                .emit_redundant_descriptors_at_end,
            descriptors,
            leb_generator,
            arbitrary_obus,
            param_definitions,
            element_parameter_ids,
            timing,
            parameters_manager,
            frame_generator,
            parameter_blocks: Vec::new(),
        })
    }

    /// The definition context for a parameter id, as collected from the
    /// descriptors.
    pub fn param_definition(
        &self,
        parameter_id: DecodedUleb128,
    ) -> Option<&PerIdParameterMetadata> {
        self.param_definitions.get(&parameter_id)
    }

    /// Append samples for one labeled channel of an audio element.
    pub fn add_samples(
        &mut self,
        audio_element_id: DecodedUleb128,
        label: ChannelLabel,
        samples: &[i32],
    ) -> Result<()> {
        self.frame_generator
            .add_samples(audio_element_id, label, samples)
    }

    /// Queue a parameter block, assigning its timestamps.
    ///
    /// `input_start_timestamp` must match the parameter stream's running
    /// counter.
    pub fn add_parameter_block(
        &mut self,
        obu: ParameterBlockObu,
        input_start_timestamp: i64,
    ) -> Result<()> {
        let definition = &obu.metadata().param_definition;
        let duration = if definition.param_definition_mode {
            obu.duration
        } else {
            definition.duration
        };
        let (start_timestamp, end_timestamp) = self.timing.get_next_parameter_block_timestamps(
            obu.parameter_id,
            input_start_timestamp,
            duration,
        )?;
        self.parameter_blocks.push(ParameterBlockWithData {
            obu,
            start_timestamp,
            end_timestamp,
        });
        Ok(())
    }

    /// Check that every parameter stream an element references covers the
    /// frame, against the blocks queued for this sequence.
    fn validate_coverage(&self, frame: &AudioFrameWithData) -> Result<()> {
        let Some(parameter_ids) = self.element_parameter_ids.get(&frame.audio_element_id) else {
            return Ok(());
        };
        for &parameter_id in parameter_ids {
            let covered = self.parameter_blocks.iter().any(|block| {
                block.obu.parameter_id == parameter_id
                    && block.start_timestamp <= frame.start_timestamp
                    && block.end_timestamp >= frame.end_timestamp
            });
            // A stream that never produced blocks falls back to defaults;
            // one that produced some but stops short is an error.
            let stream_has_blocks = self
                .parameter_blocks
                .iter()
                .any(|block| block.obu.parameter_id == parameter_id);
            if stream_has_blocks && !covered {
                return Err(Error::invalid_argument(format!(
                    "parameter stream {parameter_id} does not cover the audio frame \
                     [{}, {}) of substream {}",
                    frame.start_timestamp,
                    frame.end_timestamp,
                    frame.obu.substream_id()
                )));
            }
        }
        Ok(())
    }

    /// Drive the pipeline to completion and return the bitstream.
    pub fn encode(mut self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(self.leb_generator);
        self.sequencer
            .write_descriptor_obus(&self.descriptors, &self.arbitrary_obus, &mut writer)?;

        // Feed the queued parameter blocks, in time order, to the manager.
        self.parameter_blocks
            .sort_by_key(|block| block.start_timestamp);
        for block in &self.parameter_blocks {
            self.parameters_manager.add_demixing_parameter_block(block);
        }

        self.frame_generator.finalize()?;
        let frames = self
            .frame_generator
            .output_frames(&mut self.parameters_manager, &mut self.timing)?;
        for frame in &frames {
            self.validate_coverage(frame)?;
        }

        // A temporal unit per distinct start tick, ascending.
        let ticks: BTreeSet<i64> = frames
            .iter()
            .map(|frame| frame.start_timestamp)
            .chain(self.parameter_blocks.iter().map(|block| block.start_timestamp))
            .collect();
        let substream_count: HashSet<u32> = frames
            .iter()
            .map(|frame| frame.obu.substream_id())
            .collect();
        debug!(
            temporal_units = ticks.len(),
            substreams = substream_count.len(),
            frames = frames.len(),
            parameter_blocks = self.parameter_blocks.len(),
            "sequencing stream"
        );

        for &tick in &ticks {
            let unit_parameter_blocks: Vec<&ParameterBlockWithData> = self
                .parameter_blocks
                .iter()
                .filter(|block| block.start_timestamp == tick)
                .collect();
            let unit_frames: Vec<&AudioFrameWithData> = frames
                .iter()
                .filter(|frame| frame.start_timestamp == tick)
                .collect();
            self.sequencer.write_temporal_unit(
                tick,
                &unit_parameter_blocks,
                &unit_frames,
                &self.arbitrary_obus,
                &mut writer,
            )?;
        }

        if self.emit_redundant_descriptors_at_end {
            self.sequencer
                .write_redundant_descriptor_obus(&self.descriptors, &mut writer)?;
        }
        writer.take_bytes()
    }
}
