//! The descriptor registry: id-keyed maps owning every descriptor OBU.
//!
//! Entities reference each other by id; the registry is the single owner,
//! which keeps the audio-frame -> audio-element -> codec-config chain
//! acyclic.

use std::collections::HashMap;

use iamf_core::{DecodedUleb128, Error, Result};
use iamf_obu::{
    AudioElementObu, CodecConfigObu, IaSequenceHeaderObu, MixPresentationObu,
    ParamDefinitionType, ParamDefinitionVariant, PerIdParameterMetadata,
};

use crate::channels::{substream_labels_for_element, SubstreamLabels};

/// An audio element OBU plus the state derived from it at registration.
#[derive(Debug, Clone)]
pub struct AudioElementWithData {
    pub obu: AudioElementObu,
    /// Labels feeding each substream, in substream-id order.
    pub substream_labels: Vec<SubstreamLabels>,
}

impl AudioElementWithData {
    /// Derive the per-substream labeling for an element.
    pub fn new(obu: AudioElementObu) -> Result<Self> {
        let substream_labels = substream_labels_for_element(&obu)?;
        Ok(Self {
            obu,
            substream_labels,
        })
    }
}

/// Everything emitted once per sequence, immutable after initialization.
#[derive(Debug, Clone)]
pub struct Descriptors {
    pub sequence_header: IaSequenceHeaderObu,
    pub codec_configs: HashMap<DecodedUleb128, CodecConfigObu>,
    pub audio_elements: HashMap<DecodedUleb128, AudioElementWithData>,
    pub mix_presentations: Vec<MixPresentationObu>,
}

impl Descriptors {
    /// Look up the codec config backing an audio element.
    pub fn codec_config_for_element(
        &self,
        audio_element_id: DecodedUleb128,
    ) -> Result<&CodecConfigObu> {
        let element = self.audio_elements.get(&audio_element_id).ok_or_else(|| {
            Error::invalid_argument(format!("unknown audio element {audio_element_id}"))
        })?;
        self.codec_configs
            .get(&element.obu.codec_config_id)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "audio element {audio_element_id} references unknown codec config {}",
                    element.obu.codec_config_id
                ))
            })
    }

    /// Collect every parameter definition declared in the descriptors,
    /// keyed by `parameter_id`.
    ///
    /// Fails with `InvalidArgument` if one id is declared twice with
    /// different definitions.
    pub fn collect_param_definitions(
        &self,
    ) -> Result<HashMap<DecodedUleb128, PerIdParameterMetadata>> {
        let mut definitions: HashMap<DecodedUleb128, PerIdParameterMetadata> = HashMap::new();
        let mut insert = |param_definition_type: ParamDefinitionType,
                          definition: &iamf_obu::ParamDefinition|
         -> Result<()> {
            let metadata = PerIdParameterMetadata {
                param_definition_type,
                param_definition: definition.clone(),
            };
            match definitions.get(&definition.parameter_id) {
                None => {
                    definitions.insert(definition.parameter_id, metadata);
                    Ok(())
                }
                Some(existing) if *existing == metadata => Ok(()),
                Some(_) => Err(Error::invalid_argument(format!(
                    "parameter_id {} is declared with conflicting definitions",
                    definition.parameter_id
                ))),
            }
        };

        for element in self.audio_elements.values() {
            for param in &element.obu.audio_element_params {
                match &param.param_definition {
                    ParamDefinitionVariant::Demixing(definition) => {
                        insert(ParamDefinitionType::Demixing, &definition.base)?
                    }
                    ParamDefinitionVariant::ReconGain(definition) => {
                        insert(ParamDefinitionType::ReconGain, &definition.base)?
                    }
                    ParamDefinitionVariant::MixGain(definition) => {
                        insert(ParamDefinitionType::MixGain, &definition.base)?
                    }
                    ParamDefinitionVariant::Extended(_) => {}
                }
            }
        }
        for mix_presentation in &self.mix_presentations {
            for sub_mix in &mix_presentation.sub_mixes {
                for element in &sub_mix.audio_elements {
                    insert(ParamDefinitionType::MixGain, &element.element_mix_gain.base)?;
                }
                insert(ParamDefinitionType::MixGain, &sub_mix.output_mix_gain.base)?;
            }
        }
        Ok(definitions)
    }
}
