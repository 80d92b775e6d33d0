//! Audio frame generation.
//!
//! Buffers labeled PCM per audio element, cuts it into codec-config-sized
//! frames, threads the down-mixing parameters in force through each frame,
//! and applies trimming: user-requested start/end trim, codec start delay
//! as extra start trim, and end-of-stream zero padding as extra end trim.

use std::collections::{HashMap, VecDeque};

use iamf_core::{DecodedUleb128, Error, Result};
use iamf_obu::{AudioFrameObu, ObuHeader};

use iamf_codecs::{create_encoder, AudioEncoder, AudioFrameWithData, EncoderSettings};

use crate::channels::ChannelLabel;
use crate::descriptors::Descriptors;
use crate::metadata::AudioFrameMetadata;
use crate::params::ParametersManager;
use crate::timing::GlobalTimingModule;

struct SubstreamEncoding {
    substream_id: DecodedUleb128,
    labels: Vec<ChannelLabel>,
    encoder: Box<dyn AudioEncoder>,
}

struct ElementEncoding {
    audio_element_id: DecodedUleb128,
    substreams: Vec<SubstreamEncoding>,
    labeled_samples: HashMap<ChannelLabel, VecDeque<i32>>,
    num_samples_per_frame: u32,
    input_bit_depth: u8,
    /// Start trim still to spread over the earliest frames.
    trim_start_remaining: u32,
    user_trim_end: u32,
    /// No more samples will arrive for this element.
    done_taking: bool,
    /// End-of-stream frames have been cut and the encoders finalized.
    flushed: bool,
}

impl ElementEncoding {
    /// Samples available on the least-filled channel.
    fn min_buffered(&self) -> u32 {
        self.labeled_samples
            .values()
            .map(|buffer| buffer.len() as u32)
            .min()
            .unwrap_or(0)
    }

    /// At end of stream every channel must have received the same length.
    fn buffered_samples_at_end(&self) -> Result<u32> {
        let mut counts = self
            .labeled_samples
            .values()
            .map(|buffer| buffer.len() as u32);
        let first = counts.next().unwrap_or(0);
        if counts.any(|count| count != first) {
            return Err(Error::invalid_argument(format!(
                "audio element {} has unevenly filled channel buffers at end of stream",
                self.audio_element_id
            )));
        }
        Ok(first)
    }
}

/// Turns labeled samples into timestamped, coded audio frames.
///
/// The use pattern is: [`AudioFrameGenerator::add_samples`] per label,
/// [`AudioFrameGenerator::finalize`] once the provider runs dry, and
/// [`AudioFrameGenerator::output_frames`] after either, until
/// [`AudioFrameGenerator::generating_frames`] turns false.
pub struct AudioFrameGenerator {
    elements: Vec<ElementEncoding>,
}

impl AudioFrameGenerator {
    /// Set up one encoder per substream of every described element.
    pub fn new(
        descriptors: &Descriptors,
        audio_frame_metadata: &[AudioFrameMetadata],
        encoder_settings: &EncoderSettings,
    ) -> Result<Self> {
        let mut elements = Vec::new();
        for metadata in audio_frame_metadata {
            let element = descriptors
                .audio_elements
                .get(&metadata.audio_element_id)
                .ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "audio frame metadata references unknown audio element {}",
                        metadata.audio_element_id
                    ))
                })?;
            let codec_config = descriptors.codec_config_for_element(metadata.audio_element_id)?;

            let mut substreams = Vec::new();
            let mut labeled_samples = HashMap::new();
            let mut codec_delay = 0u32;
            for (index, &substream_id) in element.obu.audio_substream_ids.iter().enumerate() {
                let labels = element.substream_labels[index].clone();
                for &label in &labels {
                    if !metadata.channel_labels.contains(&label) {
                        return Err(Error::invalid_argument(format!(
                            "audio element {} needs channel {label:?}, not among the \
                             provided labels",
                            metadata.audio_element_id
                        )));
                    }
                    labeled_samples.insert(label, VecDeque::new());
                }
                let encoder = create_encoder(codec_config, labels.len(), encoder_settings)?;
                codec_delay = codec_delay.max(encoder.samples_to_delay_at_start());
                substreams.push(SubstreamEncoding {
                    substream_id,
                    labels,
                    encoder,
                });
            }

            elements.push(ElementEncoding {
                audio_element_id: metadata.audio_element_id,
                substreams,
                labeled_samples,
                num_samples_per_frame: codec_config.num_samples_per_frame(),
                input_bit_depth: metadata.input_bit_depth,
                trim_start_remaining: metadata.samples_to_trim_at_start + codec_delay,
                user_trim_end: metadata.samples_to_trim_at_end,
                done_taking: false,
                flushed: false,
            });
        }
        elements.sort_by_key(|element| element.audio_element_id);
        Ok(Self { elements })
    }

    fn element_mut(&mut self, audio_element_id: DecodedUleb128) -> Result<&mut ElementEncoding> {
        self.elements
            .iter_mut()
            .find(|element| element.audio_element_id == audio_element_id)
            .ok_or_else(|| {
                Error::invalid_argument(format!("unknown audio element {audio_element_id}"))
            })
    }

    /// Whether any element still accepts samples.
    pub fn taking_samples(&self) -> bool {
        self.elements.iter().any(|element| !element.done_taking)
    }

    /// Whether any encoder still holds frames to output.
    pub fn generating_frames(&self) -> bool {
        self.elements.iter().any(|element| {
            !element.flushed
                || element
                    .substreams
                    .iter()
                    .any(|substream| !substream.encoder.finished())
        })
    }

    /// Append samples for one labeled channel of an audio element.
    ///
    /// An empty slice marks the element's stream as ended.
    pub fn add_samples(
        &mut self,
        audio_element_id: DecodedUleb128,
        label: ChannelLabel,
        samples: &[i32],
    ) -> Result<()> {
        let element = self.element_mut(audio_element_id)?;
        if element.done_taking {
            return Err(Error::failed_precondition(format!(
                "audio element {audio_element_id} already stopped taking samples"
            )));
        }
        if samples.is_empty() {
            element.done_taking = true;
            return Ok(());
        }
        let buffer = element.labeled_samples.get_mut(&label).ok_or_else(|| {
            Error::invalid_argument(format!(
                "audio element {audio_element_id} does not code channel {label:?}"
            ))
        })?;
        buffer.extend(samples.iter().copied());
        Ok(())
    }

    /// Mark every element's stream as ended.
    pub fn finalize(&mut self) -> Result<()> {
        for element in &mut self.elements {
            element.done_taking = true;
        }
        Ok(())
    }

    /// Cut every frame that is ready, drive it through its encoder, and
    /// collect the coded frames in element-id, then substream order.
    pub fn output_frames(
        &mut self,
        parameters_manager: &mut ParametersManager,
        global_timing_module: &mut GlobalTimingModule,
    ) -> Result<Vec<AudioFrameWithData>> {
        for index in 0..self.elements.len() {
            self.encode_ready_frames(index, parameters_manager, global_timing_module)?;
        }

        let mut frames = Vec::new();
        for element in &mut self.elements {
            for substream in &mut element.substreams {
                while let Some(frame) = substream.encoder.pop() {
                    frames.push(frame);
                }
            }
        }
        Ok(frames)
    }

    fn encode_ready_frames(
        &mut self,
        element_index: usize,
        parameters_manager: &mut ParametersManager,
        global_timing_module: &mut GlobalTimingModule,
    ) -> Result<()> {
        loop {
            let element = &mut self.elements[element_index];
            if element.flushed {
                return Ok(());
            }
            let frame_size = element.num_samples_per_frame;
            if element.min_buffered() >= frame_size {
                Self::encode_one_frame(
                    element,
                    frame_size,
                    0,
                    parameters_manager,
                    global_timing_module,
                )?;
                continue;
            }
            if !element.done_taking {
                return Ok(());
            }
            let buffered = element.buffered_samples_at_end()?;

            // End of stream: pad the final partial frame with zeros and
            // account for the padding as trim at the end.
            if buffered > 0 {
                let padding = frame_size - buffered;
                let trim_at_end = element.user_trim_end + padding;
                if element.user_trim_end >= frame_size {
                    return Err(Error::invalid_argument(format!(
                        "samples_to_trim_at_end {} exceeds the final frame of {frame_size} \
                         samples",
                        element.user_trim_end
                    )));
                }
                for buffer in element.labeled_samples.values_mut() {
                    buffer.extend(std::iter::repeat(0).take(padding as usize));
                }
                Self::encode_one_frame(
                    element,
                    frame_size,
                    trim_at_end,
                    parameters_manager,
                    global_timing_module,
                )?;
            } else if element.user_trim_end > 0 {
                return Err(Error::invalid_argument(format!(
                    "samples_to_trim_at_end {} requested but the stream ended on a frame \
                     boundary with nothing to trim",
                    element.user_trim_end
                )));
            }
            for substream in &mut element.substreams {
                substream.encoder.finalize()?;
            }
            element.flushed = true;
            return Ok(());
        }
    }

    fn encode_one_frame(
        element: &mut ElementEncoding,
        frame_size: u32,
        trim_at_end: u32,
        parameters_manager: &mut ParametersManager,
        global_timing_module: &mut GlobalTimingModule,
    ) -> Result<()> {
        let down_mixing_params =
            parameters_manager.get_down_mixing_parameters(element.audio_element_id)?;
        let trim_at_start = element.trim_start_remaining.min(frame_size);
        element.trim_start_remaining -= trim_at_start;
        if trim_at_start + trim_at_end > frame_size {
            return Err(Error::invalid_argument(format!(
                "trims of {trim_at_start} + {trim_at_end} samples exceed the frame of \
                 {frame_size}"
            )));
        }

        let mut frame_start = None;
        for substream in &mut element.substreams {
            let mut samples: Vec<Vec<i32>> = Vec::with_capacity(frame_size as usize);
            for _ in 0..frame_size {
                let mut tick = Vec::with_capacity(substream.labels.len());
                for label in &substream.labels {
                    let buffer = element.labeled_samples.get_mut(label).ok_or_else(|| {
                        Error::failed_precondition(format!(
                            "channel {label:?} was not registered at construction"
                        ))
                    })?;
                    tick.push(buffer.pop_front().unwrap_or(0));
                }
                samples.push(tick);
            }

            let (start, end) = global_timing_module
                .get_next_audio_frame_timestamps(substream.substream_id, frame_size)?;
            frame_start.get_or_insert(start);

            let header = ObuHeader {
                trimming_status: trim_at_start > 0 || trim_at_end > 0,
                num_samples_to_trim_at_start: trim_at_start,
                num_samples_to_trim_at_end: trim_at_end,
                ..Default::default()
            };
            let partial_frame = AudioFrameWithData {
                obu: AudioFrameObu::new(header, substream.substream_id, vec![]),
                start_timestamp: start,
                end_timestamp: end,
                raw_samples: samples.clone(),
                down_mixing_params,
                audio_element_id: element.audio_element_id,
            };
            substream.encoder.encode_audio_frame(
                element.input_bit_depth,
                &samples,
                partial_frame,
            )?;
        }

        if let Some(start) = frame_start {
            parameters_manager.update_demixing_state(element.audio_element_id, start)?;
        }
        Ok(())
    }
}
