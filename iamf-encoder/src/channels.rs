//! Channel labels and per-layer substream labeling.
//!
//! The sample provider hands the encoder PCM keyed by channel label; this
//! module decides which labels feed which substream of an audio element.
//! Within a layer, coupled (stereo-pair) substreams come first, then
//! single-channel substreams. For scalable configs, each layer past the
//! first carries only the channels the previous layer cannot reconstruct
//! by demixing; the demixing arithmetic itself lives outside the core.

use serde::{Deserialize, Serialize};

use iamf_core::{Error, Result};
use iamf_obu::{
    AmbisonicsConfig, AudioElementConfig, AudioElementObu, LoudspeakerLayout,
    ScalableChannelLayoutConfig,
};

/// A labeled input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLabel {
    Mono,
    L2,
    R2,
    L3,
    R3,
    Ltf3,
    Rtf3,
    C,
    Lfe,
    L5,
    R5,
    Ls5,
    Rs5,
    L7,
    R7,
    Lss7,
    Rss7,
    Lrs7,
    Rrs7,
    Ltf2,
    Rtf2,
    Ltf4,
    Rtf4,
    Ltb4,
    Rtb4,
    BinauralL,
    BinauralR,
    /// A spherical-harmonic channel by Ambisonics Channel Number.
    Ambisonics(u8),
}

/// `(surround, lfe, height)` channel counts of a loudspeaker layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelNumbers {
    pub surround: u8,
    pub lfe: u8,
    pub height: u8,
}

impl ChannelNumbers {
    /// The channel counts of a loudspeaker layout.
    pub fn for_layout(layout: LoudspeakerLayout) -> Self {
        match layout {
            LoudspeakerLayout::Mono => Self { surround: 1, lfe: 0, height: 0 },
            LoudspeakerLayout::Stereo | LoudspeakerLayout::Binaural => {
                Self { surround: 2, lfe: 0, height: 0 }
            }
            LoudspeakerLayout::Layout5_1 => Self { surround: 5, lfe: 1, height: 0 },
            LoudspeakerLayout::Layout5_1_2 => Self { surround: 5, lfe: 1, height: 2 },
            LoudspeakerLayout::Layout5_1_4 => Self { surround: 5, lfe: 1, height: 4 },
            LoudspeakerLayout::Layout7_1 => Self { surround: 7, lfe: 1, height: 0 },
            LoudspeakerLayout::Layout7_1_2 => Self { surround: 7, lfe: 1, height: 2 },
            LoudspeakerLayout::Layout7_1_4 => Self { surround: 7, lfe: 1, height: 4 },
            LoudspeakerLayout::Layout3_1_2 => Self { surround: 3, lfe: 1, height: 2 },
        }
    }
}

/// The labels of one substream, in channel order (1 or 2 entries).
pub type SubstreamLabels = Vec<ChannelLabel>;

/// The full label set of a layout, coupled pairs first then singles,
/// grouped per substream.
fn single_layer_labels(layout: LoudspeakerLayout) -> Vec<SubstreamLabels> {
    use ChannelLabel::*;
    let (coupled, singles): (Vec<[ChannelLabel; 2]>, Vec<ChannelLabel>) = match layout {
        LoudspeakerLayout::Mono => (vec![], vec![Mono]),
        LoudspeakerLayout::Stereo => (vec![[L2, R2]], vec![]),
        LoudspeakerLayout::Binaural => (vec![[BinauralL, BinauralR]], vec![]),
        LoudspeakerLayout::Layout5_1 => (vec![[L5, R5], [Ls5, Rs5]], vec![C, Lfe]),
        LoudspeakerLayout::Layout5_1_2 => {
            (vec![[L5, R5], [Ls5, Rs5], [Ltf2, Rtf2]], vec![C, Lfe])
        }
        LoudspeakerLayout::Layout5_1_4 => (
            vec![[L5, R5], [Ls5, Rs5], [Ltf4, Rtf4], [Ltb4, Rtb4]],
            vec![C, Lfe],
        ),
        LoudspeakerLayout::Layout7_1 => {
            (vec![[L7, R7], [Lss7, Rss7], [Lrs7, Rrs7]], vec![C, Lfe])
        }
        LoudspeakerLayout::Layout7_1_2 => (
            vec![[L7, R7], [Lss7, Rss7], [Lrs7, Rrs7], [Ltf2, Rtf2]],
            vec![C, Lfe],
        ),
        LoudspeakerLayout::Layout7_1_4 => (
            vec![
                [L7, R7],
                [Lss7, Rss7],
                [Lrs7, Rrs7],
                [Ltf4, Rtf4],
                [Ltb4, Rtb4],
            ],
            vec![C, Lfe],
        ),
        LoudspeakerLayout::Layout3_1_2 => (vec![[L3, R3], [Ltf3, Rtf3]], vec![C, Lfe]),
    };
    coupled
        .into_iter()
        .map(|pair| pair.to_vec())
        .chain(singles.into_iter().map(|label| vec![label]))
        .collect()
}

/// The channels a layer transmits on top of the previous layer.
fn incremental_layer_labels(
    previous: ChannelNumbers,
    current: ChannelNumbers,
    target_height: u8,
) -> Result<Vec<SubstreamLabels>> {
    use ChannelLabel::*;
    let mut coupled: Vec<[ChannelLabel; 2]> = Vec::new();
    let mut singles: Vec<ChannelLabel> = Vec::new();

    // Walk the surround ladder 1 -> 2 -> 3 -> 5 -> 7.
    let mut surround = previous.surround;
    while surround < current.surround {
        match surround {
            1 => singles.push(L2),
            2 => singles.push(C),
            3 => coupled.push([Ls5, Rs5]),
            5 => coupled.push([Lss7, Rss7]),
            _ => {
                return Err(Error::invalid_argument(format!(
                    "no scalable path from {surround} to {} surround channels",
                    current.surround
                )))
            }
        }
        surround = match surround {
            1 => 2,
            2 => 3,
            3 => 5,
            _ => 7,
        };
    }
    if surround != current.surround {
        return Err(Error::invalid_argument(format!(
            "no scalable path to {} surround channels",
            current.surround
        )));
    }

    if previous.lfe == 0 && current.lfe == 1 {
        singles.push(Lfe);
    }

    match (previous.height, current.height) {
        (0, 0) | (2, 2) | (4, 4) => {}
        (0, 2) => coupled.push(if target_height == 2 {
            [Ltf2, Rtf2]
        } else {
            [Ltf4, Rtf4]
        }),
        (0, 4) => {
            coupled.push([Ltf4, Rtf4]);
            coupled.push([Ltb4, Rtb4]);
        }
        (2, 4) => coupled.push([Ltb4, Rtb4]),
        (previous_height, height) => {
            return Err(Error::invalid_argument(format!(
                "no scalable path from {previous_height} to {height} height channels"
            )))
        }
    }

    Ok(coupled
        .into_iter()
        .map(|pair| pair.to_vec())
        .chain(singles.into_iter().map(|label| vec![label]))
        .collect())
}

fn scalable_labels(config: &ScalableChannelLayoutConfig) -> Result<Vec<SubstreamLabels>> {
    let layers = &config.channel_audio_layer_configs;
    let target_height = layers
        .last()
        .map(|layer| ChannelNumbers::for_layout(layer.loudspeaker_layout).height)
        .unwrap_or(0);

    let mut labels: Vec<SubstreamLabels> = Vec::new();
    let mut previous: Option<ChannelNumbers> = None;
    for layer in layers {
        let current = ChannelNumbers::for_layout(layer.loudspeaker_layout);
        let layer_labels = match previous {
            None => single_layer_labels(layer.loudspeaker_layout),
            Some(previous) => incremental_layer_labels(previous, current, target_height)?,
        };

        let coupled = layer_labels.iter().filter(|group| group.len() == 2).count();
        if layer_labels.len() != layer.substream_count as usize
            || coupled != layer.coupled_substream_count as usize
        {
            return Err(Error::invalid_argument(format!(
                "layer {:?} declares {} substreams ({} coupled); its channels need {} ({coupled} coupled)",
                layer.loudspeaker_layout,
                layer.substream_count,
                layer.coupled_substream_count,
                layer_labels.len()
            )));
        }
        labels.extend(layer_labels);
        previous = Some(current);
    }
    Ok(labels)
}

fn ambisonics_labels(config: &AmbisonicsConfig) -> Result<Vec<SubstreamLabels>> {
    match config {
        AmbisonicsConfig::Mono(mono) => {
            // Each substream is fed by the lowest ACN mapped to it.
            let mut labels: Vec<Option<ChannelLabel>> = vec![None; mono.substream_count as usize];
            for (acn, &substream_index) in mono.channel_mapping.iter().enumerate() {
                if substream_index == iamf_obu::audio_element::INACTIVE_AMBISONICS_CHANNEL_NUMBER {
                    continue;
                }
                let slot = &mut labels[substream_index as usize];
                if slot.is_none() {
                    *slot = Some(ChannelLabel::Ambisonics(acn as u8));
                }
            }
            labels
                .into_iter()
                .enumerate()
                .map(|(substream, label)| {
                    label.map(|l| vec![l]).ok_or_else(|| {
                        Error::invalid_argument(format!(
                            "substream {substream} has no Ambisonics Channel Number mapped to it"
                        ))
                    })
                })
                .collect()
        }
        AmbisonicsConfig::Projection(projection) => {
            // Transformed channels are assigned sequentially: coupled
            // substreams first, two channels each, then singles.
            let mut labels = Vec::with_capacity(projection.substream_count as usize);
            let mut next_channel = 0u8;
            for substream in 0..projection.substream_count {
                if substream < projection.coupled_substream_count {
                    labels.push(vec![
                        ChannelLabel::Ambisonics(next_channel),
                        ChannelLabel::Ambisonics(next_channel + 1),
                    ]);
                    next_channel += 2;
                } else {
                    labels.push(vec![ChannelLabel::Ambisonics(next_channel)]);
                    next_channel += 1;
                }
            }
            Ok(labels)
        }
    }
}

/// Resolve the labels feeding each substream of an audio element, in
/// substream-id order.
pub fn substream_labels_for_element(obu: &AudioElementObu) -> Result<Vec<SubstreamLabels>> {
    let labels = match &obu.config {
        AudioElementConfig::ScalableChannel(config) => scalable_labels(config)?,
        AudioElementConfig::Ambisonics(config) => ambisonics_labels(config)?,
        AudioElementConfig::Extension(_) => {
            return Err(Error::unimplemented(
                "substream labels for reserved audio element types".to_string(),
            ))
        }
    };
    if labels.len() != obu.audio_substream_ids.len() {
        return Err(Error::invalid_argument(format!(
            "audio element {} declares {} substreams; its config labels {}",
            obu.audio_element_id,
            obu.audio_substream_ids.len(),
            labels.len()
        )));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_obu::{AmbisonicsMonoConfig, ChannelAudioLayerConfig};

    fn layer(
        layout: LoudspeakerLayout,
        substream_count: u8,
        coupled_substream_count: u8,
    ) -> ChannelAudioLayerConfig {
        ChannelAudioLayerConfig {
            loudspeaker_layout: layout,
            output_gain_is_present: false,
            recon_gain_is_present: false,
            reserved_a: 0,
            substream_count,
            coupled_substream_count,
            output_gain_flags: 0,
            reserved_b: 0,
            output_gain: 0,
        }
    }

    #[test]
    fn test_single_layer_stereo() {
        let config = ScalableChannelLayoutConfig {
            reserved: 0,
            channel_audio_layer_configs: vec![layer(LoudspeakerLayout::Stereo, 1, 1)],
        };
        assert_eq!(
            scalable_labels(&config).unwrap(),
            vec![vec![ChannelLabel::L2, ChannelLabel::R2]]
        );
    }

    #[test]
    fn test_single_layer_5_1_coupled_first() {
        let config = ScalableChannelLayoutConfig {
            reserved: 0,
            channel_audio_layer_configs: vec![layer(LoudspeakerLayout::Layout5_1, 4, 2)],
        };
        assert_eq!(
            scalable_labels(&config).unwrap(),
            vec![
                vec![ChannelLabel::L5, ChannelLabel::R5],
                vec![ChannelLabel::Ls5, ChannelLabel::Rs5],
                vec![ChannelLabel::C],
                vec![ChannelLabel::Lfe],
            ]
        );
    }

    #[test]
    fn test_two_layer_mono_stereo() {
        let config = ScalableChannelLayoutConfig {
            reserved: 0,
            channel_audio_layer_configs: vec![
                layer(LoudspeakerLayout::Mono, 1, 0),
                layer(LoudspeakerLayout::Stereo, 1, 0),
            ],
        };
        assert_eq!(
            scalable_labels(&config).unwrap(),
            vec![vec![ChannelLabel::Mono], vec![ChannelLabel::L2]]
        );
    }

    #[test]
    fn test_two_layer_stereo_to_5_1_2() {
        let config = ScalableChannelLayoutConfig {
            reserved: 0,
            channel_audio_layer_configs: vec![
                layer(LoudspeakerLayout::Stereo, 1, 1),
                layer(LoudspeakerLayout::Layout5_1_2, 4, 2),
            ],
        };
        // New channels: C (via the 2->3->5 ladder), LFE, and the height pair.
        assert_eq!(
            scalable_labels(&config).unwrap(),
            vec![
                vec![ChannelLabel::L2, ChannelLabel::R2],
                vec![ChannelLabel::Ls5, ChannelLabel::Rs5],
                vec![ChannelLabel::Ltf2, ChannelLabel::Rtf2],
                vec![ChannelLabel::C],
                vec![ChannelLabel::Lfe],
            ]
        );
    }

    #[test]
    fn test_layer_substream_count_mismatch_rejected() {
        let config = ScalableChannelLayoutConfig {
            reserved: 0,
            channel_audio_layer_configs: vec![layer(LoudspeakerLayout::Stereo, 2, 0)],
        };
        assert!(scalable_labels(&config).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_ambisonics_mono_lowest_acn_wins() {
        let config = AmbisonicsConfig::Mono(AmbisonicsMonoConfig {
            output_channel_count: 4,
            substream_count: 2,
            channel_mapping: vec![1, 0, 1, 255],
        });
        assert_eq!(
            ambisonics_labels(&config).unwrap(),
            vec![
                vec![ChannelLabel::Ambisonics(1)],
                vec![ChannelLabel::Ambisonics(0)],
            ]
        );
    }

    #[test]
    fn test_projection_coupled_assignment() {
        let config = AmbisonicsConfig::Projection(iamf_obu::AmbisonicsProjectionConfig {
            output_channel_count: 4,
            substream_count: 3,
            coupled_substream_count: 1,
            demixing_matrix: vec![0; 16],
        });
        assert_eq!(
            ambisonics_labels(&config).unwrap(),
            vec![
                vec![ChannelLabel::Ambisonics(0), ChannelLabel::Ambisonics(1)],
                vec![ChannelLabel::Ambisonics(2)],
                vec![ChannelLabel::Ambisonics(3)],
            ]
        );
    }
}
