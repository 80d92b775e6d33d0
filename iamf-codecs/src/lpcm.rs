//! LPCM passthrough encoder.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use iamf_core::{Error, Result};
use iamf_obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmSampleFormat};
use iamf_obu::{CodecConfigObu, DecoderConfig};

use crate::frame::AudioFrameWithData;
use crate::traits::{validate_frame_shape, AudioDecoder, AudioEncoder, EncoderState};

/// Passthrough encoder: converts left-justified 32-bit samples to the
/// configured bit depth and endianness.
#[derive(Debug)]
pub struct LpcmEncoder {
    decoder_config: LpcmDecoderConfig,
    num_channels: usize,
    num_samples_per_frame: u32,
    state: EncoderState,
}

impl LpcmEncoder {
    /// Create an encoder for one substream of `codec_config`.
    pub fn new(codec_config: &CodecConfigObu, num_channels: usize) -> Result<Self> {
        let decoder_config = match &codec_config.codec_config().decoder_config {
            DecoderConfig::Lpcm(config) => config.clone(),
            other => {
                return Err(Error::invalid_argument(format!(
                    "expected an LPCM decoder config, got {other:?}"
                )))
            }
        };
        decoder_config.validate()?;
        Ok(Self {
            decoder_config,
            num_channels,
            num_samples_per_frame: codec_config.num_samples_per_frame(),
            state: EncoderState::default(),
        })
    }

    fn encode_sample(&self, sample: i32, out: &mut Vec<u8>) {
        let little_endian =
            self.decoder_config.sample_format_flags == LpcmSampleFormat::LittleEndian;
        match self.decoder_config.sample_size {
            16 => {
                let value = (sample >> 16) as i16;
                let mut buf = [0u8; 2];
                if little_endian {
                    LittleEndian::write_i16(&mut buf, value);
                } else {
                    BigEndian::write_i16(&mut buf, value);
                }
                out.extend_from_slice(&buf);
            }
            24 => {
                let value = sample >> 8;
                let bytes = value.to_be_bytes();
                if little_endian {
                    out.extend_from_slice(&[bytes[3], bytes[2], bytes[1]]);
                } else {
                    out.extend_from_slice(&[bytes[1], bytes[2], bytes[3]]);
                }
            }
            _ => {
                let mut buf = [0u8; 4];
                if little_endian {
                    LittleEndian::write_i32(&mut buf, sample);
                } else {
                    BigEndian::write_i32(&mut buf, sample);
                }
                out.extend_from_slice(&buf);
            }
        }
    }
}

impl AudioEncoder for LpcmEncoder {
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
        if (input_bit_depth as u32) < self.decoder_config.sample_size as u32 {
            return Err(Error::invalid_argument(format!(
                "{input_bit_depth}-bit input cannot carry {}-bit LPCM",
                self.decoder_config.sample_size
            )));
        }

        let mut payload = Vec::with_capacity(
            samples.len() * self.num_channels * (self.decoder_config.sample_size as usize / 8),
        );
        for tick in samples {
            for &sample in tick {
                self.encode_sample(sample, &mut payload);
            }
        }
        partial_frame.obu.audio_frame = payload;
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

/// Passthrough decoder, the inverse of [`LpcmEncoder`].
#[derive(Debug)]
pub struct LpcmDecoder {
    decoder_config: LpcmDecoderConfig,
    num_channels: usize,
}

impl LpcmDecoder {
    /// Create a decoder for one substream of `codec_config`.
    pub fn new(codec_config: &CodecConfigObu, num_channels: usize) -> Result<Self> {
        let decoder_config = match &codec_config.codec_config().decoder_config {
            DecoderConfig::Lpcm(config) => config.clone(),
            other => {
                return Err(Error::invalid_argument(format!(
                    "expected an LPCM decoder config, got {other:?}"
                )))
            }
        };
        decoder_config.validate()?;
        Ok(Self {
            decoder_config,
            num_channels,
        })
    }
}

impl AudioDecoder for LpcmDecoder {
    fn decode_audio_frame(&mut self, encoded_frame: &[u8]) -> Result<Vec<Vec<i32>>> {
        let bytes_per_sample = self.decoder_config.sample_size as usize / 8;
        let bytes_per_tick = bytes_per_sample * self.num_channels;
        if bytes_per_tick == 0 || encoded_frame.len() % bytes_per_tick != 0 {
            return Err(Error::invalid_argument(format!(
                "{}-byte frame does not divide into {}-byte ticks",
                encoded_frame.len(),
                bytes_per_tick
            )));
        }
        let little_endian =
            self.decoder_config.sample_format_flags == LpcmSampleFormat::LittleEndian;

        let mut samples = Vec::with_capacity(encoded_frame.len() / bytes_per_tick);
        for tick in encoded_frame.chunks_exact(bytes_per_tick) {
            let mut row = Vec::with_capacity(self.num_channels);
            for raw in tick.chunks_exact(bytes_per_sample) {
                let value = match self.decoder_config.sample_size {
                    16 => {
                        let v = if little_endian {
                            LittleEndian::read_i16(raw)
                        } else {
                            BigEndian::read_i16(raw)
                        };
                        (v as i32) << 16
                    }
                    24 => {
                        let bytes = if little_endian {
                            [raw[2], raw[1], raw[0], 0]
                        } else {
                            [raw[0], raw[1], raw[2], 0]
                        };
                        i32::from_be_bytes(bytes)
                    }
                    _ => {
                        if little_endian {
                            LittleEndian::read_i32(raw)
                        } else {
                            BigEndian::read_i32(raw)
                        }
                    }
                };
                row.push(value);
            }
            samples.push(row);
        }
        Ok(samples)
    }
}
