//! FLAC decoder config.
//!
//! The payload is a sequence of FLAC metadata blocks. The first block must
//! be STREAMINFO; trailing blocks are carried opaquely.

use iamf_core::{BitWriter, Error, Result};

/// FLAC STREAMINFO block body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacStreamInfo {
    pub minimum_block_size: u16,
    pub maximum_block_size: u16,
    /// 24-bit field.
    pub minimum_frame_size: u32,
    /// 24-bit field.
    pub maximum_frame_size: u32,
    /// 20-bit field.
    pub sample_rate: u32,
    /// Stored as `count`, serialized as `count - 1` in 3 bits.
    pub number_of_channels: u8,
    /// Stored as `bits`, serialized as `bits - 1` in 5 bits.
    pub bits_per_sample: u8,
    /// 36-bit field.
    pub total_samples_in_stream: u64,
    pub md5_signature: [u8; 16],
}

/// STREAMINFO body length in bytes.
const STREAM_INFO_LENGTH: u32 = 34;

impl FlacStreamInfo {
    /// Check STREAMINFO consistency.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.sample_rate >= (1 << 20) {
            return Err(Error::invalid_argument(format!(
                "FLAC sample_rate {} does not fit in 20 bits",
                self.sample_rate
            )));
        }
        if self.number_of_channels == 0 || self.number_of_channels > 8 {
            return Err(Error::invalid_argument(format!(
                "FLAC channel count must be in [1, 8], got {}",
                self.number_of_channels
            )));
        }
        if !matches!(self.bits_per_sample, 16 | 24 | 32) {
            return Err(Error::invalid_argument(format!(
                "FLAC bits_per_sample must be 16, 24 or 32, got {}",
                self.bits_per_sample
            )));
        }
        if self.minimum_frame_size >= (1 << 24) || self.maximum_frame_size >= (1 << 24) {
            return Err(Error::invalid_argument(
                "FLAC frame sizes must fit in 24 bits".to_string(),
            ));
        }
        if self.total_samples_in_stream >= (1 << 36) {
            return Err(Error::invalid_argument(
                "FLAC total_samples_in_stream must fit in 36 bits".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.validate()?;
        writer.write_unsigned(self.minimum_block_size as u32, 16)?;
        writer.write_unsigned(self.maximum_block_size as u32, 16)?;
        writer.write_unsigned(self.minimum_frame_size, 24)?;
        writer.write_unsigned(self.maximum_frame_size, 24)?;
        writer.write_unsigned(self.sample_rate, 20)?;
        writer.write_unsigned((self.number_of_channels - 1) as u32, 3)?;
        writer.write_unsigned((self.bits_per_sample - 1) as u32, 5)?;
        writer.write_unsigned64(self.total_samples_in_stream, 36)?;
        writer.write_bytes(&self.md5_signature)
    }
}

/// One metadata block in the decoder config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlacMetadataBlock {
    StreamInfo(FlacStreamInfo),
    /// Any other block type, carried opaquely.
    Other { block_type: u8, data: Vec<u8> },
}

impl FlacMetadataBlock {
    fn block_type(&self) -> u8 {
        match self {
            FlacMetadataBlock::StreamInfo(_) => 0,
            FlacMetadataBlock::Other { block_type, .. } => *block_type,
        }
    }

    fn block_length(&self) -> u32 {
        match self {
            FlacMetadataBlock::StreamInfo(_) => STREAM_INFO_LENGTH,
            FlacMetadataBlock::Other { data, .. } => data.len() as u32,
        }
    }
}

/// The `decoder_config` payload for `fLaC` streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacDecoderConfig {
    pub metadata_blocks: Vec<FlacMetadataBlock>,
}

impl FlacDecoderConfig {
    /// The STREAMINFO block, which must come first.
    pub fn stream_info(&self) -> Result<&FlacStreamInfo> {
        match self.metadata_blocks.first() {
            Some(FlacMetadataBlock::StreamInfo(info)) => Ok(info),
            _ => Err(Error::invalid_argument(
                "the first FLAC metadata block must be STREAMINFO".to_string(),
            )),
        }
    }

    /// Check the documented invariants against the owning codec config.
    pub fn validate(&self, num_samples_per_frame: u32) -> Result<()> {
        let info = self.stream_info()?;
        info.validate()?;
        // IAMF requires a constant block size equal to the frame size.
        if info.minimum_block_size as u32 != num_samples_per_frame
            || info.maximum_block_size as u32 != num_samples_per_frame
        {
            return Err(Error::invalid_argument(format!(
                "FLAC block sizes [{}, {}] must equal num_samples_per_frame {num_samples_per_frame}",
                info.minimum_block_size, info.maximum_block_size
            )));
        }
        for block in &self.metadata_blocks[1..] {
            if block.block_type() == 0 {
                return Err(Error::invalid_argument(
                    "duplicate STREAMINFO metadata block".to_string(),
                ));
            }
            if block.block_type() > 126 {
                return Err(Error::invalid_argument(format!(
                    "invalid FLAC metadata block type {}",
                    block.block_type()
                )));
            }
        }
        Ok(())
    }

    /// Validate and serialize.
    pub fn validate_and_write(
        &self,
        num_samples_per_frame: u32,
        writer: &mut BitWriter,
    ) -> Result<()> {
        self.validate(num_samples_per_frame)?;
        for (i, block) in self.metadata_blocks.iter().enumerate() {
            let last = i == self.metadata_blocks.len() - 1;
            writer.write_unsigned(last as u32, 1)?;
            writer.write_unsigned(block.block_type() as u32, 7)?;
            writer.write_unsigned(block.block_length(), 24)?;
            match block {
                FlacMetadataBlock::StreamInfo(info) => info.validate_and_write(writer)?,
                FlacMetadataBlock::Other { data, .. } => writer.write_bytes(data)?,
            }
        }
        Ok(())
    }
}
