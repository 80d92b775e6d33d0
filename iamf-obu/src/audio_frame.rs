//! Audio Frame OBU.

use iamf_core::{BitWriter, DecodedUleb128, Result};

use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;

/// Audio Frame OBU.
///
/// Substream ids up to 17 are folded into the OBU type tag and omitted
/// from the payload; larger ids are written explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrameObu {
    pub header: ObuHeader,
    audio_substream_id: DecodedUleb128,
    /// The coded frame bytes produced by the codec.
    pub audio_frame: Vec<u8>,
}

impl AudioFrameObu {
    /// Create an audio frame OBU for a substream.
    pub fn new(
        header: ObuHeader,
        audio_substream_id: DecodedUleb128,
        audio_frame: Vec<u8>,
    ) -> Self {
        Self {
            header,
            audio_substream_id,
            audio_frame,
        }
    }

    /// The substream this frame belongs to.
    pub fn substream_id(&self) -> DecodedUleb128 {
        self.audio_substream_id
    }
}

impl Obu for AudioFrameObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::for_substream_id(self.audio_substream_id)
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        if self.obu_type() == ObuType::AudioFrame {
            // The id is only explicit in the bitstream for the generic tag.
            writer.write_uleb128(self.audio_substream_id)?;
        }
        writer.write_bytes(&self.audio_frame)
    }
}
