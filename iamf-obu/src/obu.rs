//! The OBU write framework.
//!
//! Serialization is two-phase: the payload is written to a scratch buffer
//! sharing the output writer's `LebGenerator`, so `obu_size` is known
//! before any header byte reaches the output. A failing payload never
//! leaves partial bytes in the output writer.

use iamf_core::{BitReader, BitWriter, Error, Result};

use crate::header::{ObuHeader, ObuType};

/// Common contract of every OBU.
pub trait Obu {
    /// The header flags of this OBU.
    fn header(&self) -> &ObuHeader;

    /// The type tag this OBU serializes under.
    fn obu_type(&self) -> ObuType;

    /// Validate the payload fields and serialize them.
    ///
    /// Implementations write only the payload; the header and `obu_size`
    /// are handled by [`Obu::validate_and_write`].
    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()>;

    /// Deserialize and validate the payload fields.
    ///
    /// Write-only OBUs return `Unimplemented`.
    fn validate_and_read_payload(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        let _ = reader;
        Err(Error::unimplemented(format!(
            "reading {:?} payloads",
            self.obu_type()
        )))
    }

    /// Serialize the complete OBU: header, `obu_size`, then payload.
    fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        let mut scratch = BitWriter::new(writer.leb_generator());
        self.validate_and_write_payload(&mut scratch)?;
        let payload = scratch.take_bytes()?;
        self.header()
            .validate_and_write(self.obu_type(), payload.len(), writer)?;
        writer.write_bytes(&payload)?;
        tracing::debug!(
            obu_type = ?self.obu_type(),
            payload_bytes = payload.len(),
            redundant = self.header().redundant_copy,
            "wrote OBU"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    struct FixedPayloadObu {
        header: ObuHeader,
        payload: Vec<u8>,
        fail: bool,
    }

    impl Obu for FixedPayloadObu {
        fn header(&self) -> &ObuHeader {
            &self.header
        }

        fn obu_type(&self) -> ObuType {
            ObuType::Reserved24
        }

        fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
            writer.write_bytes(&self.payload)?;
            if self.fail {
                return Err(Error::invalid_argument("forced failure".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_obu_size_matches_payload_length() {
        let obu = FixedPayloadObu {
            header: ObuHeader::default(),
            payload: vec![1, 2, 3],
            fail: false,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        obu.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[24 << 3, 3, 1, 2, 3]);
    }

    #[test]
    fn test_failed_payload_leaves_no_partial_bytes() {
        let obu = FixedPayloadObu {
            header: ObuHeader::default(),
            payload: vec![1, 2, 3],
            fail: true,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(obu.validate_and_write(&mut writer).is_err());
        assert!(writer.data().is_empty());
    }

    #[test]
    fn test_default_read_is_unimplemented() {
        let mut obu = FixedPayloadObu {
            header: ObuHeader::default(),
            payload: vec![],
            fail: false,
        };
        let data = [0u8; 4];
        let mut reader = BitReader::new(&data);
        assert!(obu
            .validate_and_read_payload(&mut reader)
            .unwrap_err()
            .is_unimplemented());
    }
}
