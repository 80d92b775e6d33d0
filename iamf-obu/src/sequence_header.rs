//! IA Sequence Header OBU.

use iamf_core::{BitWriter, Error, Result};

use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;

/// The `ia_code` FourCC, `iamf`.
pub const IA_CODE: u32 = u32::from_be_bytes(*b"iamf");

/// IAMF profile byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProfileVersion {
    Simple = 0,
    Base = 1,
}

/// IA Sequence Header OBU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaSequenceHeaderObu {
    pub header: ObuHeader,
    pub ia_code: u32,
    pub primary_profile: ProfileVersion,
    pub additional_profile: ProfileVersion,
}

impl IaSequenceHeaderObu {
    /// Create a sequence header with the standard `ia_code`.
    pub fn new(
        header: ObuHeader,
        primary_profile: ProfileVersion,
        additional_profile: ProfileVersion,
    ) -> Self {
        Self {
            header,
            ia_code: IA_CODE,
            primary_profile,
            additional_profile,
        }
    }
}

impl Obu for IaSequenceHeaderObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::SequenceHeader
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        if self.ia_code != IA_CODE {
            return Err(Error::invalid_argument(format!(
                "ia_code must be {IA_CODE:#010x}, got {:#010x}",
                self.ia_code
            )));
        }
        writer.write_unsigned(self.ia_code, 32)?;
        writer.write_unsigned(self.primary_profile as u32, 8)?;
        writer.write_unsigned(self.additional_profile as u32, 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    #[test]
    fn test_write_simple_profile() {
        let obu = IaSequenceHeaderObu::new(
            ObuHeader::default(),
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        );
        let mut writer = BitWriter::new(LebGenerator::minimum());
        obu.validate_and_write(&mut writer).unwrap();
        assert_eq!(
            writer.data(),
            &[31 << 3, 6, b'i', b'a', b'm', b'f', 0, 0]
        );
    }

    #[test]
    fn test_corrupt_ia_code_rejected() {
        let mut obu = IaSequenceHeaderObu::new(
            ObuHeader::default(),
            ProfileVersion::Base,
            ProfileVersion::Base,
        );
        obu.ia_code = 0;
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(obu
            .validate_and_write(&mut writer)
            .unwrap_err()
            .is_invalid_argument());
        assert!(writer.data().is_empty());
    }
}
