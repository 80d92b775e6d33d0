//! Temporal Delimiter OBU.

use iamf_core::{BitWriter, Result};

use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;

/// Temporal Delimiter OBU: an empty payload separating temporal units.
///
/// `redundant_copy` and `trimming_status` are forbidden on this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporalDelimiterObu {
    pub header: ObuHeader,
}

impl TemporalDelimiterObu {
    pub fn new(header: ObuHeader) -> Self {
        Self { header }
    }
}

impl Obu for TemporalDelimiterObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        ObuType::TemporalDelimiter
    }

    fn validate_and_write_payload(&self, _writer: &mut BitWriter) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    #[test]
    fn test_empty_payload() {
        let obu = TemporalDelimiterObu::default();
        let mut writer = BitWriter::new(LebGenerator::minimum());
        obu.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[4 << 3, 0]);
    }

    #[test]
    fn test_redundant_copy_rejected() {
        let obu = TemporalDelimiterObu::new(ObuHeader {
            redundant_copy: true,
            ..Default::default()
        });
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(obu
            .validate_and_write(&mut writer)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_trimming_status_rejected() {
        let obu = TemporalDelimiterObu::new(ObuHeader {
            trimming_status: true,
            ..Default::default()
        });
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(obu
            .validate_and_write(&mut writer)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_fixed_size_leb_affects_obu_size() {
        let obu = TemporalDelimiterObu::default();
        let mut writer = BitWriter::new(LebGenerator::fixed_size(2).unwrap());
        obu.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[4 << 3, 0x80, 0x00]);
    }
}
