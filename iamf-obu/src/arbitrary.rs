//! Arbitrary OBUs injected at sequencer hook points.

use iamf_core::{BitWriter, Result};

use crate::header::{ObuHeader, ObuType};
use crate::obu::Obu;

/// Where in the output sequence an arbitrary OBU is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertionHook {
    BeforeDescriptors,
    AfterIaSequenceHeader,
    AfterCodecConfigs,
    AfterAudioElements,
    AfterMixPresentations,
    /// Before the parameter blocks of the temporal unit at `insertion_tick`.
    BeforeParameterBlocks,
    /// After the parameter blocks of the temporal unit at `insertion_tick`.
    AfterParameterBlocks,
    /// After the audio frames of the temporal unit at `insertion_tick`.
    AfterAudioFrames,
}

impl InsertionHook {
    /// Hooks inside temporal units require an `insertion_tick`.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            InsertionHook::BeforeParameterBlocks
                | InsertionHook::AfterParameterBlocks
                | InsertionHook::AfterAudioFrames
        )
    }
}

/// A user-supplied OBU carried opaquely to a named hook point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitraryObu {
    pub header: ObuHeader,
    pub obu_type: ObuType,
    pub payload: Vec<u8>,
    pub insertion_hook: InsertionHook,
    /// The temporal unit this OBU belongs to, for timed hooks.
    pub insertion_tick: Option<i64>,
}

impl ArbitraryObu {
    /// Write every OBU bound to `hook` (and, for timed hooks, `tick`) in
    /// declaration order.
    pub fn write_obus_with_hook(
        hook: InsertionHook,
        tick: Option<i64>,
        arbitrary_obus: &[ArbitraryObu],
        writer: &mut BitWriter,
    ) -> Result<()> {
        for obu in arbitrary_obus {
            if obu.insertion_hook == hook && (!hook.is_timed() || obu.insertion_tick == tick) {
                obu.validate_and_write(writer)?;
            }
        }
        Ok(())
    }
}

impl Obu for ArbitraryObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn obu_type(&self) -> ObuType {
        self.obu_type
    }

    fn validate_and_write_payload(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bytes(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    fn reserved_obu(hook: InsertionHook, tick: Option<i64>, payload: Vec<u8>) -> ArbitraryObu {
        ArbitraryObu {
            header: ObuHeader::default(),
            obu_type: ObuType::Reserved25,
            payload,
            insertion_hook: hook,
            insertion_tick: tick,
        }
    }

    #[test]
    fn test_write_opaque_payload() {
        let obu = reserved_obu(InsertionHook::BeforeDescriptors, None, vec![9, 8, 7]);
        let mut writer = BitWriter::new(LebGenerator::minimum());
        obu.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[25 << 3, 3, 9, 8, 7]);
    }

    #[test]
    fn test_hook_filtering() {
        let obus = vec![
            reserved_obu(InsertionHook::BeforeDescriptors, None, vec![1]),
            reserved_obu(InsertionHook::AfterCodecConfigs, None, vec![2]),
            reserved_obu(InsertionHook::BeforeDescriptors, None, vec![3]),
        ];
        let mut writer = BitWriter::new(LebGenerator::minimum());
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::BeforeDescriptors,
            None,
            &obus,
            &mut writer,
        )
        .unwrap();
        assert_eq!(writer.data(), &[25 << 3, 1, 1, 25 << 3, 1, 3]);
    }

    #[test]
    fn test_timed_hook_filters_by_tick() {
        let obus = vec![
            reserved_obu(InsertionHook::AfterAudioFrames, Some(0), vec![1]),
            reserved_obu(InsertionHook::AfterAudioFrames, Some(64), vec![2]),
        ];
        let mut writer = BitWriter::new(LebGenerator::minimum());
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterAudioFrames,
            Some(64),
            &obus,
            &mut writer,
        )
        .unwrap();
        assert_eq!(writer.data(), &[25 << 3, 1, 2]);
    }

    #[test]
    fn test_read_is_unimplemented() {
        let mut obu = reserved_obu(InsertionHook::BeforeDescriptors, None, vec![]);
        let data = [0u8; 1];
        let mut reader = iamf_core::BitReader::new(&data);
        assert!(obu
            .validate_and_read_payload(&mut reader)
            .unwrap_err()
            .is_unimplemented());
    }
}
