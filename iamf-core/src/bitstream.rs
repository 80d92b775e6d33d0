//! Bit-granular reading and writing.
//!
//! OBU payloads mix byte-aligned fields with sub-byte bitfields, so both
//! the reader and the writer operate at bit granularity, big-endian within
//! a byte. The writer carries the [`LebGenerator`] used for every
//! variable-length integer it emits.

use crate::error::{Error, Result};
use crate::leb::{DecodedSleb128, DecodedUleb128, LebGenerator, MAX_LEB128_SIZE};

/// Longest NUL-terminated string in an IAMF bitstream, including the NUL.
pub const MAX_STRING_SIZE: usize = 128;

/// A bitstream writer for serializing OBUs.
#[derive(Debug, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_pos: u8,
    leb_generator: LebGenerator,
}

impl BitWriter {
    /// Create a new bit writer.
    pub fn new(leb_generator: LebGenerator) -> Self {
        Self {
            data: Vec::new(),
            bit_pos: 0,
            leb_generator,
        }
    }

    /// Create a new bit writer with a byte capacity hint.
    pub fn with_capacity(bytes: usize, leb_generator: LebGenerator) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            bit_pos: 0,
            leb_generator,
        }
    }

    /// The generator used for every `leb128()` field written here.
    pub fn leb_generator(&self) -> LebGenerator {
        self.leb_generator
    }

    /// Get the current length in bits.
    pub fn bit_len(&self) -> usize {
        if self.bit_pos == 0 {
            self.data.len() * 8
        } else {
            (self.data.len() - 1) * 8 + self.bit_pos as usize
        }
    }

    /// Check if the writer is byte-aligned.
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        if self.bit_pos == 0 {
            self.data.push(0);
        }
        if bit {
            let idx = self.data.len() - 1;
            self.data[idx] |= 1 << (7 - self.bit_pos);
        }
        self.bit_pos = (self.bit_pos + 1) % 8;
    }

    /// Write the lower `bits` bits of `value`, most-significant bit first.
    ///
    /// Fails with `InvalidArgument` if `bits` exceeds 32 or `value` has
    /// bits set above `bits`.
    pub fn write_unsigned(&mut self, value: u32, bits: u8) -> Result<()> {
        if bits > 32 {
            return Err(Error::invalid_argument(format!(
                "cannot write {bits} bits from a u32"
            )));
        }
        self.write_unsigned64(value as u64, bits)
    }

    /// Write the lower `bits` bits of a 64-bit `value`.
    pub fn write_unsigned64(&mut self, value: u64, bits: u8) -> Result<()> {
        if bits > 64 {
            return Err(Error::invalid_argument(format!(
                "cannot write {bits} bits from a u64"
            )));
        }
        if bits < 64 && (value >> bits) != 0 {
            return Err(Error::invalid_argument(format!(
                "{value} does not fit in {bits} bits"
            )));
        }

        if self.bit_pos == 0 && bits % 8 == 0 {
            // Byte-aligned input to a byte-aligned output: copy whole bytes.
            for byte in (0..bits / 8).rev() {
                self.data.push((value >> (byte * 8)) as u8);
            }
            return Ok(());
        }
        for bit in (0..bits).rev() {
            self.write_bit((value >> bit) & 1 != 0);
        }
        Ok(())
    }

    /// Write an 8-bit two's complement value.
    pub fn write_signed8(&mut self, value: i8) -> Result<()> {
        self.write_unsigned(value as u8 as u32, 8)
    }

    /// Write a 16-bit two's complement value, big-endian.
    pub fn write_signed16(&mut self, value: i16) -> Result<()> {
        self.write_unsigned(value as u16 as u32, 16)
    }

    /// Write a byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.bit_pos == 0 {
            self.data.extend_from_slice(bytes);
            return Ok(());
        }
        for &byte in bytes {
            self.write_unsigned(byte as u32, 8)?;
        }
        Ok(())
    }

    /// Write a ULEB128 value using this writer's generator.
    pub fn write_uleb128(&mut self, value: DecodedUleb128) -> Result<()> {
        let encoded = self.leb_generator.uleb128(value as u64)?;
        self.write_bytes(&encoded)
    }

    /// Write an SLEB128 value using this writer's generator.
    pub fn write_sleb128(&mut self, value: DecodedSleb128) -> Result<()> {
        let encoded = self.leb_generator.sleb128(value as i64)?;
        self.write_bytes(&encoded)
    }

    /// Write a NUL-terminated UTF-8 string.
    ///
    /// Fails with `InvalidArgument` if the string (including the
    /// terminator) exceeds [`MAX_STRING_SIZE`] bytes or contains an
    /// interior NUL.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() + 1 > MAX_STRING_SIZE {
            return Err(Error::invalid_argument(format!(
                "string of {} bytes exceeds the {MAX_STRING_SIZE}-byte limit",
                bytes.len() + 1
            )));
        }
        if bytes.contains(&0) {
            return Err(Error::invalid_argument(
                "string contains an interior NUL".to_string(),
            ));
        }
        self.write_bytes(bytes)?;
        self.write_unsigned(0, 8)
    }

    /// Get the written bytes. The final byte may be partially filled.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Drain the buffer, failing with `FailedPrecondition` unless it is
    /// byte-aligned.
    pub fn take_bytes(&mut self) -> Result<Vec<u8>> {
        if !self.is_byte_aligned() {
            return Err(Error::failed_precondition(
                "cannot flush a writer that is not byte-aligned".to_string(),
            ));
        }
        self.bit_pos = 0;
        Ok(std::mem::take(&mut self.data))
    }

    /// Discard all written bits.
    pub fn reset(&mut self) {
        self.data.clear();
        self.bit_pos = 0;
    }
}

/// A bitstream reader for parsing OBU payloads.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Get the current bit position in the stream.
    pub fn position(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// Get the number of remaining bits.
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.position())
    }

    /// Check if the stream is byte-aligned.
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// Move to an absolute bit position. Bounded pushback: the target must
    /// be within the underlying buffer.
    pub fn seek(&mut self, bit_position: usize) -> Result<()> {
        if bit_position > self.data.len() * 8 {
            return Err(Error::invalid_argument(format!(
                "cannot seek to bit {bit_position} in a {}-bit buffer",
                self.data.len() * 8
            )));
        }
        self.byte_pos = bit_position / 8;
        self.bit_pos = (bit_position % 8) as u8;
        Ok(())
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_pos >= self.data.len() {
            return Err(Error::ResourceExhausted(
                "unexpected end of bitstream".to_string(),
            ));
        }
        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit != 0)
    }

    /// Read up to 32 bits as an unsigned integer.
    pub fn read_unsigned(&mut self, bits: u8) -> Result<u32> {
        if bits > 32 {
            return Err(Error::invalid_argument(format!(
                "cannot read {bits} bits into a u32"
            )));
        }
        self.read_unsigned64(bits).map(|v| v as u32)
    }

    /// Read up to 64 bits as an unsigned integer.
    pub fn read_unsigned64(&mut self, bits: u8) -> Result<u64> {
        if bits > 64 {
            return Err(Error::invalid_argument(format!(
                "cannot read {bits} bits into a u64"
            )));
        }
        if self.remaining_bits() < bits as usize {
            return Err(Error::ResourceExhausted(
                "unexpected end of bitstream".to_string(),
            ));
        }
        let mut value: u64 = 0;
        for _ in 0..bits {
            value = (value << 1) | (self.read_bit()? as u64);
        }
        Ok(value)
    }

    /// Read a 16-bit two's complement value, big-endian.
    pub fn read_signed16(&mut self) -> Result<i16> {
        self.read_unsigned(16).map(|v| v as u16 as i16)
    }

    /// Read `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_unsigned(8)? as u8);
        }
        Ok(out)
    }

    /// Decode a ULEB128 value.
    ///
    /// Fails with `InvalidArgument` if the encoding runs past 8 bytes or
    /// the decoded value exceeds `u32::MAX`.
    pub fn read_uleb128(&mut self) -> Result<DecodedUleb128> {
        let mut value: u64 = 0;
        for i in 0..MAX_LEB128_SIZE {
            let byte = self.read_unsigned(8)? as u64;
            value |= (byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                if value > DecodedUleb128::MAX as u64 {
                    return Err(Error::invalid_argument(format!(
                        "decoded uleb128 {value} exceeds the 32-bit cap"
                    )));
                }
                return Ok(value as DecodedUleb128);
            }
        }
        Err(Error::invalid_argument(format!(
            "uleb128 encoding exceeds {MAX_LEB128_SIZE} bytes"
        )))
    }

    /// Decode an SLEB128 value.
    pub fn read_sleb128(&mut self) -> Result<DecodedSleb128> {
        let mut value: i64 = 0;
        for i in 0..MAX_LEB128_SIZE {
            let byte = self.read_unsigned(8)? as i64;
            value |= (byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                if byte & 0x40 != 0 && 7 * (i + 1) < 64 {
                    value |= -1i64 << (7 * (i + 1));
                }
                if value > DecodedSleb128::MAX as i64 || value < DecodedSleb128::MIN as i64 {
                    return Err(Error::invalid_argument(format!(
                        "decoded sleb128 {value} exceeds the 32-bit range"
                    )));
                }
                return Ok(value as DecodedSleb128);
            }
        }
        Err(Error::invalid_argument(format!(
            "sleb128 encoding exceeds {MAX_LEB128_SIZE} bytes"
        )))
    }

    /// Read a NUL-terminated UTF-8 string of at most [`MAX_STRING_SIZE`]
    /// bytes including the terminator.
    pub fn read_string(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        for _ in 0..MAX_STRING_SIZE {
            let byte = self.read_unsigned(8)? as u8;
            if byte == 0 {
                return String::from_utf8(bytes)
                    .map_err(|e| Error::invalid_argument(format!("invalid UTF-8 string: {e}")));
            }
            bytes.push(byte);
        }
        Err(Error::invalid_argument(format!(
            "no NUL terminator within {MAX_STRING_SIZE} bytes"
        )))
    }
}
