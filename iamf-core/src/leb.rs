//! ULEB128 / SLEB128 generation with configurable width.
//!
//! IAMF requires every `leb128()` field to be encoded in at most 8 bytes.
//! The [`LebGenerator`] either emits the shortest valid encoding or pads
//! every value to a caller-chosen fixed width; all length-prefixed fields
//! inside one OBU (including `obu_size` itself) use the same generator.

use crate::error::{Error, Result};

/// Maximum encoded size of a `leb128()` in IAMF, in bytes.
pub const MAX_LEB128_SIZE: usize = 8;

/// A decoded `leb128` in IAMF.
pub type DecodedUleb128 = u32;

/// A decoded `sleb128` in IAMF.
pub type DecodedSleb128 = i32;

/// How a [`LebGenerator`] sizes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Shortest valid encoding.
    Minimum,
    /// Exactly this many bytes, padding with continuation bytes.
    FixedSize(u8),
}

/// Serializes variable-length integers at a fixed or minimal width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LebGenerator {
    mode: GenerationMode,
}

impl LebGenerator {
    /// Create a generator for the given mode.
    ///
    /// Fails with `InvalidArgument` if a fixed size is outside `1..=8`.
    pub fn new(mode: GenerationMode) -> Result<Self> {
        if let GenerationMode::FixedSize(size) = mode {
            if size == 0 || size as usize > MAX_LEB128_SIZE {
                return Err(Error::invalid_argument(format!(
                    "fixed leb128 size must be in [1, {MAX_LEB128_SIZE}], got {size}"
                )));
            }
        }
        Ok(Self { mode })
    }

    /// Create a generator that emits minimal encodings.
    pub fn minimum() -> Self {
        Self {
            mode: GenerationMode::Minimum,
        }
    }

    /// Create a generator that always emits `size` bytes.
    pub fn fixed_size(size: u8) -> Result<Self> {
        Self::new(GenerationMode::FixedSize(size))
    }

    /// Get the generation mode.
    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Encode an unsigned value as ULEB128.
    ///
    /// Fails with `InvalidArgument` if a fixed-width encoding cannot
    /// represent the value.
    pub fn uleb128(&self, value: u64) -> Result<Vec<u8>> {
        match self.mode {
            GenerationMode::Minimum => {
                let mut out = Vec::with_capacity(MAX_LEB128_SIZE);
                let mut remaining = value;
                loop {
                    let byte = (remaining & 0x7f) as u8;
                    remaining >>= 7;
                    if remaining == 0 {
                        out.push(byte);
                        return Ok(out);
                    }
                    out.push(byte | 0x80);
                }
            }
            GenerationMode::FixedSize(size) => {
                let size = size as usize;
                let mut out = Vec::with_capacity(size);
                let mut remaining = value;
                for i in 0..size {
                    let byte = (remaining & 0x7f) as u8;
                    remaining >>= 7;
                    let last = i == size - 1;
                    out.push(if last { byte } else { byte | 0x80 });
                }
                if remaining != 0 {
                    return Err(Error::invalid_argument(format!(
                        "{value} does not fit in a {size}-byte uleb128"
                    )));
                }
                Ok(out)
            }
        }
    }

    /// Encode a signed value as SLEB128.
    ///
    /// Fails with `InvalidArgument` if a fixed-width encoding cannot
    /// represent the value.
    pub fn sleb128(&self, value: i64) -> Result<Vec<u8>> {
        match self.mode {
            GenerationMode::Minimum => {
                let mut out = Vec::with_capacity(MAX_LEB128_SIZE);
                let mut remaining = value;
                loop {
                    let byte = (remaining & 0x7f) as u8;
                    remaining >>= 7;
                    let sign_clear = byte & 0x40 == 0;
                    if (remaining == 0 && sign_clear) || (remaining == -1 && !sign_clear) {
                        out.push(byte);
                        return Ok(out);
                    }
                    out.push(byte | 0x80);
                }
            }
            GenerationMode::FixedSize(size) => {
                let size = size as usize;
                let mut out = Vec::with_capacity(size);
                let mut remaining = value;
                let mut last_byte = 0u8;
                for i in 0..size {
                    let byte = (remaining & 0x7f) as u8;
                    remaining >>= 7;
                    let last = i == size - 1;
                    last_byte = byte;
                    out.push(if last { byte } else { byte | 0x80 });
                }
                // The dropped tail must be pure sign extension of the final byte.
                let sign_extension = if last_byte & 0x40 == 0 { 0 } else { -1 };
                if remaining != sign_extension {
                    return Err(Error::invalid_argument(format!(
                        "{value} does not fit in a {size}-byte sleb128"
                    )));
                }
                Ok(out)
            }
        }
    }
}

impl Default for LebGenerator {
    fn default() -> Self {
        Self::minimum()
    }
}
