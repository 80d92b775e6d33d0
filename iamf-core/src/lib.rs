//! # IAMF Core
//!
//! Core types and utilities for the IAMF encoder crates.
//!
//! This crate provides the fundamental building blocks used across all
//! components:
//! - Error handling types
//! - Bit-granular reading/writing
//! - ULEB128/SLEB128 generation with configurable width

pub mod bitstream;
pub mod error;
pub mod leb;

pub use bitstream::{BitReader, BitWriter, MAX_STRING_SIZE};
pub use error::{Error, Result};
pub use leb::{DecodedSleb128, DecodedUleb128, GenerationMode, LebGenerator, MAX_LEB128_SIZE};
