//! Codec-specific decoder configs carried inside Codec Config OBUs.

pub mod aac;
pub mod flac;
pub mod lpcm;
pub mod opus;
