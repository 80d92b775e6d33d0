//! Demixing parameter data and the down-mix weight tables.

use iamf_core::{BitReader, BitWriter, Error, Result};

/// `dmixp_mode`: selects the down-mix coefficient set and the direction
/// the recursive weight index moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DMixPMode {
    Mode1 = 0,
    Mode2 = 1,
    Mode3 = 2,
    ReservedA = 3,
    Mode1N = 4,
    Mode2N = 5,
    Mode3N = 6,
    ReservedB = 7,
}

impl DMixPMode {
    /// The `(alpha, beta, gamma, delta, w_idx_offset)` tuple for this mode.
    ///
    /// Fails with `InvalidArgument` for the reserved modes.
    pub fn coefficients(self) -> Result<(f64, f64, f64, f64, i32)> {
        match self {
            DMixPMode::Mode1 => Ok((1.0, 1.0, 0.707, 0.707, -1)),
            DMixPMode::Mode2 => Ok((0.707, 0.707, 0.707, 0.707, -1)),
            DMixPMode::Mode3 => Ok((1.0, 0.866, 0.866, 0.866, -1)),
            DMixPMode::Mode1N => Ok((1.0, 1.0, 0.707, 0.707, 1)),
            DMixPMode::Mode2N => Ok((0.707, 0.707, 0.707, 0.707, 1)),
            DMixPMode::Mode3N => Ok((1.0, 0.866, 0.866, 0.866, 1)),
            DMixPMode::ReservedA | DMixPMode::ReservedB => Err(Error::invalid_argument(
                format!("reserved dmixp_mode {self:?}"),
            )),
        }
    }
}

impl TryFrom<u8> for DMixPMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => DMixPMode::Mode1,
            1 => DMixPMode::Mode2,
            2 => DMixPMode::Mode3,
            3 => DMixPMode::ReservedA,
            4 => DMixPMode::Mode1N,
            5 => DMixPMode::Mode2N,
            6 => DMixPMode::Mode3N,
            7 => DMixPMode::ReservedB,
            other => {
                return Err(Error::invalid_argument(format!(
                    "dmixp_mode {other} does not fit in 3 bits"
                )))
            }
        })
    }
}

/// Inclusive upper bound of the weight index.
pub const MAX_W_IDX: i32 = 10;

/// Map a clamped weight index to the down-mix weight `w`.
pub fn w_from_w_idx(w_idx: i32) -> f64 {
    const W_TABLE: [f64; 11] = [
        0.0, 0.0179, 0.0391, 0.0658, 0.1038, 0.25, 0.3962, 0.4342, 0.4609, 0.4821, 0.5,
    ];
    W_TABLE[w_idx.clamp(0, MAX_W_IDX) as usize]
}

/// Advance the weight index by a mode's offset, clamped to `[0, 10]`.
pub fn next_w_idx(w_idx: i32, w_idx_offset: i32) -> i32 {
    (w_idx + w_idx_offset).clamp(0, MAX_W_IDX)
}

/// The per-subblock payload of a demixing parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemixingInfoParameterData {
    pub dmixp_mode: DMixPMode,
    pub reserved: u8,
}

impl DemixingInfoParameterData {
    /// Validate and serialize: 3-bit mode, 5 reserved bits.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        // Reserved modes are not writable.
        self.dmixp_mode.coefficients()?;
        writer.write_unsigned(self.dmixp_mode as u32, 3)?;
        writer.write_unsigned(self.reserved as u32, 5)
    }

    /// Deserialize and validate.
    pub fn validate_and_read(reader: &mut BitReader<'_>) -> Result<Self> {
        let dmixp_mode = DMixPMode::try_from(reader.read_unsigned(3)? as u8)?;
        let reserved = reader.read_unsigned(5)? as u8;
        Ok(Self { dmixp_mode, reserved })
    }
}

/// The default payload of a demixing parameter definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDemixingInfo {
    pub dmixp_mode: DMixPMode,
    pub reserved: u8,
    /// 4-bit default weight index used when the parameter stream runs dry.
    pub default_w: u8,
    pub reserved_for_future_use: u8,
}

impl DefaultDemixingInfo {
    /// Validate and serialize: mode byte, then default weight byte.
    pub fn validate_and_write(&self, writer: &mut BitWriter) -> Result<()> {
        self.dmixp_mode.coefficients()?;
        if self.default_w as i32 > MAX_W_IDX {
            return Err(Error::invalid_argument(format!(
                "default_w must be in [0, {MAX_W_IDX}], got {}",
                self.default_w
            )));
        }
        writer.write_unsigned(self.dmixp_mode as u32, 3)?;
        writer.write_unsigned(self.reserved as u32, 5)?;
        writer.write_unsigned(self.default_w as u32, 4)?;
        writer.write_unsigned(self.reserved_for_future_use as u32, 4)
    }
}

/// The down-mixing coefficients in force for one audio frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownMixingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub w_idx_offset: i32,
    pub w_idx_used: i32,
    pub w: f64,
}

impl DownMixingParams {
    /// The coefficients implied by a mode and an already-chosen weight index.
    pub fn from_mode(dmixp_mode: DMixPMode, w_idx_used: i32) -> Result<Self> {
        let (alpha, beta, gamma, delta, w_idx_offset) = dmixp_mode.coefficients()?;
        Ok(Self {
            alpha,
            beta,
            gamma,
            delta,
            w_idx_offset,
            w_idx_used,
            w: w_from_w_idx(w_idx_used),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamf_core::LebGenerator;

    #[test]
    fn test_w_table_boundaries() {
        assert_eq!(w_from_w_idx(0), 0.0);
        assert_eq!(w_from_w_idx(1), 0.0179);
        assert_eq!(w_from_w_idx(10), 0.5);
        // Out-of-range indices clamp.
        assert_eq!(w_from_w_idx(-3), 0.0);
        assert_eq!(w_from_w_idx(12), 0.5);
    }

    #[test]
    fn test_next_w_idx_clamps() {
        assert_eq!(next_w_idx(0, -1), 0);
        assert_eq!(next_w_idx(0, 1), 1);
        assert_eq!(next_w_idx(10, 1), 10);
        assert_eq!(next_w_idx(5, 0), 5);
    }

    #[test]
    fn test_mode3n_coefficients() {
        let params = DownMixingParams::from_mode(DMixPMode::Mode3N, 0).unwrap();
        assert_eq!(params.alpha, 1.0);
        assert_eq!(params.beta, 0.866);
        assert_eq!(params.gamma, 0.866);
        assert_eq!(params.delta, 0.866);
        assert_eq!(params.w_idx_offset, 1);
        assert_eq!(params.w_idx_used, 0);
        assert_eq!(params.w, 0.0);
    }

    #[test]
    fn test_reserved_modes_rejected() {
        assert!(DMixPMode::ReservedA.coefficients().is_err());
        assert!(DMixPMode::ReservedB.coefficients().is_err());
    }

    #[test]
    fn test_parameter_data_bit_layout() {
        let data = DemixingInfoParameterData {
            dmixp_mode: DMixPMode::Mode3N,
            reserved: 0,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        data.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[6 << 5]);
    }

    #[test]
    fn test_parameter_data_roundtrip() {
        let data = DemixingInfoParameterData {
            dmixp_mode: DMixPMode::Mode2,
            reserved: 0,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        data.validate_and_write(&mut writer).unwrap();
        let bytes = writer.data().to_vec();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            DemixingInfoParameterData::validate_and_read(&mut reader).unwrap(),
            data
        );
    }

    #[test]
    fn test_default_demixing_info_layout() {
        let info = DefaultDemixingInfo {
            dmixp_mode: DMixPMode::Mode1,
            reserved: 0,
            default_w: 10,
            reserved_for_future_use: 0,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        info.validate_and_write(&mut writer).unwrap();
        assert_eq!(writer.data(), &[0x00, 10 << 4]);
    }

    #[test]
    fn test_default_w_out_of_range() {
        let info = DefaultDemixingInfo {
            dmixp_mode: DMixPMode::Mode1,
            reserved: 0,
            default_w: 11,
            reserved_for_future_use: 0,
        };
        let mut writer = BitWriter::new(LebGenerator::minimum());
        assert!(info.validate_and_write(&mut writer).unwrap_err().is_invalid_argument());
    }
}
