mod freq;
pub mod units;

pub use freq::{Freq, Hz, MHz, kHz};

/// Polar impedance of the calibrated transimpedance path, produced once at
/// init and used as a constant divisor in every later reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationValue {
    /// \[Ω\]
    pub magnitude: f32,
    /// \[rad\]
    pub phase: f32,
}

impl CalibrationValue {
    /// A fixed, externally measured transimpedance (calibration bypass).
    pub const fn fixed(magnitude: f32) -> Self {
        Self {
            magnitude,
            phase: 0.0,
        }
    }
}
