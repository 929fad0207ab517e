//! DAC code source for the differential-pulse staircase.

use crate::{
    common::units::{saturate_vbias, vbias_code, vzero_code, MAX_STEP_COUNT},
    error::GalvanoDriverError,
    firmware::DacWord,
};

/// Where the pulsed staircase stands within one logical point.
///
/// The sequencer only ever drives the machine through `BaselineHold` and
/// `PulseOn` (the two DAC emissions); the sampling phases name the cadence
/// slots the engine executes between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPhase {
    Idle,
    /// Baseline level is on the cell.
    BaselineHold,
    /// Engine samples the baseline current.
    SampleBase,
    /// Pulse level is on the cell.
    PulseOn,
    /// Engine samples the pulse current.
    SamplePulse,
    PulseOff,
    /// Baseline advances to the next staircase step.
    StepNext,
    /// All configured points emitted; no further ramp advancement.
    Stopped,
}

/// Physical description of the staircase, in mV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampParams {
    pub start_mv: f32,
    pub peak_mv: f32,
    pub step_mv: f32,
    pub pulse_amplitude_mv: f32,
    pub pulse_positive: bool,
    pub vzero_mv: f32,
    /// Logical point count; 0 derives it from the range and step size.
    pub step_count: u32,
}

/// Emits the interleaved baseline/pulse DAC words of a differential-pulse
/// staircase, two per logical point. Ramp and point advancement happen only
/// on the pulse-to-baseline transition.
#[derive(Debug, Clone, PartialEq)]
pub struct RampWave {
    phase: RampPhase,
    point: u32,
    total_points: u32,
    /// Fractional 12-bit baseline code, accumulated in float so per-step
    /// increments do not collect rounding error.
    ramp_code: f32,
    code_per_step: f32,
    pulse_code: f32,
    ascending: bool,
    vzero: u8,
}

impl RampWave {
    pub fn new(params: &RampParams) -> Result<Self, GalvanoDriverError> {
        if params.step_mv <= 0.0 {
            return Err(GalvanoDriverError::InvalidParameter(
                "ramp step must be positive",
            ));
        }
        let total_points = match params.step_count {
            0 => {
                let span = (params.peak_mv - params.start_mv).abs();
                (span / params.step_mv).floor() as u32 + 1
            }
            n => n,
        };
        if total_points > MAX_STEP_COUNT {
            return Err(GalvanoDriverError::StepCountOutOfRange(total_points));
        }
        let sign = if params.pulse_positive { 1.0 } else { -1.0 };
        Ok(Self {
            phase: RampPhase::Idle,
            point: 0,
            total_points,
            ramp_code: vbias_code(params.start_mv),
            code_per_step: vbias_code(params.step_mv),
            pulse_code: sign * vbias_code(params.pulse_amplitude_mv),
            ascending: params.peak_mv >= params.start_mv,
            vzero: vzero_code(params.vzero_mv),
        })
    }

    pub fn phase(&self) -> RampPhase {
        self.phase
    }

    pub fn point(&self) -> u32 {
        self.point
    }

    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    /// DAC word for the configured start level, used to preload the DAC
    /// before the engine takes over.
    pub fn initial_word(&self) -> u32 {
        self.word_at(self.ramp_code)
    }

    /// Emits the next DAC word of the baseline/pulse interleave.
    pub fn next_word(&mut self) -> u32 {
        match self.phase {
            RampPhase::Stopped => self.word_at(self.ramp_code),
            RampPhase::PulseOn => {
                let word = self.word_at(self.ramp_code + self.pulse_code);
                self.ramp_code += if self.ascending {
                    self.code_per_step
                } else {
                    -self.code_per_step
                };
                self.point += 1;
                self.phase = if self.point >= self.total_points {
                    RampPhase::Stopped
                } else {
                    RampPhase::BaselineHold
                };
                word
            }
            _ => {
                let word = self.word_at(self.ramp_code);
                self.phase = RampPhase::PulseOn;
                word
            }
        }
    }

    fn word_at(&self, ramp_code: f32) -> u32 {
        let vzero_rail = (self.vzero as i32) * 64;
        let mut vbias = vzero_rail - ramp_code as i32;
        // one-code correction below the zero rail, per the DAC string layout
        if vbias < vzero_rail {
            vbias -= 1;
        }
        DacWord::new()
            .with_vbias(saturate_vbias(vbias))
            .with_vzero(self.vzero)
            .into_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::DacWord;

    fn params() -> RampParams {
        RampParams {
            start_mv: -300.0,
            peak_mv: 300.0,
            step_mv: 100.0,
            pulse_amplitude_mv: 25.0,
            pulse_positive: true,
            vzero_mv: 1300.0,
            step_count: 0,
        }
    }

    #[test]
    fn derives_step_count_from_range() {
        let ramp = RampWave::new(&params()).unwrap();
        assert_eq!(7, ramp.total_points());
    }

    #[test]
    fn rejects_oversized_staircases() {
        let p = RampParams {
            step_count: MAX_STEP_COUNT + 1,
            ..params()
        };
        assert_eq!(
            Err(GalvanoDriverError::StepCountOutOfRange(MAX_STEP_COUNT + 1)),
            RampWave::new(&p)
        );
        let fine = RampParams {
            step_mv: 0.001,
            step_count: 0,
            ..params()
        };
        assert!(matches!(
            RampWave::new(&fine),
            Err(GalvanoDriverError::StepCountOutOfRange(_))
        ));
    }

    #[test]
    fn emits_two_words_per_point_and_stops() {
        let mut ramp = RampWave::new(&params()).unwrap();
        let n = ramp.total_points();
        let words: Vec<u32> = (0..2 * n).map(|_| ramp.next_word()).collect();
        assert_eq!(2 * n as usize, words.len());
        assert_eq!(RampPhase::Stopped, ramp.phase());
        assert_eq!(n, ramp.point());

        // pulse words sit below their baseline (positive pulse lowers the
        // bias code against the zero rail)
        for pair in words.chunks_exact(2) {
            let base = DacWord::from_bits(pair[0]).vbias();
            let pulse = DacWord::from_bits(pair[1]).vbias();
            assert!(pulse < base, "pulse {pulse} vs base {base}");
        }

        // further calls hold the last level without advancing
        let held = ramp.next_word();
        assert_eq!(held, ramp.next_word());
        assert_eq!(n, ramp.point());
    }

    #[test]
    fn baseline_descends_codewise_for_ascending_ramp() {
        let mut ramp = RampWave::new(&params()).unwrap();
        let b0 = DacWord::from_bits(ramp.next_word()).vbias();
        let _p0 = ramp.next_word();
        let b1 = DacWord::from_bits(ramp.next_word()).vbias();
        assert!(b1 < b0);
    }
}
