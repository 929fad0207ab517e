//! Pure conversions between physical units (ms, mV, Hz) and the sequencing
//! engine's native tick/code units.

use super::freq::Freq;

/// Voltage of one 12-bit bias DAC code, in mV (2.2 V output span).
pub const DAC_12BIT_LSB_MV: f32 = 2200.0 / 4095.0;
/// Voltage of one 6-bit zero-level DAC code, in mV.
pub const DAC_6BIT_LSB_MV: f32 = DAC_12BIT_LSB_MV * 64.0;

/// The engine rejects zero-length waits; every derived wait is at least this.
pub const MIN_WAIT_TICKS: u32 = 1;

/// Hard ceiling on logical points a generated staircase may contain. Beyond
/// this the per-point program chain cannot fit the engine SRAM in any layout.
pub const MAX_STEP_COUNT: u32 = 1020;

/// Offset subtracted from the zero-level voltage before code conversion; the
/// 6-bit DAC string starts 200 mV above ground.
pub const VZERO_BASE_MV: f32 = 200.0;

/// Converts a duration in milliseconds to timer ticks, rounded, never below
/// [`MIN_WAIT_TICKS`].
pub fn ticks(ms: f32, clk: Freq<f32>) -> u32 {
    let t = (ms / 1000.0 * clk.hz()).round() as i64;
    t.max(MIN_WAIT_TICKS as i64) as u32
}

/// Converts a duration to the wakeup-timer register value, which holds the
/// tick count minus one. Clamped to [`MIN_WAIT_TICKS`].
pub fn wakeup_ticks(ms: f32, clk: Freq<f32>) -> u32 {
    ticks(ms, clk).saturating_sub(1).max(MIN_WAIT_TICKS)
}

/// Converts a bias voltage to fractional 12-bit DAC code units. The caller
/// accumulates in float and quantizes once per emission, so per-step ramp
/// increments do not accumulate rounding error.
pub fn vbias_code(mv: f32) -> f32 {
    mv / DAC_12BIT_LSB_MV
}

/// Converts a zero-level voltage to a 6-bit DAC code, saturating at the field
/// width.
pub fn vzero_code(mv: f32) -> u8 {
    let code = ((mv - VZERO_BASE_MV) / DAC_6BIT_LSB_MV) as i32;
    code.clamp(0, 63) as u8
}

/// Saturates a computed bias code at the 12-bit field extremes.
pub fn saturate_vbias(code: i32) -> u16 {
    code.clamp(0, 4095) as u16
}

/// Linear ADC transfer function: 16-bit offset-binary code to millivolts.
pub fn adc_code_to_mv(code: u32, pga_gain: f32, vref_mv: f32) -> f32 {
    let code = (code & 0xffff) as f32;
    (code - 32768.0) / 32768.0 * vref_mv / pga_gain
}

/// Inputs for the conversion-latency estimate of one acquisition.
#[derive(Debug, Clone, Copy)]
pub struct ConversionTiming {
    /// Number of filter outputs the acquisition must produce.
    pub data_count: u32,
    pub sinc3_osr: u32,
    /// Present when the data path is routed through the sinc2/notch stage.
    pub sinc2_osr: Option<u32>,
    pub sys_to_adc_clk: f32,
}

/// Number of system clocks to wait between triggering a conversion and the
/// last output reaching the data queue.
///
/// The sinc3 stage emits one output per `sinc3_osr` ADC clocks after a
/// two-output pipeline fill; the sinc2 stage consumes `sinc2_osr` sinc3
/// outputs per output and needs a flush margin on top.
pub fn conversion_clocks(t: &ConversionTiming) -> u32 {
    let sinc3_outputs = match t.sinc2_osr {
        Some(osr2) => t.data_count * osr2 + 15,
        None => t.data_count,
    };
    let adc_clks = (sinc3_outputs + 2) * t.sinc3_osr;
    (adc_clks as f32 * t.sys_to_adc_clk).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::freq::{kHz, Freq};
    use rstest::rstest;

    #[rstest]
    #[case(32, 1.0, 32.0 * kHz)]
    #[case(1600, 50.0, 32.0 * kHz)]
    #[case(16, 1.0, 16.0 * kHz)]
    fn ms_to_ticks(#[case] expected: u32, #[case] ms: f32, #[case] clk: Freq<f32>) {
        assert_eq!(expected, ticks(ms, clk));
    }

    #[test]
    fn tick_floor_is_never_zero() {
        assert_eq!(MIN_WAIT_TICKS, ticks(0.0, 32.0 * kHz));
        assert_eq!(MIN_WAIT_TICKS, ticks(0.001, 32.0 * kHz));
        assert_eq!(MIN_WAIT_TICKS, ticks(-5.0, 32.0 * kHz));
        assert_eq!(MIN_WAIT_TICKS, wakeup_ticks(0.0, 32.0 * kHz));
    }

    #[test]
    fn wakeup_register_holds_ticks_minus_one() {
        assert_eq!(1599, wakeup_ticks(50.0, 32.0 * kHz));
    }

    #[test]
    fn dac_codes_saturate() {
        assert_eq!(63, vzero_code(10_000.0));
        assert_eq!(0, vzero_code(-10_000.0));
        assert_eq!(4095, saturate_vbias(5000));
        assert_eq!(0, saturate_vbias(-3));
    }

    #[test]
    fn adc_transfer_is_symmetric_around_midscale() {
        assert_eq!(0.0, adc_code_to_mv(0x8000, 1.0, 1820.0));
        let hi = adc_code_to_mv(0x8000 + 100, 1.0, 1820.0);
        let lo = adc_code_to_mv(0x8000 - 100, 1.0, 1820.0);
        approx::assert_abs_diff_eq!(hi, -lo, epsilon = 1e-4);
    }

    #[test]
    fn conversion_latency_grows_with_oversampling() {
        let base = ConversionTiming {
            data_count: 1,
            sinc3_osr: 4,
            sinc2_osr: None,
            sys_to_adc_clk: 1.0,
        };
        let with_sinc2 = ConversionTiming {
            sinc2_osr: Some(22),
            ..base
        };
        assert!(conversion_clocks(&with_sinc2) > conversion_clocks(&base));

        assert_eq!(12, conversion_clocks(&base));
        assert_eq!(
            conversion_clocks(&base) * 2,
            conversion_clocks(&ConversionTiming {
                sys_to_adc_clk: 2.0,
                ..base
            })
        );
    }
}
