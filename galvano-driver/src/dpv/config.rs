//! Differential-pulse voltammetry parameters.

use getset::CopyGetters;

use crate::{
    afe::{PgaGain, RtiaCalibration, RtiaSel, Sinc2Osr, Sinc3Osr},
    common::{
        Freq, Hz, MHz, kHz,
        units::{ConversionTiming, conversion_clocks},
    },
    sequence::{PulseCadenceTiming, RampParams},
};

/// Full parameter set of one voltammetry run. Defaults give a ±500 mV
/// staircase in 5 mV steps with a 25 mV / 50 ms positive pulse.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DpvConfig {
    /// Low-frequency oscillator driving the timing program.
    lfosc_clk: Freq<f32>,
    sys_clk: Freq<f32>,
    adc_clk: Freq<f32>,
    /// Calibration resistor. \[Ω\]
    rcal_ohms: f32,
    /// ADC reference. \[mV\]
    adc_vref_mv: f32,

    ramp_start_mv: f32,
    ramp_peak_mv: f32,
    ramp_step_mv: f32,
    /// 0 derives the point count from range and step.
    step_count: u32,
    vzero_mv: f32,

    pulse_amplitude_mv: f32,
    pulse_positive: bool,
    pulse_width_ms: f32,
    pre_pulse_wait_ms: f32,
    hold_after_pulse_ms: f32,
    guard_base_ms: f32,
    guard_pulse_ms: f32,

    rtia: RtiaSel,
    /// Used verbatim when `rtia` is `Open`. \[Ω\]
    external_rtia_ohms: f32,
    pga: PgaGain,
    sinc3_osr: Sinc3Osr,
    sinc2_osr: Sinc2Osr,
    fifo_threshold: u32,

    wakeup_retries: u32,
    memory_base: u16,
    memory_capacity: u16,
}

impl Default for DpvConfig {
    fn default() -> Self {
        Self {
            lfosc_clk: 32.0 * kHz,
            sys_clk: 16.0 * MHz,
            adc_clk: 16.0 * MHz,
            rcal_ohms: 10_000.0,
            adc_vref_mv: 1820.0,
            ramp_start_mv: -500.0,
            ramp_peak_mv: 500.0,
            ramp_step_mv: 5.0,
            step_count: 0,
            vzero_mv: 2200.0,
            pulse_amplitude_mv: 25.0,
            pulse_positive: true,
            pulse_width_ms: 50.0,
            pre_pulse_wait_ms: 50.0,
            hold_after_pulse_ms: 1.0,
            guard_base_ms: 2.0,
            guard_pulse_ms: 2.0,
            rtia: RtiaSel::R20k,
            external_rtia_ohms: 20_000.0,
            pga: PgaGain::X1,
            sinc3_osr: Sinc3Osr::Osr4,
            sinc2_osr: Sinc2Osr::Osr1067,
            fifo_threshold: 4,
            wakeup_retries: 10,
            memory_base: 0,
            memory_capacity: 512,
        }
    }
}

impl DpvConfig {
    pub fn with_clocks(mut self, lfosc: Freq<f32>, sys: Freq<f32>, adc: Freq<f32>) -> Self {
        self.lfosc_clk = lfosc;
        self.sys_clk = sys;
        self.adc_clk = adc;
        self
    }

    pub fn with_ramp(mut self, start_mv: f32, peak_mv: f32, step_mv: f32) -> Self {
        self.ramp_start_mv = start_mv;
        self.ramp_peak_mv = peak_mv;
        self.ramp_step_mv = step_mv;
        self
    }

    pub fn with_step_count(mut self, count: u32) -> Self {
        self.step_count = count;
        self
    }

    pub fn with_vzero(mut self, mv: f32) -> Self {
        self.vzero_mv = mv;
        self
    }

    pub fn with_pulse(mut self, amplitude_mv: f32, positive: bool, width_ms: f32) -> Self {
        self.pulse_amplitude_mv = amplitude_mv;
        self.pulse_positive = positive;
        self.pulse_width_ms = width_ms;
        self
    }

    pub fn with_pre_pulse_wait(mut self, ms: f32) -> Self {
        self.pre_pulse_wait_ms = ms;
        self
    }

    pub fn with_hold_after_pulse(mut self, ms: f32) -> Self {
        self.hold_after_pulse_ms = ms;
        self
    }

    pub fn with_guards(mut self, base_ms: f32, pulse_ms: f32) -> Self {
        self.guard_base_ms = base_ms;
        self.guard_pulse_ms = pulse_ms;
        self
    }

    pub fn with_rtia(mut self, rtia: RtiaSel) -> Self {
        self.rtia = rtia;
        self
    }

    /// External feedback resistor; implies `RtiaSel::Open`.
    pub fn with_external_rtia(mut self, ohms: f32) -> Self {
        self.rtia = RtiaSel::Open;
        self.external_rtia_ohms = ohms;
        self
    }

    pub fn with_pga(mut self, pga: PgaGain) -> Self {
        self.pga = pga;
        self
    }

    pub fn with_filters(mut self, sinc3: Sinc3Osr, sinc2: Sinc2Osr) -> Self {
        self.sinc3_osr = sinc3;
        self.sinc2_osr = sinc2;
        self
    }

    pub fn with_fifo_threshold(mut self, threshold: u32) -> Self {
        self.fifo_threshold = threshold;
        self
    }

    pub fn with_adc_vref(mut self, mv: f32) -> Self {
        self.adc_vref_mv = mv;
        self
    }

    pub fn with_rcal(mut self, ohms: f32) -> Self {
        self.rcal_ohms = ohms;
        self
    }

    pub fn with_wakeup_retries(mut self, retries: u32) -> Self {
        self.wakeup_retries = retries;
        self
    }

    pub fn with_memory(mut self, base: u16, capacity: u16) -> Self {
        self.memory_base = base;
        self.memory_capacity = capacity;
        self
    }

    pub(crate) fn ramp_params(&self) -> RampParams {
        RampParams {
            start_mv: self.ramp_start_mv,
            peak_mv: self.ramp_peak_mv,
            step_mv: self.ramp_step_mv,
            pulse_amplitude_mv: self.pulse_amplitude_mv,
            pulse_positive: self.pulse_positive,
            vzero_mv: self.vzero_mv,
            step_count: self.step_count,
        }
    }

    pub(crate) fn cadence_timing(&self) -> PulseCadenceTiming {
        PulseCadenceTiming {
            pre_pulse_wait_ms: self.pre_pulse_wait_ms,
            pulse_width_ms: self.pulse_width_ms,
            hold_after_pulse_ms: self.hold_after_pulse_ms,
            guard_base_ms: self.guard_base_ms,
            guard_pulse_ms: self.guard_pulse_ms,
        }
    }

    /// Wait clocks for one sinc3 sample to travel the filter chain.
    pub(crate) fn conversion_clks(&self) -> u32 {
        conversion_clocks(&ConversionTiming {
            data_count: 1,
            sinc3_osr: self.sinc3_osr.osr(),
            sinc2_osr: None,
            sys_to_adc_clk: self.sys_clk.hz() / self.adc_clk.hz(),
        })
    }

    /// Inputs for the front-end driver's transimpedance calibration; the
    /// probe frequency is the third sinc2 output bin of a 2048-point window.
    pub(crate) fn rtia_calibration(&self) -> RtiaCalibration {
        RtiaCalibration {
            rtia: self.rtia,
            rcal_ohms: self.rcal_ohms,
            frequency: (self.adc_clk.hz() / 4.0 / 22.0 / 2048.0 * 3.0) * Hz,
            sinc3_osr: Sinc3Osr::Osr4,
            sinc2_osr: Sinc2Osr::Osr22,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_standard_staircase() {
        let c = DpvConfig::default();
        assert_eq!(-500.0, c.ramp_start_mv());
        assert_eq!(5.0, c.ramp_step_mv());
        assert_eq!(32_000.0, c.lfosc_clk().hz());
        assert_eq!(RtiaSel::R20k, c.rtia());
        assert_eq!(4, c.fifo_threshold());
    }

    #[test]
    fn external_rtia_opens_the_internal_string() {
        let c = DpvConfig::default().with_external_rtia(33_000.0);
        assert_eq!(RtiaSel::Open, c.rtia());
        assert_eq!(33_000.0, c.external_rtia_ohms());
    }

    #[test]
    fn conversion_wait_scales_with_clock_ratio() {
        let even = DpvConfig::default();
        let slow_adc = DpvConfig::default().with_clocks(
            32.0 * kHz,
            16.0 * MHz,
            8.0 * MHz,
        );
        assert_eq!(even.conversion_clks() * 2, slow_adc.conversion_clks());
    }
}
