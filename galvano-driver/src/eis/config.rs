//! Impedance sweep parameters.

use getset::CopyGetters;

use crate::{
    afe::{
        DftConfig, DftPoints, ExcitationGain, HsDacGain, HsRtiaSel, LpFilterResistor,
        LpLoadResistor, PgaGain, PowerMode, RtiaSel, SampleSource, Sinc2Osr, Sinc3Osr, SwitchPort,
        SwitchMatrixConfig,
    },
    common::{
        Freq, Hz, MHz, kHz,
        units::{ConversionTiming, conversion_clocks},
    },
    sweep::SweepConfig,
};

/// Parameter set of one impedance run. Defaults give a 300 mVpp excitation
/// swept linearly over 101 points from 1 kHz to 100 kHz at 20 Hz output rate.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct EisConfig {
    /// Measurement output data rate.
    odr: Freq<f32>,
    /// Total point budget; `None` runs until stopped.
    point_limit: Option<u32>,
    sys_clk: Freq<f32>,
    wupt_clk: Freq<f32>,
    adc_clk: Freq<f32>,
    /// Calibration resistor. \[Ω\]
    rcal_ohms: f32,

    /// Excitation frequency when no sweep is configured.
    sin_freq: Freq<f32>,
    /// Peak-to-peak excitation at the pin. \[mV\]
    excitation_pp_mv: f32,
    bias_mv: f32,
    vzero_mv: f32,
    excitation_gain: ExcitationGain,
    dac_gain: HsDacGain,
    dac_update_rate: u8,

    /// Counter electrode routing for the sensor capture.
    sense_d: SwitchPort,
    sense_p: SwitchPort,
    sense_n: SwitchPort,
    sense_t: SwitchPort,

    power_mode: PowerMode,
    lp_rtia: RtiaSel,
    lp_rf: LpFilterResistor,
    lp_rload: LpLoadResistor,
    hs_rtia: HsRtiaSel,

    dft_points: DftPoints,
    dft_source: SampleSource,
    dft_hanning: bool,
    pga: PgaGain,
    sinc3_osr: Sinc3Osr,
    sinc2_osr: Sinc2Osr,
    fifo_threshold: u32,

    sweep: Option<SweepConfig>,

    wakeup_retries: u32,
    memory_base: u16,
    memory_capacity: u16,
}

impl Default for EisConfig {
    fn default() -> Self {
        Self {
            odr: 20.0 * Hz,
            point_limit: None,
            sys_clk: 16.0 * MHz,
            wupt_clk: 32.0 * kHz,
            adc_clk: 16.0 * MHz,
            rcal_ohms: 10_000.0,
            sin_freq: 100.0 * kHz,
            excitation_pp_mv: 300.0,
            bias_mv: 0.0,
            vzero_mv: 1100.0,
            excitation_gain: ExcitationGain::X0P25,
            dac_gain: HsDacGain::X0P2,
            dac_update_rate: 0x1b,
            sense_d: SwitchPort::Ce0,
            sense_p: SwitchPort::Ce0,
            sense_n: SwitchPort::Ain1,
            sense_t: SwitchPort::Ain1,
            power_mode: PowerMode::LowPower,
            lp_rtia: RtiaSel::R4k,
            lp_rf: LpFilterResistor::R1M,
            lp_rload: LpLoadResistor::R100,
            hs_rtia: HsRtiaSel::R1k,
            dft_points: DftPoints::P16384,
            dft_source: SampleSource::Sinc3,
            dft_hanning: true,
            pga: PgaGain::X1,
            sinc3_osr: Sinc3Osr::Osr2,
            sinc2_osr: Sinc2Osr::Osr22,
            fifo_threshold: 4,
            sweep: Some(SweepConfig {
                start: 1.0 * kHz,
                stop: 100.0 * kHz,
                points: 101,
                log: false,
            }),
            wakeup_retries: 10,
            memory_base: 0,
            memory_capacity: 512,
        }
    }
}

impl EisConfig {
    pub fn with_odr(mut self, odr: Freq<f32>) -> Self {
        self.odr = odr;
        self
    }

    /// Stops the cadence after this many reduced points.
    pub fn with_point_limit(mut self, limit: Option<u32>) -> Self {
        self.point_limit = limit;
        self
    }

    pub fn with_clocks(mut self, wupt: Freq<f32>, sys: Freq<f32>, adc: Freq<f32>) -> Self {
        self.wupt_clk = wupt;
        self.sys_clk = sys;
        self.adc_clk = adc;
        self
    }

    pub fn with_rcal(mut self, ohms: f32) -> Self {
        self.rcal_ohms = ohms;
        self
    }

    /// Fixed excitation frequency; clears any configured sweep.
    pub fn with_fixed_frequency(mut self, freq: Freq<f32>) -> Self {
        self.sin_freq = freq;
        self.sweep = None;
        self
    }

    pub fn with_sweep(mut self, sweep: SweepConfig) -> Self {
        self.sweep = Some(sweep);
        self
    }

    pub fn with_excitation(mut self, pp_mv: f32, bias_mv: f32) -> Self {
        self.excitation_pp_mv = pp_mv;
        self.bias_mv = bias_mv;
        self
    }

    pub fn with_sense_switches(
        mut self,
        d: SwitchPort,
        p: SwitchPort,
        n: SwitchPort,
        t: SwitchPort,
    ) -> Self {
        self.sense_d = d;
        self.sense_p = p;
        self.sense_n = n;
        self.sense_t = t;
        self
    }

    pub fn with_rtia(mut self, lp: RtiaSel, hs: HsRtiaSel) -> Self {
        self.lp_rtia = lp;
        self.hs_rtia = hs;
        self
    }

    pub fn with_dft(mut self, points: DftPoints, source: SampleSource, hanning: bool) -> Self {
        self.dft_points = points;
        self.dft_source = source;
        self.dft_hanning = hanning;
        self
    }

    pub fn with_filters(mut self, sinc3: Sinc3Osr, sinc2: Sinc2Osr) -> Self {
        self.sinc3_osr = sinc3;
        self.sinc2_osr = sinc2;
        self
    }

    pub fn with_pga(mut self, pga: PgaGain) -> Self {
        self.pga = pga;
        self
    }

    pub fn with_fifo_threshold(mut self, threshold: u32) -> Self {
        self.fifo_threshold = threshold;
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

    /// Excitation frequency of the first point.
    pub(crate) fn start_frequency(&self) -> Freq<f32> {
        match self.sweep {
            Some(sweep) => sweep.start,
            None => self.sin_freq,
        }
    }

    pub(crate) fn dft(&self) -> DftConfig {
        DftConfig {
            points: self.dft_points,
            source: self.dft_source,
            hanning: self.dft_hanning,
        }
    }

    pub(crate) fn sensor_switches(&self) -> SwitchMatrixConfig {
        SwitchMatrixConfig {
            d: self.sense_d,
            p: self.sense_p,
            n: self.sense_n,
            t: self.sense_t,
            t_to_tia: true,
        }
    }

    pub(crate) fn load_switches(&self) -> SwitchMatrixConfig {
        SwitchMatrixConfig {
            d: SwitchPort::Se0,
            p: SwitchPort::Se0,
            n: SwitchPort::Se0Load,
            t: SwitchPort::Se0Load,
            t_to_tia: true,
        }
    }

    pub(crate) fn rcal_switches(&self) -> SwitchMatrixConfig {
        SwitchMatrixConfig {
            d: SwitchPort::Rcal0,
            p: SwitchPort::Rcal0,
            n: SwitchPort::Rcal1,
            t: SwitchPort::Rcal1,
            t_to_tia: true,
        }
    }

    /// Wait clocks for one full DFT window to reach the data queue.
    pub(crate) fn conversion_clks(&self) -> u32 {
        conversion_clocks(&ConversionTiming {
            data_count: self.dft_points.points(),
            sinc3_osr: self.sinc3_osr.osr(),
            sinc2_osr: match self.dft_source {
                SampleSource::Sinc2 | SampleSource::Dft => Some(self.sinc2_osr.osr()),
                SampleSource::Sinc3 => None,
            },
            sys_to_adc_clk: self.sys_clk.hz() / self.adc_clk.hz(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_standard_sweep() {
        let c = EisConfig::default();
        assert_eq!(20.0, c.odr().hz());
        let sweep = c.sweep().unwrap();
        assert_eq!(1000.0, sweep.start.hz());
        assert_eq!(101, sweep.points);
        assert!(!sweep.log);
        assert_eq!(RtiaSel::R4k, c.lp_rtia());
        assert_eq!(16384, c.dft_points().points());
    }

    #[test]
    fn fixed_frequency_clears_the_sweep() {
        let c = EisConfig::default().with_fixed_frequency(10.0 * kHz);
        assert!(c.sweep().is_none());
        assert_eq!(10_000.0, c.start_frequency().hz());
    }

    #[test]
    fn conversion_wait_covers_the_dft_window() {
        let c = EisConfig::default();
        // 16384 sinc3 outputs at OSR 2, equal sys/ADC clocks
        assert_eq!((16384 + 2) * 2, c.conversion_clks());
    }
}
