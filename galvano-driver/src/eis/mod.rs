//! Sinusoidal impedance sweep with ratiometric calibration.
//!
//! Every point runs three DFT captures against the same excitation: sensor
//! plus load, load alone, and the on-board calibration resistor; the ratio
//! cancels the TIA gain so no separate gain calibration is needed.

mod config;
mod reduction;

pub use config::EisConfig;
pub use reduction::{impedance_points, sign_extend_18, PolarImpedance};

use crate::{
    afe::{
        Afe, DspConfig, FifoConfig, HsLoopConfig, HsTiaConfig, InterruptFlags, LpAmpConfig,
        LpAmpPower, LpDacConfig, LpLoopConfig, AdcMux, ReferenceConfig, RtiaSel, SubsystemConfig,
        SwitchMatrixConfig, TriggerCadence, WaveformConfig,
    },
    common::{
        Freq,
        units::{saturate_vbias, vbias_code, vzero_code},
    },
    control::{Control, EventSummary},
    error::GalvanoDriverError,
    firmware::{AfeControl, MemoryLayout, ProgramBlock, SeqInstr, TriggerId},
    sequence::ProgramAssembler,
    sweep::SweepState,
};

/// Trigger the periodic measurement program runs on.
const MEASURE: TriggerId = TriggerId::T0;
/// Trigger the one-shot init program runs on.
const INIT: TriggerId = TriggerId::T1;

/// Flag reads allowed while waiting for the one-shot init program to halt.
const INIT_POLL_LIMIT: u32 = 10_000;

/// System clocks of settle time at the head of each measurement.
const MEASURE_SETTLE_CLKS: u32 = 16 * 250;
/// System clocks between routing a path and starting its capture.
const CAPTURE_SETTLE_CLKS: u32 = 16 * 10;

struct EisRun {
    #[allow(dead_code)]
    init_block: ProgramBlock,
    #[allow(dead_code)]
    measure: ProgramBlock,
    sweep: Option<SweepState>,
    /// Frequency the most recently reduced data belongs to.
    freq_of_data: Freq<f32>,
    consumed_points: u32,
}

/// An impedance sweep over one front end. Owns the device; `init` must
/// precede each run.
pub struct EisApp<A: Afe> {
    afe: A,
    config: EisConfig,
    run: Option<EisRun>,
    params_changed: bool,
    stop_requested: bool,
}

impl<A: Afe> EisApp<A> {
    pub fn new(afe: A) -> Self {
        Self::with_config(afe, EisConfig::default())
    }

    pub fn with_config(afe: A, config: EisConfig) -> Self {
        Self {
            afe,
            config,
            run: None,
            params_changed: false,
            stop_requested: false,
        }
    }

    pub fn config(&self) -> &EisConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EisConfig {
        self.params_changed = true;
        &mut self.config
    }

    pub fn afe(&self) -> &A {
        &self.afe
    }

    pub fn afe_mut(&mut self) -> &mut A {
        &mut self.afe
    }

    /// Frequency the most recent output data belongs to; trails the
    /// generator by one point while a sweep is active.
    pub fn current_frequency(&self) -> Freq<f32> {
        match &self.run {
            Some(run) if run.sweep.is_some() => run.freq_of_data,
            _ => self.config.sin_freq(),
        }
    }

    fn wake(&mut self) -> Result<(), GalvanoDriverError> {
        let retries = self.config.wakeup_retries();
        let attempts = self.afe.wakeup(retries)?;
        if attempts > retries {
            return Err(GalvanoDriverError::WakeupTimeout(attempts));
        }
        Ok(())
    }

    /// Generates both engine programs, routes the data queue and runs the
    /// one-shot init program.
    pub fn init(&mut self) -> Result<(), GalvanoDriverError> {
        self.wake()?;

        let sweep = match self.config.sweep() {
            Some(cfg) => Some(SweepState::new(cfg)?),
            None => None,
        };
        let start_freq = self.config.start_frequency();

        let mut layout =
            MemoryLayout::new(self.config.memory_base(), self.config.memory_capacity());
        let lp_loop = self.lp_loop();
        let hs_loop = self.hs_loop(start_freq);
        let dsp = self.dsp();
        let power = self.run_power();
        let measure_instrs = self.measure_program()?;

        let (init_block, measure) = {
            let mut asm = ProgramAssembler::new(&mut self.afe, &mut layout);
            let mut instrs = asm.capture_all(&[
                SubsystemConfig::Reference(ReferenceConfig::enabled()),
                SubsystemConfig::LowPowerLoop(lp_loop),
                SubsystemConfig::HighSpeedLoop(hs_loop),
                SubsystemConfig::Dsp(dsp),
            ])?;
            instrs.push(SeqInstr::afe_on(power));
            instrs.push(SeqInstr::Stop);
            let init_block = asm.commit(INIT, instrs)?;
            let measure = asm.commit(MEASURE, measure_instrs)?;
            (init_block, measure)
        };

        self.afe.configure(&SubsystemConfig::Fifo(FifoConfig {
            source: crate::afe::SampleSource::Dft,
            threshold: self.config.fifo_threshold(),
        }))?;
        self.afe
            .configure(&SubsystemConfig::Power(self.config.power_mode()))?;
        self.afe.clear_interrupt_flags(InterruptFlags::all())?;

        self.afe.enable_sequencer(true)?;
        self.afe.trigger_now(INIT)?;
        self.wait_init_done()?;

        self.run = Some(EisRun {
            init_block,
            measure,
            sweep,
            freq_of_data: start_freq,
            consumed_points: 0,
        });
        self.params_changed = false;
        self.stop_requested = false;
        tracing::debug!(start_hz = start_freq.hz(), "impedance programs resident");
        Ok(())
    }

    fn wait_init_done(&mut self) -> Result<(), GalvanoDriverError> {
        for _ in 0..INIT_POLL_LIMIT {
            if self
                .afe
                .interrupt_flags()?
                .contains(InterruptFlags::END_OF_PROGRAM)
            {
                self.afe
                    .clear_interrupt_flags(InterruptFlags::END_OF_PROGRAM)?;
                return Ok(());
            }
        }
        Err(GalvanoDriverError::WakeupTimeout(INIT_POLL_LIMIT))
    }

    fn lp_loop(&self) -> LpLoopConfig {
        let vzero = vzero_code(self.config.vzero_mv());
        let rail = (vzero as i32) * 64;
        let mut vbias = rail + vbias_code(self.config.bias_mv()) as i32;
        if vbias > rail {
            vbias -= 1;
        }
        LpLoopConfig {
            amp: LpAmpConfig {
                power: LpAmpPower::Normal,
                pa_power: true,
                tia_power: true,
                rf: self.config.lp_rf(),
                rload: self.config.lp_rload(),
                rtia: self.config.lp_rtia(),
            },
            dac: LpDacConfig {
                vzero_code: vzero,
                vbias_code: saturate_vbias(vbias),
                power: true,
            },
        }
    }

    fn hs_loop(&self, frequency: Freq<f32>) -> HsLoopConfig {
        HsLoopConfig {
            excitation_gain: self.config.excitation_gain(),
            dac_gain: self.config.dac_gain(),
            dac_update_rate: self.config.dac_update_rate(),
            tia: HsTiaConfig {
                rtia: self.config.hs_rtia(),
                ctia: 31,
            },
            switches: self.config.sensor_switches(),
            waveform: WaveformConfig {
                frequency,
                amplitude_pp_mv: self.config.excitation_pp_mv(),
                offset_mv: 0.0,
                gain_cal: true,
                offset_cal: true,
            },
        }
    }

    fn dsp(&self) -> DspConfig {
        DspConfig {
            mux_p: AdcMux::HsTiaP,
            mux_n: AdcMux::HsTiaN,
            pga: self.config.pga(),
            sinc3_osr: self.config.sinc3_osr(),
            sinc2_osr: self.config.sinc2_osr(),
            notch_bypass: true,
            dft: Some(self.config.dft()),
        }
    }

    /// Loop blocks held powered for the whole run.
    fn run_power(&self) -> AfeControl {
        let mut power = AfeControl::HS_TIA_POWER
            | AfeControl::INAMP_POWER
            | AfeControl::EXT_BUF_POWER
            | AfeControl::WAVE_GEN
            | AfeControl::DAC_REF_POWER
            | AfeControl::HS_DAC_POWER
            | AfeControl::SINC2_NOTCH;
        if self.config.bias_mv() != 0.0 {
            power |= AfeControl::DC_BUF_POWER;
        }
        power
    }

    /// The per-point program: three captures with switch rerouting between
    /// them. The low-power TIA is opened for the sensor and load captures so
    /// its filter does not discharge into the path, and restored for the
    /// calibration capture.
    fn measure_program(&mut self) -> Result<Vec<SeqInstr>, GalvanoDriverError> {
        let power = self.run_power();
        let conversion = self.config.conversion_clks();
        let open_amp = LpAmpConfig {
            rtia: RtiaSel::Open,
            ..self.lp_loop().amp
        };
        let restored_amp = self.lp_loop().amp;

        let mut instrs = vec![SeqInstr::wait(MEASURE_SETTLE_CLKS)];
        instrs.extend(
            self.afe
                .capture(&SubsystemConfig::LowPowerAmp(open_amp))?,
        );

        self.capture_path(&mut instrs, self.config.sensor_switches(), power, conversion)?;
        instrs.push(SeqInstr::afe_off(
            power | AfeControl::DFT | AfeControl::ADC_CONVERT,
        ));

        self.capture_path(&mut instrs, self.config.load_switches(), power, conversion)?;
        instrs.push(SeqInstr::afe_off(power | AfeControl::ADC_CONVERT));

        instrs.extend(
            self.afe
                .capture(&SubsystemConfig::LowPowerAmp(restored_amp))?,
        );
        self.capture_path(&mut instrs, self.config.rcal_switches(), power, conversion)?;
        instrs.push(SeqInstr::afe_off(
            AfeControl::ADC_CONVERT
                | AfeControl::DFT
                | AfeControl::WAVE_GEN
                | AfeControl::ADC_POWER,
        ));
        instrs.push(SeqInstr::afe_off(power));

        instrs.extend(
            self.afe
                .capture(&SubsystemConfig::SwitchMatrix(SwitchMatrixConfig::open()))?,
        );
        instrs.push(SeqInstr::Sleep);
        Ok(instrs)
    }

    /// Routes one path and runs its DFT capture; leaves the converter bits
    /// for the caller, each path ends differently.
    fn capture_path(
        &mut self,
        instrs: &mut Vec<SeqInstr>,
        switches: SwitchMatrixConfig,
        power: AfeControl,
        conversion_clks: u32,
    ) -> Result<(), GalvanoDriverError> {
        instrs.extend(
            self.afe
                .capture(&SubsystemConfig::SwitchMatrix(switches))?,
        );
        instrs.push(SeqInstr::afe_on(power | AfeControl::ADC_POWER));
        instrs.push(SeqInstr::wait(CAPTURE_SETTLE_CLKS));
        instrs.push(SeqInstr::afe_on(
            AfeControl::ADC_CONVERT | AfeControl::DFT,
        ));
        instrs.push(SeqInstr::wait(conversion_clks));
        Ok(())
    }

    pub fn control(&mut self, command: Control) -> Result<(), GalvanoDriverError> {
        match command {
            Control::Start => {
                let Some(run) = self.run.as_mut() else {
                    return Err(GalvanoDriverError::NotInitialized);
                };
                run.consumed_points = 0;
                self.stop_requested = false;
                self.wake()?;
                self.afe.enable_sequencer(true)?;
                let cadence =
                    TriggerCadence::periodic(MEASURE, self.config.odr(), self.config.wupt_clk());
                self.afe.set_trigger_cadence(&cadence)?;
                self.afe.enable_trigger(true)?;
            }
            Control::StopImmediate => {
                self.wake()?;
                // the disable write races the wakeup timer; issue it twice
                self.afe.enable_trigger(false)?;
                self.afe.enable_trigger(false)?;
            }
            Control::StopSynchronous => self.stop_requested = true,
            Control::Shutdown => {
                self.control(Control::StopImmediate)?;
                self.afe
                    .configure(&SubsystemConfig::Reference(ReferenceConfig::disabled()))?;
                self.afe.hibernate()?;
            }
        }
        Ok(())
    }

    /// Services one interrupt. `out` receives reduced impedance points;
    /// raw words that do not fit stay in the hardware queue.
    pub fn on_interrupt(
        &mut self,
        out: &mut [PolarImpedance],
    ) -> Result<EventSummary, GalvanoDriverError> {
        self.wake()?;
        if self.run.is_none() {
            return Err(GalvanoDriverError::NotInitialized);
        }
        let flags = self.afe.interrupt_flags()?;
        let mut summary = EventSummary::default();
        if !flags.contains(InterruptFlags::FIFO_THRESHOLD) {
            return Ok(summary);
        }

        let queued = self.afe.read_queue_count()? / 6 * 6;
        let take = queued.min(out.len() * 6) / 6 * 6;
        if take < queued {
            summary.overflow = true;
            tracing::warn!(queued, take, "sample queue exceeds host buffer, truncating");
        }
        let mut words = vec![0u32; take];
        self.afe.read_queue(&mut words)?;
        self.afe
            .clear_interrupt_flags(InterruptFlags::FIFO_THRESHOLD)?;

        let run = self.run.as_mut().ok_or(GalvanoDriverError::NotInitialized)?;
        run.consumed_points += (take / 6) as u32;
        let limit_reached = self
            .config
            .point_limit()
            .is_some_and(|limit| run.consumed_points >= limit);
        if limit_reached || self.stop_requested {
            self.afe.enable_trigger(false)?;
            summary.finished = true;
        }

        for (slot, value) in out
            .iter_mut()
            .zip(impedance_points(&words, self.config.rcal_ohms()))
        {
            *slot = value;
            summary.produced += 1;
        }

        if let Some(sweep) = run.sweep.as_mut() {
            // one event may retire several points; step the sweep past all
            // of them before reprogramming the generator
            for _ in 0..summary.produced {
                run.freq_of_data = sweep.current();
                sweep.advance();
            }
            if summary.produced > 0 && !summary.finished {
                self.afe.set_waveform_frequency(sweep.current())?;
            }
        }
        Ok(summary)
    }
}
