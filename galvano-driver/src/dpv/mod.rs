//! Differential-pulse voltammetry.
//!
//! A staircase baseline with a superimposed pulse per step; the engine
//! samples the cell current at the end of both levels and the reduction
//! reports the pulse/baseline difference per point.

mod config;
mod reduction;

pub use config::DpvConfig;
pub use reduction::differential_currents;

use crate::{
    afe::{
        Afe, FifoConfig, InterruptFlags, LpAmpConfig, LpAmpPower, LpDacConfig, LpFilterResistor,
        LpLoadResistor, LpLoopConfig, AdcMux, DspConfig, ReferenceConfig, SampleSource,
        SubsystemConfig, TriggerCadence,
    },
    common::CalibrationValue,
    control::{Control, EventSummary},
    error::GalvanoDriverError,
    firmware::{AfeControl, DacWord, MemoryLayout, ProgramBlock, SeqInstr, TriggerId},
    sequence::{acquisition_program, ProgramAssembler, RampWave, StepSequencer},
};

/// Trigger raised for the baseline DAC update.
const BASELINE: TriggerId = TriggerId::T0;
/// Trigger raised for the pulse DAC update.
const PULSE: TriggerId = TriggerId::T1;
/// Trigger raised for both current samples.
const SAMPLE: TriggerId = TriggerId::T2;
/// Trigger the one-shot init program runs on.
const INIT: TriggerId = TriggerId::T3;

/// Flag reads allowed while waiting for the one-shot init program to halt.
const INIT_POLL_LIMIT: u32 = 10_000;

struct DpvRun {
    sequencer: StepSequencer,
    #[allow(dead_code)]
    init_block: ProgramBlock,
    #[allow(dead_code)]
    acquisition: ProgramBlock,
}

/// A voltammetry run over one front end. Owns the device; `init` must
/// precede each run.
pub struct DpvApp<A: Afe> {
    afe: A,
    config: DpvConfig,
    calibration: Option<CalibrationValue>,
    run: Option<DpvRun>,
    params_changed: bool,
    stop_requested: bool,
}

impl<A: Afe> DpvApp<A> {
    pub fn new(afe: A) -> Self {
        Self::with_config(afe, DpvConfig::default())
    }

    pub fn with_config(afe: A, config: DpvConfig) -> Self {
        Self {
            afe,
            config,
            calibration: None,
            run: None,
            params_changed: false,
            stop_requested: false,
        }
    }

    pub fn config(&self) -> &DpvConfig {
        &self.config
    }

    /// Mutable parameter access; any touch forces recalibration at the next
    /// `init`.
    pub fn config_mut(&mut self) -> &mut DpvConfig {
        self.params_changed = true;
        &mut self.config
    }

    /// Transimpedance value every reported current is scaled by; present
    /// after `init`.
    pub fn calibration(&self) -> Option<CalibrationValue> {
        self.calibration
    }

    pub fn afe(&self) -> &A {
        &self.afe
    }

    pub fn afe_mut(&mut self) -> &mut A {
        &mut self.afe
    }

    fn wake(&mut self) -> Result<(), GalvanoDriverError> {
        let retries = self.config.wakeup_retries();
        let attempts = self.afe.wakeup(retries)?;
        if attempts > retries {
            return Err(GalvanoDriverError::WakeupTimeout(attempts));
        }
        Ok(())
    }

    /// Calibrates the measurement path, generates all engine programs and
    /// runs the one-shot init program.
    pub fn init(&mut self) -> Result<(), GalvanoDriverError> {
        self.wake()?;

        if self.calibration.is_none() || self.params_changed {
            self.calibration = Some(match self.config.rtia().ohms() {
                None => CalibrationValue::fixed(self.config.external_rtia_ohms()),
                Some(_) => self.afe.calibrate_rtia(&self.config.rtia_calibration())?,
            });
        }

        let ramp = RampWave::new(&self.config.ramp_params())?;
        let mut layout =
            MemoryLayout::new(self.config.memory_base(), self.config.memory_capacity());

        let start = DacWord::from_bits(ramp.initial_word());
        let lp_loop = LpLoopConfig {
            amp: self.lp_amp(),
            dac: LpDacConfig {
                vzero_code: start.vzero(),
                vbias_code: start.vbias(),
                power: true,
            },
        };
        let dsp = DspConfig {
            mux_p: AdcMux::LpTiaP,
            mux_n: AdcMux::LpTiaN,
            pga: self.config.pga(),
            sinc3_osr: self.config.sinc3_osr(),
            sinc2_osr: self.config.sinc2_osr(),
            notch_bypass: true,
            dft: None,
        };

        let (init_block, acquisition) = {
            let mut asm = ProgramAssembler::new(&mut self.afe, &mut layout);
            let mut instrs = asm.capture_all(&[
                SubsystemConfig::Reference(ReferenceConfig::enabled()),
                SubsystemConfig::LowPowerLoop(lp_loop),
                SubsystemConfig::Dsp(dsp),
            ])?;
            instrs.push(SeqInstr::Stop);
            let init_block = asm.commit(INIT, instrs)?;
            let acquisition = asm.commit(
                SAMPLE,
                acquisition_program(AfeControl::empty(), self.config.conversion_clks()),
            )?;
            (init_block, acquisition)
        };
        let mut sequencer = StepSequencer::new(&mut layout, ramp, (BASELINE, PULSE))?;

        self.afe.configure(&SubsystemConfig::Fifo(FifoConfig {
            source: SampleSource::Sinc3,
            threshold: self.config.fifo_threshold(),
        }))?;
        self.afe.clear_interrupt_flags(InterruptFlags::all())?;

        self.afe.enable_sequencer(true)?;
        self.afe.trigger_now(INIT)?;
        self.wait_init_done()?;

        sequencer.prime(&mut self.afe)?;
        self.afe.enable_sequencer(false)?;

        self.run = Some(DpvRun {
            sequencer,
            init_block,
            acquisition,
        });
        self.params_changed = false;
        self.stop_requested = false;
        tracing::debug!("voltammetry programs resident, device armed");
        Ok(())
    }

    fn lp_amp(&self) -> LpAmpConfig {
        LpAmpConfig {
            power: LpAmpPower::Boost3,
            pa_power: true,
            tia_power: true,
            rf: LpFilterResistor::R20k,
            rload: LpLoadResistor::Short,
            rtia: self.config.rtia(),
        }
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

    pub fn control(&mut self, command: Control) -> Result<(), GalvanoDriverError> {
        match command {
            Control::Start => {
                if self.run.is_none() {
                    return Err(GalvanoDriverError::NotInitialized);
                }
                self.stop_requested = false;
                self.wake()?;
                self.afe.enable_sequencer(true)?;
                let cadence = TriggerCadence::pulsed(
                    BASELINE,
                    PULSE,
                    SAMPLE,
                    &self.config.cadence_timing(),
                    self.config.lfosc_clk(),
                );
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

    /// Services one interrupt. `out` receives reduced differential currents
    /// in µA; samples that do not fit stay in the hardware queue.
    pub fn on_interrupt(&mut self, out: &mut [f32]) -> Result<EventSummary, GalvanoDriverError> {
        self.wake()?;
        if self.run.is_none() {
            return Err(GalvanoDriverError::NotInitialized);
        }
        let flags = self.afe.interrupt_flags()?;
        let mut summary = EventSummary::default();

        if flags.contains(InterruptFlags::BLOCK_CONSUMED) {
            self.afe
                .clear_interrupt_flags(InterruptFlags::BLOCK_CONSUMED)?;
            if let Some(run) = self.run.as_mut() {
                run.sequencer.refill(&mut self.afe)?;
            }
        }

        if flags.contains(InterruptFlags::FIFO_THRESHOLD) {
            let samples = self.drain(out.len() * 2, &mut summary)?;
            self.afe
                .clear_interrupt_flags(InterruptFlags::FIFO_THRESHOLD)?;
            if self.stop_requested {
                self.afe.enable_trigger(false)?;
                summary.finished = true;
            }
            summary.produced += self.reduce_into(&samples, out);
        }

        if flags.contains(InterruptFlags::END_OF_PROGRAM) {
            self.afe
                .clear_interrupt_flags(InterruptFlags::END_OF_PROGRAM)?;
            let room = (out.len() - summary.produced) * 2;
            let samples = self.drain(room, &mut summary)?;
            let produced = summary.produced;
            summary.produced += self.reduce_into(&samples, &mut out[produced..]);
            summary.finished = true;
            self.afe.enable_trigger(false)?;
            self.afe.enable_trigger(false)?;
        }

        Ok(summary)
    }

    /// Pops at most `capacity` samples, in pairs. Anything beyond stays
    /// queued and flags the overflow.
    fn drain(
        &mut self,
        capacity: usize,
        summary: &mut EventSummary,
    ) -> Result<Vec<u32>, GalvanoDriverError> {
        let queued = self.afe.read_queue_count()?;
        let take = queued.min(capacity) & !1;
        if take < queued {
            summary.overflow = true;
            tracing::warn!(queued, take, "sample queue exceeds host buffer, truncating");
        }
        let mut buf = vec![0u32; take];
        self.afe.read_queue(&mut buf)?;
        Ok(buf)
    }

    fn reduce_into(&self, samples: &[u32], out: &mut [f32]) -> usize {
        let Some(calibration) = self.calibration else {
            return 0;
        };
        let mut produced = 0;
        for (slot, value) in out.iter_mut().zip(differential_currents(
            samples,
            &calibration,
            self.config.pga().gain(),
            self.config.adc_vref_mv(),
        )) {
            *slot = value;
            produced += 1;
        }
        produced
    }
}
