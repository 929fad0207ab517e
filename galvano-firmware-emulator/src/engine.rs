//! Behavioral model of the autonomous sequencing engine.
//!
//! Executes the instruction stream the driver writes, keeps the DAC and
//! analog-control state the stream produces, and synthesizes ADC/DFT data
//! from a small electrical model so reductions can be checked end to end.

use std::collections::VecDeque;

use num_complex::Complex32;

use galvano_driver::{
    afe::{
        Afe, AfeError, InterruptFlags, RtiaCalibration, RtiaSel, SubsystemConfig,
        SwitchMatrixConfig, SwitchPort, TriggerCadence,
    },
    common::{units::DAC_12BIT_LSB_MV, CalibrationValue, Freq},
    firmware::{regs, AfeControl, BlockDescriptor, DacWord, RegAddr, SeqInstr, TriggerId},
};

use crate::error::EmulatorError;

/// Registers the opaque subsystems live behind; the driver never addresses
/// these directly, they only appear in captured write streams.
const REG_SWITCH_MATRIX: RegAddr = RegAddr(0x2000);
const REG_LP_AMP: RegAddr = RegAddr(0x2004);
const REG_SUBSYS: RegAddr = RegAddr(0x2008);

fn encode_port(port: SwitchPort) -> u32 {
    match port {
        SwitchPort::Open => 0,
        SwitchPort::Ce0 => 1,
        SwitchPort::Se0 => 2,
        SwitchPort::Se0Load => 3,
        SwitchPort::Ain1 => 4,
        SwitchPort::Rcal0 => 5,
        SwitchPort::Rcal1 => 6,
    }
}

fn decode_port(bits: u32) -> SwitchPort {
    match bits & 0xf {
        1 => SwitchPort::Ce0,
        2 => SwitchPort::Se0,
        3 => SwitchPort::Se0Load,
        4 => SwitchPort::Ain1,
        5 => SwitchPort::Rcal0,
        6 => SwitchPort::Rcal1,
        _ => SwitchPort::Open,
    }
}

fn encode_switches(cfg: &SwitchMatrixConfig) -> u32 {
    encode_port(cfg.d)
        | encode_port(cfg.p) << 4
        | encode_port(cfg.n) << 8
        | encode_port(cfg.t) << 12
        | (cfg.t_to_tia as u32) << 16
}

fn decode_switches(bits: u32) -> SwitchMatrixConfig {
    SwitchMatrixConfig {
        d: decode_port(bits),
        p: decode_port(bits >> 4),
        n: decode_port(bits >> 8),
        t: decode_port(bits >> 12),
        t_to_tia: bits & (1 << 16) != 0,
    }
}

fn encode_rtia(rtia: RtiaSel) -> u32 {
    match rtia {
        RtiaSel::Open => 0,
        RtiaSel::R200 => 1,
        RtiaSel::R1k => 2,
        RtiaSel::R4k => 3,
        RtiaSel::R20k => 4,
        RtiaSel::R100k => 5,
    }
}

fn decode_rtia(bits: u32) -> Option<f32> {
    match bits & 0xf {
        1 => Some(200.0),
        2 => Some(1_000.0),
        3 => Some(4_000.0),
        4 => Some(20_000.0),
        5 => Some(100_000.0),
        _ => None,
    }
}

fn encode_18(v: i32) -> u32 {
    (v as u32) & 0x3ffff
}

/// What is wired to the pins. Sample synthesis reads this; tests set it to
/// whatever they want to recover through the reductions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectricalModel {
    /// Resistive cell on the voltammetry path. \[Ω\]
    pub cell_resistance_ohms: f32,
    /// Sensor impedance on the impedance path. \[Ω\]
    pub sensor: Complex32,
    /// Series load resistor. \[Ω\]
    pub rload_ohms: f32,
    /// On-board calibration resistor. \[Ω\]
    pub rcal_ohms: f32,
    /// DFT amplitude for a 1 Ω path; everything scales off this.
    pub dft_scale: f32,
    /// ADC reference. \[mV\]
    pub adc_vref_mv: f32,
}

impl Default for ElectricalModel {
    fn default() -> Self {
        Self {
            cell_resistance_ohms: 10_000.0,
            sensor: Complex32::new(2_000.0, 0.0),
            rload_ohms: 100.0,
            rcal_ohms: 10_000.0,
            dft_scale: 1.0e7,
            adc_vref_mv: 1820.0,
        }
    }
}

/// The engine plus the bits of analog state its instruction stream touches.
pub struct EngineEmulator {
    memory: Vec<SeqInstr>,
    descriptors: [BlockDescriptor; 4],
    cadence: Option<TriggerCadence>,
    trigger_enabled: bool,
    sequencer_enabled: bool,
    halted: bool,
    hibernated: bool,
    ctrl: AfeControl,
    route: SwitchMatrixConfig,
    lp_rtia_ohms: f32,
    pga_gain: f32,
    fifo: VecDeque<u32>,
    fifo_threshold: u32,
    flags: InterruptFlags,
    dac_history: Vec<DacWord>,
    current_dac: DacWord,
    waveform_history: Vec<Freq<f32>>,
    elapsed_clks: u64,
    wakeup_attempts_needed: u32,
    pub model: ElectricalModel,
}

impl EngineEmulator {
    pub fn new(memory_words: usize) -> Self {
        Self {
            memory: vec![SeqInstr::Nop; memory_words],
            descriptors: [BlockDescriptor::new(); 4],
            cadence: None,
            trigger_enabled: false,
            sequencer_enabled: false,
            halted: false,
            hibernated: false,
            ctrl: AfeControl::empty(),
            route: SwitchMatrixConfig::open(),
            lp_rtia_ohms: 20_000.0,
            pga_gain: 1.0,
            fifo: VecDeque::new(),
            fifo_threshold: u32::MAX,
            flags: InterruptFlags::empty(),
            dac_history: Vec::new(),
            current_dac: DacWord::new(),
            waveform_history: Vec::new(),
            elapsed_clks: 0,
            wakeup_attempts_needed: 1,
            model: ElectricalModel::default(),
        }
    }

    pub fn dac_history(&self) -> &[DacWord] {
        &self.dac_history
    }

    pub fn queued(&self) -> usize {
        self.fifo.len()
    }

    pub fn flags(&self) -> InterruptFlags {
        self.flags
    }

    pub fn is_trigger_enabled(&self) -> bool {
        self.trigger_enabled
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_hibernated(&self) -> bool {
        self.hibernated
    }

    pub fn route(&self) -> SwitchMatrixConfig {
        self.route
    }

    pub fn waveform_history(&self) -> &[Freq<f32>] {
        &self.waveform_history
    }

    pub fn elapsed_clks(&self) -> u64 {
        self.elapsed_clks
    }

    /// Number of reads the next wakeup poll will take.
    pub fn require_wakeup_attempts(&mut self, attempts: u32) {
        self.wakeup_attempts_needed = attempts;
    }

    /// Executes the block a trigger's descriptor currently points at.
    /// Returns whether anything ran.
    pub fn run_trigger(&mut self, id: TriggerId) -> bool {
        if !self.sequencer_enabled || self.halted || self.hibernated {
            return false;
        }
        let desc = self.descriptors[id.index()];
        let addr = desc.addr() as usize;
        for i in 0..desc.len() as usize {
            let Some(&instr) = self.memory.get(addr + i) else {
                break;
            };
            match instr {
                SeqInstr::Write { reg, value } => self.execute_write(reg, value),
                SeqInstr::Wait { clks } => self.elapsed_clks += clks as u64,
                SeqInstr::Sleep => break,
                SeqInstr::Interrupt => {
                    self.flags |= InterruptFlags::BLOCK_CONSUMED;
                    break;
                }
                SeqInstr::Stop => {
                    self.flags |= InterruptFlags::END_OF_PROGRAM;
                    self.halted = true;
                    break;
                }
                SeqInstr::Nop => {}
            }
        }
        true
    }

    /// Runs one full pass of the timing program's trigger cycle.
    pub fn run_cycle(&mut self) -> bool {
        if !self.trigger_enabled {
            return false;
        }
        let Some(order) = self.cadence.as_ref().map(|c| c.order.clone()) else {
            return false;
        };
        let mut ran = false;
        for id in order {
            if !self.trigger_enabled {
                break;
            }
            ran |= self.run_trigger(id);
        }
        ran
    }

    fn execute_write(&mut self, reg: RegAddr, value: u32) {
        match reg {
            regs::DAC_DATA => {
                let word = DacWord::from_bits(value);
                self.current_dac = word;
                self.dac_history.push(word);
            }
            regs::AFE_CTRL_SET => {
                let set = AfeControl::from_bits_truncate(value);
                let convert_edge = set.contains(AfeControl::ADC_CONVERT)
                    && !self.ctrl.contains(AfeControl::ADC_CONVERT);
                self.ctrl |= set;
                if convert_edge {
                    self.sample();
                }
            }
            regs::AFE_CTRL_CLR => {
                self.ctrl -= AfeControl::from_bits_truncate(value);
            }
            REG_SWITCH_MATRIX => self.route = decode_switches(value),
            REG_LP_AMP => {
                if let Some(ohms) = decode_rtia(value) {
                    self.lp_rtia_ohms = ohms;
                }
            }
            _ => {
                if let Some(i) = regs::TRIGGER_INFO.iter().position(|&r| r == reg) {
                    self.descriptors[i] = BlockDescriptor::from_bits(value);
                }
            }
        }
    }

    fn sample(&mut self) {
        if self.ctrl.contains(AfeControl::DFT) {
            let z = match self.route.d {
                SwitchPort::Se0 => Complex32::new(self.model.rload_ohms, 0.0),
                SwitchPort::Rcal0 => Complex32::new(self.model.rcal_ohms, 0.0),
                _ => self.model.sensor + Complex32::new(self.model.rload_ohms, 0.0),
            };
            let dft = Complex32::new(self.model.dft_scale, 0.0) / z;
            self.fifo.push_back(encode_18(dft.re.round() as i32));
            // the hardware stores the imaginary part negated
            self.fifo.push_back(encode_18((-dft.im).round() as i32));
        } else {
            let rail = (self.current_dac.vzero() as i32) * 64;
            let cell_mv =
                (rail - self.current_dac.vbias() as i32) as f32 * DAC_12BIT_LSB_MV;
            let tia_mv = cell_mv / self.model.cell_resistance_ohms * self.lp_rtia_ohms;
            let code = 32768.0 + tia_mv * self.pga_gain / self.model.adc_vref_mv * 32768.0;
            self.fifo.push_back(code.round().clamp(0.0, 65535.0) as u32);
        }
        if self.fifo.len() >= self.fifo_threshold as usize {
            self.flags |= InterruptFlags::FIFO_THRESHOLD;
        }
    }

    fn apply(&mut self, config: &SubsystemConfig) {
        match config {
            SubsystemConfig::LowPowerLoop(lp) => {
                if let Some(ohms) = lp.amp.rtia.ohms() {
                    self.lp_rtia_ohms = ohms;
                }
                self.current_dac = DacWord::new()
                    .with_vbias(lp.dac.vbias_code)
                    .with_vzero(lp.dac.vzero_code);
            }
            SubsystemConfig::LowPowerAmp(amp) => {
                if let Some(ohms) = amp.rtia.ohms() {
                    self.lp_rtia_ohms = ohms;
                }
            }
            SubsystemConfig::HighSpeedLoop(hs) => {
                self.route = hs.switches;
                self.waveform_history.push(hs.waveform.frequency);
            }
            SubsystemConfig::SwitchMatrix(sw) => self.route = *sw,
            SubsystemConfig::Dsp(dsp) => self.pga_gain = dsp.pga.gain(),
            SubsystemConfig::Fifo(fifo) => self.fifo_threshold = fifo.threshold,
            SubsystemConfig::Reference(_) | SubsystemConfig::Power(_) => {}
        }
    }

    fn subsystem_tag(config: &SubsystemConfig) -> u32 {
        match config {
            SubsystemConfig::Reference(_) => 0,
            SubsystemConfig::LowPowerLoop(_) => 1,
            SubsystemConfig::LowPowerAmp(_) => 2,
            SubsystemConfig::HighSpeedLoop(_) => 3,
            SubsystemConfig::SwitchMatrix(_) => 4,
            SubsystemConfig::Dsp(_) => 5,
            SubsystemConfig::Fifo(_) => 6,
            SubsystemConfig::Power(_) => 7,
        }
    }
}

impl Afe for EngineEmulator {
    fn configure(&mut self, config: &SubsystemConfig) -> Result<(), AfeError> {
        self.apply(config);
        Ok(())
    }

    fn capture(&mut self, config: &SubsystemConfig) -> Result<Vec<SeqInstr>, AfeError> {
        Ok(match config {
            // routing must change at execution time, not capture time
            SubsystemConfig::SwitchMatrix(sw) => {
                vec![SeqInstr::write(REG_SWITCH_MATRIX, encode_switches(sw))]
            }
            SubsystemConfig::LowPowerAmp(amp) => {
                vec![SeqInstr::write(REG_LP_AMP, encode_rtia(amp.rtia))]
            }
            other => {
                self.apply(other);
                vec![SeqInstr::write(REG_SUBSYS, Self::subsystem_tag(other))]
            }
        })
    }

    fn write_program(&mut self, addr: u16, instrs: &[SeqInstr]) -> Result<(), AfeError> {
        let addr = addr as usize;
        if addr + instrs.len() > self.memory.len() {
            return Err(EmulatorError::OutOfMemory {
                addr: addr as u16,
                len: instrs.len(),
                capacity: self.memory.len(),
            }
            .into());
        }
        self.memory[addr..addr + instrs.len()].copy_from_slice(instrs);
        Ok(())
    }

    fn set_block_descriptor(
        &mut self,
        id: TriggerId,
        addr: u16,
        len: u16,
    ) -> Result<(), AfeError> {
        self.descriptors[id.index()] = BlockDescriptor::new().with_addr(addr).with_len(len);
        Ok(())
    }

    fn set_trigger_cadence(&mut self, cadence: &TriggerCadence) -> Result<(), AfeError> {
        self.cadence = Some(cadence.clone());
        Ok(())
    }

    fn enable_trigger(&mut self, enable: bool) -> Result<(), AfeError> {
        self.trigger_enabled = enable;
        Ok(())
    }

    fn enable_sequencer(&mut self, enable: bool) -> Result<(), AfeError> {
        self.sequencer_enabled = enable;
        if enable {
            self.halted = false;
        }
        Ok(())
    }

    fn trigger_now(&mut self, id: TriggerId) -> Result<(), AfeError> {
        self.run_trigger(id);
        Ok(())
    }

    fn read_queue_count(&mut self) -> Result<usize, AfeError> {
        Ok(self.fifo.len())
    }

    fn read_queue(&mut self, buf: &mut [u32]) -> Result<(), AfeError> {
        if buf.len() > self.fifo.len() {
            return Err(EmulatorError::QueueUnderrun {
                requested: buf.len(),
                queued: self.fifo.len(),
            }
            .into());
        }
        for slot in buf.iter_mut() {
            *slot = self.fifo.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn interrupt_flags(&mut self) -> Result<InterruptFlags, AfeError> {
        Ok(self.flags)
    }

    fn clear_interrupt_flags(&mut self, flags: InterruptFlags) -> Result<(), AfeError> {
        self.flags -= flags;
        Ok(())
    }

    fn wakeup(&mut self, _max_attempts: u32) -> Result<u32, AfeError> {
        self.hibernated = false;
        Ok(self.wakeup_attempts_needed)
    }

    fn set_waveform_frequency(&mut self, frequency: Freq<f32>) -> Result<(), AfeError> {
        self.waveform_history.push(frequency);
        Ok(())
    }

    fn calibrate_rtia(&mut self, cal: &RtiaCalibration) -> Result<CalibrationValue, AfeError> {
        match cal.rtia.ohms() {
            Some(ohms) => Ok(CalibrationValue {
                magnitude: ohms,
                phase: 0.0,
            }),
            None => Err(AfeError::new(
                "cannot calibrate an open transimpedance string".to_owned(),
            )),
        }
    }

    fn hibernate(&mut self) -> Result<(), AfeError> {
        self.hibernated = true;
        self.trigger_enabled = false;
        Ok(())
    }
}
