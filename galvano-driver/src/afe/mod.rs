//! The narrow interface to the register-level front-end driver.
//!
//! Everything the core needs from the chip goes through [`Afe`]; the
//! register map, wakeup mechanics and calibration internals stay behind it.

mod config;

pub use config::*;

use bitflags::bitflags;
use derive_more::Display;
use derive_new::new;
use thiserror::Error;

use crate::{
    common::{CalibrationValue, Freq},
    firmware::{SeqInstr, TriggerId},
};

/// An error produced by the register-level front-end driver.
#[derive(new, Error, Debug, Display, PartialEq, Clone)]
#[display("{}", msg)]
pub struct AfeError {
    msg: String,
}

bitflags! {
    /// Interrupt sources reported by the front end. Edge semantics: a set
    /// bit means the event fired since it was last cleared; multiple sources
    /// may be set simultaneously.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptFlags: u32 {
        /// A ping-pong program block has been fully executed.
        const BLOCK_CONSUMED = 1 << 0;
        /// The hardware sample queue reached its configured threshold.
        const FIFO_THRESHOLD = 1 << 1;
        /// A program ended with a halt instruction.
        const END_OF_PROGRAM = 1 << 2;
    }
}

/// The autonomous wakeup cadence: an ordered cycle of triggers, each with an
/// independent (sleep, wake) tick pair indexed by trigger id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCadence {
    /// Cycle of triggers the timing program raises, in order (1 to 4 slots).
    pub order: Vec<TriggerId>,
    pub sleep_ticks: [u32; 4],
    pub wake_ticks: [u32; 4],
}

impl TriggerCadence {
    pub fn slot(&mut self, id: TriggerId, sleep: u32, wake: u32) {
        self.sleep_ticks[id.index()] = sleep;
        self.wake_ticks[id.index()] = wake;
    }
}

/// Register-level front-end driver, out of scope for the core and specified
/// only at this interface.
pub trait Afe {
    /// Applies a subsystem configuration immediately.
    fn configure(&mut self, config: &SubsystemConfig) -> Result<(), AfeError>;

    /// Translates a subsystem configuration into the equivalent register
    /// writes, for splicing into a program block instead of applying now.
    fn capture(&mut self, config: &SubsystemConfig) -> Result<Vec<SeqInstr>, AfeError>;

    /// Writes a program to engine memory at the given word address.
    fn write_program(&mut self, addr: u16, instrs: &[SeqInstr]) -> Result<(), AfeError>;

    /// Points a trigger's block descriptor at `addr`/`len` without touching
    /// engine memory.
    fn set_block_descriptor(&mut self, id: TriggerId, addr: u16, len: u16)
        -> Result<(), AfeError>;

    fn set_trigger_cadence(&mut self, cadence: &TriggerCadence) -> Result<(), AfeError>;

    /// Starts or stops the autonomous timing program.
    fn enable_trigger(&mut self, enable: bool) -> Result<(), AfeError>;

    /// Gates the engine itself; disabled, triggers are ignored.
    fn enable_sequencer(&mut self, enable: bool) -> Result<(), AfeError>;

    /// Raises a trigger from the host, bypassing the timing program.
    fn trigger_now(&mut self, id: TriggerId) -> Result<(), AfeError>;

    fn read_queue_count(&mut self) -> Result<usize, AfeError>;

    /// Pops `buf.len()` samples from the hardware queue.
    fn read_queue(&mut self, buf: &mut [u32]) -> Result<(), AfeError>;

    fn interrupt_flags(&mut self) -> Result<InterruptFlags, AfeError>;

    fn clear_interrupt_flags(&mut self, flags: InterruptFlags) -> Result<(), AfeError>;

    /// Polls the device awake, reading at most `max_attempts` times. Returns
    /// the number of attempts the device actually needed; a value above
    /// `max_attempts` means it never responded.
    fn wakeup(&mut self, max_attempts: u32) -> Result<u32, AfeError>;

    /// Pushes a new excitation frequency to the waveform generator (sweep
    /// hook; takes effect at the next excitation start).
    fn set_waveform_frequency(&mut self, frequency: Freq<f32>) -> Result<(), AfeError>;

    /// Measures the transimpedance path against the calibration resistor.
    fn calibrate_rtia(&mut self, cal: &RtiaCalibration) -> Result<CalibrationValue, AfeError>;

    /// Final power-down; only a wakeup poll brings the device back.
    fn hibernate(&mut self) -> Result<(), AfeError>;
}
