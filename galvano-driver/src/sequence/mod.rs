//! Generation and scheduling of programs for the autonomous sequencing
//! engine.

mod assembler;
mod cadence;
mod pingpong;
mod ramp;

pub use assembler::{acquisition_program, ProgramAssembler, ADC_SETTLE_CLKS};
pub use cadence::PulseCadenceTiming;
pub use pingpong::{Region, StepSequencer, GROUP_LEN};
pub use ramp::{RampParams, RampPhase, RampWave};
