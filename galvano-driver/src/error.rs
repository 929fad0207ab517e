use thiserror::Error;

use crate::{afe::AfeError, common::units::MAX_STEP_COUNT};

/// An interface for error handling in galvano-driver.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum GalvanoDriverError {
    /// The front end did not respond to the wakeup poll within the retry bound.
    #[error("Front end failed to wake up within {0} attempts")]
    WakeupTimeout(u32),

    /// A configuration value is unusable as given.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The generated program does not fit the sequencer memory budget.
    #[error("Program ({required} words) exceeds the remaining sequencer memory ({available} words)")]
    ProgramTooLarge { required: usize, available: usize },

    /// The derived step count exceeds what the sequencer memory can support.
    #[error("Step count ({0}) is out of range ([1, {max}])", max = MAX_STEP_COUNT)]
    StepCountOutOfRange(u32),

    /// A control command was issued before a successful `init`.
    #[error("Application is not initialized")]
    NotInitialized,

    /// Error reported by the register-level front-end driver.
    #[error("{0}")]
    Afe(#[from] AfeError),
}
