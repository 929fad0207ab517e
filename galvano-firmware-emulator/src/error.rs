use galvano_driver::afe::AfeError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EmulatorError {
    #[error("Program write at {addr:#06x}+{len} exceeds engine memory ({capacity} words)")]
    OutOfMemory { addr: u16, len: usize, capacity: usize },

    #[error("Queue underrun: requested {requested}, queued {queued}")]
    QueueUnderrun { requested: usize, queued: usize },
}

impl From<EmulatorError> for AfeError {
    fn from(err: EmulatorError) -> Self {
        AfeError::new(err.to_string())
    }
}
