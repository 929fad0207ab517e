mod engine;
pub mod error;

pub use engine::{ElectricalModel, EngineEmulator};
