pub mod afe;
pub mod common;
pub mod control;
pub mod dpv;
pub mod eis;
pub mod error;
pub mod firmware;
pub mod sequence;
pub mod sweep;

pub mod prelude {
    pub use crate::{
        afe::{Afe, AfeError, InterruptFlags, TriggerCadence},
        common::{CalibrationValue, Freq, Hz, MHz, kHz},
        control::{Control, EventSummary},
        dpv::{DpvApp, DpvConfig},
        eis::{EisApp, EisConfig, PolarImpedance},
        error::GalvanoDriverError,
        sweep::SweepConfig,
    };
}
