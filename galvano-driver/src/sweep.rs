//! Excitation frequency scheduling for the impedance sweep.

use crate::{
    common::{Freq, Hz},
    error::GalvanoDriverError,
};

/// A frequency sweep over a fixed number of points, linear or logarithmic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    pub start: Freq<f32>,
    pub stop: Freq<f32>,
    pub points: u32,
    pub log: bool,
}

impl SweepConfig {
    /// Frequency of the i-th point; the last point lands exactly on `stop`.
    pub fn frequency_at(&self, index: u32) -> Freq<f32> {
        if self.points <= 1 {
            return self.start;
        }
        let index = index.min(self.points - 1);
        let t = index as f32 / (self.points - 1) as f32;
        let hz = if self.log {
            let ratio = self.stop.hz() / self.start.hz();
            self.start.hz() * ratio.powf(t)
        } else {
            self.start.hz() + (self.stop.hz() - self.start.hz()) * t
        };
        hz * Hz
    }
}

/// Progress through a sweep. `current` is the frequency of the point being
/// measured; `next` is already pushed to the waveform generator so it takes
/// effect the moment the current point completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepState {
    config: SweepConfig,
    index: u32,
    current: Freq<f32>,
    next: Freq<f32>,
}

impl SweepState {
    pub fn new(config: SweepConfig) -> Result<Self, GalvanoDriverError> {
        if config.points == 0 {
            return Err(GalvanoDriverError::InvalidParameter(
                "sweep needs at least one point",
            ));
        }
        if config.start.hz() <= 0.0 || config.stop.hz() <= 0.0 {
            return Err(GalvanoDriverError::InvalidParameter(
                "sweep frequencies must be positive",
            ));
        }
        Ok(Self {
            config,
            index: 0,
            current: config.frequency_at(0),
            next: config.frequency_at(1),
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn current(&self) -> Freq<f32> {
        self.current
    }

    pub fn next(&self) -> Freq<f32> {
        self.next
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.config.points
    }

    /// Moves to the next point. Past the end the sweep holds the final
    /// frequency instead of wrapping.
    pub fn advance(&mut self) {
        if !self.is_last() {
            self.index += 1;
        }
        self.current = self.next;
        self.next = self.config.frequency_at(self.index + 1);
    }
}
