//! Host-side run control shared by both measurement modes.

/// Commands the host can issue against a running measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Arms the timing program and starts the autonomous run.
    Start,
    /// Disables the timing program at once; a point in flight is abandoned.
    StopImmediate,
    /// Lets the run continue until the next batch of samples is retired,
    /// then stops cleanly.
    StopSynchronous,
    /// Immediate stop followed by full power-down.
    Shutdown,
}

/// What one interrupt-service pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSummary {
    /// Reduced output values appended to the result buffer.
    pub produced: usize,
    /// Samples were left in the hardware queue because the host buffer was
    /// full; they remain queued for the next pass.
    pub overflow: bool,
    /// The run has ended; no further interrupts are expected.
    pub finished: bool,
}
