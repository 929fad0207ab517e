//! Ping-pong emission of per-step DAC update programs.
//!
//! The engine executes one region while the other is being (re)written; the
//! interrupt ordering guarantees the two are never touched concurrently, so
//! no locking is involved.

use crate::{
    afe::Afe,
    error::GalvanoDriverError,
    firmware::{BlockDescriptor, MemoryLayout, SeqInstr, TriggerId, regs},
};

use super::ramp::RampWave;

/// Words per per-step instruction group.
pub const GROUP_LEN: u16 = 4;

/// Settle time between the DAC write and the descriptor rewrite, in system
/// clocks.
const INTRA_STEP_WAIT_CLKS: u32 = 10;

/// One of the two alternating memory regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    A,
    B,
}

impl Region {
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Scheduling state of the double buffer, owned exclusively by the
/// [`StepSequencer`]; the engine only executes the addresses it is handed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PingPongState {
    /// Region the next emission goes into.
    current: Region,
    /// DAC updates still to be emitted (two per logical point).
    remaining: u32,
    steps_per_block: u32,
    region_addr: [u16; 2],
    /// Whether the next group belongs to the primary trigger; the group
    /// rewrites the descriptor of the *other* trigger.
    write_for_primary: bool,
}

/// Emits per-step DAC programs into two alternating regions sized from the
/// remaining memory budget.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSequencer {
    state: PingPongState,
    ramp: RampWave,
    /// (primary, alternate) triggers the timing program raises in turn.
    triggers: (TriggerId, TriggerId),
}

impl StepSequencer {
    /// Claims both regions from the remaining budget. Each region holds
    /// `steps_per_block` groups plus one group of tail room for the final
    /// halt.
    pub fn new(
        layout: &mut MemoryLayout,
        ramp: RampWave,
        triggers: (TriggerId, TriggerId),
    ) -> Result<Self, GalvanoDriverError> {
        let budget = layout.remaining() as u32;
        if budget < 4 * GROUP_LEN as u32 {
            return Err(GalvanoDriverError::ProgramTooLarge {
                required: 4 * GROUP_LEN as usize,
                available: budget as usize,
            });
        }
        let steps_per_block = (budget - 2 * GROUP_LEN as u32) / GROUP_LEN as u32 / 2;
        let region_len = steps_per_block as u16 * GROUP_LEN + GROUP_LEN;
        let a = layout.alloc(region_len)?;
        let b = layout.alloc(region_len)?;
        tracing::debug!(
            steps_per_block,
            region_a = a,
            region_b = b,
            "sized ping-pong regions"
        );
        Ok(Self {
            state: PingPongState {
                current: Region::A,
                remaining: ramp.total_points() * 2,
                steps_per_block,
                region_addr: [a, b],
                write_for_primary: true,
            },
            ramp,
            triggers,
        })
    }

    /// Fills both regions before the engine starts and binds the two
    /// alternating triggers to the entry group.
    pub fn prime<A: Afe>(&mut self, afe: &mut A) -> Result<(), GalvanoDriverError> {
        let entry = self.state.region_addr[Region::A.index()];
        for _ in 0..2 {
            self.refill(afe)?;
        }
        afe.set_block_descriptor(self.triggers.0, entry, GROUP_LEN)?;
        afe.set_block_descriptor(self.triggers.1, entry, GROUP_LEN)?;
        Ok(())
    }

    /// Emits one block into the region not currently executing and toggles
    /// the selector. Invoked once per block-consumed interrupt; a call with
    /// nothing left to emit is a no-op.
    pub fn refill<A: Afe>(&mut self, afe: &mut A) -> Result<(), GalvanoDriverError> {
        if self.state.remaining == 0 {
            return Ok(());
        }
        let is_final = self.state.remaining <= self.state.steps_per_block;
        let count = self.state.remaining.min(self.state.steps_per_block);
        self.state.remaining -= count;

        let mut addr = self.state.region_addr[self.state.current.index()];
        for i in 0..count {
            let last_in_block = i == count - 1;
            let next = if !last_in_block || is_final {
                addr + GROUP_LEN
            } else {
                self.state.region_addr[self.state.current.other().index()]
            };
            let target = if self.state.write_for_primary {
                self.triggers.1
            } else {
                self.triggers.0
            };
            let tail = if last_in_block && !is_final {
                SeqInstr::Interrupt
            } else {
                SeqInstr::Sleep
            };
            let group = [
                SeqInstr::write(regs::DAC_DATA, self.ramp.next_word()),
                SeqInstr::wait(INTRA_STEP_WAIT_CLKS),
                SeqInstr::write(
                    target.info_reg(),
                    BlockDescriptor::new()
                        .with_addr(next)
                        .with_len(GROUP_LEN)
                        .into_bits(),
                ),
                tail,
            ];
            afe.write_program(addr, &group)?;
            self.state.write_for_primary = !self.state.write_for_primary;
            addr += GROUP_LEN;
        }

        if is_final {
            afe.write_program(
                addr,
                &[SeqInstr::Nop, SeqInstr::Nop, SeqInstr::Nop, SeqInstr::Stop],
            )?;
        }

        tracing::debug!(
            region = ?self.state.current,
            groups = count,
            remaining = self.state.remaining,
            is_final,
            "emitted DAC block"
        );
        self.state.current = self.state.current.other();
        Ok(())
    }

    pub fn remaining(&self) -> u32 {
        self.state.remaining
    }

    pub fn steps_per_block(&self) -> u32 {
        self.state.steps_per_block
    }

    /// Region the next emission will be written into.
    pub fn write_region(&self) -> Region {
        self.state.current
    }

    pub fn ramp(&self) -> &RampWave {
        &self.ramp
    }
}
