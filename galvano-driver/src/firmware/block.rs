use bitfield_struct::bitfield;

use super::instruction::{regs, RegAddr, SeqInstr};

/// One of the four hardware triggers the timing program (or the host) can
/// raise; each owns a block descriptor selecting the program it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerId {
    T0,
    T1,
    T2,
    T3,
}

impl TriggerId {
    pub const ALL: [TriggerId; 4] = [Self::T0, Self::T1, Self::T2, Self::T3];

    pub const fn index(self) -> usize {
        match self {
            Self::T0 => 0,
            Self::T1 => 1,
            Self::T2 => 2,
            Self::T3 => 3,
        }
    }

    /// Register holding this trigger's block descriptor.
    pub const fn info_reg(self) -> RegAddr {
        regs::TRIGGER_INFO[self.index()]
    }
}

/// Packed descriptor word: where a trigger's program starts and how many
/// words it executes.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct BlockDescriptor {
    pub addr: u16,
    pub len: u16,
}

/// Packed DAC data word: 12-bit bias code plus 6-bit zero-level code.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct DacWord {
    #[bits(12)]
    pub vbias: u16,
    #[bits(6)]
    pub vzero: u8,
    #[bits(14)]
    __: u32,
}

/// A relocatable unit of engine code resident in engine memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBlock {
    pub trigger: TriggerId,
    pub addr: u16,
    pub instrs: Vec<SeqInstr>,
}

impl ProgramBlock {
    pub fn len(&self) -> u16 {
        self.instrs.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn descriptor(&self) -> BlockDescriptor {
        BlockDescriptor::new()
            .with_addr(self.addr)
            .with_len(self.len())
    }
}
