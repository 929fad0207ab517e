mod block;
mod instruction;
mod memory;

pub use block::{BlockDescriptor, DacWord, ProgramBlock, TriggerId};
pub use instruction::{regs, AfeControl, RegAddr, SeqInstr};
pub use memory::MemoryLayout;
