//! Instruction set of the autonomous sequencing engine.
//!
//! One instruction occupies one word of engine memory; program and block
//! lengths are counted in these words.

use bitflags::bitflags;

/// Address of an engine-visible control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegAddr(pub u16);

/// The handful of registers the core writes from inside generated programs.
/// Everything else behind the register map is reached through the opaque
/// front-end driver.
pub mod regs {
    use super::RegAddr;

    /// Combined zero-level/bias DAC data word.
    pub const DAC_DATA: RegAddr = RegAddr(0x0120);
    /// Set bits of the analog control register.
    pub const AFE_CTRL_SET: RegAddr = RegAddr(0x00A0);
    /// Clear bits of the analog control register.
    pub const AFE_CTRL_CLR: RegAddr = RegAddr(0x00A4);
    /// Block descriptors of the four triggers, indexed by trigger id.
    pub const TRIGGER_INFO: [RegAddr; 4] = [
        RegAddr(0x00B0),
        RegAddr(0x00B4),
        RegAddr(0x00B8),
        RegAddr(0x00BC),
    ];
}

bitflags! {
    /// Analog subsystem power/control bits, written through
    /// [`regs::AFE_CTRL_SET`] / [`regs::AFE_CTRL_CLR`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AfeControl: u32 {
        const ADC_POWER     = 1 << 0;
        const ADC_CONVERT   = 1 << 1;
        const DFT           = 1 << 2;
        const WAVE_GEN      = 1 << 3;
        const HS_TIA_POWER  = 1 << 4;
        const INAMP_POWER   = 1 << 5;
        const EXT_BUF_POWER = 1 << 6;
        const DAC_REF_POWER = 1 << 7;
        const HS_DAC_POWER  = 1 << 8;
        const SINC2_NOTCH   = 1 << 9;
        const DC_BUF_POWER  = 1 << 10;
    }
}

/// A single engine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqInstr {
    /// Write a control register.
    Write { reg: RegAddr, value: u32 },
    /// Busy-wait for the given number of system clocks.
    Wait { clks: u32 },
    /// Low-power wait until the timing program raises the next trigger.
    Sleep,
    /// Raise the block-consumed interrupt towards the host, then sleep.
    Interrupt,
    /// Halt the engine and raise the end-of-program interrupt.
    Stop,
    Nop,
}

impl SeqInstr {
    pub const fn write(reg: RegAddr, value: u32) -> Self {
        Self::Write { reg, value }
    }

    pub const fn wait(clks: u32) -> Self {
        Self::Wait { clks }
    }

    /// Power/control bits to assert.
    pub const fn afe_on(flags: AfeControl) -> Self {
        Self::Write {
            reg: regs::AFE_CTRL_SET,
            value: flags.bits(),
        }
    }

    /// Power/control bits to deassert.
    pub const fn afe_off(flags: AfeControl) -> Self {
        Self::Write {
            reg: regs::AFE_CTRL_CLR,
            value: flags.bits(),
        }
    }
}
