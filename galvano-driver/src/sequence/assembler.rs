//! Placement of generated programs into engine memory.

use crate::{
    afe::{Afe, SubsystemConfig},
    error::GalvanoDriverError,
    firmware::{AfeControl, MemoryLayout, ProgramBlock, SeqInstr, TriggerId},
};

/// System clocks between powering the ADC and starting a conversion.
pub const ADC_SETTLE_CLKS: u32 = 16 * 100;

/// Lays generated programs out back to back in engine memory and binds them
/// to their triggers.
pub struct ProgramAssembler<'a, A: Afe> {
    afe: &'a mut A,
    layout: &'a mut MemoryLayout,
}

impl<'a, A: Afe> ProgramAssembler<'a, A> {
    pub fn new(afe: &'a mut A, layout: &'a mut MemoryLayout) -> Self {
        Self { afe, layout }
    }

    /// Translates a list of subsystem configurations into one flat register
    /// write program.
    pub fn capture_all(
        &mut self,
        configs: &[SubsystemConfig],
    ) -> Result<Vec<SeqInstr>, GalvanoDriverError> {
        let mut instrs = Vec::new();
        for config in configs {
            instrs.extend(self.afe.capture(config)?);
        }
        Ok(instrs)
    }

    /// Allocates room for the program, writes it, and points the trigger's
    /// descriptor at it.
    pub fn commit(
        &mut self,
        trigger: TriggerId,
        instrs: Vec<SeqInstr>,
    ) -> Result<ProgramBlock, GalvanoDriverError> {
        let addr = self.layout.alloc(instrs.len() as u16)?;
        self.afe.write_program(addr, &instrs)?;
        let block = ProgramBlock {
            trigger,
            addr,
            instrs,
        };
        self.afe
            .set_block_descriptor(trigger, addr, block.len())?;
        tracing::debug!(trigger = ?trigger, addr, len = block.len(), "committed program block");
        Ok(block)
    }

    /// Re-points a trigger at an already resident block without rewriting
    /// engine memory.
    pub fn rebind(&mut self, block: &ProgramBlock) -> Result<(), GalvanoDriverError> {
        self.afe
            .set_block_descriptor(block.trigger, block.addr, block.len())?;
        Ok(())
    }

    pub fn layout(&self) -> &MemoryLayout {
        self.layout
    }
}

/// The one-shot acquisition program: power the ADC, let it settle, convert
/// for the filter-chain latency, power down, hand control back to the timing
/// program.
pub fn acquisition_program(power: AfeControl, conversion_clks: u32) -> Vec<SeqInstr> {
    vec![
        SeqInstr::afe_on(power.union(AfeControl::ADC_POWER)),
        SeqInstr::wait(ADC_SETTLE_CLKS),
        SeqInstr::afe_on(AfeControl::ADC_CONVERT),
        SeqInstr::wait(conversion_clks),
        SeqInstr::afe_off(power.union(AfeControl::ADC_POWER).union(AfeControl::ADC_CONVERT)),
        SeqInstr::Sleep,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{afe::tests::RecordingAfe, firmware::regs};

    #[test]
    fn commit_places_blocks_back_to_back() {
        let mut afe = RecordingAfe::default();
        let mut layout = MemoryLayout::new(0x10, 64);
        let mut asm = ProgramAssembler::new(&mut afe, &mut layout);
        let a = asm
            .commit(TriggerId::T3, vec![SeqInstr::Nop, SeqInstr::Stop])
            .unwrap();
        let b = asm
            .commit(TriggerId::T2, acquisition_program(AfeControl::empty(), 25))
            .unwrap();
        assert_eq!(0x10, a.addr);
        assert_eq!(0x12, b.addr);
        assert_eq!(
            vec![(TriggerId::T3, 0x10, 2), (TriggerId::T2, 0x12, 6)],
            afe.descriptors
        );
        assert_eq!((0x12, b.instrs.clone()), afe.program_writes[1]);
    }

    #[test]
    fn rebind_repoints_without_rewriting_memory() {
        let mut afe = RecordingAfe::default();
        let mut layout = MemoryLayout::new(0, 32);
        let mut asm = ProgramAssembler::new(&mut afe, &mut layout);
        let block = asm
            .commit(TriggerId::T0, vec![SeqInstr::Nop, SeqInstr::Sleep])
            .unwrap();
        asm.rebind(&block).unwrap();
        assert_eq!(1, afe.program_writes.len());
        assert_eq!(vec![(TriggerId::T0, 0, 2), (TriggerId::T0, 0, 2)], afe.descriptors);
    }

    #[test]
    fn commit_fails_when_memory_is_exhausted() {
        let mut afe = RecordingAfe::default();
        let mut layout = MemoryLayout::new(0, 4);
        let mut asm = ProgramAssembler::new(&mut afe, &mut layout);
        assert!(matches!(
            asm.commit(TriggerId::T0, vec![SeqInstr::Nop; 5]),
            Err(GalvanoDriverError::ProgramTooLarge { .. })
        ));
    }

    #[test]
    fn acquisition_powers_down_everything_it_powered_up() {
        let program = acquisition_program(AfeControl::SINC2_NOTCH, 100);
        let on = AfeControl::SINC2_NOTCH | AfeControl::ADC_POWER;
        let off = on | AfeControl::ADC_CONVERT;
        assert_eq!(SeqInstr::afe_on(on), program[0]);
        assert_eq!(SeqInstr::wait(ADC_SETTLE_CLKS), program[1]);
        assert_eq!(SeqInstr::afe_on(AfeControl::ADC_CONVERT), program[2]);
        assert_eq!(SeqInstr::wait(100), program[3]);
        assert_eq!(SeqInstr::afe_off(off), program[4]);
        assert_eq!(SeqInstr::Sleep, program[5]);
        assert!(matches!(
            program[0],
            SeqInstr::Write { reg, .. } if reg == regs::AFE_CTRL_SET
        ));
    }
}
