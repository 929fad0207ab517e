use crate::error::GalvanoDriverError;

/// Strict bump allocator over the engine's program memory. Computed once per
/// generation; the whole region is regenerated from scratch when the
/// configuration changes, so there is no deallocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    base: u16,
    capacity: u16,
    cursor: u16,
}

impl MemoryLayout {
    pub fn new(base: u16, capacity: u16) -> Self {
        Self {
            base,
            capacity,
            cursor: 0,
        }
    }

    /// Claims `len` words, returning their base address.
    pub fn alloc(&mut self, len: u16) -> Result<u16, GalvanoDriverError> {
        if len > self.remaining() {
            return Err(GalvanoDriverError::ProgramTooLarge {
                required: len as usize,
                available: self.remaining() as usize,
            });
        }
        let addr = self.base + self.cursor;
        self.cursor += len;
        Ok(addr)
    }

    pub fn remaining(&self) -> u16 {
        self.capacity - self.cursor
    }

    pub fn used(&self) -> u16 {
        self.cursor
    }

    /// Forgets all allocations; used when programs are regenerated.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_contiguous_and_bounded() {
        let mut layout = MemoryLayout::new(0x100, 16);
        assert_eq!(0x100, layout.alloc(10).unwrap());
        assert_eq!(0x10A, layout.alloc(6).unwrap());
        assert_eq!(0, layout.remaining());
        assert_eq!(
            Err(GalvanoDriverError::ProgramTooLarge {
                required: 1,
                available: 0
            }),
            layout.alloc(1)
        );
    }

    #[test]
    fn reset_reclaims_everything() {
        let mut layout = MemoryLayout::new(0, 8);
        layout.alloc(8).unwrap();
        layout.reset();
        assert_eq!(8, layout.remaining());
        assert_eq!(0, layout.alloc(4).unwrap());
    }
}
