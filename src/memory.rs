use crate::error::MemoryError;
use crate::font::MEMORY_SIZE;

/// Flat, byte-addressable memory.
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Memory {
    /// 64KB of zeroed memory.
    pub fn new() -> Self {
        Self::with_size(MEMORY_SIZE)
    }

    pub fn with_size(size: usize) -> Self {
        Memory {
            bytes: vec![0; size].into_boxed_slice(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Zero-fill every location.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    pub fn read(&self, addr: usize) -> Result<u8, MemoryError> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(MemoryError::OutOfRange {
                addr,
                size: self.size(),
            })
    }

    /// Store the low 8 bits of `value`.
    pub fn write(&mut self, addr: usize, value: u16) -> Result<(), MemoryError> {
        let size = self.size();
        let cell = self
            .bytes
            .get_mut(addr)
            .ok_or(MemoryError::OutOfRange { addr, size })?;
        *cell = (value & 0xFF) as u8;
        Ok(())
    }

    /// Copy `program` into memory starting at `start`. Memory is untouched if it does not fit.
    pub fn load_program(&mut self, program: &[u8], start: usize) -> Result<(), MemoryError> {
        if program.is_empty() {
            log::warn!("attempted to load an empty program at {start:#06x}");
            return Ok(());
        }
        let end = start
            .checked_add(program.len())
            .filter(|end| *end <= self.size())
            .ok_or(MemoryError::CapacityExceeded {
                start,
                len: program.len(),
                size: self.size(),
            })?;
        self.bytes[start..end].copy_from_slice(program);
        log::debug!("loaded {} bytes at {start:#06x}", program.len());
        Ok(())
    }

    /// Read-only view of `len` bytes from `start`, clamped to the end of memory.
    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        let start = start.min(self.size());
        let end = start.saturating_add(len).min(self.size());
        &self.bytes[start..end]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
