//! Shared memory abstractions for the NES core.

use thiserror::Error;

use crate::utils::{word_from_bytes, word_to_bytes};

/// Errors raised by memory-mapped accesses through the CPU bus.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("read from unmapped address {addr:#06X}")]
    UnmappedRead { addr: u16 },

    #[error("write to unmapped address {addr:#06X}")]
    UnmappedWrite { addr: u16 },

    #[error("write to read-only address {addr:#06X}")]
    ReadOnly { addr: u16 },
}

/// Byte-addressed memory as the CPU sees it.
///
/// Reads take `&mut self`: several NES registers mutate on read (reading
/// `$2002` clears the vblank flag, reading `$2007` advances the VRAM
/// address), so a bus implementation must never serve them from a cache.
pub trait Memory {
    /// Read a byte from the specified address.
    fn read_byte(&mut self, addr: u16) -> Result<u8, MemoryError>;

    /// Write a byte to the specified address.
    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), MemoryError>;

    /// Read a 16-bit little-endian word.
    fn read_word(&mut self, addr: u16) -> Result<u16, MemoryError> {
        let lo = self.read_byte(addr)?;
        let hi = self.read_byte(addr.wrapping_add(1))?;
        Ok(word_from_bytes(lo, hi))
    }

    /// Write a 16-bit little-endian word.
    fn write_word(&mut self, addr: u16, value: u16) -> Result<(), MemoryError> {
        let (lo, hi) = word_to_bytes(value);
        self.write_byte(addr, lo)?;
        self.write_byte(addr.wrapping_add(1), hi)
    }
}
