//! NES CPU core library
//!
//! Emulates the Ricoh 2A03 (a 6502 without decimal mode) together with the
//! memory bus that fans CPU reads and writes out to work RAM, the PPU and APU
//! register files, the controller ports, and cartridge PRG-ROM. Rendering,
//! audio synthesis, and host I/O live outside this crate; the [`nes::Nes`]
//! orchestrator exposes the instruction-level `step`/`run_frame` surface a
//! frontend drives.

pub mod nes;
pub mod rom_loader;
pub mod utils;
