//! NES system orchestration.
//!
//! [`Nes`] owns the CPU and the bus and wires them together the only way
//! the hardware allows: interrupts are delivered at instruction boundaries,
//! and the PPU advances three dots per CPU cycle (NTSC). The PPU's pending
//! NMI is polled here between instructions rather than letting the PPU call
//! back into the CPU.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod ppu;
pub mod prg_rom;
pub mod ram;
pub mod utils;

use thiserror::Error;

use self::bus::CpuBus;
use self::cartridge::{Cartridge, CartridgeError};
use self::controller::Button;
use self::cpu::{Cpu, CpuError, Interrupt};

pub use self::utils::{Memory, MemoryError};

/// CPU cycles per NTSC frame (~1.79 MHz / 60 Hz).
const CYCLES_PER_FRAME: u32 = 29_780;
/// PPU dots per CPU cycle on NTSC.
const PPU_TICKS_PER_CPU_CYCLE: u32 = 3;

/// Errors surfaced by the NES system.
#[derive(Error, Debug)]
pub enum NesError {
    #[error("CPU error: {0}")]
    Cpu(#[from] CpuError),

    #[error("cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
}

/// The NES system: CPU plus everything it can address.
#[derive(Debug)]
pub struct Nes {
    pub cpu: Cpu,
    pub bus: CpuBus,
}

impl Nes {
    /// Build a system around a cartridge and run the reset sequence, which
    /// loads PC from the cartridge's reset vector.
    pub fn new(cart: &Cartridge) -> Result<Self, NesError> {
        let mut bus = CpuBus::new(cart);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus)?;
        Ok(Nes { cpu, bus })
    }

    /// Convenience constructor straight from an iNES image.
    pub fn from_ines_bytes(data: &[u8]) -> Result<Self, NesError> {
        let cart = Cartridge::from_bytes(data)?;
        Nes::new(&cart)
    }

    /// Reset the whole system.
    pub fn reset(&mut self) -> Result<(), NesError> {
        self.bus.reset();
        self.cpu.reset(&mut self.bus)?;
        Ok(())
    }

    /// Execute one instruction.
    ///
    /// Any NMI the PPU raised since the last instruction is delivered
    /// first; afterwards the PPU is advanced three dots per consumed CPU
    /// cycle.
    pub fn step(&mut self) -> Result<u32, NesError> {
        if self.bus.ppu.poll_nmi() {
            self.cpu.trigger_nmi();
        }

        let cycles = self.cpu.step(&mut self.bus)?;

        for _ in 0..cycles * PPU_TICKS_PER_CPU_CYCLE {
            self.bus.ppu.tick();
        }
        Ok(cycles)
    }

    /// Run roughly one frame's worth of CPU cycles.
    pub fn run_frame(&mut self) -> Result<u32, NesError> {
        let mut cycles = 0;
        while cycles < CYCLES_PER_FRAME {
            cycles += self.step()?;
        }
        Ok(cycles)
    }

    /// Inject an interrupt between instructions. Returns the cycles
    /// consumed (0 when a maskable interrupt was suppressed).
    pub fn interrupt(&mut self, kind: Interrupt) -> Result<u32, NesError> {
        Ok(self.cpu.interrupt(&mut self.bus, kind)?)
    }

    /// Host-side controller update.
    pub fn set_button(&mut self, port: usize, button: Button, pressed: bool) {
        self.bus.set_button(port, button, pressed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 32 KiB NROM image: an NMI-enabling program at $8000, an NMI
    /// handler at $8100 that counts into RAM, and matching vectors.
    fn test_image() -> Vec<u8> {
        let mut prg = vec![0xEA; 32 * 1024];

        // $8000: LDA #$80 / STA $2000 (enable NMI) / JMP $8005
        prg[0x0000..0x0008].copy_from_slice(&[
            0xA9, 0x80, // LDA #$80
            0x8D, 0x00, 0x20, // STA $2000
            0x4C, 0x05, 0x80, // JMP $8005
        ]);

        // $8100: INC $10 / RTI
        prg[0x0100..0x0103].copy_from_slice(&[0xE6, 0x10, 0x40]);

        // Vectors: NMI -> $8100, RESET -> $8000, IRQ -> $8100.
        prg[0x7FFA..0x8000].copy_from_slice(&[0x00, 0x81, 0x00, 0x80, 0x00, 0x81]);

        let mut image = Vec::new();
        image.extend_from_slice(b"NES\x1A");
        image.push(2); // 32 KiB PRG
        image.push(1); // 8 KiB CHR
        image.extend_from_slice(&[0; 10]);
        image.extend_from_slice(&prg);
        image.extend(std::iter::repeat(0).take(8 * 1024));
        image
    }

    #[test]
    fn reset_vector_seeds_pc() {
        let nes = Nes::from_ines_bytes(&test_image()).unwrap();
        assert_eq!(nes.cpu.reg.pc, 0x8000);
        assert_eq!(nes.cpu.reg.s, 0xFD);
    }

    #[test]
    fn step_advances_ppu_three_dots_per_cycle() {
        let mut nes = Nes::from_ines_bytes(&test_image()).unwrap();

        let cycles = nes.step().unwrap(); // LDA #$80
        assert_eq!(cycles, 2);
        assert_eq!(nes.cpu.reg.a, 0x80);
        // 6 dots into scanline 0.
        assert_eq!(nes.bus.ppu.scanline(), 0);
    }

    #[test]
    fn frame_delivers_vblank_nmi_to_the_handler() {
        let mut nes = Nes::from_ines_bytes(&test_image()).unwrap();

        let cycles = nes.run_frame().unwrap();
        assert!(cycles >= CYCLES_PER_FRAME);

        // The PPU reached vblank, the NMI fired, and the handler counted.
        assert_eq!(nes.bus.ram.read(0x10), 1);

        nes.run_frame().unwrap();
        assert_eq!(nes.bus.ram.read(0x10), 2);
    }

    #[test]
    fn injected_irq_respects_the_i_flag() {
        let mut nes = Nes::from_ines_bytes(&test_image()).unwrap();

        // Fresh from reset the I flag is set, so an IRQ is dropped.
        assert_eq!(nes.interrupt(Interrupt::Irq).unwrap(), 0);

        nes.cpu
            .reg
            .set_flag(cpu::StatusFlags::INTERRUPT_DISABLE, false);
        assert_eq!(nes.interrupt(Interrupt::Irq).unwrap(), 7);
        assert_eq!(nes.cpu.reg.pc, 0x8100);
    }
}
