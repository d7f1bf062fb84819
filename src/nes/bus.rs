//! The CPU-side memory bus.
//!
//! A pure address decoder: every CPU read and write lands here and is fanned
//! out to work RAM, the PPU and APU register files, the controller ports, or
//! cartridge PRG-ROM. The bus holds no cycle state; cycle accounting is the
//! CPU's job.

use crate::nes::apu::Apu;
use crate::nes::cartridge::Cartridge;
use crate::nes::controller::{Button, ControllerPorts};
use crate::nes::ppu::Ppu;
use crate::nes::prg_rom::PrgRom;
use crate::nes::ram::WorkRam;
use crate::nes::utils::{Memory, MemoryError};

/// Address decoder over the CPU's 64 KiB space.
///
/// | Range           | Target                               |
/// |-----------------|--------------------------------------|
/// | `$0000-$1FFF`   | 2 KiB work RAM, mirrored every 2 KiB |
/// | `$2000-$3FFF`   | PPU registers, mirrored every 8      |
/// | `$4000-$4015`   | APU registers                        |
/// | `$4016-$4017`   | Controller ports                     |
/// | `$4018-$7FFF`   | unmapped (fatal)                     |
/// | `$8000-$FFFF`   | PRG-ROM (writes rejected)            |
#[derive(Debug)]
pub struct CpuBus {
    pub ram: WorkRam,
    pub ppu: Ppu,
    pub apu: Apu,
    pub controllers: ControllerPorts,
    pub prg: PrgRom,
}

impl CpuBus {
    pub fn new(cart: &Cartridge) -> Self {
        let mut ppu = Ppu::new();
        ppu.attach_chr(cart.chr_rom.clone(), cart.chr_is_ram());

        CpuBus {
            ram: WorkRam::new(),
            ppu,
            apu: Apu::new(),
            controllers: ControllerPorts::new(),
            prg: PrgRom::from_cartridge(cart),
        }
    }

    pub fn reset(&mut self) {
        self.ram.reset();
        self.ppu.reset();
        self.apu.reset();
        self.controllers.reset();
    }

    /// Host-side controller update, forwarded to the ports.
    pub fn set_button(&mut self, port: usize, button: Button, pressed: bool) {
        self.controllers.set_button(port, button, pressed);
    }
}

impl Memory for CpuBus {
    fn read_byte(&mut self, addr: u16) -> Result<u8, MemoryError> {
        match addr {
            0x0000..=0x1FFF => Ok(self.ram.read(addr)),
            0x2000..=0x3FFF => Ok(self.ppu.read_register(0x2000 + (addr & 0x0007))),
            0x4000..=0x4015 => Ok(self.apu.read(addr)),
            0x4016 => Ok(self.controllers.read(0)),
            0x4017 => Ok(self.controllers.read(1)),
            0x4018..=0x7FFF => Err(MemoryError::UnmappedRead { addr }),
            0x8000..=0xFFFF => Ok(self.prg.read(addr)),
        }
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        match addr {
            0x0000..=0x1FFF => {
                self.ram.write(addr, value);
                Ok(())
            }
            0x2000..=0x3FFF => self.ppu.write_register(0x2000 + (addr & 0x0007), value),
            0x4000..=0x4015 => {
                self.apu.write(addr, value);
                Ok(())
            }
            0x4016 | 0x4017 => {
                self.controllers.write(value);
                Ok(())
            }
            0x4018..=0x7FFF => Err(MemoryError::UnmappedWrite { addr }),
            // Bare ROM; no mapper routes writes here.
            0x8000..=0xFFFF => Err(MemoryError::ReadOnly { addr }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nes::cartridge::Mirroring;

    fn test_bus() -> CpuBus {
        let mut prg = vec![0; 32 * 1024];
        prg[0] = 0x42;
        let cart = Cartridge {
            prg_rom: prg,
            chr_rom: vec![0; 8 * 1024],
            mapper: 0,
            prg_banks: 2,
            chr_banks: 1,
            mirroring: Mirroring::Horizontal,
            has_trainer: false,
        };
        CpuBus::new(&cart)
    }

    #[test]
    fn ram_is_mirrored_through_the_bus() {
        let mut bus = test_bus();
        bus.write_byte(0x0000, 0x55).unwrap();

        assert_eq!(bus.read_byte(0x0800).unwrap(), 0x55);
        assert_eq!(bus.read_byte(0x1800).unwrap(), 0x55);
    }

    #[test]
    fn ppu_registers_are_mirrored_every_8_bytes() {
        let mut bus = test_bus();
        // $3456 mirrors $2006; two writes set the VRAM address.
        bus.write_byte(0x3456, 0x21).unwrap();
        bus.write_byte(0x2006, 0x08).unwrap();

        assert_eq!(bus.ppu.regs.vram_addr, 0x2108);
    }

    #[test]
    fn ppu_status_write_is_rejected() {
        let mut bus = test_bus();
        assert_eq!(
            bus.write_byte(0x2002, 0x00),
            Err(MemoryError::ReadOnly { addr: 0x2002 })
        );
    }

    #[test]
    fn apu_registers_read_back() {
        let mut bus = test_bus();
        bus.write_byte(0x4000, 0x77).unwrap();
        assert_eq!(bus.read_byte(0x4000).unwrap(), 0x77);
    }

    #[test]
    fn controller_ports_strobe_and_read() {
        let mut bus = test_bus();
        bus.set_button(0, Button::A, true);
        bus.write_byte(0x4016, 1).unwrap();
        bus.write_byte(0x4016, 0).unwrap();

        assert_eq!(bus.read_byte(0x4016).unwrap(), 1);
    }

    #[test]
    fn status_read_through_a_mirror_still_clears_vblank() {
        use crate::nes::ppu::StatusRegister;

        let mut bus = test_bus();
        bus.ppu.regs.status.insert(StatusRegister::VBLANK_STARTED);

        // $3FFA mirrors $2002; the read side effect must reach the PPU.
        let status = bus.read_byte(0x3FFA).unwrap();
        assert_ne!(status & 0x80, 0);
        assert_eq!(bus.read_byte(0x2002).unwrap() & 0x80, 0);
    }

    #[test]
    fn unmapped_range_is_fatal() {
        let mut bus = test_bus();
        assert_eq!(
            bus.read_byte(0x5000),
            Err(MemoryError::UnmappedRead { addr: 0x5000 })
        );
        assert_eq!(
            bus.write_byte(0x6000, 0),
            Err(MemoryError::UnmappedWrite { addr: 0x6000 })
        );
    }

    #[test]
    fn prg_rom_reads_but_rejects_writes() {
        let mut bus = test_bus();
        assert_eq!(bus.read_byte(0x8000).unwrap(), 0x42);
        assert_eq!(
            bus.write_byte(0x8000, 0x00),
            Err(MemoryError::ReadOnly { addr: 0x8000 })
        );
    }
}
