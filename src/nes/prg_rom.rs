//! Read-only view of cartridge PRG-ROM over `$8000-$FFFF`.

use thiserror::Error;

use crate::nes::cartridge::Cartridge;
use crate::utils::word_from_bytes;

pub const PRG_START: u16 = 0x8000;
pub const PRG_BANK_SIZE: usize = 16 * 1024;
pub const PRG_WINDOW_SIZE: usize = 32 * 1024;

/// Reset vector location; the other vectors live in the same page.
pub const RESET_VECTOR: u16 = 0xFFFC;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrgRomError {
    #[error("bank {bank} out of range ({banks} banks)")]
    BankOutOfRange { bank: usize, banks: usize },
}

/// How PRG bytes map into the CPU's upper 32 KiB.
///
/// `Fixed` serves NROM-style carts: a 16 KiB image is mirrored into both
/// halves of the window, a 32 KiB image maps flat. `Switchable` serves
/// UxROM-style carts: 16 KiB banks with a selectable bank at `$8000-$BFFF`
/// and a fixed bank (conventionally the last) at `$C000-$FFFF`. Nothing in
/// the bus routes writes here; bank selection is driven by the orchestrator.
#[derive(Debug, Clone)]
pub enum PrgRom {
    Fixed {
        data: Vec<u8>,
    },
    Switchable {
        banks: Vec<Vec<u8>>,
        switchable_bank: usize,
        fixed_bank: usize,
    },
}

impl PrgRom {
    /// Build the view appropriate for a cartridge's PRG size.
    pub fn from_cartridge(cart: &Cartridge) -> Self {
        if cart.prg_rom.len() <= PRG_WINDOW_SIZE {
            PrgRom::Fixed {
                data: cart.prg_rom.clone(),
            }
        } else {
            let banks: Vec<Vec<u8>> = cart
                .prg_rom
                .chunks(PRG_BANK_SIZE)
                .map(|bank| bank.to_vec())
                .collect();
            let fixed_bank = banks.len() - 1;
            PrgRom::Switchable {
                banks,
                switchable_bank: 0,
                fixed_bank,
            }
        }
    }

    /// Read a byte at a CPU address in `$8000-$FFFF`.
    pub fn read(&self, addr: u16) -> u8 {
        let offset = (addr - PRG_START) as usize;
        match self {
            PrgRom::Fixed { data } => data[offset % data.len()],
            PrgRom::Switchable {
                banks,
                switchable_bank,
                fixed_bank,
            } => {
                if offset < PRG_BANK_SIZE {
                    banks[*switchable_bank][offset]
                } else {
                    banks[*fixed_bank][offset - PRG_BANK_SIZE]
                }
            }
        }
    }

    /// Select the bank mapped at `$8000-$BFFF`.
    pub fn select_bank(&mut self, bank: usize) -> Result<(), PrgRomError> {
        match self {
            PrgRom::Fixed { .. } => Err(PrgRomError::BankOutOfRange { bank, banks: 0 }),
            PrgRom::Switchable {
                banks,
                switchable_bank,
                ..
            } => {
                if bank >= banks.len() {
                    return Err(PrgRomError::BankOutOfRange {
                        bank,
                        banks: banks.len(),
                    });
                }
                *switchable_bank = bank;
                Ok(())
            }
        }
    }

    /// Initial program counter, read from the reset vector at `$FFFC/$FFFD`.
    pub fn reset_vector(&self) -> u16 {
        let lo = self.read(RESET_VECTOR);
        let hi = self.read(RESET_VECTOR + 1);
        word_from_bytes(lo, hi)
    }
}
