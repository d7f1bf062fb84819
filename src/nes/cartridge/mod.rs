//! iNES cartridge images.

use thiserror::Error;

const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const PRG_BANK_SIZE: usize = 16 * 1024;
const CHR_BANK_SIZE: usize = 8 * 1024;
const CHR_RAM_SIZE: usize = 8 * 1024;

/// Errors raised while parsing an iNES image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("missing iNES magic (expected NES\\x1A)")]
    InvalidMagic,

    #[error("image truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Nametable mirroring requested by the cartridge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

/// An NES cartridge: PRG-ROM, CHR data, and the mapper number that selects
/// the cartridge-side address logic.
///
/// PRG content is immutable once parsed; bank selection happens in the
/// PRG-ROM view, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Cartridge {
    /// PRG ROM data, a multiple of 16 KiB.
    pub prg_rom: Vec<u8>,

    /// CHR data, a multiple of 8 KiB. When the header declares zero CHR
    /// banks this is 8 KiB of CHR RAM instead.
    pub chr_rom: Vec<u8>,

    /// Mapper number (header byte 6 high nibble merged with byte 7 high
    /// nibble).
    pub mapper: u8,

    /// Number of 16 KiB PRG banks.
    pub prg_banks: usize,

    /// Number of 8 KiB CHR banks (zero means CHR RAM).
    pub chr_banks: usize,

    /// Nametable mirroring.
    pub mirroring: Mirroring,

    /// Whether the image carried a 512-byte trainer (skipped during parse).
    pub has_trainer: bool,
}

impl Cartridge {
    /// Parse an iNES image from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_SIZE {
            return Err(CartridgeError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        if &data[0..4] != b"NES\x1A" {
            return Err(CartridgeError::InvalidMagic);
        }

        let prg_banks = data[4] as usize;
        let chr_banks = data[5] as usize;
        let flags6 = data[6];
        let flags7 = data[7];

        let mapper = (flags6 >> 4) | (flags7 & 0xF0);
        let has_trainer = flags6 & 0x04 != 0;
        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let prg_start = HEADER_SIZE + if has_trainer { TRAINER_SIZE } else { 0 };
        let prg_end = prg_start + prg_banks * PRG_BANK_SIZE;
        let chr_end = prg_end + chr_banks * CHR_BANK_SIZE;
        if data.len() < chr_end {
            return Err(CartridgeError::Truncated {
                expected: chr_end,
                actual: data.len(),
            });
        }

        let prg_rom = data[prg_start..prg_end].to_vec();
        let chr_rom = if chr_banks > 0 {
            data[prg_end..chr_end].to_vec()
        } else {
            vec![0; CHR_RAM_SIZE]
        };

        Ok(Cartridge {
            prg_rom,
            chr_rom,
            mapper,
            prg_banks,
            chr_banks,
            mirroring,
            has_trainer,
        })
    }

    /// Whether the CHR area is writable (CHR RAM).
    pub fn chr_is_ram(&self) -> bool {
        self.chr_banks == 0
    }
}
