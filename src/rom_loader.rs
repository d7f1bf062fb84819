//! ROM loading for the NES core.
//!
//! Accepts plain `.nes` images or `.zip` archives containing one, and hands
//! the parsed [`Cartridge`] to the caller.

use log::info;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::nes::cartridge::{Cartridge, CartridgeError};

/// Errors that can occur during ROM loading.
#[derive(Error, Debug)]
pub enum RomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] ZipError),

    #[error("cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),

    #[error("not a .nes file or a .zip containing one")]
    InvalidFormat,
}

/// Extract the first `.nes` member from a ZIP archive.
fn extract_nes_rom_from_zip(zip_path: &Path) -> Result<Vec<u8>, RomError> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.name().to_lowercase().ends_with(".nes") {
            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer)?;
            return Ok(buffer);
        }
    }

    Err(RomError::InvalidFormat)
}

/// Load a cartridge from a `.nes` file or a `.zip` archive containing one.
pub fn load_rom<P: AsRef<Path>>(path: P) -> Result<Cartridge, RomError> {
    let path = path.as_ref();
    info!("loading ROM from {}", path.display());

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
        .ok_or(RomError::InvalidFormat)?;

    let rom_data = match ext.as_str() {
        "zip" => extract_nes_rom_from_zip(path)?,
        "nes" => std::fs::read(path)?,
        _ => return Err(RomError::InvalidFormat),
    };

    info!("ROM data size: {} bytes", rom_data.len());
    let cart = Cartridge::from_bytes(&rom_data)?;
    info!(
        "mapper {}, {} PRG bank(s), {} CHR bank(s)",
        cart.mapper, cart.prg_banks, cart.chr_banks
    );
    Ok(cart)
}

fn is_rom_file(entry: &std::fs::DirEntry) -> bool {
    entry
        .path()
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "nes" | "zip"))
        .unwrap_or(false)
}

/// List ROM files (`.nes` or `.zip`) in a directory, sorted by name.
pub fn list_roms<P: AsRef<Path>>(dir: P) -> Result<Vec<String>, std::io::Error> {
    let mut roms = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_rom_file(&entry) {
            if let Some(file_name) = entry.file_name().to_str() {
                roms.push(file_name.to_string());
            }
        }
    }

    roms.sort();
    Ok(roms)
}
