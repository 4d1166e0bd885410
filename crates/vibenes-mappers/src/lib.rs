//! Cartridge mapper implementations for the VibeNES emulator.
//!
//! Mappers are the cartridge-resident logic that banks PRG and CHR memory
//! into the console's fixed address windows, selects nametable mirroring,
//! and (on MMC3) drives the IRQ line from PPU address activity.
//!
//! # Supported mappers
//!
//! | Mapper | Name  | Banking |
//! |--------|-------|---------|
//! | 0      | NROM  | none |
//! | 1      | MMC1  | serial shift register, PRG 16/32 KiB, CHR 4/8 KiB |
//! | 2      | UxROM | PRG 16 KiB switchable + fixed last, bus conflicts |
//! | 3      | CNROM | CHR 8 KiB switchable, bus conflicts |
//! | 4      | MMC3  | PRG 8 KiB, CHR 1/2 KiB, scanline IRQ |
//!
//! # Example
//!
//! ```no_run
//! use vibenes_mappers::{create_mapper, Rom};
//!
//! let rom_data = std::fs::read("game.nes").expect("failed to read ROM");
//! let rom = Rom::load(&rom_data).expect("failed to parse ROM");
//! let mapper = create_mapper(&rom).expect("unsupported mapper");
//!
//! let reset_lo = mapper.cpu_read(0xFFFC);
//! let tile = mapper.ppu_read(0x0000);
//! ```

pub mod mapper;
pub mod rom;

mod cnrom;
mod mmc1;
mod mmc3;
mod nrom;
mod uxrom;

pub use cnrom::Cnrom;
pub use mapper::{Mapper, Mirroring};
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use rom::{Rom, RomError, RomHeader};
pub use uxrom::Uxrom;

/// Create a mapper instance from ROM data.
///
/// # Errors
///
/// Returns [`RomError::UnsupportedMapper`] if the header's mapper ID is
/// outside {0, 1, 2, 3, 4}.
pub fn create_mapper(rom: &Rom) -> Result<Box<dyn Mapper>, RomError> {
    let mapper: Box<dyn Mapper> = match rom.header.mapper {
        0 => Box::new(Nrom::new(rom)),
        1 => Box::new(Mmc1::new(rom)),
        2 => Box::new(Uxrom::new(rom)),
        3 => Box::new(Cnrom::new(rom)),
        4 => Box::new(Mmc3::new(rom)),
        n => return Err(RomError::UnsupportedMapper(n)),
    };
    log::debug!(
        "created mapper {} ({})",
        mapper.mapper_number(),
        mapper.mapper_name()
    );
    Ok(mapper)
}

/// The mapper IDs this crate implements.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[0, 1, 2, 3, 4]
}

/// Check whether a mapper ID is supported.
#[must_use]
pub fn is_mapper_supported(mapper: u16) -> bool {
    supported_mappers().contains(&mapper)
}
