//! iNES ROM image parsing.
//!
//! ROM files start with a 16-byte header:
//!
//! ```text
//! Byte 0-3:  Magic "NES" + MS-DOS EOF (0x4E 0x45 0x53 0x1A)
//! Byte 4:    PRG-ROM size in 16 KiB pages
//! Byte 5:    CHR-ROM size in 8 KiB pages (0 = cartridge has CHR-RAM)
//! Byte 6:    Flags: bit 0 mirroring (0=H, 1=V), bit 1 battery,
//!            bit 2 trainer, bit 3 four-screen, bits 4-7 mapper low nibble
//! Byte 7:    Bits 4-7: mapper high nibble
//! ```
//!
//! An optional 512-byte trainer sits between the header and PRG-ROM.

use crate::mapper::Mirroring;
use vibenes_common::Byte;

/// Errors that can occur when parsing ROM images.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RomError {
    /// File is too small to contain a header.
    #[error("ROM file too small: expected at least 16 bytes, got {0}")]
    TooSmall(usize),

    /// Invalid magic number in the header.
    #[error("invalid iNES magic: expected [4E 45 53 1A], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// A PRG page count of zero makes the image unusable.
    #[error("header declares zero PRG-ROM pages")]
    NoPrgRom,

    /// Data shorter than the header-declared sections.
    #[error("ROM file truncated: header needs {expected} bytes, file has {actual}")]
    Truncated {
        /// Bytes the header says the file should contain.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// Mapper ID outside the supported set {0, 1, 2, 3, 4}.
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),
}

/// Parsed iNES header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    /// PRG-ROM size in 16 KiB pages.
    pub prg_pages: u8,
    /// CHR-ROM size in 8 KiB pages; zero means 8 KiB of CHR-RAM.
    pub chr_pages: u8,
    /// iNES mapper ID (high nibble of byte 7, low nibble of byte 6).
    pub mapper: u16,
    /// Solder-pad mirroring select.
    pub mirroring: Mirroring,
    /// Battery-backed PRG-RAM present.
    pub has_battery: bool,
    /// 512-byte trainer present before PRG-ROM.
    pub has_trainer: bool,
}

impl RomHeader {
    /// iNES magic number: "NES" followed by MS-DOS EOF.
    pub const MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

    /// Parse the 16-byte header.
    ///
    /// # Errors
    ///
    /// Returns [`RomError`] if the data is shorter than 16 bytes, the magic
    /// is wrong, or the PRG page count is zero.
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < 16 {
            return Err(RomError::TooSmall(data.len()));
        }

        let magic = [data[0], data[1], data[2], data[3]];
        if magic != Self::MAGIC {
            return Err(RomError::InvalidMagic(magic));
        }

        let prg_pages = data[4];
        if prg_pages == 0 {
            return Err(RomError::NoPrgRom);
        }
        let chr_pages = data[5];

        let flags6 = data[6];
        let flags7 = data[7];
        let mapper = u16::from((flags6 >> 4) | (flags7 & 0xF0));

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        Ok(Self {
            prg_pages,
            chr_pages,
            mapper,
            mirroring,
            has_battery: flags6 & 0x02 != 0,
            has_trainer: flags6 & 0x04 != 0,
        })
    }

    /// PRG-ROM size in bytes.
    #[must_use]
    pub fn prg_size(&self) -> usize {
        usize::from(self.prg_pages) * 16 * 1024
    }

    /// CHR-ROM size in bytes (zero when the cartridge uses CHR-RAM).
    #[must_use]
    pub fn chr_size(&self) -> usize {
        usize::from(self.chr_pages) * 8 * 1024
    }
}

/// Parsed ROM image.
#[derive(Debug, Clone)]
pub struct Rom {
    /// Header fields.
    pub header: RomHeader,
    /// 512-byte trainer, if present.
    pub trainer: Option<Vec<Byte>>,
    /// PRG-ROM data.
    pub prg_rom: Vec<Byte>,
    /// CHR-ROM data; empty when the cartridge uses CHR-RAM.
    pub chr_rom: Vec<Byte>,
}

impl Rom {
    /// Load a ROM from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RomError`] if the header is invalid or the file is shorter
    /// than the header-declared sections.
    pub fn load(data: &[u8]) -> Result<Self, RomError> {
        let header = RomHeader::parse(data)?;

        let trainer_size = if header.has_trainer { 512 } else { 0 };
        let expected = 16 + trainer_size + header.prg_size() + header.chr_size();
        if data.len() < expected {
            return Err(RomError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let mut offset = 16;
        let trainer = header.has_trainer.then(|| {
            let t = data[offset..offset + 512].to_vec();
            offset += 512;
            t
        });

        let prg_rom = data[offset..offset + header.prg_size()].to_vec();
        offset += header.prg_size();

        let chr_rom = data[offset..offset + header.chr_size()].to_vec();

        log::debug!(
            "loaded ROM: mapper {}, {} KiB PRG, {} KiB CHR, {:?} mirroring",
            header.mapper,
            header.prg_size() / 1024,
            header.chr_size() / 1024,
            header.mirroring
        );

        Ok(Self {
            header,
            trainer,
            prg_rom,
            chr_rom,
        })
    }
}
