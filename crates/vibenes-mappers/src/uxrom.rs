//! UxROM (Mapper 2).
//!
//! Discrete-logic PRG banking board (Mega Man, Castlevania, Contra).
//! Writes anywhere in $8000-$FFFF select the 16 KiB bank mapped at
//! $8000-$BFFF; $C000-$FFFF is fixed to the last bank. The board has no
//! write-data isolation, so the value stored is the CPU's data ANDed with
//! the ROM byte at the written address (bus conflict). CHR is 8 KiB of RAM.

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;
use vibenes_common::{Address, Byte, StateError, StateReader, StateWriter};

/// UxROM mapper implementation.
#[derive(Debug, Clone)]
pub struct Uxrom {
    /// PRG-ROM data.
    prg_rom: Vec<Byte>,
    /// CHR-ROM/RAM data (8 KiB).
    chr: Vec<Byte>,
    /// Whether CHR is RAM (writable). Almost always true on this board.
    chr_is_ram: bool,
    /// Selected 16 KiB bank at $8000-$BFFF.
    prg_bank: u8,
    /// Number of 16 KiB PRG banks.
    prg_banks: usize,
    /// Solder-pad mirroring.
    mirroring: Mirroring,
}

impl Uxrom {
    /// Create a UxROM mapper from ROM data.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0u8; 8192]
        } else {
            rom.chr_rom.clone()
        };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr,
            chr_is_ram,
            prg_bank: 0,
            prg_banks: (rom.prg_rom.len() / 16384).max(1),
            mirroring: rom.header.mirroring,
        }
    }
}

impl Mapper for Uxrom {
    fn cpu_read(&self, addr: Address) -> Byte {
        match addr {
            0x8000..=0xBFFF => {
                let bank = usize::from(self.prg_bank) % self.prg_banks;
                self.prg_rom[bank * 16384 + (addr as usize - 0x8000)]
            }
            0xC000..=0xFFFF => {
                let bank = self.prg_banks - 1;
                self.prg_rom[bank * 16384 + (addr as usize - 0xC000)]
            }
            _ => 0xFF,
        }
    }

    fn cpu_write(&mut self, addr: Address, value: Byte) {
        if addr >= 0x8000 {
            // Bus conflict: ROM drives the data lines too, so the latch
            // sees the AND of both values.
            let effective = value & self.cpu_read(addr);
            self.prg_bank = effective & 0x0F;
        }
    }

    fn ppu_read(&self, addr: Address) -> Byte {
        self.chr[(addr & 0x1FFF) as usize]
    }

    fn ppu_write(&mut self, addr: Address, value: Byte) {
        if self.chr_is_ram {
            self.chr[(addr & 0x1FFF) as usize] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        2
    }

    fn mapper_name(&self) -> &'static str {
        "UxROM"
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
    }

    fn save_state(&self, w: &mut StateWriter) {
        if self.chr_is_ram {
            w.put_bytes(&self.chr);
        }
        w.put_u8(self.prg_bank);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        if self.chr_is_ram {
            r.get_bytes(&mut self.chr)?;
        }
        self.prg_bank = r.get_u8()?;
        Ok(())
    }
}
