//! CNROM (Mapper 3).
//!
//! CHR-banking counterpart of UxROM (Arkanoid, Gradius). PRG is fixed (16
//! or 32 KiB); writes to $8000-$FFFF select an 8 KiB CHR bank, subject to
//! the same AND-with-ROM bus conflict as UxROM.

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;
use vibenes_common::{Address, Byte, StateError, StateReader, StateWriter};

/// CNROM mapper implementation.
#[derive(Debug, Clone)]
pub struct Cnrom {
    /// PRG-ROM data (fixed).
    prg_rom: Vec<Byte>,
    /// CHR-ROM data.
    chr: Vec<Byte>,
    /// Selected 8 KiB CHR bank.
    chr_bank: u8,
    /// Number of 8 KiB CHR banks.
    chr_banks: usize,
    /// Solder-pad mirroring.
    mirroring: Mirroring,
}

impl Cnrom {
    /// Create a CNROM mapper from ROM data.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr = if rom.chr_rom.is_empty() {
            vec![0u8; 8192]
        } else {
            rom.chr_rom.clone()
        };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_banks: (chr.len() / 8192).max(1),
            chr,
            chr_bank: 0,
            mirroring: rom.header.mirroring,
        }
    }
}

impl Mapper for Cnrom {
    fn cpu_read(&self, addr: Address) -> Byte {
        match addr {
            0x8000..=0xFFFF => {
                let offset = (addr as usize - 0x8000) % self.prg_rom.len().max(1);
                self.prg_rom[offset]
            }
            _ => 0xFF,
        }
    }

    fn cpu_write(&mut self, addr: Address, value: Byte) {
        if addr >= 0x8000 {
            // Bus conflict, as on UxROM.
            let effective = value & self.cpu_read(addr);
            self.chr_bank = effective & 0x03;
        }
    }

    fn ppu_read(&self, addr: Address) -> Byte {
        let bank = usize::from(self.chr_bank) % self.chr_banks;
        self.chr[bank * 8192 + (addr & 0x1FFF) as usize]
    }

    fn ppu_write(&mut self, _addr: Address, _value: Byte) {
        // CHR-ROM: writes are ignored.
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        3
    }

    fn mapper_name(&self) -> &'static str {
        "CNROM"
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
    }

    fn save_state(&self, w: &mut StateWriter) {
        w.put_u8(self.chr_bank);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.chr_bank = r.get_u8()?;
        Ok(())
    }
}
