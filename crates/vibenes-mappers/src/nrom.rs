//! NROM (Mapper 0).
//!
//! The launch-era cartridge board: no banking at all. 16 KiB PRG mirrors at
//! $8000 and $C000 (32 KiB fills both), 8 KiB of CHR-ROM or CHR-RAM, and
//! optionally 8 KiB of PRG-RAM at $6000. Writes to the PRG region are
//! ignored.

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;
use vibenes_common::{Address, Byte, StateError, StateReader, StateWriter};

/// NROM mapper implementation.
#[derive(Debug, Clone)]
pub struct Nrom {
    /// PRG-ROM data (16 or 32 KiB).
    prg_rom: Vec<Byte>,
    /// CHR-ROM/RAM data (8 KiB).
    chr: Vec<Byte>,
    /// PRG-RAM at $6000-$7FFF.
    prg_ram: Vec<Byte>,
    /// Whether CHR is RAM (writable).
    chr_is_ram: bool,
    /// Solder-pad mirroring.
    mirroring: Mirroring,
    /// Battery-backed PRG-RAM present.
    has_battery: bool,
}

impl Nrom {
    /// Create an NROM mapper from ROM data.
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
            prg_ram: vec![0u8; 8192],
            chr_is_ram,
            mirroring: rom.header.mirroring,
            has_battery: rom.header.has_battery,
        }
    }

    /// Map a CPU address into the PRG-ROM image, mirroring 16 KiB boards.
    fn prg_offset(&self, addr: Address) -> usize {
        (addr as usize - 0x8000) % self.prg_rom.len().max(1)
    }
}

impl Mapper for Nrom {
    fn cpu_read(&self, addr: Address) -> Byte {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0xFF,
        }
    }

    fn cpu_write(&mut self, addr: Address, value: Byte) {
        if let 0x6000..=0x7FFF = addr {
            self.prg_ram[(addr - 0x6000) as usize] = value;
        }
        // PRG-ROM writes are ignored: no registers on this board.
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
        0
    }

    fn mapper_name(&self) -> &'static str {
        "NROM"
    }

    fn has_battery(&self) -> bool {
        self.has_battery
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.has_battery.then_some(self.prg_ram.as_slice())
    }

    fn set_battery_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.prg_ram.len());
        self.prg_ram[..len].copy_from_slice(&data[..len]);
    }

    fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    fn reset(&mut self) {
        // No registers to reset.
    }

    fn save_state(&self, w: &mut StateWriter) {
        w.put_bytes(&self.prg_ram);
        if self.chr_is_ram {
            w.put_bytes(&self.chr);
        }
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.get_bytes(&mut self.prg_ram)?;
        if self.chr_is_ram {
            r.get_bytes(&mut self.chr)?;
        }
        Ok(())
    }
}
