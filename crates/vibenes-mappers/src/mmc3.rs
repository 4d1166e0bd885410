//! MMC3 (Mapper 4).
//!
//! The most widely used mapper (Super Mario Bros. 3, Mega Man 3-6,
//! Kirby's Adventure). Register pairs by address range:
//!
//! - $8000/$8001: bank select / bank data (8 bank registers R0-R7)
//! - $A000/$A001: mirroring / PRG-RAM protect
//! - $C000/$C001: IRQ latch / IRQ reload
//! - $E000/$E001: IRQ disable+acknowledge / IRQ enable
//!
//! CHR banking is 2 KiB (R0-R1) + 1 KiB (R2-R5) with an inversion bit that
//! swaps the pattern-table halves; PRG banking is 8 KiB with bit 6 of the
//! bank-select register choosing which end is fixed.
//!
//! The scanline counter clocks on PPU A12 rising edges. During normal
//! rendering A12 is low for background fetches and high for sprite
//! fetches, producing one clean rising edge per scanline; a filter ignores
//! edges unless A12 stayed low for at least one CPU cycle (3 dots), which
//! rejects the rapid toggling caused by $2006/$2007 manipulation.

use crate::mapper::{Mapper, Mirroring};
use crate::rom::Rom;
use vibenes_common::{Address, Byte, StateError, StateReader, StateWriter};

/// MMC3 mapper implementation.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)] // Each flag mirrors a hardware latch
pub struct Mmc3 {
    /// PRG-ROM data.
    prg_rom: Vec<Byte>,
    /// CHR-ROM/RAM data.
    chr: Vec<Byte>,
    /// PRG-RAM data (8 KiB).
    prg_ram: Vec<Byte>,
    /// Whether CHR is RAM (writable).
    chr_is_ram: bool,
    /// Number of 8 KiB PRG banks.
    prg_banks: usize,
    /// Number of 1 KiB CHR banks.
    chr_banks: usize,

    /// Bank register index selected by $8000 bits 0-2.
    bank_select: u8,
    /// PRG mode: bit 6 of $8000. Swaps which of $8000/$C000 is fixed.
    prg_mode: bool,
    /// CHR inversion: bit 7 of $8000. Swaps the pattern-table halves.
    chr_inversion: bool,
    /// Bank registers R0-R7 (R0-R5 CHR, R6-R7 PRG).
    banks: [u8; 8],

    /// Mirroring control ($A000 bit 0): false = vertical, true = horizontal.
    mirroring_horizontal: bool,
    /// Header mirroring; four-screen boards ignore $A000.
    initial_mirroring: Mirroring,
    /// PRG-RAM protect register ($A001): bit 7 enable, bit 6 write protect.
    prg_ram_protect: u8,

    /// IRQ counter reload value ($C000).
    irq_latch: u8,
    /// Current IRQ counter value.
    irq_counter: u8,
    /// Reload requested ($C001).
    irq_reload: bool,
    /// IRQ generation enabled ($E001).
    irq_enabled: bool,
    /// IRQ line asserted.
    irq_pending: bool,

    /// Last observed A12 level.
    a12_level: bool,
    /// CPU cycles A12 has been low; edges only count after one full cycle.
    a12_low_cycles: u8,

    /// Battery-backed PRG-RAM present.
    has_battery: bool,
}

impl Mmc3 {
    /// Create an MMC3 mapper from ROM data.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0u8; 8192]
        } else {
            rom.chr_rom.clone()
        };

        Self {
            prg_banks: (rom.prg_rom.len() / 8192).max(1),
            chr_banks: (chr.len() / 1024).max(1),
            prg_rom: rom.prg_rom.clone(),
            chr,
            prg_ram: vec![0u8; 8192],
            chr_is_ram,
            bank_select: 0,
            prg_mode: false,
            chr_inversion: false,
            banks: [0, 2, 4, 5, 6, 7, 0, 1],
            mirroring_horizontal: rom.header.mirroring == Mirroring::Horizontal,
            initial_mirroring: rom.header.mirroring,
            prg_ram_protect: 0x80,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            a12_level: false,
            a12_low_cycles: 0,
            has_battery: rom.header.has_battery,
        }
    }

    fn prg_ram_enabled(&self) -> bool {
        self.prg_ram_protect & 0x80 != 0
    }

    fn prg_ram_writable(&self) -> bool {
        self.prg_ram_protect & 0x40 == 0
    }

    /// Map a CPU address into the PRG-ROM image.
    fn prg_offset(&self, addr: Address) -> usize {
        let bank = match addr {
            0x8000..=0x9FFF => {
                if self.prg_mode {
                    self.prg_banks.saturating_sub(2)
                } else {
                    usize::from(self.banks[6])
                }
            }
            0xA000..=0xBFFF => usize::from(self.banks[7]),
            0xC000..=0xDFFF => {
                if self.prg_mode {
                    usize::from(self.banks[6])
                } else {
                    self.prg_banks.saturating_sub(2)
                }
            }
            _ => self.prg_banks.saturating_sub(1), // $E000-$FFFF always fixed last
        };

        (bank % self.prg_banks) * 8192 + (addr & 0x1FFF) as usize
    }

    /// Map a PPU address into the CHR image.
    fn chr_offset(&self, addr: Address) -> usize {
        let addr = addr & 0x1FFF;
        // Region index in 1 KiB units; inversion flips bit 12.
        let region = if self.chr_inversion {
            addr ^ 0x1000
        } else {
            addr
        };

        let bank = match region {
            0x0000..=0x07FF => usize::from(self.banks[0] & 0xFE) + usize::from(region >> 10 & 1),
            0x0800..=0x0FFF => {
                usize::from(self.banks[1] & 0xFE) + usize::from((region - 0x0800) >> 10 & 1)
            }
            0x1000..=0x13FF => usize::from(self.banks[2]),
            0x1400..=0x17FF => usize::from(self.banks[3]),
            0x1800..=0x1BFF => usize::from(self.banks[4]),
            _ => usize::from(self.banks[5]),
        };

        (bank % self.chr_banks) * 1024 + (addr & 0x03FF) as usize
    }

    /// Clock the scanline counter (debounced A12 rising edge).
    fn clock_irq_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }
}

impl Mapper for Mmc3 {
    fn cpu_read(&self, addr: Address) -> Byte {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled() {
                    self.prg_ram[(addr - 0x6000) as usize]
                } else {
                    0xFF
                }
            }
            0x8000..=0xFFFF => {
                let offset = self.prg_offset(addr);
                self.prg_rom.get(offset).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn cpu_write(&mut self, addr: Address, value: Byte) {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled() && self.prg_ram_writable() {
                    self.prg_ram[(addr - 0x6000) as usize] = value;
                }
            }
            0x8000..=0x9FFF => {
                if addr & 1 == 0 {
                    self.bank_select = value & 0x07;
                    self.prg_mode = value & 0x40 != 0;
                    self.chr_inversion = value & 0x80 != 0;
                } else {
                    let index = usize::from(self.bank_select);
                    self.banks[index] = match index {
                        // PRG registers ignore the top two bits.
                        6 | 7 => value & 0x3F,
                        _ => value,
                    };
                }
            }
            0xA000..=0xBFFF => {
                if addr & 1 == 0 {
                    self.mirroring_horizontal = value & 0x01 != 0;
                } else {
                    self.prg_ram_protect = value;
                }
            }
            0xC000..=0xDFFF => {
                if addr & 1 == 0 {
                    self.irq_latch = value;
                } else {
                    // Reload: the counter refills from the latch on the
                    // next clock.
                    self.irq_counter = 0;
                    self.irq_reload = true;
                }
            }
            0xE000..=0xFFFF => {
                if addr & 1 == 0 {
                    self.irq_enabled = false;
                    self.irq_pending = false;
                } else {
                    self.irq_enabled = true;
                }
            }
            _ => {}
        }
    }

    fn ppu_read(&self, addr: Address) -> Byte {
        let offset = self.chr_offset(addr);
        self.chr.get(offset).copied().unwrap_or(0xFF)
    }

    fn ppu_write(&mut self, addr: Address, value: Byte) {
        if self.chr_is_ram {
            let offset = self.chr_offset(addr);
            if let Some(byte) = self.chr.get_mut(offset) {
                *byte = value;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        if self.initial_mirroring == Mirroring::FourScreen {
            Mirroring::FourScreen
        } else if self.mirroring_horizontal {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    fn notify_a12(&mut self, level: bool) {
        if level && !self.a12_level {
            // Rising edge; only counts after a full CPU cycle of low time.
            if self.a12_low_cycles >= 1 {
                self.clock_irq_counter();
            }
            self.a12_low_cycles = 0;
        }
        self.a12_level = level;
    }

    fn notify_cpu_cycle(&mut self) {
        if !self.a12_level {
            self.a12_low_cycles = self.a12_low_cycles.saturating_add(1);
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    fn mapper_number(&self) -> u16 {
        4
    }

    fn mapper_name(&self) -> &'static str {
        "MMC3"
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
        self.bank_select = 0;
        self.prg_mode = false;
        self.chr_inversion = false;
        self.banks = [0, 2, 4, 5, 6, 7, 0, 1];
        self.mirroring_horizontal = self.initial_mirroring == Mirroring::Horizontal;
        self.prg_ram_protect = 0x80;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.a12_level = false;
        self.a12_low_cycles = 0;
    }

    fn save_state(&self, w: &mut StateWriter) {
        w.put_bytes(&self.prg_ram);
        if self.chr_is_ram {
            w.put_bytes(&self.chr);
        }
        w.put_u8(self.bank_select);
        w.put_bool(self.prg_mode);
        w.put_bool(self.chr_inversion);
        w.put_bytes(&self.banks);
        w.put_bool(self.mirroring_horizontal);
        w.put_u8(self.prg_ram_protect);
        w.put_u8(self.irq_latch);
        w.put_u8(self.irq_counter);
        w.put_bool(self.irq_reload);
        w.put_bool(self.irq_enabled);
        w.put_bool(self.irq_pending);
        w.put_bool(self.a12_level);
        w.put_u8(self.a12_low_cycles);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.get_bytes(&mut self.prg_ram)?;
        if self.chr_is_ram {
            r.get_bytes(&mut self.chr)?;
        }
        self.bank_select = r.get_u8()?;
        self.prg_mode = r.get_bool()?;
        self.chr_inversion = r.get_bool()?;
        r.get_bytes(&mut self.banks)?;
        self.mirroring_horizontal = r.get_bool()?;
        self.prg_ram_protect = r.get_u8()?;
        self.irq_latch = r.get_u8()?;
        self.irq_counter = r.get_u8()?;
        self.irq_reload = r.get_bool()?;
        self.irq_enabled = r.get_bool()?;
        self.irq_pending = r.get_bool()?;
        self.a12_level = r.get_bool()?;
        self.a12_low_cycles = r.get_u8()?;
        Ok(())
    }
}
