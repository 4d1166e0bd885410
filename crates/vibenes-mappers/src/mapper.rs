//! Mapper trait definition.
//!
//! This module defines the core `Mapper` trait that all cartridge mappers
//! implement. Mappers handle memory banking for PRG-ROM, CHR-ROM/RAM,
//! provide mirroring control, and may drive the IRQ line.

use vibenes_common::{Address, Byte, StateError, StateReader, StateWriter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nametable mirroring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mirroring {
    /// Horizontal mirroring (vertical arrangement): $2000/$2400 share.
    #[default]
    Horizontal,
    /// Vertical mirroring (horizontal arrangement): $2000/$2800 share.
    Vertical,
    /// Single-screen, first 1 KiB bank.
    SingleScreenLow,
    /// Single-screen, second 1 KiB bank.
    SingleScreenHigh,
    /// Four-screen (cartridge-provided extra VRAM).
    FourScreen,
}

impl Mirroring {
    /// Encode for save states.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 1,
            Self::SingleScreenLow => 2,
            Self::SingleScreenHigh => 3,
            Self::FourScreen => 4,
        }
    }

    /// Decode from a save state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidValue`] for bytes outside 0..=4.
    pub fn from_byte(value: u8) -> Result<Self, StateError> {
        match value {
            0 => Ok(Self::Horizontal),
            1 => Ok(Self::Vertical),
            2 => Ok(Self::SingleScreenLow),
            3 => Ok(Self::SingleScreenHigh),
            4 => Ok(Self::FourScreen),
            _ => Err(StateError::InvalidValue {
                field: "mirroring",
                value: u32::from(value),
            }),
        }
    }
}

/// Mapper trait.
///
/// All cartridge mappers implement this trait. The mapper handles:
/// - PRG-ROM/RAM access (CPU $4020-$FFFF; $6000-$7FFF is PRG-RAM if present)
/// - CHR-ROM/RAM access (PPU $0000-$1FFF)
/// - Nametable mirroring selection (may change dynamically)
/// - Optional IRQ generation (MMC3's A12-clocked scanline counter)
///
/// Reads are pure with respect to the address and mapper state: the `&self`
/// receiver enforces it.
pub trait Mapper: Send + Sync {
    /// Read a byte from CPU address space ($4020-$FFFF).
    ///
    /// Unmapped regions (including disabled PRG-RAM) return `0xFF`; the
    /// system bus substitutes its open-bus latch.
    fn cpu_read(&self, addr: Address) -> Byte;

    /// Write a byte into CPU address space ($4020-$FFFF).
    ///
    /// $8000-$FFFF writes typically hit mapper registers; $6000-$7FFF is
    /// PRG-RAM when present.
    fn cpu_write(&mut self, addr: Address, value: Byte);

    /// Read a byte from PPU pattern space ($0000-$1FFF).
    fn ppu_read(&self, addr: Address) -> Byte;

    /// Write a byte into PPU pattern space; only effective with CHR-RAM.
    fn ppu_write(&mut self, addr: Address, value: Byte);

    /// Current nametable mirroring (MMC1 and MMC3 switch it at runtime).
    fn mirroring(&self) -> Mirroring;

    /// PPU address bus bit 12 changed level.
    ///
    /// MMC3 clocks its scanline IRQ counter on debounced rising edges.
    fn notify_a12(&mut self, _level: bool) {}

    /// One CPU cycle elapsed (one CPU bus access).
    ///
    /// MMC1 timestamps register writes with this to filter the double
    /// write of read-modify-write instructions; MMC3 measures how long
    /// A12 has been low.
    fn notify_cpu_cycle(&mut self) {}

    /// Whether the mapper is asserting the IRQ line.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Acknowledge the mapper IRQ (release the line).
    fn clear_irq(&mut self) {}

    /// The iNES mapper ID.
    fn mapper_number(&self) -> u16;

    /// Human-readable mapper name.
    fn mapper_name(&self) -> &'static str;

    /// Whether the cartridge has battery-backed PRG-RAM.
    fn has_battery(&self) -> bool {
        false
    }

    /// Battery-backed RAM contents for persisting, if any.
    fn battery_ram(&self) -> Option<&[u8]> {
        None
    }

    /// Load persisted battery RAM contents.
    fn set_battery_ram(&mut self, _data: &[u8]) {}

    /// The raw PRG-ROM image (for save-state checksumming).
    fn prg_rom(&self) -> &[u8];

    /// Return banking registers and IRQ state to power-on defaults.
    /// ROM contents and battery RAM are preserved.
    fn reset(&mut self);

    /// Append all mutable mapper state to a save-state buffer.
    fn save_state(&self, w: &mut StateWriter);

    /// Restore mapper state from a save-state buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on a truncated buffer or illegal field value.
    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirroring_default() {
        assert_eq!(Mirroring::default(), Mirroring::Horizontal);
    }

    #[test]
    fn test_mirroring_byte_round_trip() {
        for m in [
            Mirroring::Horizontal,
            Mirroring::Vertical,
            Mirroring::SingleScreenLow,
            Mirroring::SingleScreenHigh,
            Mirroring::FourScreen,
        ] {
            assert_eq!(Mirroring::from_byte(m.to_byte()).unwrap(), m);
        }
        assert!(Mirroring::from_byte(5).is_err());
    }
}
