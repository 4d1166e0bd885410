//! PPU control, mask and status registers ($2000-$2002).

use bitflags::bitflags;
use vibenes_common::Address;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// PPUCTRL ($2000) - write-only control register.
    ///
    /// ```text
    /// 7  bit  0
    /// VPHB SINN
    /// |||| ||++- Base nametable address (written into t bits 10-11)
    /// |||| |+--- VRAM increment: 0 = +1 across, 1 = +32 down
    /// |||| +---- Sprite pattern table (8x8 sprites only)
    /// |||+------ Background pattern table
    /// ||+------- Sprite size: 0 = 8x8, 1 = 8x16
    /// |+-------- PPU master/slave (unused on the console)
    /// +--------- Generate NMI at VBlank start
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct PpuCtrl: u8 {
        /// Base nametable select, low bit.
        const NAMETABLE_X = 1 << 0;
        /// Base nametable select, high bit.
        const NAMETABLE_Y = 1 << 1;
        /// VRAM address increment: set = 32 (down), clear = 1 (across).
        const VRAM_INCREMENT_32 = 1 << 2;
        /// Sprite pattern table at $1000 (ignored for 8x16 sprites).
        const SPRITE_TABLE = 1 << 3;
        /// Background pattern table at $1000.
        const BACKGROUND_TABLE = 1 << 4;
        /// 8x16 sprite mode.
        const SPRITE_SIZE_16 = 1 << 5;
        /// Master/slave select (no effect).
        const MASTER_SLAVE = 1 << 6;
        /// Raise NMI when the VBlank flag sets.
        const NMI_ENABLE = 1 << 7;
    }
}

impl PpuCtrl {
    /// VRAM address increment applied after $2007 accesses.
    #[must_use]
    pub fn vram_increment(self) -> u16 {
        if self.contains(Self::VRAM_INCREMENT_32) {
            32
        } else {
            1
        }
    }

    /// Background pattern table base address.
    #[must_use]
    pub fn background_table(self) -> Address {
        if self.contains(Self::BACKGROUND_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite pattern table base address (8x8 mode).
    #[must_use]
    pub fn sprite_table(self) -> Address {
        if self.contains(Self::SPRITE_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite height in pixels (8 or 16).
    #[must_use]
    pub fn sprite_height(self) -> u16 {
        if self.contains(Self::SPRITE_SIZE_16) {
            16
        } else {
            8
        }
    }

    /// Whether VBlank raises NMI.
    #[must_use]
    pub fn nmi_enabled(self) -> bool {
        self.contains(Self::NMI_ENABLE)
    }
}

bitflags! {
    /// PPUMASK ($2001) - write-only rendering mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct PpuMask: u8 {
        /// Grayscale: AND palette indices with $30.
        const GRAYSCALE = 1 << 0;
        /// Show background in the leftmost 8 pixels.
        const SHOW_BACKGROUND_LEFT = 1 << 1;
        /// Show sprites in the leftmost 8 pixels.
        const SHOW_SPRITES_LEFT = 1 << 2;
        /// Enable background rendering.
        const SHOW_BACKGROUND = 1 << 3;
        /// Enable sprite rendering.
        const SHOW_SPRITES = 1 << 4;
        /// Emphasize red.
        const EMPHASIZE_RED = 1 << 5;
        /// Emphasize green.
        const EMPHASIZE_GREEN = 1 << 6;
        /// Emphasize blue.
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

impl PpuMask {
    /// Whether either background or sprite rendering is on. Gates the
    /// entire fetch pipeline, scroll updates and the odd-frame skip.
    #[must_use]
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Self::SHOW_BACKGROUND | Self::SHOW_SPRITES)
    }

    /// Background layer enabled.
    #[must_use]
    pub fn show_background(self) -> bool {
        self.contains(Self::SHOW_BACKGROUND)
    }

    /// Sprite layer enabled.
    #[must_use]
    pub fn show_sprites(self) -> bool {
        self.contains(Self::SHOW_SPRITES)
    }

    /// Emphasis bits (mask bits 5-7) as a 3-bit value {R, G, B}.
    #[must_use]
    pub fn emphasis(self) -> u8 {
        self.bits() >> 5
    }
}

bitflags! {
    /// PPUSTATUS ($2002) - read-only status register.
    ///
    /// Bits 0-4 are open bus; reading clears VBLANK and resets the
    /// $2005/$2006 write toggle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct PpuStatus: u8 {
        /// Sprite overflow (set by the buggy evaluation scan).
        const SPRITE_OVERFLOW = 1 << 5;
        /// Sprite 0 hit.
        const SPRITE_ZERO_HIT = 1 << 6;
        /// Currently in vertical blank.
        const VBLANK = 1 << 7;
    }
}
