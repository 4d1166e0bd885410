//! Dot-accurate 2C02 PPU for the VibeNES emulator.
//!
//! The PPU runs three dots per CPU cycle and produces a 256x240 RGBA frame
//! buffer. This crate models the rendering pipeline at dot granularity:
//! the background tile fetch state machine, sprite evaluation with the
//! hardware's buggy overflow scan, the loopy scroll registers, and the
//! quirks programs depend on (odd-frame skip, the $2002 VBlank race,
//! buffered $2007 reads, palette mirrors).
//!
//! Pattern-table and nametable storage is external: the system bus
//! implements [`PpuBus`] and routes those ranges to the cartridge and
//! internal VRAM. Palette RAM is internal to the PPU.

pub mod background;
pub mod oam;
pub mod palette;
pub mod ppu;
pub mod registers;
pub mod scroll;
pub mod sprites;
pub mod timing;

pub use oam::{Oam, SecondaryOam, SecondarySprite};
pub use palette::{compose_rgba, MASTER_PALETTE};
pub use ppu::{Ppu, PpuBus, TickResult, FRAME_HEIGHT, FRAME_SIZE, FRAME_WIDTH};
pub use registers::{PpuCtrl, PpuMask, PpuStatus};
pub use scroll::Scroll;
pub use timing::Timing;
