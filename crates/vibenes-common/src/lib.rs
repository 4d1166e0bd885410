//! Shared primitives for the VibeNES emulator workspace.
//!
//! Every component crate depends on this one for:
//!
//! - The [`types`] module: `Byte`/`Address` aliases, signed `CpuCycle` and
//!   unsigned `PpuDot` counts, and the NTSC clock constants.
//! - The [`state`] module: the little-endian byte-buffer writer/reader pair
//!   used by save states, and the [`Snapshot`](state::Snapshot) trait each
//!   stateful component implements.

pub mod state;
pub mod types;

pub use state::{Snapshot, StateError, StateReader, StateWriter};
pub use types::{
    Address, Byte, CpuCycle, PpuDot, CPU_CLOCK_NTSC, CPU_CYCLES_PER_FRAME, DOTS_PER_SCANLINE,
    MASTER_CLOCK_NTSC, PPU_CLOCK_NTSC, SCANLINES_PER_FRAME,
};
