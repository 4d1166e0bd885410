//! VibeNES emulation core.
//!
//! A deterministic, cycle-accurate NES core: the 6502 CPU, the 2C02 PPU
//! and the 2A03 APU advance in lockstep (three PPU dots and one APU cycle
//! per CPU cycle) behind a single [`Console`] driver. All inter-component
//! traffic flows through the [`SystemBus`], which owns address decoding,
//! the open-bus latch, OAM DMA and the cartridge mapper.
//!
//! # Quick start
//!
//! ```no_run
//! use vibenes_core::Console;
//!
//! let rom = std::fs::read("game.nes").expect("failed to read ROM");
//!
//! let mut console = Console::new();
//! console.load_rom(&rom).expect("failed to load ROM");
//!
//! loop {
//!     console.set_buttons(0, 0); // Host input goes here
//!     console.step_frame();
//!     let frame = console.frame_buffer(); // 256x240 RGBA
//!     # let _ = frame;
//!     console.clear_frame_ready();
//!     # break;
//! }
//! ```

pub mod audio;
pub mod bus;
pub mod console;
pub mod error;
pub mod input;
pub mod save_state;

pub use audio::SampleRing;
pub use bus::SystemBus;
pub use console::Console;
pub use error::EmuError;
pub use input::{Buttons, Controller};
pub use save_state::{SaveStateError, SAVE_STATE_MAGIC, SAVE_STATE_VERSION};

pub use vibenes_apu::Apu;
pub use vibenes_common::types::{
    CPU_CLOCK_NTSC, CPU_CYCLES_PER_FRAME, DOTS_PER_SCANLINE, MASTER_CLOCK_NTSC, PPU_CLOCK_NTSC,
    SCANLINES_PER_FRAME,
};
pub use vibenes_cpu::{Bus, Cpu};
pub use vibenes_mappers::{create_mapper, Mapper, Mirroring, Rom, RomError};
pub use vibenes_ppu::{Ppu, FRAME_HEIGHT, FRAME_SIZE, FRAME_WIDTH};
