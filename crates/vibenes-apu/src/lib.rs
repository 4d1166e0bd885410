//! 2A03 APU core for the VibeNES emulator.
//!
//! Covers the bus-visible half of the audio unit: the $4000-$4017
//! register file, the 4-step/5-step frame counter with its IRQ, and the
//! length counter / envelope / linear counter machinery that `$4015`
//! status reads observe. Waveform synthesis, mixing and resampling are
//! external collaborators fed from this state.

pub mod apu;
pub mod envelope;
pub mod frame_counter;
pub mod length_counter;

pub use apu::Apu;
pub use envelope::Envelope;
pub use frame_counter::{FrameCounter, FrameCounterMode, FrameEvent};
pub use length_counter::LengthCounter;
