//! Controller input.
//!
//! The console samples gamepads through serial shift registers behind
//! $4016/$4017; the host pushes button state in at any time via
//! [`crate::Console::set_buttons`].

pub mod controller;

pub use controller::{Buttons, Controller};
