//! A CHIP-8 virtual machine.
//!
//! [`machine::Machine`] owns all architectural state (memory, registers,
//! call stack, timers, framebuffer, key state) and executes exactly one
//! instruction per [`machine::Machine::step`] call. The host owns the
//! pacing: it loads a program image, supplies key state through the
//! [`machine::HostInput`] collaborator, and reads the framebuffer and beep
//! signal back after each step.
//!
//! ```
//! use chip8_vm::machine::{HostInput, Machine};
//!
//! struct NoKeys;
//! impl HostInput for NoKeys {
//!     fn is_key_pressed(&self, _key: u8) -> bool {
//!         false
//!     }
//! }
//!
//! let mut machine = Machine::new();
//! machine.load(&[0x00, 0xE0]).unwrap(); // 00E0: clear the screen
//! machine.step(&NoKeys).unwrap();
//! ```
//!
//! The [`emulator`] module wraps the machine in a ratatui terminal front
//! end with keyboard input and a beeper.

pub mod emulator;
pub mod error;
pub mod framebuffer;
pub mod instruction;
pub mod machine;
