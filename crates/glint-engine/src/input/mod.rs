//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! Window providers translate platform events into `InputEvent`s; the
//! `InputBridge` turns them into parameter changes.

mod bridge;
pub mod platform;
mod types;

pub use bridge::{InputBridge, KeyBinding};
pub use types::{InputEvent, Key};
