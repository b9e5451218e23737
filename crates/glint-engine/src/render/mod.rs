//! Frame loop.
//!
//! Convention:
//! - one iteration polls, ticks, uploads uniform feeds, draws once and presents
//! - a frame is presented even when nothing changed

mod frame_loop;

pub use frame_loop::{LoopConfig, LoopControl, LoopState, RenderLoop, UniformFeed};
