//! Time subsystem.
//!
//! Intended usage:
//! - one `FrameClock` per render loop
//! - call `tick()` once per presented frame to obtain `FrameTime`
//!
//! Tests drive the clock through a scripted `TimeSource` instead of `Instant`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime, MonotonicSource, TimeSource};
