//! Glint engine crate.
//!
//! A small real-time rendering core: shader stages compiled and linked into
//! programs, vertex data uploaded into owned buffer/array objects, and a frame
//! loop that advances animation state from a clock and keyboard input.
//!
//! GPU work goes through the [`driver::Driver`] boundary. `WgpuDriver` renders
//! into a winit window; `HeadlessDriver` runs the same validation on the CPU
//! and records frames, which is what the tests use.

pub mod animation;
pub mod driver;
pub mod error;
pub mod input;
pub mod logging;
pub mod render;
pub mod shader;
pub mod time;
pub mod vertex;
pub mod window;

pub use error::{CompileFailure, LinkFailure, RenderError, RenderResult};
