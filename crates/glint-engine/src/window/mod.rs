//! Window providers.
//!
//! The render loop pulls from a `Window` once per iteration: events, stop
//! signal and surface size. Presentation itself belongs to the driver, which
//! owns the surface.

mod headless;
mod runtime;

pub use headless::HeadlessWindow;
pub use runtime::{RuntimeConfig, WinitWindow};
pub use winit::dpi::LogicalSize;

use crate::input::InputEvent;

pub trait Window {
    /// Appends every event queued since the last call. Never blocks.
    fn poll_events(&mut self, out: &mut Vec<InputEvent>);

    /// Stop signal, observed once per iteration boundary.
    fn should_stop(&self) -> bool;

    /// Drawable size in physical pixels.
    fn size(&self) -> (u32, u32);

    /// Runs right before the driver presents.
    fn pre_present(&mut self) {}
}
