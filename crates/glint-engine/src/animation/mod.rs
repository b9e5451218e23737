//! Animation state advanced by the frame clock and adjusted by input.

mod state;

pub use state::{AnimationState, Param};
