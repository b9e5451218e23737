//! Platform event translation.

mod winit;

pub use self::winit::{map_key, translate_key_event};
