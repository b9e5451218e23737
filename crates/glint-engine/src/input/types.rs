use std::fmt;

/// Physical key, named after the US layout position.
///
/// Keys the bridge has no use for arrive as `Unknown` with the platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Minus,
    Equal,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    Unknown(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Unknown(code) => write!(f, "key code {code}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Discrete keyboard event consumed within the frame it was polled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InputEvent {
    /// `repeat` is set for auto-repeat presses while the key is held.
    KeyDown { key: Key, repeat: bool },
    KeyUp { key: Key },
}

impl InputEvent {
    pub fn key(&self) -> Key {
        match *self {
            InputEvent::KeyDown { key, .. } | InputEvent::KeyUp { key } => key,
        }
    }
}
