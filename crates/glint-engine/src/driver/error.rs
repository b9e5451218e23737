use std::fmt;

use super::types::UniformKind;

/// Failure reported by a driver call.
///
/// Calls are atomic: on error the addressed object is left as it was before
/// the call (or, for creation calls, was never allocated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The object name does not refer to a live object of the expected kind.
    UnknownObject(String),
    /// Draw/bind/present issued without the state it requires.
    Unbound(String),
    /// A format, stage, or operation the backend cannot express.
    Unsupported(String),
    /// A write or lookup outside the addressed object's storage.
    OutOfRange(String),
    /// Uniform upload with a value that differs from the declared type.
    UniformKindMismatch {
        name: String,
        declared: UniformKind,
        supplied: UniformKind,
    },
    /// The GPU device reported a failure outside any single object.
    Device(String),
    /// The presentation surface failed in a way that cannot be recovered.
    Surface(String),
    OutOfMemory,
}

impl DriverError {
    pub(crate) fn unknown(what: impl fmt::Display) -> Self {
        DriverError::UnknownObject(what.to_string())
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::UnknownObject(what) => write!(f, "unknown driver object: {what}"),
            DriverError::Unbound(what) => write!(f, "missing draw state: {what}"),
            DriverError::Unsupported(what) => write!(f, "unsupported by this driver: {what}"),
            DriverError::OutOfRange(what) => write!(f, "out of range: {what}"),
            DriverError::UniformKindMismatch {
                name,
                declared,
                supplied,
            } => write!(
                f,
                "uniform `{name}` is declared as {declared} but a {supplied} was uploaded"
            ),
            DriverError::Device(what) => write!(f, "device failure: {what}"),
            DriverError::Surface(what) => write!(f, "surface failure: {what}"),
            DriverError::OutOfMemory => f.write_str("out of GPU memory"),
        }
    }
}

impl std::error::Error for DriverError {}
