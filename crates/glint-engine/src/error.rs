use std::fmt;

use crate::driver::{DriverError, StageKind, StageSource};

/// A stage source the compiler rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub kind: StageKind,
    /// The submitted source, kept so the failure can be reproduced.
    pub source: StageSource,
    /// Compiler log; never empty.
    pub log: String,
}

/// A stage set the linker rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub log: String,
}

/// Errors surfaced by the pipeline core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    Compile(CompileFailure),
    Link(LinkFailure),
    /// Programming error such as a re-upload into static storage or a draw
    /// without bound state. Fatal to the resource or run it occurs in.
    ContractViolation(String),
    Driver(DriverError),
}

impl RenderError {
    pub fn contract(msg: impl Into<String>) -> Self {
        RenderError::ContractViolation(msg.into())
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, RenderError::ContractViolation(_))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Compile(c) => write!(f, "{} stage failed to compile:\n{}", c.kind, c.log),
            RenderError::Link(l) => write!(f, "program failed to link:\n{}", l.log),
            RenderError::ContractViolation(msg) => write!(f, "contract violation: {msg}"),
            RenderError::Driver(e) => write!(f, "driver error: {e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Driver(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DriverError> for RenderError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Unbound(what) => RenderError::ContractViolation(what),
            e @ DriverError::UniformKindMismatch { .. } => RenderError::ContractViolation(e.to_string()),
            other => RenderError::Driver(other),
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::UniformKind;

    #[test]
    fn unbound_driver_state_is_a_contract_violation() {
        let err: RenderError = DriverError::Unbound("no vertex array bound".into()).into();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn uniform_kind_mismatch_is_a_contract_violation() {
        let err: RenderError = DriverError::UniformKindMismatch {
            name: "model".into(),
            declared: UniformKind::Mat4,
            supplied: UniformKind::Vec3,
        }
        .into();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn other_driver_errors_stay_driver_errors() {
        let err: RenderError = DriverError::OutOfMemory.into();
        assert!(matches!(err, RenderError::Driver(DriverError::OutOfMemory)));
    }
}
