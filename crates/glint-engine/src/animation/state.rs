use std::collections::BTreeMap;
use std::fmt;

use glam::{Vec3, Vec4};

use crate::time::FrameTime;

/// Named interaction parameter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Param {
    Scalar(f32),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl Param {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Param::Scalar(_) => "scalar",
            Param::Vec3(_) => "vec3",
            Param::Vec4(_) => "vec4",
        }
    }

    /// Component-wise sum; `None` when the kinds differ.
    pub fn checked_add(self, other: Param) -> Option<Param> {
        match (self, other) {
            (Param::Scalar(a), Param::Scalar(b)) => Some(Param::Scalar(a + b)),
            (Param::Vec3(a), Param::Vec3(b)) => Some(Param::Vec3(a + b)),
            (Param::Vec4(a), Param::Vec4(b)) => Some(Param::Vec4(a + b)),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Param::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Scalar(v) => write!(f, "{v}"),
            Param::Vec3(v) => write!(f, "{v}"),
            Param::Vec4(v) => write!(f, "{v}"),
        }
    }
}

/// Time-driven and user-driven state read by uniform feeds each frame.
///
/// The clock side writes `elapsed_sim_time` and `last_frame_timestamp` through
/// [`AnimationState::advance`]; the input side writes `params`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationState {
    pub elapsed_sim_time: f64,
    pub last_frame_timestamp: f64,
    pub params: BTreeMap<String, Param>,
}

impl AnimationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Param) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Euler step: `elapsed_sim_time += angular_velocity * dt`.
    pub fn advance(&mut self, time: &FrameTime, angular_velocity: f64) {
        self.elapsed_sim_time += angular_velocity * time.dt;
        self.last_frame_timestamp = time.now;
    }

    pub fn param(&self, name: &str) -> Option<Param> {
        self.params.get(name).copied()
    }

    /// Scalar parameter `name`, or `default` when unset or not a scalar.
    pub fn scalar(&self, name: &str, default: f32) -> f32 {
        self.params.get(name).and_then(Param::as_scalar).unwrap_or(default)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: Param) {
        self.params.insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(dt: f64, now: f64) -> FrameTime {
        FrameTime {
            dt,
            now,
            frame_index: 0,
        }
    }

    #[test]
    fn advance_integrates_angular_velocity() {
        let mut state = AnimationState::new();
        state.advance(&frame(0.0, 1.0), 2.0);
        state.advance(&frame(0.5, 1.5), 2.0);
        state.advance(&frame(0.25, 1.75), 2.0);

        assert_eq!(state.elapsed_sim_time, 1.5);
        assert_eq!(state.last_frame_timestamp, 1.75);
    }

    #[test]
    fn checked_add_requires_matching_kinds() {
        assert_eq!(
            Param::Scalar(1.0).checked_add(Param::Scalar(0.5)),
            Some(Param::Scalar(1.5))
        );
        assert_eq!(
            Param::Vec3(Vec3::X).checked_add(Param::Vec3(Vec3::Y)),
            Some(Param::Vec3(Vec3::new(1.0, 1.0, 0.0)))
        );
        assert_eq!(Param::Scalar(1.0).checked_add(Param::Vec4(Vec4::ONE)), None);
    }

    #[test]
    fn scalar_falls_back_to_default() {
        let state = AnimationState::new()
            .with_param("zoom", Param::Scalar(0.3))
            .with_param("tint", Param::Vec3(Vec3::ONE));

        assert_eq!(state.scalar("zoom", 0.0), 0.3);
        assert_eq!(state.scalar("tint", 7.0), 7.0);
        assert_eq!(state.scalar("missing", -1.0), -1.0);
    }
}
