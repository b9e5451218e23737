use std::collections::HashMap;

use crate::driver::{Driver, ProgramId, UniformKind, UniformLocation, UniformValue};
use crate::error::{RenderError, RenderResult};

/// Resolved uniform slot.
///
/// `Absent` is a valid result: shaders may omit uniforms the caller feeds, and
/// uploads to an absent slot do nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Slot {
    Absent,
    Bound { location: UniformLocation, kind: UniformKind },
}

impl Slot {
    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }
}

/// Per-program cache of uniform slots, resolved once by name.
#[derive(Debug)]
pub struct UniformBinder {
    program: ProgramId,
    cache: HashMap<String, Slot>,
}

impl UniformBinder {
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            cache: HashMap::new(),
        }
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Looks `name` up in the linked program, caching the result (absent included).
    pub fn resolve<D: Driver>(&mut self, driver: &D, name: &str) -> Slot {
        if let Some(slot) = self.cache.get(name) {
            return *slot;
        }
        let slot = match driver.uniform_location(self.program, name) {
            Some(info) => Slot::Bound {
                location: info.location,
                kind: info.kind,
            },
            None => {
                log::debug!("uniform `{name}` not declared by {}", self.program);
                Slot::Absent
            }
        };
        self.cache.insert(name.to_string(), slot);
        slot
    }

    /// Writes `value` into `slot`. The value's kind must match the declaration.
    pub fn upload<D: Driver>(&self, driver: &mut D, slot: Slot, value: &UniformValue) -> RenderResult<()> {
        let Slot::Bound { location, kind } = slot else {
            return Ok(());
        };
        if kind != value.kind() {
            return Err(RenderError::contract(format!(
                "uniform location {} of {} is {kind}, not {}",
                location.raw(),
                self.program,
                value.kind()
            )));
        }
        driver.set_uniform(self.program, location, value)?;
        Ok(())
    }

    /// Number of names resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::driver::{HeadlessDriver, StageKind, StageSource};
    use crate::shader::{Program, ShaderStage};

    const SOURCE: &str = r#"
@group(0) @binding(0) var<uniform> model: mat4x4<f32>;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return model * vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn program(d: &mut HeadlessDriver) -> Program {
        let vs = ShaderStage::compile(d, StageKind::Vertex, StageSource::wgsl(SOURCE)).unwrap();
        let fs = ShaderStage::compile(d, StageKind::Fragment, StageSource::wgsl(SOURCE)).unwrap();
        Program::link(d, vec![vs, fs]).unwrap()
    }

    #[test]
    fn resolve_is_cached_and_idempotent() {
        let mut d = HeadlessDriver::new();
        let p = program(&mut d);
        let mut binder = UniformBinder::new(p.id());

        let first = binder.resolve(&d, "model");
        let second = binder.resolve(&d, "model");
        assert_eq!(first, second);
        assert!(matches!(first, Slot::Bound { kind: UniformKind::Mat4, .. }));
        assert_eq!(binder.cached(), 1);
        p.release(&mut d);
    }

    #[test]
    fn absent_slot_upload_is_a_no_op() {
        let mut d = HeadlessDriver::new();
        let p = program(&mut d);
        let mut binder = UniformBinder::new(p.id());

        let slot = binder.resolve(&d, "doesNotExist");
        assert!(slot.is_absent());
        binder.upload(&mut d, slot, &UniformValue::F32(1.0)).unwrap();
        p.release(&mut d);
    }

    #[test]
    fn mismatched_kind_is_a_contract_violation() {
        let mut d = HeadlessDriver::new();
        let p = program(&mut d);
        let mut binder = UniformBinder::new(p.id());

        let slot = binder.resolve(&d, "model");
        let err = binder.upload(&mut d, slot, &UniformValue::Vec3(Vec3::ONE)).unwrap_err();
        assert!(err.is_contract_violation());
        binder.upload(&mut d, slot, &UniformValue::Mat4(Mat4::IDENTITY)).unwrap();
        p.release(&mut d);
    }
}
