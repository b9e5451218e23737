//! Host-side shader and program objects shared by the drivers.
//!
//! Compilation and linking happen on the CPU through the naga front end; the
//! drivers only add backend state (pipelines, uniform buffers) on top.

use std::collections::{BTreeMap, HashMap};

use super::error::DriverError;
use super::front::{self, CompiledStage, LinkedProgram, UniformSlot};
use super::types::{ProgramId, ShaderId, StageKind, StageSource, UniformInfo, UniformLocation, UniformValue};

#[derive(Debug)]
struct ShaderObject {
    kind: StageKind,
    source: Option<StageSource>,
    compiled: Option<CompiledStage>,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<ShaderId>,
    linked: Option<LinkedProgram>,
    log: String,
    values: BTreeMap<u32, UniformValue>,
}

#[derive(Debug, Default)]
pub(crate) struct ShaderRegistry {
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
}

fn copy_log(log: &str, buf: &mut [u8]) -> usize {
    let n = log.len().min(buf.len());
    buf[..n].copy_from_slice(&log.as_bytes()[..n]);
    n
}

impl ShaderRegistry {
    pub(crate) fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub(crate) fn program_count(&self) -> usize {
        self.programs.len()
    }

    // ── shaders ───────────────────────────────────────────────────────────

    pub(crate) fn insert_shader(&mut self, id: ShaderId, kind: StageKind) {
        self.shaders.insert(
            id.0,
            ShaderObject {
                kind,
                source: None,
                compiled: None,
                log: String::new(),
            },
        );
    }

    fn shader(&self, id: ShaderId) -> Result<&ShaderObject, DriverError> {
        self.shaders.get(&id.0).ok_or_else(|| DriverError::unknown(id))
    }

    fn shader_mut(&mut self, id: ShaderId) -> Result<&mut ShaderObject, DriverError> {
        self.shaders.get_mut(&id.0).ok_or_else(|| DriverError::unknown(id))
    }

    pub(crate) fn shader_source(&mut self, id: ShaderId, source: &StageSource) -> Result<(), DriverError> {
        self.shader_mut(id)?.source = Some(source.clone());
        Ok(())
    }

    pub(crate) fn compile_shader(&mut self, id: ShaderId) -> Result<(), DriverError> {
        let obj = self.shader_mut(id)?;
        let result = match &obj.source {
            Some(source) => front::compile(obj.kind, source),
            None => Err("no source attached to shader".to_string()),
        };
        match result {
            Ok(compiled) => {
                obj.compiled = Some(compiled);
                obj.log.clear();
            }
            Err(log) => {
                obj.compiled = None;
                obj.log = log;
            }
        }
        Ok(())
    }

    pub(crate) fn compile_status(&self, id: ShaderId) -> bool {
        self.shader(id).is_ok_and(|s| s.compiled.is_some())
    }

    pub(crate) fn shader_log_length(&self, id: ShaderId) -> usize {
        self.shader(id).map_or(0, |s| s.log.len())
    }

    pub(crate) fn shader_log(&self, id: ShaderId, buf: &mut [u8]) -> usize {
        self.shader(id).map_or(0, |s| copy_log(&s.log, buf))
    }

    pub(crate) fn remove_shader(&mut self, id: ShaderId) -> bool {
        self.shaders.remove(&id.0).is_some()
    }

    // ── programs ──────────────────────────────────────────────────────────

    pub(crate) fn insert_program(&mut self, id: ProgramId) {
        self.programs.insert(id.0, ProgramObject::default());
    }

    pub(crate) fn contains_program(&self, id: ProgramId) -> bool {
        self.programs.contains_key(&id.0)
    }

    fn program_mut(&mut self, id: ProgramId) -> Result<&mut ProgramObject, DriverError> {
        self.programs.get_mut(&id.0).ok_or_else(|| DriverError::unknown(id))
    }

    pub(crate) fn attach(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), DriverError> {
        self.shader(shader)?;
        let obj = self.program_mut(program)?;
        if !obj.attached.contains(&shader) {
            obj.attached.push(shader);
        }
        Ok(())
    }

    /// Links the attached stages; on failure the program keeps only its log.
    pub(crate) fn link(&mut self, program: ProgramId) -> Result<(), DriverError> {
        let attached = &self
            .programs
            .get(&program.0)
            .ok_or_else(|| DriverError::unknown(program))?
            .attached;

        let mut stages = Vec::with_capacity(attached.len());
        let mut problems = Vec::new();
        for id in attached {
            match self.shaders.get(&id.0) {
                Some(ShaderObject {
                    compiled: Some(compiled),
                    ..
                }) => stages.push(compiled),
                Some(s) => problems.push(format!("attached {} {id} is not compiled", s.kind)),
                None => problems.push(format!("attached {id} no longer exists")),
            }
        }

        let result = if problems.is_empty() {
            front::link(&stages)
        } else {
            Err(problems.join("\n"))
        };

        let obj = self.program_mut(program)?;
        obj.values.clear();
        match result {
            Ok(linked) => {
                obj.linked = Some(linked);
                obj.log.clear();
            }
            Err(log) => {
                obj.linked = None;
                obj.log = log;
            }
        }
        Ok(())
    }

    pub(crate) fn linked(&self, id: ProgramId) -> Option<&LinkedProgram> {
        self.programs.get(&id.0).and_then(|p| p.linked.as_ref())
    }

    pub(crate) fn program_log_length(&self, id: ProgramId) -> usize {
        self.programs.get(&id.0).map_or(0, |p| p.log.len())
    }

    pub(crate) fn program_log(&self, id: ProgramId, buf: &mut [u8]) -> usize {
        self.programs.get(&id.0).map_or(0, |p| copy_log(&p.log, buf))
    }

    pub(crate) fn remove_program(&mut self, id: ProgramId) -> bool {
        self.programs.remove(&id.0).is_some()
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    pub(crate) fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformInfo> {
        let iface = &self.linked(program)?.interface;
        let index = iface.uniform_index(name)?;
        Some(UniformInfo {
            location: UniformLocation(index as u32),
            kind: iface.uniforms[index].kind,
        })
    }

    pub(crate) fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.linked(program)?.interface.attribute_location(name)
    }

    /// Records `value` for `location`, returning the slot it lands in.
    pub(crate) fn set_uniform(
        &mut self,
        program: ProgramId,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<UniformSlot, DriverError> {
        let linked = self
            .linked(program)
            .ok_or_else(|| DriverError::Unbound(format!("{program} is not linked")))?;
        let slot = linked
            .interface
            .uniforms
            .get(location.0 as usize)
            .cloned()
            .ok_or_else(|| DriverError::OutOfRange(format!("uniform location {} in {program}", location.0)))?;
        if slot.kind != value.kind() {
            return Err(DriverError::UniformKindMismatch {
                name: slot.name,
                declared: slot.kind,
                supplied: value.kind(),
            });
        }
        self.program_mut(program)?.values.insert(location.0, *value);
        Ok(slot)
    }

    /// Uniform values last written to `program`, by name.
    pub(crate) fn uniform_values(&self, program: ProgramId) -> BTreeMap<String, UniformValue> {
        let Some(obj) = self.programs.get(&program.0) else {
            return BTreeMap::new();
        };
        let Some(linked) = obj.linked.as_ref() else {
            return BTreeMap::new();
        };
        obj.values
            .iter()
            .filter_map(|(loc, value)| {
                let slot = linked.interface.uniforms.get(*loc as usize)?;
                Some((slot.name.clone(), *value))
            })
            .collect()
    }
}
