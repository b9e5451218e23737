//! naga-backed shader front end shared by every driver.
//!
//! Compiling parses and validates one stage; linking checks the stage set and
//! reflects the uniform/attribute interface the drivers expose by name.

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;

use naga::{AddressSpace, Binding, Handle, Module, Scalar, ScalarKind, ShaderStage, Type, TypeInner, VectorSize};

use super::types::{SourceLanguage, StageKind, StageSource, UniformKind};

/// Successfully compiled stage: a validated module plus the entry point to run.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStage {
    pub kind: StageKind,
    pub module: Module,
    pub entry_point: String,
}

/// One name addressable through `uniform_location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformSlot {
    pub name: String,
    pub binding: u32,
    pub offset: u32,
    pub size: u32,
    pub kind: UniformKind,
}

/// One `@group(0)` uniform buffer the program reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct UniformBuffer {
    pub binding: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeInput {
    pub name: String,
    pub location: u32,
}

/// Reflected interface of a linked program.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgramInterface {
    pub uniforms: Vec<UniformSlot>,
    pub buffers: Vec<UniformBuffer>,
    pub attributes: Vec<AttributeInput>,
}

impl ProgramInterface {
    /// Index of the slot named `name`; the index doubles as the uniform location.
    pub fn uniform_index(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|u| u.name == name)
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.iter().find(|a| a.name == name).map(|a| a.location)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LinkedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    pub interface: ProgramInterface,
}

// ── compile ───────────────────────────────────────────────────────────────

/// Compiles `source` for `kind`. The error is the human-readable compile log.
pub(crate) fn compile(kind: StageKind, source: &StageSource) -> Result<CompiledStage, String> {
    let stage = match kind {
        StageKind::Vertex => ShaderStage::Vertex,
        StageKind::Fragment => ShaderStage::Fragment,
        StageKind::Geometry => {
            return Err("geometry stages are not supported by this shader compiler".to_string());
        }
    };

    let text = source.text();
    let module = match source.language() {
        SourceLanguage::Wgsl => naga::front::wgsl::parse_str(text).map_err(|e| e.emit_to_string(text))?,
        SourceLanguage::Glsl => {
            let mut frontend = naga::front::glsl::Frontend::default();
            frontend
                .parse(&naga::front::glsl::Options::from(stage), text)
                .map_err(|e| e.emit_to_string(text))?
        }
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("validation error: {}", error_chain(&e)))?;

    let mut entries = module.entry_points.iter().filter(|ep| ep.stage == stage);
    let entry_point = match (entries.next(), entries.next()) {
        (Some(ep), None) => ep.name.clone(),
        (None, _) => return Err(format!("no {kind} entry point in shader source")),
        (Some(_), Some(_)) => {
            return Err(format!(
                "shader source declares several {kind} entry points; exactly one is required"
            ));
        }
    };

    Ok(CompiledStage {
        kind,
        module,
        entry_point,
    })
}

fn error_chain(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

// ── link ──────────────────────────────────────────────────────────────────

/// Checks the stage set and reflects the program interface.
///
/// The error is the link log, one problem per line.
pub(crate) fn link(stages: &[&CompiledStage]) -> Result<LinkedProgram, String> {
    let mut problems = Vec::new();

    let count = |kind: StageKind| stages.iter().filter(|s| s.kind == kind).count();
    for (kind, max) in [
        (StageKind::Vertex, 1),
        (StageKind::Fragment, 1),
        (StageKind::Geometry, 1),
    ] {
        let n = count(kind);
        if n > max {
            problems.push(format!("{n} {kind} stages attached; at most {max} allowed"));
        }
    }
    if count(StageKind::Geometry) > 0 {
        problems.push("geometry stages cannot be linked by this driver".to_string());
    }

    let vertex = stages.iter().find(|s| s.kind == StageKind::Vertex);
    let fragment = stages.iter().find(|s| s.kind == StageKind::Fragment);
    let (vertex, fragment) = match (vertex, fragment) {
        (Some(v), Some(f)) => (*v, *f),
        (v, f) => {
            if v.is_none() {
                problems.push("program has no vertex stage".to_string());
            }
            if f.is_none() {
                problems.push("program has no fragment stage".to_string());
            }
            return Err(problems.join("\n"));
        }
    };

    let produced = vertex_outputs(vertex);
    for (location, name) in stage_inputs(fragment) {
        if !produced.contains(&location) {
            problems.push(format!(
                "fragment input `{name}` at location {location} is not written by the vertex stage"
            ));
        }
    }

    let mut interface = ProgramInterface {
        attributes: stage_inputs(vertex)
            .into_iter()
            .map(|(location, name)| AttributeInput { name, location })
            .collect(),
        ..ProgramInterface::default()
    };

    let mut buffers: BTreeMap<u32, u32> = BTreeMap::new();
    let mut aliases: Vec<UniformSlot> = Vec::new();
    let mut ambiguous: BTreeSet<String> = BTreeSet::new();
    for stage in [vertex, fragment] {
        for reflected in reflect_uniforms(&stage.module, &mut problems) {
            let buffer = reflected.buffer;
            match buffers.get(&buffer.binding) {
                Some(&size) if size != buffer.size => problems.push(format!(
                    "uniform binding {} is {} bytes in one stage and {} bytes in another",
                    buffer.binding, size, buffer.size
                )),
                _ => {
                    buffers.insert(buffer.binding, buffer.size);
                }
            }

            let slot = reflected.slot;
            if reflected.alias {
                // Bare member names are a convenience; when two differ, neither is exposed.
                match aliases.iter().position(|a| a.name == slot.name) {
                    Some(i) if aliases[i] != slot => {
                        ambiguous.insert(slot.name.clone());
                    }
                    Some(_) => {}
                    None => aliases.push(slot),
                }
                continue;
            }
            match interface.uniforms.iter().find(|u| u.name == slot.name) {
                Some(existing) if *existing != slot => problems.push(format!(
                    "uniform `{}` is {} ({} bytes at binding {}) in one declaration and {} ({} bytes at binding {}) in another",
                    slot.name, existing.kind, existing.size, existing.binding, slot.kind, slot.size, slot.binding
                )),
                Some(_) => {}
                None => interface.uniforms.push(slot),
            }
        }
    }
    for alias in aliases {
        if ambiguous.contains(&alias.name) || interface.uniform_index(&alias.name).is_some() {
            continue;
        }
        interface.uniforms.push(alias);
    }
    interface.buffers = buffers
        .into_iter()
        .map(|(binding, size)| UniformBuffer { binding, size })
        .collect();

    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    Ok(LinkedProgram {
        vertex: vertex.clone(),
        fragment: fragment.clone(),
        interface,
    })
}

fn entry_function<'m>(stage: &'m CompiledStage) -> Option<&'m naga::Function> {
    stage
        .module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point)
        .map(|ep| &ep.function)
}

/// `(location, name)` for every located input of the stage entry point.
fn stage_inputs(stage: &CompiledStage) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    let Some(function) = entry_function(stage) else {
        return out;
    };
    for arg in &function.arguments {
        match arg.binding {
            Some(Binding::Location { location, .. }) => {
                out.push((location, arg.name.clone().unwrap_or_default()));
            }
            Some(Binding::BuiltIn(_)) => {}
            None => collect_member_locations(&stage.module, arg.ty, &mut out),
        }
    }
    out
}

fn vertex_outputs(stage: &CompiledStage) -> BTreeSet<u32> {
    let mut out = Vec::new();
    if let Some(result) = entry_function(stage).and_then(|f| f.result.as_ref()) {
        match result.binding {
            Some(Binding::Location { location, .. }) => out.push((location, String::new())),
            Some(Binding::BuiltIn(_)) => {}
            None => collect_member_locations(&stage.module, result.ty, &mut out),
        }
    }
    out.into_iter().map(|(location, _)| location).collect()
}

fn collect_member_locations(module: &Module, ty: Handle<Type>, out: &mut Vec<(u32, String)>) {
    if let TypeInner::Struct { ref members, .. } = module.types[ty].inner {
        for member in members {
            if let Some(Binding::Location { location, .. }) = member.binding {
                out.push((location, member.name.clone().unwrap_or_default()));
            }
        }
    }
}

/// A reflected uniform name. `alias` marks the bare member name of a block,
/// which is reachable only while no other declaration claims it.
struct ReflectedUniform {
    slot: UniformSlot,
    buffer: UniformBuffer,
    alias: bool,
}

fn reflect_uniforms(module: &Module, problems: &mut Vec<String>) -> Vec<ReflectedUniform> {
    let ctx = module.to_ctx();
    let mut out = Vec::new();

    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Uniform {
            continue;
        }
        let Some(ref rb) = var.binding else {
            continue;
        };
        if rb.group != 0 {
            problems.push(format!(
                "uniform `{}` uses bind group {}; only group 0 is supported",
                var.name.as_deref().unwrap_or("<unnamed>"),
                rb.group
            ));
            continue;
        }

        let inner = &module.types[var.ty].inner;
        let buffer = UniformBuffer {
            binding: rb.binding,
            size: inner.size(ctx),
        };

        if let Some(name) = &var.name {
            out.push(ReflectedUniform {
                slot: UniformSlot {
                    name: name.clone(),
                    binding: rb.binding,
                    offset: 0,
                    size: buffer.size,
                    kind: uniform_kind(inner),
                },
                buffer,
                alias: false,
            });
        }

        if let TypeInner::Struct { ref members, .. } = *inner {
            for member in members {
                let Some(member_name) = &member.name else {
                    continue;
                };
                let member_inner = &module.types[member.ty].inner;
                let slot = UniformSlot {
                    name: member_name.clone(),
                    binding: rb.binding,
                    offset: member.offset,
                    size: member_inner.size(ctx),
                    kind: uniform_kind(member_inner),
                };
                if let Some(var_name) = &var.name {
                    out.push(ReflectedUniform {
                        slot: UniformSlot {
                            name: format!("{var_name}.{member_name}"),
                            ..slot.clone()
                        },
                        buffer,
                        alias: false,
                    });
                }
                out.push(ReflectedUniform {
                    slot,
                    buffer,
                    alias: true,
                });
            }
        }
    }

    out
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    const F32: Scalar = Scalar {
        kind: ScalarKind::Float,
        width: 4,
    };
    match *inner {
        TypeInner::Scalar(s) if s == F32 => UniformKind::F32,
        TypeInner::Vector { size, scalar } if scalar == F32 => match size {
            VectorSize::Bi => UniformKind::Vec2,
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == F32 => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}
