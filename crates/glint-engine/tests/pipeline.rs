//! End-to-end pipeline behaviour against the headless driver and window.

use std::cell::RefCell;

use glint_engine::driver::{
    BufferUsage, Driver, HeadlessDriver, StageKind, StageSource, Topology, UniformValue,
};
use glint_engine::render::{LoopConfig, LoopState, RenderLoop};
use glint_engine::shader::{Program, ShaderStage};
use glint_engine::time::FrameClock;
use glint_engine::vertex::{VertexAttribute, VertexLayout, VertexResourceSet};
use glint_engine::window::HeadlessWindow;
use glint_engine::RenderError;

const VERTEX_WGSL: &str = r#"
struct Camera {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> model: mat4x4<f32>;

struct Out {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn main(@location(0) position: vec3<f32>, @location(1) color: vec3<f32>) -> Out {
    return Out(camera.projection * camera.view * model * vec4<f32>(position, 1.0), color);
}
"#;

const FRAGMENT_WGSL: &str = r#"
@fragment
fn main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;

const VERTEX_GLSL: &str = "#version 450\nvoid main(){gl_Position=vec4(0,0,0,1);}";
const FRAGMENT_GLSL: &str = "#version 450\nlayout(location = 0) out vec4 color;\nvoid main(){color=vec4(1,0,0,1);}";

fn bytes(v: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(v).to_vec()
}

fn link(d: &mut HeadlessDriver, vs: StageSource, fs: StageSource) -> Program {
    let vs = ShaderStage::compile(d, StageKind::Vertex, vs).unwrap();
    let fs = ShaderStage::compile(d, StageKind::Fragment, fs).unwrap();
    Program::link(d, vec![vs, fs]).unwrap()
}

fn interleaved() -> VertexLayout {
    VertexLayout::new()
        .with(VertexAttribute::f32("position", 3).stride(24))
        .with(VertexAttribute::f32("color", 3).offset(12).stride(24))
}

// ── compile and link ─────────────────────────────────────────────────────

#[test]
fn valid_pairs_link_without_a_log() {
    let pairs = [
        (StageSource::wgsl(VERTEX_WGSL), StageSource::wgsl(FRAGMENT_WGSL)),
        (StageSource::glsl(VERTEX_GLSL), StageSource::glsl(FRAGMENT_GLSL)),
    ];
    for (vs, fs) in pairs {
        let mut d = HeadlessDriver::new();
        let program = link(&mut d, vs, fs);
        assert!(d.program_link_status(program.id()));
        assert_eq!(d.program_info_log_length(program.id()), 0);
        program.release(&mut d);
        assert_eq!(d.live_objects().total(), 0);
    }
}

#[test]
fn syntax_errors_carry_a_log_and_the_source() {
    let broken = [
        StageSource::wgsl("@vertex fn main( -> @builtin(position) vec4<f32> { }"),
        StageSource::wgsl("@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0) }"),
        StageSource::glsl("#version 450\nvoid main(){gl_Position=vec4(0,0,0,1)}"),
        StageSource::glsl("#version 450\nvoid main(){ undeclared = 1.0; }"),
    ];
    for source in broken {
        let mut d = HeadlessDriver::new();
        let err = ShaderStage::compile(&mut d, StageKind::Vertex, source.clone()).unwrap_err();
        let RenderError::Compile(failure) = err else {
            panic!("expected a compile failure");
        };
        assert!(!failure.log.is_empty());
        assert_eq!(failure.kind, StageKind::Vertex);
        assert_eq!(failure.source, source);
        assert_eq!(d.live_objects().total(), 0);
    }
}

#[test]
fn blocks_with_a_shared_member_name_link() {
    let vs = r#"
struct Light { color: vec4<f32> }
struct Material { color: vec4<f32> }
@group(0) @binding(0) var<uniform> light: Light;
@group(0) @binding(1) var<uniform> material: Material;

struct Out {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn main(@location(0) position: vec3<f32>) -> Out {
    return Out(vec4<f32>(position, 1.0), light.color * material.color);
}
"#;
    let fs = r#"
struct Material { color: vec4<f32> }
@group(0) @binding(1) var<uniform> material: Material;

@fragment
fn main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color * material.color;
}
"#;
    let mut d = HeadlessDriver::new();
    let mut program = link(&mut d, StageSource::wgsl(vs), StageSource::wgsl(fs));
    assert_eq!(d.program_info_log_length(program.id()), 0);

    let light = program.resolve(&d, "light.color");
    let material = program.resolve(&d, "material.color");
    assert!(!light.is_absent() && !material.is_absent());
    assert_ne!(light, material);
    program.upload(&mut d, material, &UniformValue::Vec4(glam::Vec4::ONE)).unwrap();
    program.release(&mut d);
}

#[test]
fn failed_link_leaves_nothing_behind() {
    let mut d = HeadlessDriver::new();
    let vs = ShaderStage::compile(&mut d, StageKind::Vertex, StageSource::wgsl(VERTEX_WGSL)).unwrap();
    let fs = ShaderStage::compile(
        &mut d,
        StageKind::Fragment,
        StageSource::wgsl("@fragment fn main(@location(5) x: f32) -> @location(0) vec4<f32> { return vec4<f32>(x); }"),
    )
    .unwrap();

    let err = Program::link(&mut d, vec![vs, fs]).unwrap_err();
    assert!(matches!(err, RenderError::Link(ref l) if !l.log.is_empty()));
    assert_eq!(d.live_objects().total(), 0);
}

// ── uniforms ─────────────────────────────────────────────────────────────

#[test]
fn resolve_is_idempotent() {
    let mut d = HeadlessDriver::new();
    let mut program = link(&mut d, StageSource::wgsl(VERTEX_WGSL), StageSource::wgsl(FRAGMENT_WGSL));

    for name in ["model", "camera.view", "view", "doesNotExist"] {
        let first = program.resolve(&d, name);
        let second = program.resolve(&d, name);
        assert_eq!(first, second, "{name}");
    }
    program.release(&mut d);
}

#[test]
fn absent_uniform_upload_is_a_no_op() {
    let mut d = HeadlessDriver::new();
    let mut program = link(&mut d, StageSource::wgsl(VERTEX_WGSL), StageSource::wgsl(FRAGMENT_WGSL));

    let slot = program.resolve(&d, "doesNotExist");
    assert!(slot.is_absent());
    program.upload(&mut d, slot, &UniformValue::F32(4.0)).unwrap();
    program.release(&mut d);
}

// ── vertex resources ─────────────────────────────────────────────────────

#[test]
fn dynamic_reupload_round_trips() {
    let mut d = HeadlessDriver::new();
    let program = link(&mut d, StageSource::wgsl(VERTEX_WGSL), StageSource::wgsl(FRAGMENT_WGSL));

    let data = bytes(&[0.0; 18]);
    let data2 = bytes(&[1.0, 2.0, 3.0, 0.5, 0.5, 0.5, 4.0, 5.0, 6.0, 0.1, 0.2, 0.3, 7.0, 8.0, 9.0, 1.0, 1.0, 1.0]);
    let mut set =
        VertexResourceSet::create_for_program(&mut d, &program, &interleaved(), &data, BufferUsage::DynamicUpload)
            .unwrap();
    set.reupload(&mut d, &data2).unwrap();

    assert_eq!(set.read_back(&mut d).unwrap(), Some(data2));
    assert_eq!(set.vertex_count(), 3);
    set.release(&mut d);
    program.release(&mut d);
}

#[test]
fn static_reupload_is_a_contract_violation() {
    let mut d = HeadlessDriver::new();
    let program = link(&mut d, StageSource::wgsl(VERTEX_WGSL), StageSource::wgsl(FRAGMENT_WGSL));

    let data = bytes(&[0.0; 18]);
    let mut set =
        VertexResourceSet::create_for_program(&mut d, &program, &interleaved(), &data, BufferUsage::StaticUpload)
            .unwrap();
    let err = set.reupload(&mut d, &data).unwrap_err();
    assert!(err.is_contract_violation(), "{err}");

    // The original contents are untouched.
    assert_eq!(set.read_back(&mut d).unwrap(), Some(data));
    set.release(&mut d);
    program.release(&mut d);
}

#[test]
fn draw_without_bound_array_is_a_contract_violation() {
    let mut d = HeadlessDriver::new();
    let program = link(&mut d, StageSource::glsl(VERTEX_GLSL), StageSource::glsl(FRAGMENT_GLSL));

    d.begin_frame([0.0; 4]).unwrap();
    d.use_program(Some(program.id())).unwrap();
    let err: RenderError = d.draw_arrays(Topology::Triangles, 0, 3).unwrap_err().into();
    assert!(err.is_contract_violation());
    program.release(&mut d);
}

// ── clock ────────────────────────────────────────────────────────────────

#[test]
fn clock_deltas_are_never_negative() {
    let readings = RefCell::new(vec![3.0, 3.0, 2.0, 2.5, 2.5, 10.0, 9.0].into_iter());
    let mut clock = FrameClock::with_source(|| readings.borrow_mut().next().unwrap_or(10.0));

    let first = clock.tick();
    assert_eq!(first.dt, 0.0);

    let deltas: Vec<f64> = (0..6).map(|_| clock.tick().dt).collect();
    assert_eq!(deltas, vec![0.0, 0.0, 0.5, 0.0, 7.5, 0.0]);
}

// ── full loop ────────────────────────────────────────────────────────────

#[test]
fn uniformless_program_draws_three_vertices() {
    let window = HeadlessWindow::new(64, 64).with_frame_budget(2);
    let config = LoopConfig {
        clear_color: [0.1, 0.1, 0.1, 1.0],
        ..LoopConfig::default()
    };
    let mut lp = RenderLoop::new(window, HeadlessDriver::new(), config);

    let d = lp.driver_mut();
    let program = link(d, StageSource::glsl(VERTEX_GLSL), StageSource::glsl(FRAGMENT_GLSL));
    let mut set = VertexResourceSet::create(d, VertexLayout::new(), &[], BufferUsage::StaticUpload).unwrap();
    set.set_vertex_count(Some(3));

    lp.start(program, set).unwrap();
    assert_eq!(lp.run().unwrap(), 2);
    assert_eq!(lp.state(), LoopState::Stopped);

    let frames = lp.driver().frames();
    assert_eq!(frames.len(), 2);
    for frame in frames {
        assert_eq!(frame.clear, [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(frame.draws.len(), 1);
        assert_eq!(frame.draws[0].count, 3);
        assert!(frame.draws[0].uniforms.is_empty());
    }
    assert_eq!(lp.driver().live_objects().total(), 0);
}

#[test]
fn blank_frames_are_still_presented() {
    let window = HeadlessWindow::new(8, 8).with_frame_budget(4);
    let mut lp = RenderLoop::new(window, HeadlessDriver::new(), LoopConfig::default());

    let d = lp.driver_mut();
    let program = link(d, StageSource::wgsl(VERTEX_WGSL), StageSource::wgsl(FRAGMENT_WGSL));
    let set =
        VertexResourceSet::create_for_program(d, &program, &interleaved(), &[], BufferUsage::DynamicUpload).unwrap();
    assert_eq!(set.vertex_count(), 0);

    lp.start(program, set).unwrap();
    lp.run().unwrap();
    assert_eq!(lp.driver().frames().len(), 4);
    assert_eq!(lp.window().pre_presents(), 4);
}
