mod spiral;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

use glint_engine::animation::{AnimationState, Param};
use glint_engine::driver::{BufferUsage, GpuInit, StageKind, StageSource, Topology, UniformValue, WgpuDriver};
use glint_engine::input::{InputBridge, Key};
use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::render::{LoopConfig, RenderLoop};
use glint_engine::shader::{Program, ShaderStage};
use glint_engine::vertex::{VertexAttribute, VertexLayout, VertexResourceSet};
use glint_engine::window::{LogicalSize, RuntimeConfig, WinitWindow};

const SHADER: &str = include_str!("points.wgsl");
const PRIME_LIMIT: u32 = 40_000;
const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;

/// Camera distance at zoom 0; W/S move it by 0.1 per key event.
const BASE_DISTANCE: f32 = 2.6;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let window = WinitWindow::open(RuntimeConfig {
        title: "glint: prime spiral".to_string(),
        initial_size: LogicalSize::new(WIDTH, HEIGHT),
    })?;
    let mut driver = WgpuDriver::new(window.handle(), GpuInit::default()).context("failed to initialize GPU")?;

    let program = build_program(&mut driver)?;

    let points = spiral::sacks_points(PRIME_LIMIT);
    let layout = VertexLayout::new().with(VertexAttribute::f32("position", 3));
    let resources = match VertexResourceSet::create_for_program(
        &mut driver,
        &program,
        &layout,
        bytemuck::cast_slice(&points),
        BufferUsage::StaticUpload,
    ) {
        Ok(r) => r,
        Err(e) => {
            program.release(&mut driver);
            return Err(e).context("failed to upload point cloud");
        }
    };
    log::info!("uploaded {} primes below {PRIME_LIMIT}", points.len());

    let aspect = (WIDTH / HEIGHT) as f32;
    let config = LoopConfig {
        clear_color: [0.02, 0.02, 0.04, 1.0],
        angular_velocity: 0.35,
        topology: Topology::Points,
    };

    let mut render_loop = RenderLoop::new(window, driver, config)
        .with_input(InputBridge::new().bind_scalar_pair(Key::W, Key::S, "zoom", 0.1))
        .with_animation(AnimationState::new().with_param("zoom", Param::Scalar(0.0)))
        .feed("projection", move |_| {
            UniformValue::Mat4(Mat4::perspective_rh(45f32.to_radians(), aspect, 0.01, 100.0))
        })
        .feed("view", |s| UniformValue::Mat4(view_matrix(s.scalar("zoom", 0.0))))
        .feed("model", |s| UniformValue::Mat4(Mat4::from_rotation_z(s.elapsed_sim_time as f32)))
        .clear_with(cycle_clear);

    render_loop.start(program, resources)?;
    let frames = render_loop.run()?;
    log::info!("presented {frames} frames");
    Ok(())
}

fn build_program(driver: &mut WgpuDriver) -> Result<Program> {
    let vs = ShaderStage::compile(driver, StageKind::Vertex, StageSource::wgsl(SHADER))
        .context("vertex stage")?;
    let fs = match ShaderStage::compile(driver, StageKind::Fragment, StageSource::wgsl(SHADER)) {
        Ok(fs) => fs,
        Err(e) => {
            vs.release(driver);
            return Err(e).context("fragment stage");
        }
    };
    Ok(Program::link(driver, vec![vs, fs])?)
}

fn view_matrix(zoom: f32) -> Mat4 {
    let distance = (BASE_DISTANCE - zoom).max(0.2);
    Mat4::look_at_rh(Vec3::new(0.0, -0.6 * distance, distance), Vec3::ZERO, Vec3::Z)
}

/// Slow hue drift driven by the same angle that rotates the model.
fn cycle_clear(state: &AnimationState) -> [f32; 4] {
    let t = state.elapsed_sim_time as f32;
    [
        0.04 + 0.04 * t.sin(),
        0.04 + 0.04 * (t + 2.1).sin(),
        0.08 + 0.04 * (t + 4.2).sin(),
        1.0,
    ]
}
