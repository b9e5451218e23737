use std::fmt;

use crate::animation::AnimationState;
use crate::driver::{Driver, Topology, UniformValue};
use crate::error::{RenderError, RenderResult};
use crate::input::{InputBridge, InputEvent};
use crate::shader::{Program, Slot};
use crate::time::{FrameClock, FrameTime, MonotonicSource, TimeSource};
use crate::vertex::VertexResourceSet;
use crate::window::Window;

/// Loop configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoopConfig {
    /// Used unless a clear colour function is installed.
    pub clear_color: [f32; 4],
    /// Multiplier applied to `dt` when advancing simulation time.
    pub angular_velocity: f64,
    pub topology: Topology,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            angular_velocity: 1.0,
            topology: Topology::Triangles,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    NotStarted,
    Running,
    /// Terminal.
    Stopped,
}

/// Result of one iteration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopControl {
    Continue,
    Stop,
}

type UniformFn = Box<dyn Fn(&AnimationState) -> UniformValue>;
type ClearFn = Box<dyn Fn(&AnimationState) -> [f32; 4]>;

/// A uniform recomputed from the animation state every frame.
pub struct UniformFeed {
    name: String,
    compute: UniformFn,
    slot: Option<Slot>,
}

impl UniformFeed {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot the name resolved to; `None` before the loop starts.
    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }
}

impl fmt::Debug for UniformFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformFeed")
            .field("name", &self.name)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Drives poll, tick, upload, draw and present until the window asks to stop.
///
/// The loop owns the program and vertex resources once started and releases
/// both when it stops, whether through the stop signal, an error, or drop.
pub struct RenderLoop<W: Window, D: Driver, S: TimeSource = MonotonicSource> {
    window: W,
    driver: D,
    config: LoopConfig,
    clock: FrameClock<S>,
    animation: AnimationState,
    input: InputBridge,
    feeds: Vec<UniformFeed>,
    clear: Option<ClearFn>,
    program: Option<Program>,
    resources: Option<VertexResourceSet>,
    events: Vec<InputEvent>,
    size: (u32, u32),
    state: LoopState,
    frames_presented: u64,
    last_frame: Option<FrameTime>,
}

impl<W: Window, D: Driver> RenderLoop<W, D, MonotonicSource> {
    pub fn new(window: W, driver: D, config: LoopConfig) -> Self {
        Self::with_clock(window, driver, config, FrameClock::new())
    }
}

impl<W: Window, D: Driver, S: TimeSource> RenderLoop<W, D, S> {
    pub fn with_clock(window: W, driver: D, config: LoopConfig, clock: FrameClock<S>) -> Self {
        let size = window.size();
        Self {
            window,
            driver,
            config,
            clock,
            animation: AnimationState::new(),
            input: InputBridge::new(),
            feeds: Vec::new(),
            clear: None,
            program: None,
            resources: None,
            events: Vec::new(),
            size,
            state: LoopState::NotStarted,
            frames_presented: 0,
            last_frame: None,
        }
    }

    pub fn with_input(mut self, input: InputBridge) -> Self {
        self.input = input;
        self
    }

    pub fn with_animation(mut self, animation: AnimationState) -> Self {
        self.animation = animation;
        self
    }

    /// Uploads `compute(state)` to uniform `name` every frame.
    ///
    /// Names the program does not declare resolve to an absent slot and are
    /// skipped silently.
    pub fn feed(
        mut self,
        name: impl Into<String>,
        compute: impl Fn(&AnimationState) -> UniformValue + 'static,
    ) -> Self {
        self.feeds.push(UniformFeed {
            name: name.into(),
            compute: Box::new(compute),
            slot: None,
        });
        self
    }

    /// Derives the clear colour from the animation state instead of the config.
    pub fn clear_with(mut self, clear: impl Fn(&AnimationState) -> [f32; 4] + 'static) -> Self {
        self.clear = Some(Box::new(clear));
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// For building the program and resources before `start`.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    pub fn feeds(&self) -> &[UniformFeed] {
        &self.feeds
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Timing of the most recent iteration.
    pub fn last_frame(&self) -> Option<FrameTime> {
        self.last_frame
    }

    /// Takes ownership of `program` and `resources` and enters `Running`.
    ///
    /// Uniform feeds are resolved here, once.
    pub fn start(&mut self, mut program: Program, resources: VertexResourceSet) -> RenderResult<()> {
        if self.state != LoopState::NotStarted {
            program.release(&mut self.driver);
            resources.release(&mut self.driver);
            return Err(RenderError::contract(format!("start called on a loop in state {:?}", self.state)));
        }

        for feed in &mut self.feeds {
            feed.slot = Some(program.resolve(&self.driver, &feed.name));
        }

        log::info!(
            "render loop started: {}, {} vertices, {} uniform feeds",
            program.id(),
            resources.vertex_count(),
            self.feeds.len()
        );
        self.program = Some(program);
        self.resources = Some(resources);
        self.state = LoopState::Running;
        Ok(())
    }

    /// Runs exactly one iteration.
    ///
    /// Any error stops the loop and releases its objects before returning.
    pub fn step(&mut self) -> RenderResult<LoopControl> {
        match self.state {
            LoopState::NotStarted => return Err(RenderError::contract("step called before start")),
            LoopState::Stopped => return Ok(LoopControl::Stop),
            LoopState::Running => {}
        }

        if self.window.should_stop() {
            log::info!("stop requested after {} frames", self.frames_presented);
            self.stop();
            return Ok(LoopControl::Stop);
        }

        match self.frame() {
            Ok(()) => {
                self.frames_presented += 1;
                Ok(LoopControl::Continue)
            }
            Err(e) => {
                log::error!("render loop aborted: {e}");
                self.stop();
                Err(e)
            }
        }
    }

    /// Steps until the stop signal; returns the number of presented frames.
    pub fn run(&mut self) -> RenderResult<u64> {
        while self.step()? == LoopControl::Continue {}
        Ok(self.frames_presented)
    }

    /// Releases the program and resources and enters `Stopped`.
    pub fn stop(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.release(&mut self.driver);
        }
        if let Some(program) = self.program.take() {
            program.release(&mut self.driver);
        }
        self.state = LoopState::Stopped;
    }

    fn frame(&mut self) -> RenderResult<()> {
        self.window.poll_events(&mut self.events);
        for event in self.events.drain(..) {
            self.input.on_key_event(&event, &mut self.animation);
        }

        let size = self.window.size();
        if size != self.size {
            log::info!("surface resized to {}x{}", size.0, size.1);
            self.driver.resize(size.0, size.1);
            self.size = size;
        }

        let time = self.clock.tick();
        self.animation.advance(&time, self.config.angular_velocity);
        self.last_frame = Some(time);

        let (Some(program), Some(resources)) = (self.program.as_mut(), self.resources.as_ref()) else {
            return Err(RenderError::contract("running loop has no program or resources"));
        };

        for feed in &mut self.feeds {
            let slot = match feed.slot {
                Some(slot) => slot,
                None => {
                    let slot = program.resolve(&self.driver, &feed.name);
                    feed.slot = Some(slot);
                    slot
                }
            };
            let value = (feed.compute)(&self.animation);
            program.upload(&mut self.driver, slot, &value)?;
        }

        let clear = match &self.clear {
            Some(f) => f(&self.animation),
            None => self.config.clear_color,
        };
        self.driver.begin_frame(clear)?;
        self.driver.use_program(Some(program.id()))?;
        resources.bind_for_draw(&mut self.driver)?;
        self.driver
            .draw_arrays(self.config.topology, 0, resources.vertex_count())?;

        self.window.pre_present();
        self.driver.present()?;
        Ok(())
    }
}

impl<W: Window, D: Driver, S: TimeSource> Drop for RenderLoop<W, D, S> {
    fn drop(&mut self) {
        if self.program.is_some() || self.resources.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use glam::Mat4;

    use super::*;
    use crate::animation::Param;
    use crate::driver::{BufferUsage, HeadlessDriver, StageKind, StageSource};
    use crate::input::Key;
    use crate::shader::ShaderStage;
    use crate::vertex::{VertexAttribute, VertexLayout};
    use crate::window::HeadlessWindow;

    const SOURCE: &str = r#"
@group(0) @binding(0) var<uniform> model: mat4x4<f32>;
@group(0) @binding(1) var<uniform> zoom: f32;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return model * vec4<f32>(position * zoom, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

    fn build(d: &mut HeadlessDriver) -> (Program, VertexResourceSet) {
        let vs = ShaderStage::compile(d, StageKind::Vertex, StageSource::wgsl(SOURCE)).unwrap();
        let fs = ShaderStage::compile(d, StageKind::Fragment, StageSource::wgsl(SOURCE)).unwrap();
        let program = Program::link(d, vec![vs, fs]).unwrap();
        let data: Vec<u8> = bytemuck::cast_slice(&[0.0f32; 9]).to_vec();
        let layout = VertexLayout::new().with(VertexAttribute::f32("position", 3));
        let resources =
            VertexResourceSet::create_for_program(d, &program, &layout, &data, BufferUsage::StaticUpload).unwrap();
        (program, resources)
    }

    /// Fixed 1/60 s steps.
    fn sixty_hz() -> FrameClock<impl Fn() -> f64> {
        let t = Cell::new(0.0);
        FrameClock::with_source(move || {
            let now = t.get();
            t.set(now + 1.0 / 60.0);
            now
        })
    }

    #[test]
    fn step_before_start_is_a_contract_violation() {
        let mut lp = RenderLoop::new(HeadlessWindow::new(4, 4), HeadlessDriver::new(), LoopConfig::default());
        assert!(lp.step().unwrap_err().is_contract_violation());
    }

    #[test]
    fn every_iteration_presents_and_stop_releases() {
        let window = HeadlessWindow::new(4, 4).with_frame_budget(3);
        let mut lp = RenderLoop::new(window, HeadlessDriver::new(), LoopConfig::default());
        let (program, resources) = build(lp.driver_mut());
        lp.start(program, resources).unwrap();

        assert_eq!(lp.run().unwrap(), 3);
        assert_eq!(lp.state(), LoopState::Stopped);
        assert_eq!(lp.driver().frames().len(), 3);
        assert_eq!(lp.window().pre_presents(), 3);
        assert!(lp.driver().frames().iter().all(|f| f.draws.len() == 1 && f.draws[0].count == 3));
        assert_eq!(lp.driver().live_objects().total(), 0);

        // Stopped is terminal.
        assert_eq!(lp.step().unwrap(), LoopControl::Stop);
    }

    #[test]
    fn feeds_track_input_and_time() {
        let window = HeadlessWindow::new(4, 4)
            .with_frame_budget(3)
            .push_frame([InputEvent::KeyDown { key: Key::W, repeat: false }])
            .push_frame([InputEvent::KeyDown { key: Key::W, repeat: true }]);
        let config = LoopConfig {
            angular_velocity: 2.0,
            ..LoopConfig::default()
        };
        let mut lp = RenderLoop::with_clock(window, HeadlessDriver::new(), config, sixty_hz())
            .with_input(InputBridge::new().bind_scalar_pair(Key::W, Key::S, "zoom", 0.5))
            .with_animation(AnimationState::new().with_param("zoom", Param::Scalar(1.0)))
            .feed("zoom", |s| UniformValue::F32(s.scalar("zoom", 1.0)))
            .feed("model", |s| UniformValue::Mat4(Mat4::from_rotation_z(s.elapsed_sim_time as f32)))
            .feed("unused", |_| UniformValue::F32(0.0));
        let (program, resources) = build(lp.driver_mut());
        lp.start(program, resources).unwrap();
        assert!(lp.feeds()[2].slot().is_some_and(|s| s.is_absent()));

        lp.run().unwrap();

        let zooms: Vec<UniformValue> = lp
            .driver()
            .frames()
            .iter()
            .map(|f| f.draws[0].uniforms["zoom"])
            .collect();
        assert_eq!(
            zooms,
            vec![UniformValue::F32(1.5), UniformValue::F32(2.0), UniformValue::F32(2.0)]
        );
        assert!((lp.animation().elapsed_sim_time - 2.0 * 2.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn clear_function_overrides_config() {
        let window = HeadlessWindow::new(4, 4).with_frame_budget(1);
        let mut lp = RenderLoop::new(window, HeadlessDriver::new(), LoopConfig::default())
            .clear_with(|_| [0.25, 0.5, 0.75, 1.0]);
        let (program, resources) = build(lp.driver_mut());
        lp.start(program, resources).unwrap();
        lp.run().unwrap();
        assert_eq!(lp.driver().frames()[0].clear, [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn resize_is_forwarded_to_driver() {
        let window = HeadlessWindow::new(4, 4).with_frame_budget(2).resize_at(1, 16, 9);
        let mut lp = RenderLoop::new(window, HeadlessDriver::new(), LoopConfig::default());
        let (program, resources) = build(lp.driver_mut());
        lp.start(program, resources).unwrap();
        lp.run().unwrap();
        assert_eq!(lp.driver().size(), (16, 9));
    }

    #[test]
    fn kind_mismatch_in_feed_aborts_the_run() {
        let window = HeadlessWindow::new(4, 4).with_frame_budget(5);
        let mut lp = RenderLoop::new(window, HeadlessDriver::new(), LoopConfig::default())
            .feed("zoom", |_| UniformValue::Mat4(Mat4::IDENTITY));
        let (program, resources) = build(lp.driver_mut());
        lp.start(program, resources).unwrap();

        let err = lp.run().unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(lp.state(), LoopState::Stopped);
        assert_eq!(lp.frames_presented(), 0);
        assert_eq!(lp.driver().live_objects().total(), 0);
    }

    #[test]
    fn second_start_is_rejected_and_releases_its_arguments() {
        let mut lp = RenderLoop::new(HeadlessWindow::new(4, 4), HeadlessDriver::new(), LoopConfig::default());
        let (program, resources) = build(lp.driver_mut());
        lp.start(program, resources).unwrap();
        let live = lp.driver().live_objects().total();

        let (program, resources) = build(lp.driver_mut());
        assert!(lp.start(program, resources).unwrap_err().is_contract_violation());
        assert_eq!(lp.driver().live_objects().total(), live);
        assert_eq!(lp.state(), LoopState::Running);

        lp.stop();
        assert_eq!(lp.driver().live_objects().total(), 0);
    }
}
