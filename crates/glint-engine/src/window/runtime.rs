use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::input::platform::translate_key_event;
use crate::input::InputEvent;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "glint".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

/// Pumps before giving up on the platform delivering `resumed`.
const OPEN_ATTEMPTS: usize = 64;

/// A single winit window whose event loop is pumped once per frame.
///
/// The render loop stays in control: nothing here blocks or owns the frame.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    handler: Handler,
    window: Arc<Window>,
}

impl WinitWindow {
    /// Creates the event loop and pumps it until the window exists.
    pub fn open(config: RuntimeConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut handler = Handler::new(config);

        for _ in 0..OPEN_ATTEMPTS {
            if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(Duration::ZERO), &mut handler) {
                return Err(anyhow!("event loop exited with code {code} before the window opened"));
            }
            if let Some(e) = handler.error.take() {
                return Err(e);
            }
            if handler.window.is_some() {
                break;
            }
        }

        let window = handler
            .window
            .clone()
            .ok_or_else(|| anyhow!("platform never resumed the application"))?;

        log::info!(
            "opened window \"{}\" at {}x{}",
            window.title(),
            handler.size.width,
            handler.size.height
        );
        Ok(Self {
            event_loop,
            handler,
            window,
        })
    }

    /// Shared handle for surface creation.
    pub fn handle(&self) -> Arc<Window> {
        Arc::clone(&self.window)
    }

    /// Requests a stop at the next iteration boundary.
    pub fn close(&mut self) {
        self.handler.close_requested = true;
    }
}

impl super::Window for WinitWindow {
    fn poll_events(&mut self, out: &mut Vec<InputEvent>) {
        let status = self.event_loop.pump_app_events(Some(Duration::ZERO), &mut self.handler);
        if let PumpStatus::Exit(code) = status {
            log::debug!("event loop exited with code {code}");
            self.handler.close_requested = true;
        }
        out.append(&mut self.handler.events);
    }

    fn should_stop(&self) -> bool {
        self.handler.close_requested
    }

    fn size(&self) -> (u32, u32) {
        (self.handler.size.width, self.handler.size.height)
    }

    fn pre_present(&mut self) {
        self.window.pre_present_notify();
    }
}

struct Handler {
    config: RuntimeConfig,
    window: Option<Arc<Window>>,
    error: Option<anyhow::Error>,
    events: Vec<InputEvent>,
    size: PhysicalSize<u32>,
    close_requested: bool,
}

impl Handler {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            window: None,
            error: None,
            events: Vec::new(),
            size: PhysicalSize::new(0, 0),
            close_requested: false,
        }
    }
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.size = window.inner_size();
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.error = Some(anyhow::Error::new(e).context("failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.close_requested = true;
            }

            WindowEvent::Resized(new_size) => {
                log::debug!("window resized to {}x{}", new_size.width, new_size.height);
                self.size = new_size;
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(w) = &self.window {
                    self.size = w.inner_size();
                }
            }

            WindowEvent::KeyboardInput {
                event, is_synthetic, ..
            } => {
                // Synthetic presses are focus bookkeeping, not user input.
                if !is_synthetic {
                    self.events.push(translate_key_event(&event));
                }
            }

            _ => {}
        }
    }
}
