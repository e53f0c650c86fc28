use std::sync::Arc;
use std::time::Instant;

use wgpu::SurfaceError;
use winit::{
    dpi::PhysicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

use crate::config::WindowConfig;
use crate::error::{RenderError, RenderResult};

#[derive(Debug)]
pub struct AppState {
    previous_time: Instant,
    elapsed_time: f32,
    frame: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            elapsed_time: 0.0,
            frame: 0,
        }
    }

    pub fn update(&mut self) {
        let current_time = Instant::now();
        self.elapsed_time = current_time
            .duration_since(self.previous_time)
            .as_secs_f32();
        self.previous_time = current_time;
        self.frame += 1;
    }

    /// Seconds spent on the previous frame.
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Application<L: Layer + 'static> {
    layer: L,
    screen: Screen,
    state: AppState,
}

impl<L: Layer + 'static> Application<L> {
    fn run(
        &mut self,
        event: Event<()>,
        _event_loop: &EventLoopWindowTarget<()>,
        control_flow: &mut ControlFlow,
    ) {
        // Progressive refinement keeps drawing while idle.
        control_flow.set_poll();

        self.layer.process_event(&event, &mut self.screen);

        match event {
            Event::WindowEvent {
                window_id,
                ref event,
            } if self.screen.window().id() == window_id => match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => {
                    self.layer.shutdown(&self.state, &mut self.screen);
                    control_flow.set_exit_with_code(0);
                }
                WindowEvent::Resized(physical_size) => {
                    self.screen.resize(*physical_size);
                    self.layer
                        .resize(*physical_size, &self.state, &mut self.screen);
                }
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    self.screen.resize(**new_inner_size);
                    self.layer
                        .resize(**new_inner_size, &self.state, &mut self.screen);
                }
                _ => {}
            },
            Event::MainEventsCleared => {
                self.state.update();
                self.screen.window().request_redraw();
            }
            Event::RedrawRequested(window_id) if self.screen.window().id() == window_id => {
                self.layer.update(&self.state, &mut self.screen);

                match self.layer.render(&self.state, &mut self.screen) {
                    Ok(_) => {}
                    Err(RenderError::Surface(SurfaceError::Lost)) => {
                        self.screen.resize_to_current()
                    }
                    Err(RenderError::Surface(SurfaceError::OutOfMemory)) => {
                        control_flow.set_exit_with_code(137)
                    }
                    Err(e) => tracing::error!("frame skipped: {}", e),
                }
            }
            _ => {}
        }
    }

    pub async fn init(window: &WindowConfig, config: L::Config) -> RenderResult<()> {
        let event_loop = EventLoop::new();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let mut screen = Screen::new(&event_loop, &instance, window).await?;
        let state = AppState::new();
        let layer = L::start(&mut screen, &state, &config)?;

        let mut application = Self {
            layer,
            screen,
            state,
        };
        event_loop.run(move |event, event_loop, control_flow| {
            application.run(event, event_loop, control_flow);
        });
    }
}

pub struct Screen {
    pub surface: wgpu::Surface,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: wgpu::SurfaceConfiguration,
    window: Window,
}

impl Screen {
    pub async fn new(
        event_loop: &EventLoopWindowTarget<()>,
        instance: &wgpu::Instance,
        window_config: &WindowConfig,
    ) -> RenderResult<Self> {
        let window = WindowBuilder::new()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
            .build(event_loop)
            .map_err(RenderError::device)?;

        // SAFETY:
        // The surface needs to live as long as the window that created it.
        // Screen owns the window so this should be safe.
        let surface =
            unsafe { instance.create_surface(&window) }.map_err(RenderError::device)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::device("no compatible GPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                    label: Some("progressive-tracer-device"),
                },
                None,
            )
            .await
            .map_err(RenderError::device)?;
        let size = window.inner_size();
        let config = surface
            .get_default_config(&adapter, size.width, size.height)
            .ok_or_else(|| RenderError::device("surface is not supported by the adapter"))?;
        surface.configure(&device, &config);

        tracing::info!(
            adapter = ?adapter.get_info().name,
            width = config.width,
            height = config.height,
            format = ?config.format,
            "screen ready"
        );

        Ok(Self {
            window,
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resize the screen to new window size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Resize the screen to current window inner size.
    pub fn resize_to_current(&mut self) {
        self.resize(self.window.inner_size());
    }
}

pub trait Layer: Sized {
    type Config;

    fn start(screen: &mut Screen, app: &AppState, config: &Self::Config) -> RenderResult<Self>;
    fn process_event(&mut self, event: &Event<()>, screen: &mut Screen);
    fn resize(&mut self, new_size: PhysicalSize<u32>, app: &AppState, screen: &mut Screen);
    fn update(&mut self, app: &AppState, screen: &mut Screen);
    fn render(&mut self, app: &AppState, screen: &mut Screen) -> RenderResult<()>;
    fn shutdown(&mut self, app: &AppState, screen: &mut Screen);
}
