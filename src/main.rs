use std::path::PathBuf;

use glam::UVec2;
use progressive_tracer_lib::{
    application::{AppState, Application, Layer, Screen},
    backend::WgpuBackend,
    camera::{Camera, CameraController},
    config::RenderConfig,
    error::RenderResult,
    frame::DirectionalLight,
    orchestrator::{FrameInput, RenderOrchestrator},
    texture::sky_gradient,
};
use tracing_subscriber::EnvFilter;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
};

const SKY_WIDTH: u32 = 1024;
const SKY_HEIGHT: u32 = 512;
/// Radians the light turns per key press.
const LIGHT_TURN: f32 = 0.05;

struct ProgressiveRayTracer {
    camera: Camera,
    camera_controller: CameraController,
    light: DirectionalLight,
    backend: WgpuBackend,
    orchestrator: RenderOrchestrator<WgpuBackend>,
    /// Camera or light moved since the last rendered frame.
    moved: bool,
    /// Change signal handed to the next frame.
    changed: bool,
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

impl Layer for ProgressiveRayTracer {
    type Config = RenderConfig;

    fn start(screen: &mut Screen, _app: &AppState, config: &RenderConfig) -> RenderResult<Self> {
        let sky = match &config.skybox {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading skybox");
                image::open(path)?.to_rgba8()
            }
            None => sky_gradient(SKY_WIDTH, SKY_HEIGHT),
        };

        let camera = config
            .camera
            .camera(aspect_ratio(screen.config.width, screen.config.height));
        let mut backend = WgpuBackend::new(screen, &sky);
        let orchestrator = RenderOrchestrator::init(&mut backend, &config.scene, &camera);

        Ok(Self {
            camera,
            camera_controller: config.camera.controller(),
            light: config.light.light(),
            backend,
            orchestrator,
            moved: false,
            changed: false,
        })
    }

    fn process_event(&mut self, event: &Event<()>, _screen: &mut Screen) {
        let Event::WindowEvent { event, .. } = event else {
            return;
        };

        if self.camera_controller.process_events(&mut self.camera, event) {
            self.moved = true;
            return;
        }

        if let WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    state: ElementState::Pressed,
                    virtual_keycode: Some(keycode),
                    ..
                },
            ..
        } = event
        {
            let turn = match keycode {
                VirtualKeyCode::J => LIGHT_TURN,
                VirtualKeyCode::L => -LIGHT_TURN,
                _ => return,
            };
            self.light.rotate_y(turn);
            self.moved = true;
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>, _app: &AppState, _screen: &mut Screen) {
        self.camera.aspect = aspect_ratio(new_size.width, new_size.height);
        tracing::info!(width = new_size.width, height = new_size.height, "resized");
    }

    fn update(&mut self, _app: &AppState, _screen: &mut Screen) {
        self.changed = std::mem::take(&mut self.moved);
    }

    fn render(&mut self, app: &AppState, screen: &mut Screen) -> RenderResult<()> {
        let input = FrameInput {
            changed: self.changed,
            viewport: UVec2::new(screen.config.width, screen.config.height),
            camera: &self.camera,
            light: &self.light,
        };

        let converged = self.orchestrator.per_frame(&mut self.backend, input)?;
        if let Some(converged) = converged {
            self.backend.present(screen, converged)?;
        }

        if app.frame() % 120 == 0 {
            tracing::debug!(
                samples = self.orchestrator.accumulation().sample_count(),
                frame_ms = app.elapsed_time() * 1000.0,
                "accumulating"
            );
        }
        Ok(())
    }

    fn shutdown(&mut self, _app: &AppState, _screen: &mut Screen) {
        self.orchestrator.teardown();
        tracing::info!("exiting");
    }
}

fn load_config() -> RenderResult<RenderConfig> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            RenderConfig::load(&path)
        }
        None => Ok(RenderConfig::default()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    let window = config.window.clone();
    if let Err(e) = pollster::block_on(Application::<ProgressiveRayTracer>::init(&window, config)) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
