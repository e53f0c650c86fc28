use glam::UVec2;

use crate::accumulation::AccumulationState;
use crate::backend::Backend;
use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::dispatch::DispatchController;
use crate::error::RenderResult;
use crate::frame::{DirectionalLight, FrameParameterMarshaler};
use crate::scene_store::SceneStore;

/// Everything the driver loop reports for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// The scene, camera or light moved since the previous frame.
    pub changed: bool,
    pub viewport: UVec2,
    pub camera: &'a Camera,
    pub light: &'a DirectionalLight,
}

pub struct RenderOrchestrator<B: Backend> {
    store: SceneStore<B>,
    accumulation: AccumulationState<B>,
    marshaler: FrameParameterMarshaler,
    dispatcher: DispatchController,
}

impl<B: Backend> RenderOrchestrator<B> {
    /// Generates the scene and uploads it, sorted for `camera`.
    pub fn init(backend: &mut B, config: &SceneConfig, camera: &Camera) -> Self {
        let scene = config.generator().generate();
        let mut store = SceneStore::new(scene);
        store.rebuild(backend, camera.position);

        Self {
            store,
            accumulation: AccumulationState::new(),
            marshaler: FrameParameterMarshaler::new(config.seed),
            dispatcher: DispatchController,
        }
    }

    pub fn scene_store(&self) -> &SceneStore<B> {
        &self.store
    }

    pub fn accumulation(&self) -> &AccumulationState<B> {
        &self.accumulation
    }

    /// Renders one sample and folds it into the converged image, which is
    /// returned for presentation. A zero-sized viewport renders nothing.
    pub fn per_frame(
        &mut self,
        backend: &mut B,
        input: FrameInput<'_>,
    ) -> RenderResult<Option<&B::Accumulator>> {
        if input.changed {
            self.store.rebuild(backend, input.camera.position);
            self.accumulation.reset();
            tracing::debug!("scene changed, accumulation restarted");
        }

        if input.viewport.x == 0 || input.viewport.y == 0 {
            return Ok(None);
        }
        self.accumulation.ensure_sized(backend, input.viewport);

        let params = self.marshaler.collect(input.camera, input.light);
        let sample = self.dispatcher.dispatch(
            backend,
            input.viewport,
            &params,
            &self.store,
            &mut self.accumulation,
        )?;
        self.accumulation.advance(backend, sample)?;

        Ok(self.accumulation.converged())
    }

    pub fn teardown(&mut self) {
        self.store.release();
        self.accumulation.release();
        tracing::info!("released render resources");
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::backend::HostBackend;
    use crate::error::RenderError;
    use crate::frame::FrameUniforms;
    use crate::scene::GpuSphere;

    fn backend() -> HostBackend {
        HostBackend::new(|_: UVec2, uniforms: &FrameUniforms, _: &[GpuSphere]| {
            Ok(Vec4::splat(uniforms.seed))
        })
    }

    fn config() -> SceneConfig {
        SceneConfig {
            seed: 12,
            max_spheres: 40,
            sphere_radius: [2.0, 4.0],
            placement_radius: 60.0,
        }
    }

    fn light() -> DirectionalLight {
        DirectionalLight::new(Vec3::new(0.2, -1.0, 0.3), 1.0)
    }

    fn input<'a>(
        changed: bool,
        viewport: UVec2,
        camera: &'a Camera,
        light: &'a DirectionalLight,
    ) -> FrameInput<'a> {
        FrameInput {
            changed,
            viewport,
            camera,
            light,
        }
    }

    #[test]
    fn init_builds_sorted_scene_buffer() {
        let mut backend = backend();
        let camera = Camera::default();
        let orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);

        let store = orchestrator.scene_store();
        assert!(!store.is_empty());
        assert_eq!(store.buffer().expect("uploaded").size(), store.len() * 56);
        assert!(orchestrator.accumulation().is_empty());
    }

    #[test]
    fn frames_accumulate_until_change() {
        let mut backend = backend();
        let camera = Camera::default();
        let light = light();
        let viewport = UVec2::new(16, 8);
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);

        for k in 1..=4 {
            let converged = orchestrator
                .per_frame(&mut backend, input(false, viewport, &camera, &light))
                .expect("frame");
            assert!(converged.is_some());
            assert_eq!(orchestrator.accumulation().sample_count(), k);
        }
    }

    #[test]
    fn change_signal_resets_and_rebuilds_spheres_only() {
        let mut backend = backend();
        let mut camera = Camera::default();
        let light = light();
        let viewport = UVec2::new(16, 8);
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);

        for _ in 0..3 {
            orchestrator
                .per_frame(&mut backend, input(false, viewport, &camera, &light))
                .expect("frame");
        }
        let images_before = backend.images_created();
        let buffers_before = backend.sphere_buffers_created();
        let generation_before = orchestrator
            .scene_store()
            .buffer()
            .expect("uploaded")
            .generation();

        camera.position += Vec3::new(5.0, 0.0, 0.0);
        orchestrator
            .per_frame(&mut backend, input(true, viewport, &camera, &light))
            .expect("frame");

        assert_eq!(orchestrator.accumulation().sample_count(), 1);
        assert_eq!(orchestrator.accumulation().extent(), Some(viewport));
        assert_eq!(backend.images_created(), images_before);
        assert_eq!(backend.sphere_buffers_created(), buffers_before + 1);
        assert_ne!(
            orchestrator.scene_store().buffer().expect("uploaded").generation(),
            generation_before
        );
    }

    #[test]
    fn resize_restarts_accumulation() {
        let mut backend = backend();
        let camera = Camera::default();
        let light = light();
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);

        for _ in 0..5 {
            orchestrator
                .per_frame(&mut backend, input(false, UVec2::new(16, 16), &camera, &light))
                .expect("frame");
        }
        let converged = orchestrator
            .per_frame(&mut backend, input(false, UVec2::new(32, 8), &camera, &light))
            .expect("frame")
            .expect("presentable");
        assert_eq!(converged.extent(), UVec2::new(32, 8));
        assert_eq!(orchestrator.accumulation().sample_count(), 1);
    }

    #[test]
    fn converged_image_is_the_mean_of_frame_seeds() {
        let mut backend = backend();
        let camera = Camera::default();
        let light = light();
        let viewport = UVec2::new(4, 4);
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);

        let mut seeds = Vec::new();
        let mut replay = FrameParameterMarshaler::new(config().seed);
        for _ in 0..8 {
            seeds.push(replay.collect(&camera, &light).seed);
            orchestrator
                .per_frame(&mut backend, input(false, viewport, &camera, &light))
                .expect("frame");
        }

        let mean = seeds.iter().sum::<f32>() / seeds.len() as f32;
        let converged = orchestrator.accumulation().converged().expect("allocated");
        assert!((converged.pixel(1, 1).x - mean).abs() < 1e-5);
    }

    #[test]
    fn minimized_viewport_skips_the_frame() {
        let mut backend = backend();
        let camera = Camera::default();
        let light = light();
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);
        let buffers_before = backend.sphere_buffers_created();

        let converged = orchestrator
            .per_frame(&mut backend, input(true, UVec2::new(0, 600), &camera, &light))
            .expect("frame");
        assert!(converged.is_none());
        assert!(orchestrator.accumulation().is_empty());
        assert_eq!(orchestrator.accumulation().sample_count(), 0);
        assert_eq!(backend.kernel_invocations(), 0);
        assert_eq!(backend.sphere_buffers_created(), buffers_before + 1);
    }

    #[test]
    fn dispatch_failure_reaches_the_driver() {
        let mut backend = HostBackend::new(|_: UVec2, _: &FrameUniforms, _: &[GpuSphere]| {
            Err("kernel crashed".to_string())
        });
        let camera = Camera::default();
        let light = light();
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);

        let result =
            orchestrator.per_frame(&mut backend, input(false, UVec2::new(8, 8), &camera, &light));
        assert!(matches!(result, Err(RenderError::Dispatch(_))));
        assert_eq!(orchestrator.accumulation().sample_count(), 0);
    }

    #[test]
    fn empty_scene_still_renders() {
        let mut backend = backend();
        let camera = Camera::default();
        let light = light();
        let config = SceneConfig {
            max_spheres: 0,
            ..config()
        };
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config, &camera);

        assert!(orchestrator.scene_store().is_empty());
        let converged = orchestrator
            .per_frame(&mut backend, input(false, UVec2::new(8, 8), &camera, &light))
            .expect("frame");
        assert!(converged.is_some());
    }

    #[test]
    fn teardown_releases_everything() {
        let mut backend = backend();
        let camera = Camera::default();
        let light = light();
        let mut orchestrator = RenderOrchestrator::init(&mut backend, &config(), &camera);
        orchestrator
            .per_frame(&mut backend, input(false, UVec2::new(8, 8), &camera, &light))
            .expect("frame");

        orchestrator.teardown();
        assert!(orchestrator.scene_store().buffer().is_none());
        assert!(orchestrator.accumulation().is_empty());
        orchestrator.teardown();
    }
}
