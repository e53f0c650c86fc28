use glam::UVec2;

use crate::accumulation::AccumulationState;
use crate::backend::Backend;
use crate::error::{RenderError, RenderResult};
use crate::frame::{FrameParameters, FrameUniforms};
use crate::scene_store::SceneStore;
use crate::util::math::div_ceil;

/// Edge length of the square pixel tile one kernel workgroup covers.
pub const TILE_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl WorkgroupGrid {
    pub fn for_viewport(extent: UVec2) -> Self {
        Self {
            x: div_ceil(extent.x, TILE_SIZE),
            y: div_ceil(extent.y, TILE_SIZE),
            z: 1,
        }
    }
}

/// Proof that a kernel dispatch finished writing a sample of `extent` pixels.
///
/// Only [`DispatchController::dispatch`] hands these out, and blending
/// consumes one, so every blend follows exactly one dispatch.
///
/// ```compile_fail
/// let sample = progressive_tracer_lib::dispatch::RawSample {
///     extent: glam::UVec2::ONE,
/// };
/// ```
#[must_use = "a dispatched sample must be blended into the accumulation buffers"]
#[derive(Debug, PartialEq, Eq)]
pub struct RawSample {
    extent: UVec2,
}

impl RawSample {
    pub(crate) fn new(extent: UVec2) -> Self {
        Self { extent }
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchController;

impl DispatchController {
    /// Runs the kernel once over the whole viewport, writing into the working
    /// target of `accumulation`. Failures are returned as-is.
    pub fn dispatch<B: Backend>(
        &self,
        backend: &mut B,
        viewport: UVec2,
        params: &FrameParameters,
        scene: &SceneStore<B>,
        accumulation: &mut AccumulationState<B>,
    ) -> RenderResult<RawSample> {
        let grid = WorkgroupGrid::for_viewport(viewport);
        let uniforms = FrameUniforms::new(params, scene.len() as u32);
        let target = accumulation
            .working_target_mut()
            .ok_or_else(|| RenderError::dispatch("working target is not allocated"))?;

        backend.dispatch(grid, &uniforms, scene.buffer(), target)?;

        Ok(RawSample::new(viewport))
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::backend::HostBackend;
    use crate::camera::Camera;
    use crate::frame::{DirectionalLight, FrameParameterMarshaler};
    use crate::scene::SceneGenerator;

    fn params() -> FrameParameters {
        let light = DirectionalLight::new(Vec3::NEG_Y, 1.0);
        FrameParameterMarshaler::new(0).collect(&Camera::default(), &light)
    }

    #[test]
    fn grid_covers_viewport_with_8x8_tiles() {
        assert_eq!(
            WorkgroupGrid::for_viewport(UVec2::new(800, 600)),
            WorkgroupGrid { x: 100, y: 75, z: 1 }
        );
        assert_eq!(
            WorkgroupGrid::for_viewport(UVec2::new(801, 1)),
            WorkgroupGrid { x: 101, y: 1, z: 1 }
        );
    }

    #[test]
    fn dispatch_writes_every_pixel_once() {
        let mut backend = HostBackend::new(|pixel: UVec2, _: &FrameUniforms, _: &[_]| {
            Ok(Vec4::new(pixel.x as f32, pixel.y as f32, 0.0, 1.0))
        });
        let scene = SceneStore::new(SceneGenerator::new(1, 10, (1.0, 2.0), 20.0).generate());
        let viewport = UVec2::new(13, 9);
        let mut accumulation = AccumulationState::new();
        accumulation.ensure_sized(&mut backend, viewport);

        let sample = DispatchController
            .dispatch(&mut backend, viewport, &params(), &scene, &mut accumulation)
            .expect("dispatch");
        assert_eq!(sample.extent(), viewport);
        assert_eq!(backend.kernel_invocations(), 13 * 9);

        let target = accumulation.working_target().expect("allocated");
        assert_eq!(target.pixel(12, 8), Vec4::new(12.0, 8.0, 0.0, 1.0));
        assert_eq!(target.pixel(0, 0), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn kernel_sees_sphere_records() {
        let mut backend = HostBackend::new(|_: UVec2, uniforms: &FrameUniforms, spheres: &[_]| {
            assert_eq!(uniforms.sphere_count as usize, spheres.len());
            Ok(Vec4::splat(spheres.len() as f32))
        });
        let mut scene = SceneStore::new(SceneGenerator::new(4, 30, (1.0, 2.0), 40.0).generate());
        scene.rebuild(&mut backend, Vec3::ZERO);
        let expected = scene.len() as f32;

        let viewport = UVec2::new(8, 8);
        let mut accumulation = AccumulationState::new();
        accumulation.ensure_sized(&mut backend, viewport);
        let _sample = DispatchController
            .dispatch(&mut backend, viewport, &params(), &scene, &mut accumulation)
            .expect("dispatch");
        let target = accumulation.working_target().expect("allocated");
        assert_eq!(target.pixel(3, 3), Vec4::splat(expected));
    }

    #[test]
    fn kernel_failure_propagates() {
        let mut backend = HostBackend::new(|_: UVec2, _: &FrameUniforms, _: &[_]| {
            Err("device lost".to_string())
        });
        let scene = SceneStore::new(Default::default());
        let viewport = UVec2::new(4, 4);
        let mut accumulation = AccumulationState::new();
        accumulation.ensure_sized(&mut backend, viewport);

        let result = DispatchController.dispatch(
            &mut backend,
            viewport,
            &params(),
            &scene,
            &mut accumulation,
        );
        assert!(matches!(result, Err(RenderError::Dispatch(_))));
    }

    #[test]
    fn dispatch_needs_allocated_buffers() {
        let mut backend = HostBackend::new(|_: UVec2, _: &FrameUniforms, _: &[_]| Ok(Vec4::ONE));
        let scene = SceneStore::new(Default::default());
        let mut accumulation = AccumulationState::new();

        let result = DispatchController.dispatch(
            &mut backend,
            UVec2::new(4, 4),
            &params(),
            &scene,
            &mut accumulation,
        );
        assert!(matches!(result, Err(RenderError::Dispatch(_))));
        assert_eq!(backend.kernel_invocations(), 0);
    }
}
