//! Device seam between the progressive-refinement core and whatever executes
//! the ray-tracing kernel.
//!
//! Resources are released by dropping them. Every owner keeps its resource in
//! an `Option` and drops the old value before storing a new one.

pub mod host;
pub mod gpu;

use glam::UVec2;

use crate::dispatch::WorkgroupGrid;
use crate::error::RenderResult;
use crate::frame::FrameUniforms;
use crate::scene::GpuSphere;

pub use self::host::{HostBackend, HostKernel};
pub use self::gpu::WgpuBackend;

pub trait Backend {
    /// Device mirror of the scene, one [`GpuSphere`] record per sphere.
    type SphereBuffer;
    /// Image the kernel writes a single noisy sample into.
    type Target;
    /// Running-mean image the samples are blended into.
    type Accumulator;

    fn create_sphere_buffer(&mut self, records: &[GpuSphere]) -> Self::SphereBuffer;
    fn create_target(&mut self, extent: UVec2) -> Self::Target;
    fn create_accumulator(&mut self, extent: UVec2) -> Self::Accumulator;

    /// Runs the kernel once over `grid` and returns after the target is
    /// safe to read.
    fn dispatch(
        &mut self,
        grid: WorkgroupGrid,
        uniforms: &FrameUniforms,
        spheres: Option<&Self::SphereBuffer>,
        target: &mut Self::Target,
    ) -> RenderResult<()>;

    /// `accumulator = accumulator * (1 - weight) + sample * weight`
    fn blend(
        &mut self,
        sample: &Self::Target,
        accumulator: &mut Self::Accumulator,
        weight: f32,
    ) -> RenderResult<()>;
}
