//! CPU implementation of [`Backend`], used for headless runs and tests.
//!
//! The kernel is an ordinary closure evaluated per pixel, walked tile by tile
//! exactly like the device grid.

use glam::{UVec2, Vec4};

use super::Backend;
use crate::dispatch::{WorkgroupGrid, TILE_SIZE};
use crate::error::{RenderError, RenderResult};
use crate::frame::FrameUniforms;
use crate::scene::GpuSphere;

/// Per-pixel kernel run by [`HostBackend`].
pub type HostKernel = dyn Fn(UVec2, &FrameUniforms, &[GpuSphere]) -> Result<Vec4, String>;

#[derive(Debug)]
pub struct HostSphereBuffer {
    generation: u64,
    bytes: Vec<u8>,
}

impl HostSphereBuffer {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn read_back(&self) -> Vec<GpuSphere> {
        self.bytes
            .chunks_exact(GpuSphere::SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

#[derive(Debug)]
pub struct HostImage {
    generation: u64,
    extent: UVec2,
    pixels: Vec<Vec4>,
}

impl HostImage {
    fn new(generation: u64, extent: UVec2) -> Self {
        Self {
            generation,
            extent,
            pixels: vec![Vec4::ZERO; extent.x as usize * extent.y as usize],
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[y as usize * self.extent.x as usize + x as usize]
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }
}

pub struct HostBackend {
    kernel: Box<HostKernel>,
    next_generation: u64,
    sphere_buffers_created: usize,
    images_created: usize,
    kernel_invocations: usize,
}

impl HostBackend {
    pub fn new<F>(kernel: F) -> Self
    where
        F: Fn(UVec2, &FrameUniforms, &[GpuSphere]) -> Result<Vec4, String> + 'static,
    {
        Self {
            kernel: Box::new(kernel),
            next_generation: 0,
            sphere_buffers_created: 0,
            images_created: 0,
            kernel_invocations: 0,
        }
    }

    pub fn sphere_buffers_created(&self) -> usize {
        self.sphere_buffers_created
    }

    pub fn images_created(&self) -> usize {
        self.images_created
    }

    pub fn kernel_invocations(&self) -> usize {
        self.kernel_invocations
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

impl Backend for HostBackend {
    type SphereBuffer = HostSphereBuffer;
    type Target = HostImage;
    type Accumulator = HostImage;

    fn create_sphere_buffer(&mut self, records: &[GpuSphere]) -> HostSphereBuffer {
        self.sphere_buffers_created += 1;
        HostSphereBuffer {
            generation: self.generation(),
            bytes: bytemuck::cast_slice(records).to_vec(),
        }
    }

    fn create_target(&mut self, extent: UVec2) -> HostImage {
        self.images_created += 1;
        HostImage::new(self.generation(), extent)
    }

    fn create_accumulator(&mut self, extent: UVec2) -> HostImage {
        self.create_target(extent)
    }

    fn dispatch(
        &mut self,
        grid: WorkgroupGrid,
        uniforms: &FrameUniforms,
        spheres: Option<&HostSphereBuffer>,
        target: &mut HostImage,
    ) -> RenderResult<()> {
        let records = spheres.map(HostSphereBuffer::read_back).unwrap_or_default();
        let extent = target.extent;

        for group_y in 0..grid.y {
            for group_x in 0..grid.x {
                for local_y in 0..TILE_SIZE {
                    for local_x in 0..TILE_SIZE {
                        let x = group_x * TILE_SIZE + local_x;
                        let y = group_y * TILE_SIZE + local_y;
                        if x >= extent.x || y >= extent.y {
                            continue;
                        }

                        self.kernel_invocations += 1;
                        let color = (self.kernel)(UVec2::new(x, y), uniforms, records.as_slice())
                            .map_err(RenderError::Dispatch)?;
                        target.pixels[y as usize * extent.x as usize + x as usize] = color;
                    }
                }
            }
        }

        Ok(())
    }

    fn blend(
        &mut self,
        sample: &HostImage,
        accumulator: &mut HostImage,
        weight: f32,
    ) -> RenderResult<()> {
        if sample.extent != accumulator.extent {
            return Err(RenderError::Blend(format!(
                "sample is {} but accumulator is {}",
                sample.extent, accumulator.extent
            )));
        }

        for (converged, new) in accumulator.pixels.iter_mut().zip(&sample.pixels) {
            *converged = converged.lerp(*new, weight);
        }
        Ok(())
    }
}
