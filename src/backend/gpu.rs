//! wgpu implementation of [`Backend`]: the ray-tracing kernel and the
//! running-mean blend are both compute passes on the window's device.

use std::sync::Arc;

use glam::UVec2;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::Backend;
use crate::application::Screen;
use crate::dispatch::{WorkgroupGrid, TILE_SIZE};
use crate::error::{RenderError, RenderResult};
use crate::frame::FrameUniforms;
use crate::renderer::PresentPipeline;
use crate::scene::GpuSphere;
use crate::texture::Texture;
use crate::util::math::div_ceil;

/// Format of the kernel output. Must match the storage texture in `raytrace.wgsl`.
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Bytes per converged pixel (`vec4<f32>`).
const ACCUMULATOR_TEXEL_SIZE: u64 = 16;

/// Device mirror of the scene. An empty scene owns no buffer at all.
pub struct WgpuSphereBuffer {
    buffer: Option<wgpu::Buffer>,
}

impl WgpuSphereBuffer {
    /// Size in bytes, always `GpuSphere::SIZE` times the scene length.
    pub fn size(&self) -> u64 {
        self.buffer.as_ref().map_or(0, wgpu::Buffer::size)
    }
}

/// Bytes uploaded for `records`, or `None` when there is nothing to upload.
fn sphere_contents(records: &[GpuSphere]) -> Option<&[u8]> {
    if records.is_empty() {
        None
    } else {
        Some(bytemuck::cast_slice(records))
    }
}

pub struct WgpuTarget {
    extent: UVec2,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct WgpuAccumulator {
    extent: UVec2,
    buffer: wgpu::Buffer,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BlendUniforms {
    width: u32,
    height: u32,
    weight: f32,
    _padding: u32,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    kernel_pipeline: wgpu::ComputePipeline,
    kernel_layout: wgpu::BindGroupLayout,
    frame_uniforms: wgpu::Buffer,
    blend_pipeline: wgpu::ComputePipeline,
    blend_layout: wgpu::BindGroupLayout,
    blend_uniforms: wgpu::Buffer,
    /// Bound in place of the scene buffer when there is nothing to bind.
    placeholder_spheres: wgpu::Buffer,
    sky: Texture,
    present: PresentPipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl WgpuBackend {
    pub fn new(screen: &Screen, sky_image: &RgbaImage) -> Self {
        let device = Arc::clone(&screen.device);
        let queue = Arc::clone(&screen.queue);

        let kernel_shader =
            device.create_shader_module(wgpu::include_wgsl!("../asset/shader/raytrace.wgsl"));
        let blend_shader =
            device.create_shader_module(wgpu::include_wgsl!("../asset/shader/accumulate.wgsl"));

        let kernel_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                storage_entry(0, true),
                uniform_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: TARGET_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
            label: Some("kernel_bind_group_layout"),
        });

        let blend_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                storage_entry(1, false),
                uniform_entry(2),
            ],
            label: Some("blend_bind_group_layout"),
        });

        let kernel_pipeline = create_compute_pipeline(&device, &kernel_layout, &kernel_shader, "Kernel");
        let blend_pipeline = create_compute_pipeline(&device, &blend_layout, &blend_shader, "Blend");

        let frame_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let blend_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blend Uniform Buffer"),
            size: std::mem::size_of::<BlendUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let placeholder_spheres = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Placeholder Sphere Buffer"),
            contents: bytemuck::bytes_of(&<GpuSphere as bytemuck::Zeroable>::zeroed()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let sky = Texture::from_image(&device, &queue, sky_image, Some("Sky Texture"));
        let present = PresentPipeline::new(&device, screen.config.format);

        Self {
            device,
            queue,
            kernel_pipeline,
            kernel_layout,
            frame_uniforms,
            blend_pipeline,
            blend_layout,
            blend_uniforms,
            placeholder_spheres,
            sky,
            present,
        }
    }

    /// Draws the converged image onto the window surface.
    pub fn present(&self, screen: &Screen, converged: &WgpuAccumulator) -> RenderResult<()> {
        self.present.present(
            &self.device,
            &self.queue,
            &screen.surface,
            &converged.buffer,
            converged.extent.x,
            converged.extent.y,
        )
    }

    /// Submits `encoder` and reports any validation error it raised.
    fn submit_checked(&self, encoder: wgpu::CommandEncoder) -> Option<wgpu::Error> {
        self.queue.submit(std::iter::once(encoder.finish()));
        pollster::block_on(self.device.pop_error_scope())
    }
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    name: &str,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name} Pipeline Layout")),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name} Pipeline")),
        layout: Some(&layout),
        module,
        entry_point: "main",
    })
}

impl Backend for WgpuBackend {
    type SphereBuffer = WgpuSphereBuffer;
    type Target = WgpuTarget;
    type Accumulator = WgpuAccumulator;

    fn create_sphere_buffer(&mut self, records: &[GpuSphere]) -> WgpuSphereBuffer {
        let buffer = sphere_contents(records).map(|contents| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Sphere Buffer"),
                    contents,
                    usage: wgpu::BufferUsages::STORAGE,
                })
        });
        tracing::debug!(count = records.len(), "uploaded sphere buffer");

        WgpuSphereBuffer { buffer }
    }

    fn create_target(&mut self, extent: UVec2) -> WgpuTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sample Target"),
            size: wgpu::Extent3d {
                width: extent.x,
                height: extent.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        WgpuTarget {
            extent,
            _texture: texture,
            view,
        }
    }

    fn create_accumulator(&mut self, extent: UVec2) -> WgpuAccumulator {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Converged Buffer"),
            size: extent.x as u64 * extent.y as u64 * ACCUMULATOR_TEXEL_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        WgpuAccumulator { extent, buffer }
    }

    fn dispatch(
        &mut self,
        grid: WorkgroupGrid,
        uniforms: &FrameUniforms,
        spheres: Option<&WgpuSphereBuffer>,
        target: &mut WgpuTarget,
    ) -> RenderResult<()> {
        let mut uniforms = *uniforms;
        // Zero-sized storage bindings are invalid, so an empty scene binds the
        // shared zeroed record with a count of zero.
        let sphere_buffer = match spheres.and_then(|spheres| spheres.buffer.as_ref()) {
            Some(buffer) => buffer,
            None => {
                uniforms.sphere_count = 0;
                &self.placeholder_spheres
            }
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue
            .write_buffer(&self.frame_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.kernel_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: sphere_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.frame_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.sky.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sky.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&target.view),
                },
            ],
            label: Some("kernel_bind_group"),
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Kernel Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Kernel Pass"),
            });
            pass.set_pipeline(&self.kernel_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.x, grid.y, grid.z);
        }

        match self.submit_checked(encoder) {
            Some(error) => Err(RenderError::dispatch(error)),
            None => Ok(()),
        }
    }

    fn blend(
        &mut self,
        sample: &WgpuTarget,
        accumulator: &mut WgpuAccumulator,
        weight: f32,
    ) -> RenderResult<()> {
        if sample.extent != accumulator.extent {
            return Err(RenderError::Blend(format!(
                "sample is {} but accumulator is {}",
                sample.extent, accumulator.extent
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let uniforms = BlendUniforms {
            width: accumulator.extent.x,
            height: accumulator.extent.y,
            weight,
            _padding: 0,
        };
        self.queue
            .write_buffer(&self.blend_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.blend_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&sample.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: accumulator.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.blend_uniforms.as_entire_binding(),
                },
            ],
            label: Some("blend_bind_group"),
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Blend Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Blend Pass"),
            });
            pass.set_pipeline(&self.blend_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                div_ceil(accumulator.extent.x, TILE_SIZE),
                div_ceil(accumulator.extent.y, TILE_SIZE),
                1,
            );
        }

        match self.submit_checked(encoder) {
            Some(error) => Err(RenderError::Blend(error.to_string())),
            None => Ok(()),
        }
    }
}
