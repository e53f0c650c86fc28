use image::{Rgba, RgbaImage};

pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub fn from_image<'label>(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &RgbaImage,
        label: Option<&'label str>,
    ) -> Self {
        let (width, height) = img.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            img.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}

/// Equirectangular horizon-to-zenith gradient used when no sky image is configured.
pub fn sky_gradient(width: u32, height: u32) -> RgbaImage {
    let zenith = [0.25_f32, 0.45, 0.85];
    let horizon = [0.85_f32, 0.9, 1.0];
    let ground = [0.35_f32, 0.3, 0.25];

    RgbaImage::from_fn(width, height, |_, y| {
        // v = 0 at the zenith, 0.5 at the horizon, 1 at the nadir.
        let v = (y as f32 + 0.5) / height as f32;
        let (from, to, t) = if v < 0.5 {
            (zenith, horizon, v / 0.5)
        } else {
            (horizon, ground, ((v - 0.5) / 0.5).min(0.1) * 10.0)
        };
        let channel = |i: usize| ((from[i] + (to[i] - from[i]) * t) * 255.0).round() as u8;
        Rgba([channel(0), channel(1), channel(2), 255])
    })
}
