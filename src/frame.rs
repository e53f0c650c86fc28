use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::camera::Camera;
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in, normalized.
    pub direction: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            intensity,
        }
    }

    pub fn rotate_y(&mut self, radians: f32) {
        self.direction = (Quat::from_rotation_y(radians) * self.direction).normalize_or_zero();
    }

    /// Packed as the kernel expects it: xyz direction, w intensity.
    pub fn packed(&self) -> Vec4 {
        self.direction.extend(self.intensity)
    }
}

/// Inputs of a single kernel invocation. Recomputed every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParameters {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
    pub light: Vec4,
    /// Sub-pixel offset in `[0, 1)^2`.
    pub jitter: Vec2,
    pub seed: f32,
}

/// Uniform block bound to the kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub camera_to_world: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub directional_light: [f32; 4],
    pub pixel_offset: [f32; 2],
    pub seed: f32,
    pub sphere_count: u32,
}

impl FrameUniforms {
    pub fn new(params: &FrameParameters, sphere_count: u32) -> Self {
        Self {
            camera_to_world: params.camera_to_world.to_cols_array_2d(),
            inverse_projection: params.inverse_projection.to_cols_array_2d(),
            directional_light: params.light.to_array(),
            pixel_offset: params.jitter.to_array(),
            seed: params.seed,
            sphere_count,
        }
    }
}

/// Packages camera and light state for the kernel, drawing fresh jitter and
/// noise seed from its own random stream on every call.
#[derive(Debug, Clone)]
pub struct FrameParameterMarshaler {
    random: RandomSource,
}

impl FrameParameterMarshaler {
    pub fn new(seed: u32) -> Self {
        Self {
            random: RandomSource::new(seed),
        }
    }

    pub fn collect(&mut self, camera: &Camera, light: &DirectionalLight) -> FrameParameters {
        let seed = self.random.value();
        let jitter = Vec2::new(self.random.value(), self.random.value());

        FrameParameters {
            camera_to_world: camera.camera_to_world(),
            inverse_projection: camera.inverse_projection(),
            light: light.packed(),
            jitter,
            seed,
        }
    }
}
