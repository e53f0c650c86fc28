//! Seeded random source shared by scene generation and per-frame jitter.
//!
//! The stream is fully determined by the seed, so a scene is reproducible from
//! its configuration alone.

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;

use crate::util::color::hsv_to_rgb;

#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: Xoshiro128StarStar,
}

impl RandomSource {
    pub fn new(seed: u32) -> Self {
        Self {
            rng: Xoshiro128StarStar::seed_from_u64(seed as u64),
        }
    }

    /// Uniform float in `[0, 1)`.
    pub fn value(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.value() * (max - min)
    }

    /// Uniform point inside the unit disc.
    pub fn inside_unit_circle(&mut self) -> Vec2 {
        let radius = self.value().sqrt();
        let theta = self.value() * std::f32::consts::TAU;
        Vec2::new(theta.cos(), theta.sin()) * radius
    }

    pub fn color_hsv(&mut self) -> Vec3 {
        self.color_hsv_range((0.0, 1.0), (0.0, 1.0), (0.0, 1.0))
    }

    pub fn color_hsv_range(
        &mut self,
        hue: (f32, f32),
        saturation: (f32, f32),
        value: (f32, f32),
    ) -> Vec3 {
        let h = self.range(hue.0, hue.1);
        let s = self.range(saturation.0, saturation.1);
        let v = self.range(value.0, value.1);
        hsv_to_rgb(h, s, v)
    }
}
