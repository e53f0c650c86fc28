use glam::Vec3;

use crate::random::RandomSource;

/// Probability that an accepted sphere becomes a light source.
pub const EMISSIVE_PROBABILITY: f32 = 0.15;
/// Probability that a reflective sphere is a metal rather than a dielectric.
pub const METAL_PROBABILITY: f32 = 0.5;
/// Specular reflectance of dielectrics, per channel.
pub const DIELECTRIC_SPECULAR: f32 = 0.04;
/// HSV value range of emission colors.
pub const EMISSION_VALUE_RANGE: (f32, f32) = (3.0, 8.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    Emissive {
        emission: Vec3,
    },
    Reflective {
        albedo: Vec3,
        specular: Vec3,
        smoothness: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub position: Vec3,
    pub radius: f32,

    pub material: Material,
}

impl Sphere {
    pub fn overlaps(&self, other: &Sphere) -> bool {
        spheres_overlap(self.position, self.radius, other.position, other.radius)
    }

    pub fn to_gpu(&self) -> GpuSphere {
        let (albedo, specular, emission, smoothness) = match self.material {
            Material::Emissive { emission } => (Vec3::ZERO, Vec3::ZERO, emission, 0.0),
            Material::Reflective {
                albedo,
                specular,
                smoothness,
            } => (albedo, specular, Vec3::ZERO, smoothness),
        };

        GpuSphere {
            radius: self.radius,
            smoothness,
            albedo: albedo.to_array(),
            emission: emission.to_array(),
            position: self.position.to_array(),
            specular: specular.to_array(),
        }
    }
}

/// Kernel-side sphere record, 56 tightly packed bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuSphere {
    pub radius: f32,
    pub smoothness: f32,
    pub albedo: [f32; 3],
    pub emission: [f32; 3],
    pub position: [f32; 3],
    pub specular: [f32; 3],
}

impl GpuSphere {
    pub const SIZE: usize = std::mem::size_of::<GpuSphere>();
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
}

impl Scene {
    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    /// Stable sort, farthest sphere from `camera` first.
    pub fn sort_back_to_front(&mut self, camera: Vec3) {
        self.spheres.sort_by(|a, b| {
            let a = a.position.distance(camera);
            let b = b.position.distance(camera);
            b.total_cmp(&a)
        });
    }

    pub fn validate_no_overlap(&self) -> bool {
        self.spheres.iter().enumerate().all(|(i, sphere)| {
            self.spheres[i + 1..]
                .iter()
                .all(|other| !sphere.overlaps(other))
        })
    }

    pub fn gpu_records(&self) -> Vec<GpuSphere> {
        self.spheres.iter().map(Sphere::to_gpu).collect()
    }
}

/// Places up to `max_count` spheres on the ground plane by single-pass
/// rejection sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneGenerator {
    pub seed: u32,
    pub max_count: u32,
    pub radius_range: (f32, f32),
    pub placement_radius: f32,
}

impl SceneGenerator {
    pub fn new(seed: u32, max_count: u32, radius_range: (f32, f32), placement_radius: f32) -> Self {
        Self {
            seed,
            max_count,
            radius_range,
            placement_radius,
        }
    }

    /// A rejected candidate is dropped, not retried, so the result may hold
    /// fewer than `max_count` spheres (or none at all).
    pub fn generate(&self) -> Scene {
        let mut random = RandomSource::new(self.seed);
        let mut spheres: Vec<Sphere> = Vec::new();

        for _ in 0..self.max_count {
            let radius = random.range(self.radius_range.0, self.radius_range.1);
            let disc = random.inside_unit_circle() * self.placement_radius;
            let position = Vec3::new(disc.x, radius, disc.y);

            if spheres
                .iter()
                .any(|other| spheres_overlap(position, radius, other.position, other.radius))
            {
                continue;
            }

            spheres.push(Sphere {
                position,
                radius,
                material: classify_material(&mut random),
            });
        }

        tracing::info!(
            seed = self.seed,
            requested = self.max_count,
            accepted = spheres.len(),
            "generated scene"
        );

        Scene { spheres }
    }
}

/// Touching spheres do not overlap.
fn spheres_overlap(a: Vec3, a_radius: f32, b: Vec3, b_radius: f32) -> bool {
    let min_distance = a_radius + b_radius;
    a.distance_squared(b) < min_distance * min_distance
}

fn classify_material(random: &mut RandomSource) -> Material {
    let color = random.color_hsv();

    if random.value() < EMISSIVE_PROBABILITY {
        let emission = random.color_hsv_range((0.0, 1.0), (0.0, 1.0), EMISSION_VALUE_RANGE);
        return Material::Emissive { emission };
    }

    let metal = random.value() < METAL_PROBABILITY;
    let smoothness = random.value();
    if metal {
        Material::Reflective {
            albedo: Vec3::ZERO,
            specular: color,
            smoothness,
        }
    } else {
        Material::Reflective {
            albedo: color,
            specular: Vec3::splat(DIELECTRIC_SPECULAR),
            smoothness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_generator(seed: u32) -> SceneGenerator {
        SceneGenerator::new(seed, 100, (3.0, 8.0), 100.0)
    }

    #[test]
    fn record_is_56_bytes() {
        assert_eq!(GpuSphere::SIZE, 56);
        assert_eq!(std::mem::align_of::<GpuSphere>(), 4);
    }

    #[test]
    fn record_field_order() {
        let sphere = Sphere {
            position: Vec3::new(7.0, 8.0, 9.0),
            radius: 1.5,
            material: Material::Reflective {
                albedo: Vec3::new(0.1, 0.2, 0.3),
                specular: Vec3::new(0.4, 0.5, 0.6),
                smoothness: 0.25,
            },
        };
        let record = sphere.to_gpu();
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&record));
        assert_eq!(
            floats,
            &[1.5, 0.25, 0.1, 0.2, 0.3, 0.0, 0.0, 0.0, 7.0, 8.0, 9.0, 0.4, 0.5, 0.6]
        );
    }

    #[test]
    fn generation_is_deterministic() {
        for seed in [0, 1, 42, 1337, u32::MAX] {
            let a = default_generator(seed).generate();
            let b = default_generator(seed).generate();
            assert_eq!(a, b);
            assert_eq!(
                bytemuck::cast_slice::<GpuSphere, u8>(&a.gpu_records()),
                bytemuck::cast_slice::<GpuSphere, u8>(&b.gpu_records())
            );
        }
    }

    #[test]
    fn seeds_produce_different_scenes() {
        assert_ne!(default_generator(1).generate(), default_generator(2).generate());
    }

    #[test]
    fn accepted_spheres_never_overlap() {
        for seed in 0..20 {
            let scene = SceneGenerator::new(seed, 300, (1.0, 6.0), 30.0).generate();
            for (i, a) in scene.spheres.iter().enumerate() {
                for b in &scene.spheres[i + 1..] {
                    assert!(a.position.distance(b.position) >= a.radius + b.radius);
                }
            }
            assert!(scene.validate_no_overlap());
        }
    }

    #[test]
    fn touching_spheres_do_not_overlap() {
        let emissive = Material::Emissive {
            emission: Vec3::ONE,
        };
        let a = Sphere {
            position: Vec3::new(0.0, 2.0, 0.0),
            radius: 2.0,
            material: emissive,
        };
        let touching = Sphere {
            position: Vec3::new(5.0, 2.0, 0.0),
            radius: 3.0,
            material: emissive,
        };
        let intersecting = Sphere {
            position: Vec3::new(4.0, 2.0, 0.0),
            ..touching
        };
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&intersecting));
        assert!(Scene {
            spheres: vec![a, touching]
        }
        .validate_no_overlap());
    }

    #[test]
    fn spheres_rest_on_ground_inside_disc() {
        let generator = default_generator(5);
        let scene = generator.generate();
        assert!(!scene.is_empty());
        for sphere in &scene.spheres {
            assert!(sphere.radius >= 3.0 && sphere.radius <= 8.0);
            assert_eq!(sphere.position.y, sphere.radius);
            let planar = glam::Vec2::new(sphere.position.x, sphere.position.z);
            assert!(planar.length() <= generator.placement_radius + 1e-3);
        }
    }

    #[test]
    fn crowded_placement_yields_fewer_spheres() {
        let scene = SceneGenerator::new(9, 500, (3.0, 8.0), 10.0).generate();
        assert!(scene.len() < 500);
        assert!(scene.validate_no_overlap());
    }

    #[test]
    fn zero_attempts_is_an_empty_scene() {
        let scene = SceneGenerator::new(9, 0, (3.0, 8.0), 100.0).generate();
        assert!(scene.is_empty());
        assert!(scene.gpu_records().is_empty());
    }

    #[test]
    fn materials_follow_classification() {
        let mut emissive = 0;
        let mut metals = 0;
        let mut dielectrics = 0;
        for seed in 0..10 {
            for sphere in default_generator(seed).generate().spheres {
                match sphere.material {
                    Material::Emissive { emission } => {
                        emissive += 1;
                        assert!(emission.min_element() >= 0.0);
                        assert!(emission.max_element() >= 3.0 - 1e-4);
                        assert!(emission.max_element() <= 8.0 + 1e-4);
                    }
                    Material::Reflective {
                        albedo,
                        specular,
                        smoothness,
                    } => {
                        assert!((0.0..=1.0).contains(&smoothness));
                        if albedo == Vec3::ZERO {
                            metals += 1;
                        } else {
                            dielectrics += 1;
                            assert_eq!(specular, Vec3::splat(DIELECTRIC_SPECULAR));
                        }
                    }
                }
            }
        }
        assert!(emissive > 0);
        assert!(metals > 0);
        assert!(dielectrics > 0);
        assert!(emissive < metals + dielectrics);
    }

    #[test]
    fn emissive_records_carry_no_reflectance() {
        let sphere = Sphere {
            position: Vec3::ONE,
            radius: 1.0,
            material: Material::Emissive {
                emission: Vec3::new(4.0, 2.0, 0.0),
            },
        };
        let record = sphere.to_gpu();
        assert_eq!(record.albedo, [0.0; 3]);
        assert_eq!(record.specular, [0.0; 3]);
        assert_eq!(record.smoothness, 0.0);
        assert_eq!(record.emission, [4.0, 2.0, 0.0]);
    }

    #[test]
    fn sorts_back_to_front() {
        let mut scene = default_generator(3).generate();
        let camera = Vec3::new(0.0, 10.0, -50.0);
        scene.sort_back_to_front(camera);
        let distances: Vec<f32> = scene
            .spheres
            .iter()
            .map(|s| s.position.distance(camera))
            .collect();
        assert!(distances.windows(2).all(|w| w[0] >= w[1]));
    }
}
