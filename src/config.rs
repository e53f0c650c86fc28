use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::camera::{Camera, CameraController};
use crate::error::{RenderError, RenderResult};
use crate::frame::DirectionalLight;
use crate::scene::SceneGenerator;
use crate::util::math::degree_to_radian;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub window: WindowConfig,
    /// Equirectangular sky image. A procedural gradient is used when absent.
    pub skybox: Option<PathBuf>,
}

/// Inputs that fully determine the generated scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneConfig {
    pub seed: u32,
    pub max_spheres: u32,
    pub sphere_radius: [f32; 2],
    pub placement_radius: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
    pub fov_y_degrees: f32,
    pub move_speed: f32,
    pub turn_degrees: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightConfig {
    pub direction: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_spheres: 100,
            sphere_radius: [3.0, 8.0],
            placement_radius: 100.0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = Camera::default();
        Self {
            position: camera.position.to_array(),
            yaw_degrees: 0.0,
            pitch_degrees: -10.0,
            fov_y_degrees: 60.0,
            move_speed: 2.0,
            turn_degrees: 3.0,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [0.3, -1.0, 0.4],
            intensity: 1.0,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "progressive-tracer".to_owned(),
            width: 1280,
            height: 720,
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> RenderResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> RenderResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RenderResult<()> {
        self.scene.validate()?;

        let direction = Vec3::from_array(self.light.direction);
        if !direction.is_finite() || direction.length() < 1e-4 {
            return Err(RenderError::config("light direction must be a finite non-zero vector"));
        }
        if !self.light.intensity.is_finite() || self.light.intensity < 0.0 {
            return Err(RenderError::config("light intensity must be finite and non-negative"));
        }
        if !(self.camera.fov_y_degrees > 0.0 && self.camera.fov_y_degrees < 180.0) {
            return Err(RenderError::config("camera fovYDegrees must be in (0, 180)"));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(RenderError::config("window width and height must be positive"));
        }
        Ok(())
    }
}

impl SceneConfig {
    pub fn validate(&self) -> RenderResult<()> {
        let [min, max] = self.sphere_radius;
        if !(min > 0.0 && max.is_finite()) {
            return Err(RenderError::config(format!(
                "sphereRadius must be positive, got [{min}, {max}]"
            )));
        }
        if min > max {
            return Err(RenderError::config(format!(
                "sphereRadius range is inverted: [{min}, {max}]"
            )));
        }
        if !(self.placement_radius > 0.0 && self.placement_radius.is_finite()) {
            return Err(RenderError::config(format!(
                "placementRadius must be positive, got {}",
                self.placement_radius
            )));
        }
        Ok(())
    }

    pub fn generator(&self) -> SceneGenerator {
        SceneGenerator::new(
            self.seed,
            self.max_spheres,
            (self.sphere_radius[0], self.sphere_radius[1]),
            self.placement_radius,
        )
    }
}

impl CameraConfig {
    pub fn camera(&self, aspect: f32) -> Camera {
        Camera {
            position: Vec3::from_array(self.position),
            yaw: degree_to_radian(self.yaw_degrees),
            pitch: degree_to_radian(self.pitch_degrees),
            aspect,
            fov_y: degree_to_radian(self.fov_y_degrees),
            ..Camera::default()
        }
    }

    pub fn controller(&self) -> CameraController {
        CameraController::new(self.move_speed, degree_to_radian(self.turn_degrees))
    }
}

impl LightConfig {
    pub fn light(&self) -> DirectionalLight {
        DirectionalLight::new(Vec3::from_array(self.direction), self.intensity)
    }
}
