use glam::{EulerRot, Mat4, Quat, Vec3};
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};

use crate::util::math::degree_to_radian;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation around the world Y axis, radians.
    pub yaw: f32,
    /// Rotation around the camera X axis, radians.
    pub pitch: f32,
    pub aspect: f32,
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 30.0, 120.0),
            yaw: 0.0,
            pitch: degree_to_radian(-10.0),
            aspect: 16.0 / 9.0,
            fov_y: degree_to_radian(60.0),
            z_near: 0.3,
            z_far: 1000.0,
        }
    }
}

impl Camera {
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    pub fn camera_to_world(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation(), self.position)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn inverse_projection(&self) -> Mat4 {
        self.projection().inverse()
    }
}

pub struct CameraController {
    pub speed: f32,
    pub turn_speed: f32,
}

impl CameraController {
    pub fn new(speed: f32, turn_speed: f32) -> Self {
        Self { speed, turn_speed }
    }

    /// Returns `true` when the camera moved.
    pub fn process_events(&self, camera: &mut Camera, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } => self.apply_key(camera, *keycode),
            _ => false,
        }
    }

    pub fn apply_key(&self, camera: &mut Camera, keycode: VirtualKeyCode) -> bool {
        match keycode {
            VirtualKeyCode::W => camera.position += camera.forward() * self.speed,
            VirtualKeyCode::S => camera.position -= camera.forward() * self.speed,
            VirtualKeyCode::D => camera.position += camera.right() * self.speed,
            VirtualKeyCode::A => camera.position -= camera.right() * self.speed,
            VirtualKeyCode::E => camera.position += Vec3::Y * self.speed,
            VirtualKeyCode::Q => camera.position -= Vec3::Y * self.speed,
            VirtualKeyCode::Left => camera.yaw += self.turn_speed,
            VirtualKeyCode::Right => camera.yaw -= self.turn_speed,
            VirtualKeyCode::Up => camera.pitch += self.turn_speed,
            VirtualKeyCode::Down => camera.pitch -= self.turn_speed,
            _ => return false,
        }
        tracing::debug!(
            position = ?camera.position,
            yaw = camera.yaw,
            pitch = camera.pitch,
            "camera moved"
        );
        true
    }
}
