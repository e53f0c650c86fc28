use glam::Vec3;

use crate::backend::Backend;
use crate::scene::Scene;

/// Owns the scene and its device mirror. The two are rebuilt together.
pub struct SceneStore<B: Backend> {
    scene: Scene,
    buffer: Option<B::SphereBuffer>,
}

impl<B: Backend> SceneStore<B> {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            buffer: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn len(&self) -> usize {
        self.scene.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scene.is_empty()
    }

    /// Current mirror buffer. Do not hold on to it across [`SceneStore::rebuild`].
    pub fn buffer(&self) -> Option<&B::SphereBuffer> {
        self.buffer.as_ref()
    }

    /// Sorts the scene back to front as seen from `camera_position` and uploads
    /// it into a freshly allocated buffer.
    pub fn rebuild(&mut self, backend: &mut B, camera_position: Vec3) {
        self.scene.sort_back_to_front(camera_position);
        self.release();

        let records = self.scene.gpu_records();
        self.buffer = Some(backend.create_sphere_buffer(&records));
        tracing::debug!(spheres = records.len(), "rebuilt sphere buffer");
    }

    pub fn release(&mut self) {
        drop(self.buffer.take());
    }
}
