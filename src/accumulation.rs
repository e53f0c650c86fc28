//! Progressive accumulation: every dispatched sample is folded into a running
//! mean until the next reset.

use glam::UVec2;

use crate::backend::Backend;
use crate::dispatch::RawSample;
use crate::error::{RenderError, RenderResult};

struct AccumulationBuffers<B: Backend> {
    extent: UVec2,
    target: B::Target,
    accumulator: B::Accumulator,
}

/// `Empty` until the first [`AccumulationState::ensure_sized`], `Accumulating`
/// afterwards.
pub struct AccumulationState<B: Backend> {
    buffers: Option<AccumulationBuffers<B>>,
    sample_count: u32,
}

impl<B: Backend> Default for AccumulationState<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> AccumulationState<B> {
    pub fn new() -> Self {
        Self {
            buffers: None,
            sample_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_none()
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn extent(&self) -> Option<UVec2> {
        self.buffers.as_ref().map(|buffers| buffers.extent)
    }

    /// Weight the next sample receives in the running mean.
    pub fn blend_weight(&self) -> f32 {
        1.0 / (self.sample_count as f32 + 1.0)
    }

    /// (Re)allocates both images when missing or sized differently, which also
    /// restarts accumulation. Returns whether an allocation happened.
    pub fn ensure_sized(&mut self, backend: &mut B, extent: UVec2) -> bool {
        if self.extent() == Some(extent) {
            return false;
        }

        self.release();
        self.buffers = Some(AccumulationBuffers {
            extent,
            target: backend.create_target(extent),
            accumulator: backend.create_accumulator(extent),
        });
        self.sample_count = 0;

        tracing::info!(width = extent.x, height = extent.y, "allocated accumulation buffers");
        true
    }

    /// Restarts the running mean, keeping the current images.
    pub fn reset(&mut self) {
        self.sample_count = 0;
    }

    pub fn working_target(&self) -> Option<&B::Target> {
        self.buffers.as_ref().map(|buffers| &buffers.target)
    }

    pub(crate) fn working_target_mut(&mut self) -> Option<&mut B::Target> {
        self.buffers.as_mut().map(|buffers| &mut buffers.target)
    }

    pub fn converged(&self) -> Option<&B::Accumulator> {
        self.buffers.as_ref().map(|buffers| &buffers.accumulator)
    }

    /// Blends the sample sitting in the working target into the converged image.
    pub fn advance(&mut self, backend: &mut B, sample: RawSample) -> RenderResult<()> {
        let weight = self.blend_weight();
        let buffers = self
            .buffers
            .as_mut()
            .ok_or_else(|| RenderError::Blend("accumulation buffers are not allocated".into()))?;

        if buffers.extent != sample.extent() {
            return Err(RenderError::StaleSample {
                expected: buffers.extent,
                actual: sample.extent(),
            });
        }

        backend.blend(&buffers.target, &mut buffers.accumulator, weight)?;
        self.sample_count += 1;
        Ok(())
    }

    pub fn release(&mut self) {
        drop(self.buffers.take());
    }
}
