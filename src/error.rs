use glam::UVec2;

/// Every failure the renderer core can surface to its driver.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("device error: {0}")]
    Device(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),

    #[error("accumulation blend failed: {0}")]
    Blend(String),

    /// A sample was produced for a viewport the accumulation buffers no longer match.
    #[error("sample of size {actual} does not match accumulation buffers of size {expected}")]
    StaleSample { expected: UVec2, actual: UVec2 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl RenderError {
    pub fn device<T: ToString>(msg: T) -> Self {
        RenderError::Device(msg.to_string())
    }

    pub fn dispatch<T: ToString>(msg: T) -> Self {
        RenderError::Dispatch(msg.to_string())
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        RenderError::Config(msg.to_string())
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
