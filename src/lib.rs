pub mod accumulation;
pub mod application;
pub mod backend;
pub mod camera;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod orchestrator;
pub mod random;
pub mod renderer;
pub mod scene;
pub mod scene_store;
pub mod texture;
pub mod util;
