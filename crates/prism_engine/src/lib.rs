//! # Prism Engine
//!
//! A real-time 3D rendering engine core: sparse-set component storage,
//! draw batching, and a fixed four-pass frame pipeline (shadow, deferred
//! geometry, lighting with forward translucency, post-process chain)
//! over an abstract GPU device.
//!
//! ## Features
//!
//! - **Sparse-Set ECS**: O(1) component add/remove with hole-free dense
//!   iteration
//! - **Draw Batching**: Minimal instanced draws from pre-sorted streams
//! - **Frames In Flight**: Fence-paced CPU/GPU overlap with a per-pass
//!   semaphore chain
//! - **Resize Coordination**: Drain-then-rebuild of window-sized targets
//! - **Fork/Join Jobs**: Worker pool with epoch barriers for frame work
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prism_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let device = RecordingDevice::new(Extent2d::new(1280, 720));
//!     let mut renderer = Renderer::new(device, &config)?;
//!
//!     let submission = FrameSubmission {
//!         meshes: &[],
//!         materials: &[],
//!         transforms: &[],
//!         shadow_caster_count: 0,
//!         light_view_proj: nalgebra::Matrix4::identity(),
//!         camera_view_proj: nalgebra::Matrix4::identity(),
//!     };
//!     let stats = renderer.submit_frame(&submission)?;
//!     println!("drew {} batches", stats.draws);
//!     renderer.shutdown()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod ecs;
pub mod jobs;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::{EngineConfig, RendererConfig, ShaderPaths};
    pub use crate::ecs::{
        Components, Entity, EntityManager, GeometryKind, MaterialComponent, MeshComponent,
        RenderLayer, TransformComponent,
    };
    pub use crate::jobs::JobPool;
    pub use crate::render::{
        Extent2d, FrameStats, FrameSubmission, GpuDevice, RecordingDevice, Renderer, RenderError,
        ResizeState,
    };
}
