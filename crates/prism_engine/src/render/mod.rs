//! The frame pipeline
//!
//! Four fixed passes (shadow, deferred geometry, lighting + forward
//! translucency, post-process chain) recorded from batched component
//! streams, sequenced on the GPU timeline by a synchronization ledger,
//! and rebuilt on window resizes by a coordinator. All graphics-API
//! access goes through the [`GpuDevice`] seam.

pub mod batcher;
pub mod device;
pub mod handles;
pub mod passes;
pub mod recording;
pub mod renderer;
pub mod resize;
pub mod sync;
pub mod targets;

pub use batcher::{BatchKey, BatchRun, DrawBatcher, FrameBatches};
pub use device::{
    AcquireOutcome, AttachmentDesc, AttachmentFormat, GpuDevice, InstanceData, MeshBuffers,
    PassTarget, PresentOutcome,
};
pub use handles::{
    AttachmentId, BufferHandle, CommandBufferId, DescriptorId, Extent2d, FenceId, FramebufferId,
    SemaphoreId, ShaderId, TextureId,
};
pub use recording::{DeviceEvent, RecordingDevice, ResourceKind};
pub use renderer::{FrameStats, FrameSubmission, Renderer};
pub use resize::ResizeState;
pub use sync::SynchronizationLedger;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors from the frame pipeline
///
/// Setup and rebuild failures are fatal: the pipeline cannot render
/// without its device objects, and partially rebuilt window state cannot
/// be safely rendered from. Surface staleness never appears here; it is
/// absorbed inside `submit_frame` by the resize coordinator.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Required device object creation failed during startup
    #[error("device setup failed: {0}")]
    Setup(String),

    /// A device operation failed mid-frame
    #[error("device error: {0}")]
    Device(String),

    /// Recreating window-extent-dependent state failed
    #[error("window resource rebuild failed: {0}")]
    RebuildFailed(String),

    /// A frame slot's command buffers were touched before its fence
    /// signaled
    #[error("frame slot is still in flight")]
    SlotInFlight,

    /// Component storage fault surfaced during frame preparation
    #[error(transparent)]
    Ecs(#[from] crate::ecs::EcsError),
}
