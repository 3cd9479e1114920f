//! The fixed render-pass nodes
//!
//! Shadow → deferred geometry → lighting/forward → post-process chain,
//! each recording against a frame slot's command buffer and sequenced on
//! the GPU purely by the ledger's semaphore chain. The pass set is
//! decided in code at startup; there is no user-authored graph.

pub mod geometry;
pub mod lighting;
pub mod post;
pub mod shadow;

pub use geometry::DeferredGeometryPass;
pub use lighting::LightingAndForwardPass;
pub use post::{PostEffect, PostProcessChain};
pub use shadow::ShadowPass;

use super::batcher::BatchKey;
use super::device::GpuDevice;
use super::handles::{BufferHandle, CommandBufferId, DescriptorId, ShaderId};
use super::{RenderError, RenderResult};

/// Lifecycle of a pass within one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    /// Not yet recorded this frame
    #[default]
    Idle,
    /// Commands recorded, not yet submitted
    Recording,
    /// Submitted to the GPU; returns to idle once the frame completes
    Submitted,
}

/// Per-frame state machine shared by all pass nodes
#[derive(Debug, Default)]
pub(crate) struct PassNode {
    label: &'static str,
    state: PassState,
}

impl PassNode {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            state: PassState::Idle,
        }
    }

    pub(crate) fn state(&self) -> PassState {
        self.state
    }

    pub(crate) fn begin_recording(&mut self) -> RenderResult<()> {
        if self.state != PassState::Idle {
            return Err(RenderError::Device(format!(
                "pass '{}' recorded twice in one frame",
                self.label
            )));
        }
        self.state = PassState::Recording;
        Ok(())
    }

    pub(crate) fn mark_submitted(&mut self) -> RenderResult<()> {
        if self.state != PassState::Recording {
            return Err(RenderError::Device(format!(
                "pass '{}' submitted without recording",
                self.label
            )));
        }
        self.state = PassState::Submitted;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.state = PassState::Idle;
    }
}

/// Tracks bound state so each run rebinds only the fields its key
/// actually changed, keeping state changes at exactly the number of key
/// transitions
#[derive(Debug, Default)]
pub(crate) struct BindTracker {
    shader: Option<ShaderId>,
    descriptor: Option<DescriptorId>,
    mesh: Option<(BufferHandle, BufferHandle)>,
    state_changes: usize,
}

impl BindTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bring the bound state up to `key`, emitting only the diff
    pub(crate) fn ensure<D: GpuDevice>(
        &mut self,
        device: &mut D,
        buffer: CommandBufferId,
        key: &BatchKey,
    ) -> RenderResult<()> {
        if self.shader != Some(key.shader) {
            device.bind_pipeline(buffer, key.shader)?;
            self.shader = Some(key.shader);
            self.state_changes += 1;
        }
        if self.descriptor != Some(key.descriptor) {
            device.bind_descriptor_set(buffer, key.descriptor)?;
            self.descriptor = Some(key.descriptor);
            self.state_changes += 1;
        }
        let mesh = (key.vertex_buffer, key.index_buffer);
        if self.mesh != Some(mesh) {
            device.bind_mesh(buffer, key.vertex_buffer, key.index_buffer)?;
            self.mesh = Some(mesh);
            self.state_changes += 1;
        }
        Ok(())
    }

    /// Bind just a mesh, for passes with a fixed pipeline (shadow)
    pub(crate) fn ensure_mesh<D: GpuDevice>(
        &mut self,
        device: &mut D,
        buffer: CommandBufferId,
        vertex: BufferHandle,
        index: BufferHandle,
    ) -> RenderResult<()> {
        if self.mesh != Some((vertex, index)) {
            device.bind_mesh(buffer, vertex, index)?;
            self.mesh = Some((vertex, index));
            self.state_changes += 1;
        }
        Ok(())
    }

    pub(crate) fn state_changes(&self) -> usize {
        self.state_changes
    }
}
