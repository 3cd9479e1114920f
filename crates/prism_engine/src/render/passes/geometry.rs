//! Deferred geometry pass
//!
//! Draws the opaque-layer batches into the G-buffer (albedo, normal,
//! depth). Its wait on the shadow pass's semaphore is an ordering
//! dependency on the shared queue, not a data dependency.

use nalgebra::Matrix4;

use super::super::batcher::BatchRun;
use super::super::device::{GpuDevice, PassTarget};
use super::super::handles::CommandBufferId;
use super::super::targets::FrameTargets;
use super::super::RenderResult;
use super::{BindTracker, PassNode, PassState};

/// G-buffer-writing pass over the opaque batches
#[derive(Debug)]
pub struct DeferredGeometryPass {
    node: PassNode,
    state_changes: usize,
}

impl DeferredGeometryPass {
    /// Create the pass; its attachments live in [`FrameTargets`]
    pub fn new() -> Self {
        Self {
            node: PassNode::new("geometry"),
            state_changes: 0,
        }
    }

    /// Record the opaque runs into the G-buffer
    pub fn record<D: GpuDevice>(
        &mut self,
        device: &mut D,
        buffer: CommandBufferId,
        targets: &FrameTargets,
        runs: &[BatchRun],
        camera_view_proj: &Matrix4<f32>,
    ) -> RenderResult<()> {
        self.node.begin_recording()?;
        let mut tracker = BindTracker::new();

        device.begin_pass(
            buffer,
            PassTarget::Offscreen(targets.gbuffer_framebuffer()),
            "geometry",
        )?;
        if !runs.is_empty() {
            device.push_matrix(buffer, camera_view_proj.as_ref())?;
            for run in runs {
                tracker.ensure(device, buffer, &run.key)?;
                device.draw_instanced(buffer, run.count, run.start)?;
            }
        }
        device.end_pass(buffer)?;

        self.state_changes = tracker.state_changes();
        Ok(())
    }

    /// Current state in the per-frame lifecycle
    pub fn state(&self) -> PassState {
        self.node.state()
    }

    /// State changes recorded for the last frame
    pub fn state_changes(&self) -> usize {
        self.state_changes
    }

    pub(crate) fn mark_submitted(&mut self) -> RenderResult<()> {
        self.node.mark_submitted()
    }

    pub(crate) fn reset(&mut self) {
        self.node.reset();
    }
}

impl Default for DeferredGeometryPass {
    fn default() -> Self {
        Self::new()
    }
}
