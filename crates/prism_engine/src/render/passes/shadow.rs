//! Shadow map pass
//!
//! Renders the shadow-casting prefix of the frame's batches into a
//! depth-only attachment from the light's orthographic view-projection.
//! The map's extent is fixed at startup, so unlike the window-sized
//! targets it survives resize rebuilds.

use nalgebra::Matrix4;

use super::super::batcher::BatchRun;
use super::super::device::{AttachmentDesc, AttachmentFormat, GpuDevice, PassTarget};
use super::super::handles::{AttachmentId, CommandBufferId, Extent2d, FramebufferId, ShaderId};
use super::super::RenderResult;
use super::{BindTracker, PassNode, PassState};

/// Depth-only pass producing the frame's shadow map
#[derive(Debug)]
pub struct ShadowPass {
    node: PassNode,
    shader: ShaderId,
    map: AttachmentId,
    framebuffer: FramebufferId,
    extent: Extent2d,
    state_changes: usize,
}

impl ShadowPass {
    /// Create the pass and its fixed-extent depth attachment
    pub fn new<D: GpuDevice>(
        device: &mut D,
        shader: ShaderId,
        extent: Extent2d,
    ) -> RenderResult<Self> {
        let map = device.create_attachment(&AttachmentDesc {
            format: AttachmentFormat::Depth32,
            extent,
            sampled: true,
        })?;
        let framebuffer = device.create_framebuffer(&[], Some(map), extent)?;
        log::debug!("shadow pass created at {}x{}", extent.width, extent.height);
        Ok(Self {
            node: PassNode::new("shadow"),
            shader,
            map,
            framebuffer,
            extent,
            state_changes: 0,
        })
    }

    /// The depth attachment the lighting pass samples
    pub fn map(&self) -> AttachmentId {
        self.map
    }

    /// Record the shadow-casting runs
    ///
    /// The light view-projection is pushed once for the whole pass; each
    /// run's instance-start rides on the draw itself, so per-run state
    /// changes reduce to mesh rebinds.
    pub fn record<D: GpuDevice>(
        &mut self,
        device: &mut D,
        buffer: CommandBufferId,
        runs: &[BatchRun],
        light_view_proj: &Matrix4<f32>,
    ) -> RenderResult<()> {
        self.node.begin_recording()?;
        let mut tracker = BindTracker::new();

        device.begin_pass(buffer, PassTarget::Offscreen(self.framebuffer), "shadow")?;
        if !runs.is_empty() {
            device.bind_pipeline(buffer, self.shader)?;
            device.push_matrix(buffer, (*light_view_proj).as_ref())?;
            for run in runs {
                tracker.ensure_mesh(device, buffer, run.key.vertex_buffer, run.key.index_buffer)?;
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

    /// Mesh rebinds recorded for the last frame
    pub fn state_changes(&self) -> usize {
        self.state_changes
    }

    pub(crate) fn mark_submitted(&mut self) -> RenderResult<()> {
        self.node.mark_submitted()
    }

    pub(crate) fn reset(&mut self) {
        self.node.reset();
    }

    /// Release the pass's device objects; called from shutdown only
    pub fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_attachment(self.map);
    }

    /// Fixed extent of the shadow map
    pub fn extent(&self) -> Extent2d {
        self.extent
    }
}
