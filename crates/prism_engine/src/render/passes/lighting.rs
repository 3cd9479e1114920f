//! Lighting and forward-translucency pass
//!
//! One render pass, two sub-steps: a full-screen resolve sampling the
//! G-buffers and the shadow map, then forward shading of the translucent
//! batches into the same attachment, in the back-to-front order the
//! caller's sort established.

use nalgebra::Matrix4;

use super::super::batcher::BatchRun;
use super::super::device::{GpuDevice, PassTarget};
use super::super::handles::{CommandBufferId, DescriptorId, ShaderId};
use super::super::targets::FrameTargets;
use super::super::RenderResult;
use super::{BindTracker, PassNode, PassState};

/// Full-screen lighting resolve plus forward translucency
#[derive(Debug)]
pub struct LightingAndForwardPass {
    node: PassNode,
    shader: ShaderId,
    // Samples the G-buffers and the shadow map; rebuilt with them.
    descriptor: Option<DescriptorId>,
    state_changes: usize,
}

impl LightingAndForwardPass {
    /// Create the pass around the full-screen resolve shader
    pub fn new(shader: ShaderId) -> Self {
        Self {
            node: PassNode::new("lighting"),
            shader,
            descriptor: None,
            state_changes: 0,
        }
    }

    /// The full-screen resolve shader
    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    /// Install the descriptor sampling the current G-buffer/shadow map
    pub fn set_descriptor(&mut self, descriptor: DescriptorId) {
        self.descriptor = Some(descriptor);
    }

    /// Take the descriptor for destruction before a rebuild
    pub fn take_descriptor(&mut self) -> Option<DescriptorId> {
        self.descriptor.take()
    }

    /// Record the resolve and the translucent runs
    ///
    /// `target` is the post chain's first intermediate target, or the
    /// swap-chain image itself when the chain is empty; that choice is
    /// made once at startup, not per frame.
    pub fn record<D: GpuDevice>(
        &mut self,
        device: &mut D,
        buffer: CommandBufferId,
        targets: &FrameTargets,
        image_index: u32,
        translucent_runs: &[BatchRun],
        camera_view_proj: &Matrix4<f32>,
    ) -> RenderResult<()> {
        self.node.begin_recording()?;
        let descriptor = self.descriptor.ok_or_else(|| {
            super::super::RenderError::Device("lighting descriptor not built".into())
        })?;

        let target = match targets.scene_framebuffer() {
            Some(framebuffer) => PassTarget::Offscreen(framebuffer),
            None => PassTarget::Swapchain(image_index),
        };

        device.begin_pass(buffer, target, "lighting")?;

        // Full-screen resolve of the lit opaque color.
        device.bind_pipeline(buffer, self.shader)?;
        device.bind_descriptor_set(buffer, descriptor)?;
        device.draw_fullscreen(buffer)?;

        // Forward sub-step into the same attachment.
        let mut tracker = BindTracker::new();
        if !translucent_runs.is_empty() {
            device.push_matrix(buffer, camera_view_proj.as_ref())?;
            for run in translucent_runs {
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

    /// Forward-step state changes recorded for the last frame
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
