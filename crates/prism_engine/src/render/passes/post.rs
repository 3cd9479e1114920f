//! Post-process chain
//!
//! An ordered list of full-screen effects. Effect `i` samples effect
//! `i-1`'s output (the lighting target for the first) and the last
//! effect writes the swap-chain image. An empty chain means the lighting
//! pass already wrote the swap-chain image and this pass records
//! nothing.

use super::super::device::{GpuDevice, PassTarget};
use super::super::handles::{CommandBufferId, DescriptorId, ShaderId};
use super::super::targets::FrameTargets;
use super::super::{RenderError, RenderResult};
use super::{PassNode, PassState};

/// One full-screen effect in the chain
#[derive(Debug)]
pub struct PostEffect {
    /// Effect name, used as the pass label
    pub name: String,
    /// Full-screen shader
    pub shader: ShaderId,
    /// Samples the previous stage's output; rebuilt with the targets
    pub descriptor: Option<DescriptorId>,
}

/// The frame's ordered post-process passes
#[derive(Debug)]
pub struct PostProcessChain {
    node: PassNode,
    effects: Vec<PostEffect>,
}

impl PostProcessChain {
    /// Build the chain; the effect list is fixed for the process lifetime
    pub fn new(effects: Vec<PostEffect>) -> Self {
        Self {
            node: PassNode::new("post"),
            effects,
        }
    }

    /// Number of effects in the chain
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether the chain has no effects
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// The effects, for descriptor installation after a rebuild
    pub fn effects_mut(&mut self) -> &mut [PostEffect] {
        &mut self.effects
    }

    /// Record every effect; the last one targets the swap-chain image
    pub fn record<D: GpuDevice>(
        &mut self,
        device: &mut D,
        buffer: CommandBufferId,
        targets: &FrameTargets,
        image_index: u32,
    ) -> RenderResult<()> {
        self.node.begin_recording()?;

        let last = self.effects.len().saturating_sub(1);
        for (i, effect) in self.effects.iter().enumerate() {
            let descriptor = effect.descriptor.ok_or_else(|| {
                RenderError::Device(format!("post effect '{}' descriptor not built", effect.name))
            })?;
            let target = if i == last {
                PassTarget::Swapchain(image_index)
            } else {
                PassTarget::Offscreen(targets.post_framebuffer(i)?)
            };
            device.begin_pass(buffer, target, "post")?;
            device.bind_pipeline(buffer, effect.shader)?;
            device.bind_descriptor_set(buffer, descriptor)?;
            device.draw_fullscreen(buffer)?;
            device.end_pass(buffer)?;
        }
        Ok(())
    }

    /// Current state in the per-frame lifecycle
    pub fn state(&self) -> PassState {
        self.node.state()
    }

    pub(crate) fn mark_submitted(&mut self) -> RenderResult<()> {
        self.node.mark_submitted()
    }

    pub(crate) fn reset(&mut self) {
        self.node.reset();
    }
}
