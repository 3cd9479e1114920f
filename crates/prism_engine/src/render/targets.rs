//! Window-extent-dependent render targets
//!
//! Everything sized to the window lives here as one unit: the G-buffer,
//! the lighting accumulation target, and the post chain's intermediate
//! targets. The resize coordinator destroys and recreates the whole
//! struct; nothing else ever rebuilds these, and every create is paired
//! with a destroy.

use super::device::{AttachmentDesc, AttachmentFormat, GpuDevice};
use super::handles::{AttachmentId, Extent2d, FramebufferId};
use super::{RenderError, RenderResult};

/// The window-sized attachments and framebuffers of one extent
#[derive(Debug)]
pub struct FrameTargets {
    extent: Extent2d,
    gbuffer_albedo: AttachmentId,
    gbuffer_normal: AttachmentId,
    gbuffer_depth: AttachmentId,
    gbuffer_framebuffer: FramebufferId,
    // Lighting output when a post chain follows; None means the lighting
    // pass writes the swap-chain image directly.
    scene: Option<(AttachmentId, FramebufferId)>,
    // Targets between post effects: effect i writes slot i, effect i+1
    // samples it. The last effect writes the swap-chain image instead.
    post: Vec<(AttachmentId, FramebufferId)>,
}

impl FrameTargets {
    /// Create all window-sized targets at `extent`
    ///
    /// `post_count` is the post chain length decided at startup; it
    /// determines whether a scene target exists at all.
    pub fn create<D: GpuDevice>(
        device: &mut D,
        extent: Extent2d,
        post_count: usize,
    ) -> RenderResult<Self> {
        let gbuffer_albedo = device.create_attachment(&AttachmentDesc {
            format: AttachmentFormat::ColorSrgb,
            extent,
            sampled: true,
        })?;
        let gbuffer_normal = device.create_attachment(&AttachmentDesc {
            format: AttachmentFormat::NormalRgb10,
            extent,
            sampled: true,
        })?;
        let gbuffer_depth = device.create_attachment(&AttachmentDesc {
            format: AttachmentFormat::Depth32,
            extent,
            sampled: true,
        })?;
        let gbuffer_framebuffer = device.create_framebuffer(
            &[gbuffer_albedo, gbuffer_normal],
            Some(gbuffer_depth),
            extent,
        )?;

        let scene = if post_count > 0 {
            let color = device.create_attachment(&AttachmentDesc {
                format: AttachmentFormat::ColorHdr,
                extent,
                sampled: true,
            })?;
            let framebuffer = device.create_framebuffer(&[color], None, extent)?;
            Some((color, framebuffer))
        } else {
            None
        };

        let mut post = Vec::new();
        for _ in 1..post_count {
            let color = device.create_attachment(&AttachmentDesc {
                format: AttachmentFormat::ColorHdr,
                extent,
                sampled: true,
            })?;
            let framebuffer = device.create_framebuffer(&[color], None, extent)?;
            post.push((color, framebuffer));
        }

        log::debug!(
            "frame targets created at {}x{} ({} post stage(s))",
            extent.width,
            extent.height,
            post_count
        );

        Ok(Self {
            extent,
            gbuffer_albedo,
            gbuffer_normal,
            gbuffer_depth,
            gbuffer_framebuffer,
            scene,
            post,
        })
    }

    /// Destroy every target, in reverse creation order
    pub fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
        for (color, framebuffer) in self.post.drain(..).rev() {
            device.destroy_framebuffer(framebuffer);
            device.destroy_attachment(color);
        }
        if let Some((color, framebuffer)) = self.scene.take() {
            device.destroy_framebuffer(framebuffer);
            device.destroy_attachment(color);
        }
        device.destroy_framebuffer(self.gbuffer_framebuffer);
        device.destroy_attachment(self.gbuffer_depth);
        device.destroy_attachment(self.gbuffer_normal);
        device.destroy_attachment(self.gbuffer_albedo);
    }

    /// Extent these targets were built at
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// The G-buffer framebuffer the geometry pass writes
    pub fn gbuffer_framebuffer(&self) -> FramebufferId {
        self.gbuffer_framebuffer
    }

    /// The G-buffer attachments the lighting pass samples
    pub fn gbuffer_attachments(&self) -> [AttachmentId; 3] {
        [self.gbuffer_albedo, self.gbuffer_normal, self.gbuffer_depth]
    }

    /// The lighting pass's offscreen target, if a post chain follows
    pub fn scene_framebuffer(&self) -> Option<FramebufferId> {
        self.scene.map(|(_, framebuffer)| framebuffer)
    }

    /// The attachment post effect `index` samples
    pub fn post_input(&self, index: usize) -> RenderResult<AttachmentId> {
        if index == 0 {
            self.scene
                .map(|(color, _)| color)
                .ok_or_else(|| RenderError::Device("post chain has no scene target".into()))
        } else {
            self.post
                .get(index - 1)
                .map(|&(color, _)| color)
                .ok_or_else(|| RenderError::Device(format!("no post target before stage {index}")))
        }
    }

    /// The framebuffer post effect `index` writes when it is not last
    pub fn post_framebuffer(&self, index: usize) -> RenderResult<FramebufferId> {
        self.post
            .get(index)
            .map(|&(_, framebuffer)| framebuffer)
            .ok_or_else(|| RenderError::Device(format!("no post target for stage {index}")))
    }
}
