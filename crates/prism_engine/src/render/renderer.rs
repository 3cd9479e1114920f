//! The frame renderer
//!
//! Owns the device, the four pass nodes, the window-sized targets, the
//! synchronization ledger, and the resize coordinator, and sequences
//! them into `submit_frame`. The caller hands in pre-sorted component
//! streams; everything from batching to present happens here.
//!
//! Surface staleness never escapes this module: an out-of-date acquire
//! or present is absorbed by skipping the frame and scheduling a
//! rebuild, and the caller only ever sees whether its frame was
//! presented.

use nalgebra::Matrix4;

use crate::config::RendererConfig;
use crate::ecs::{MaterialComponent, MeshComponent, TransformComponent};

use super::batcher::DrawBatcher;
use super::device::{AcquireOutcome, GpuDevice, InstanceData, MeshBuffers, PresentOutcome};
use super::handles::{AttachmentId, DescriptorId, Extent2d, ShaderId, TextureId};
use super::passes::{
    DeferredGeometryPass, LightingAndForwardPass, PostEffect, PostProcessChain, ShadowPass,
};
use super::resize::{ResizeCoordinator, ResizeState};
use super::sync::SynchronizationLedger;
use super::targets::FrameTargets;
use super::{RenderError, RenderResult};

/// What one `submit_frame` call did
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    /// Frame counter value of this frame
    pub frame_index: u64,
    /// Whether an image was presented; false when the frame was skipped
    /// for a pending rebuild or a stale surface
    pub presented: bool,
    /// Instance records uploaded
    pub instances: usize,
    /// Instanced and full-screen draws recorded
    pub draws: usize,
    /// Pipeline, descriptor, and mesh rebinds across the mesh passes
    pub state_changes: usize,
}

/// One frame's pre-sorted input streams
///
/// The three slices are parallel: index `i` across all of them is one
/// entity. The caller has already ordered them — shadow casters first
/// (`shadow_caster_count` of them), then by batch key within each layer,
/// translucent entries back-to-front.
#[derive(Debug)]
pub struct FrameSubmission<'a> {
    /// Mesh stream
    pub meshes: &'a [MeshComponent],
    /// Material stream
    pub materials: &'a [MaterialComponent],
    /// Transform stream
    pub transforms: &'a [TransformComponent],
    /// Length of the shadow-casting prefix
    pub shadow_caster_count: usize,
    /// Light orthographic view-projection for the shadow pass
    pub light_view_proj: Matrix4<f32>,
    /// Camera view-projection for the mesh passes
    pub camera_view_proj: Matrix4<f32>,
}

/// The frame pipeline over a [`GpuDevice`]
#[derive(Debug)]
pub struct Renderer<D: GpuDevice> {
    device: D,
    ledger: SynchronizationLedger,
    batcher: DrawBatcher,
    shadow: ShadowPass,
    geometry: DeferredGeometryPass,
    lighting: LightingAndForwardPass,
    post: PostProcessChain,
    targets: FrameTargets,
    resize: ResizeCoordinator,
}

impl<D: GpuDevice> Renderer<D> {
    /// Build the pipeline: shaders, shadow pass, window targets, frame
    /// slots, and the attachment descriptors tying them together
    pub fn new(mut device: D, config: &RendererConfig) -> RenderResult<Self> {
        config
            .validate()
            .map_err(|e| RenderError::Setup(e.to_string()))?;

        let shadow_shader = device.create_shader(&config.shadow_shader.vert, &config.shadow_shader.frag)?;
        let lighting_shader =
            device.create_shader(&config.lighting_shader.vert, &config.lighting_shader.frag)?;

        let mut effects = Vec::with_capacity(config.post_effects.len());
        for effect in &config.post_effects {
            let shader = device.create_shader(&effect.shader.vert, &effect.shader.frag)?;
            effects.push(PostEffect {
                name: effect.name.clone(),
                shader,
                descriptor: None,
            });
        }

        let shadow_extent = Extent2d::new(config.shadow_map_size, config.shadow_map_size);
        let shadow = ShadowPass::new(&mut device, shadow_shader, shadow_extent)?;
        let surface_extent = device.surface_extent();
        let targets = FrameTargets::create(&mut device, surface_extent, effects.len())?;
        let ledger = SynchronizationLedger::new(&mut device, config.max_frames_in_flight)?;

        let mut lighting = LightingAndForwardPass::new(lighting_shader);
        let mut post = PostProcessChain::new(effects);
        Self::install_descriptors(&mut device, &targets, shadow.map(), &mut lighting, &mut post)?;

        log::info!(
            "renderer ready: {} frame(s) in flight, {} post effect(s), shadow map {}x{}",
            ledger.slot_count(),
            post.len(),
            shadow.extent().width,
            shadow.extent().height,
        );

        Ok(Self {
            device,
            ledger,
            batcher: DrawBatcher::new(),
            shadow,
            geometry: DeferredGeometryPass::new(),
            lighting,
            post,
            targets,
            resize: ResizeCoordinator::new(),
        })
    }

    /// Record, submit, and present one frame
    ///
    /// Returns what happened; a skipped frame (pending rebuild on a
    /// zero-extent window, or a stale surface discovered mid-frame) is a
    /// success with `presented: false`, never an error.
    pub fn submit_frame(&mut self, submission: &FrameSubmission<'_>) -> RenderResult<FrameStats> {
        debug_assert_eq!(submission.meshes.len(), submission.materials.len());
        debug_assert_eq!(submission.meshes.len(), submission.transforms.len());

        let mut stats = FrameStats {
            frame_index: self.ledger.frame_index(),
            ..FrameStats::default()
        };

        if self.resize.rebuild_pending() && !self.rebuild_if_possible()? {
            // Minimized window; nothing to render into until it returns.
            return Ok(stats);
        }

        let slot_index = self.ledger.begin_frame(&mut self.device)?;
        let slot = self.ledger.slot(slot_index);
        let (shadow_cb, geometry_cb, lighting_cb, post_cb, image_available) = (
            slot.shadow_buffer,
            slot.geometry_buffer,
            slot.lighting_buffer,
            slot.post_buffer,
            slot.image_available,
        );

        let image_index = match self.device.acquire_image(image_available)? {
            AcquireOutcome::OutOfDate => {
                self.resize.notify_stale();
                return Ok(stats);
            }
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                // A suboptimal surface still renders; rebuild next frame.
                if suboptimal {
                    self.resize.notify_stale();
                }
                image_index
            }
        };

        let instances: Vec<InstanceData> = submission
            .transforms
            .iter()
            .map(|transform| InstanceData {
                model: *transform.matrix().as_ref(),
            })
            .collect();
        self.device.upload_instances(slot_index, &instances)?;

        let batches = self.batcher.batch(
            submission.meshes,
            submission.materials,
            submission.shadow_caster_count,
        );

        self.device.begin_commands(shadow_cb)?;
        self.shadow.record(
            &mut self.device,
            shadow_cb,
            &batches.shadow,
            &submission.light_view_proj,
        )?;
        self.device.end_commands(shadow_cb)?;

        self.device.begin_commands(geometry_cb)?;
        self.geometry.record(
            &mut self.device,
            geometry_cb,
            &self.targets,
            &batches.opaque,
            &submission.camera_view_proj,
        )?;
        self.device.end_commands(geometry_cb)?;

        self.device.begin_commands(lighting_cb)?;
        self.lighting.record(
            &mut self.device,
            lighting_cb,
            &self.targets,
            image_index,
            &batches.translucent,
            &submission.camera_view_proj,
        )?;
        self.device.end_commands(lighting_cb)?;

        let with_post = !self.post.is_empty();
        if with_post {
            self.device.begin_commands(post_cb)?;
            self.post
                .record(&mut self.device, post_cb, &self.targets, image_index)?;
            self.device.end_commands(post_cb)?;
        }

        let present_wait = self
            .ledger
            .submit_passes(&mut self.device, slot_index, with_post)?;
        self.shadow.mark_submitted()?;
        self.geometry.mark_submitted()?;
        self.lighting.mark_submitted()?;
        if with_post {
            self.post.mark_submitted()?;
        }

        match self.device.present(image_index, present_wait)? {
            PresentOutcome::OutOfDate => self.resize.notify_stale(),
            PresentOutcome::Presented { suboptimal } => {
                if suboptimal {
                    self.resize.notify_stale();
                }
                stats.presented = true;
            }
        }

        self.shadow.reset();
        self.geometry.reset();
        self.lighting.reset();
        self.post.reset();
        self.ledger.advance();

        stats.instances = instances.len();
        stats.draws = batches.draw_count() + 1 + self.post.len();
        stats.state_changes = self.shadow.state_changes()
            + self.geometry.state_changes()
            + self.lighting.state_changes();
        Ok(stats)
    }

    /// Report a window-system resize; takes effect at the next frame
    pub fn notify_resize(&mut self, extent: Extent2d) {
        self.resize.notify_resize(extent);
    }

    /// Where the pipeline is in the resize lifecycle
    pub fn resize_state(&self) -> ResizeState {
        self.resize.state()
    }

    /// Extent the window targets are currently built at
    pub fn target_extent(&self) -> Extent2d {
        self.targets.extent()
    }

    /// Monotonic frame counter
    pub fn frame_index(&self) -> u64 {
        self.ledger.frame_index()
    }

    /// The underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The underlying device, mutably (loader calls between frames)
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Load a mesh file into a component
    pub fn create_mesh_component(&mut self, filepath: &str) -> RenderResult<MeshComponent> {
        let MeshBuffers {
            vertex_buffer,
            index_buffer,
            index_count,
            geometry,
        } = self.device.create_mesh_buffers(filepath)?;
        Ok(MeshComponent {
            vertex_buffer,
            index_buffer,
            index_count,
            geometry,
        })
    }

    /// Load a texture file
    pub fn create_texture(&mut self, filepath: &str) -> RenderResult<TextureId> {
        self.device.create_texture(filepath)
    }

    /// Compile a material shader pair
    pub fn create_shader(&mut self, vert_path: &str, frag_path: &str) -> RenderResult<ShaderId> {
        self.device.create_shader(vert_path, frag_path)
    }

    /// Build a material descriptor binding textures to a shader
    pub fn create_material_descriptor(
        &mut self,
        shader: ShaderId,
        textures: &[TextureId],
    ) -> RenderResult<DescriptorId> {
        self.device.create_descriptor_set(shader, textures)
    }

    /// Drain the GPU and release everything the pipeline owns
    pub fn shutdown(&mut self) -> RenderResult<()> {
        log::info!("renderer shutting down after {} frame(s)", self.ledger.frame_index());
        self.device.wait_idle()?;
        Self::drop_descriptors(&mut self.device, &mut self.lighting, &mut self.post);
        self.targets.destroy(&mut self.device);
        self.shadow.destroy(&mut self.device);
        self.ledger.destroy(&mut self.device);
        Ok(())
    }

    /// Run the drain/rebuild if the window has a usable extent
    ///
    /// Returns false when the target extent is zero, in which case the
    /// frame is skipped and the coordinator stays draining.
    fn rebuild_if_possible(&mut self) -> RenderResult<bool> {
        let extent = self.resize.target_extent(self.device.surface_extent());
        if extent.is_zero() {
            return Ok(false);
        }
        self.ledger.wait_all(&mut self.device)?;
        self.resize.begin_rebuild();
        self.rebuild_window_targets(extent)?;
        self.resize.finish_rebuild();
        Ok(true)
    }

    /// Destroy and recreate everything sized to the window
    ///
    /// Any failure here is fatal: partially rebuilt window state cannot
    /// be rendered from.
    fn rebuild_window_targets(&mut self, extent: Extent2d) -> RenderResult<()> {
        Self::drop_descriptors(&mut self.device, &mut self.lighting, &mut self.post);
        self.targets.destroy(&mut self.device);

        self.device
            .recreate_swapchain(extent)
            .map_err(|e| RenderError::RebuildFailed(e.to_string()))?;
        self.targets = FrameTargets::create(&mut self.device, extent, self.post.len())
            .map_err(|e| RenderError::RebuildFailed(e.to_string()))?;
        Self::install_descriptors(
            &mut self.device,
            &self.targets,
            self.shadow.map(),
            &mut self.lighting,
            &mut self.post,
        )
        .map_err(|e| RenderError::RebuildFailed(e.to_string()))?;

        log::info!(
            "window targets rebuilt at {}x{}",
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Build the descriptors that sample rebuilt attachments
    fn install_descriptors(
        device: &mut D,
        targets: &FrameTargets,
        shadow_map: AttachmentId,
        lighting: &mut LightingAndForwardPass,
        post: &mut PostProcessChain,
    ) -> RenderResult<()> {
        let [albedo, normal, depth] = targets.gbuffer_attachments();
        let descriptor = device
            .create_attachment_descriptor(lighting.shader(), &[albedo, normal, depth, shadow_map])?;
        lighting.set_descriptor(descriptor);

        for (i, effect) in post.effects_mut().iter_mut().enumerate() {
            let input = targets.post_input(i)?;
            effect.descriptor = Some(device.create_attachment_descriptor(effect.shader, &[input])?);
        }
        Ok(())
    }

    /// Destroy the attachment-sampling descriptors before their
    /// attachments go away
    fn drop_descriptors(
        device: &mut D,
        lighting: &mut LightingAndForwardPass,
        post: &mut PostProcessChain,
    ) {
        if let Some(descriptor) = lighting.take_descriptor() {
            device.destroy_descriptor_set(descriptor);
        }
        for effect in post.effects_mut() {
            if let Some(descriptor) = effect.descriptor.take() {
                device.destroy_descriptor_set(descriptor);
            }
        }
    }
}
