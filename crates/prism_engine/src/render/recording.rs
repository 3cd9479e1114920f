//! Command-stream recording device
//!
//! A [`GpuDevice`] implementation that executes nothing but records
//! everything: every recorded command becomes a [`DeviceEvent`], every
//! create/destroy is counted per resource class, and fences are modeled
//! so that re-recording a command buffer still owned by "in-flight" work
//! fails the way a real driver's validation layer would. Tests and
//! headless runs drive the full frame pipeline against it.

use std::collections::HashMap;

use super::device::{
    AcquireOutcome, AttachmentDesc, GpuDevice, InstanceData, MeshBuffers, PassTarget,
    PresentOutcome,
};
use super::handles::{
    AttachmentId, BufferHandle, CommandBufferId, DescriptorId, Extent2d, FenceId, FramebufferId,
    SemaphoreId, ShaderId, TextureId,
};
use super::{RenderError, RenderResult};
use crate::ecs::GeometryKind;

/// Resource classes tracked by paired create/destroy counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Render-target attachments
    Attachment,
    /// Framebuffers
    Framebuffer,
    /// Semaphores
    Semaphore,
    /// Fences
    Fence,
    /// Command buffers
    CommandBuffer,
    /// Descriptor sets (attachment-sampling only; material descriptors
    /// are loader-owned)
    Descriptor,
    /// The swap chain itself
    Swapchain,
}

/// One recorded device operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A render pass began on a command buffer
    BeginPass {
        /// Recording command buffer
        buffer: CommandBufferId,
        /// Pass label
        label: &'static str,
    },
    /// The current render pass ended
    EndPass {
        /// Recording command buffer
        buffer: CommandBufferId,
    },
    /// A pipeline was bound
    BindPipeline(ShaderId),
    /// A descriptor set was bound
    BindDescriptor(DescriptorId),
    /// A mesh's buffers were bound
    BindMesh(BufferHandle, BufferHandle),
    /// A matrix push constant was recorded
    PushMatrix,
    /// Per-instance data was uploaded into a frame slot
    UploadInstances {
        /// Frame slot index
        slot: usize,
        /// Number of instance records
        count: usize,
    },
    /// An instanced draw was recorded
    DrawInstanced {
        /// First instance index (transform fetch base)
        first_instance: u32,
        /// Instances covered by this draw
        instance_count: u32,
    },
    /// A full-screen draw was recorded
    DrawFullscreen,
    /// A swap-chain image was acquired
    Acquire {
        /// Acquired image index
        image_index: u32,
    },
    /// A command buffer was submitted
    Submit {
        /// Submitted command buffer
        buffer: CommandBufferId,
        /// Number of semaphores waited on
        wait_count: usize,
        /// Number of semaphores signaled
        signal_count: usize,
        /// Whether a completion fence was attached
        fenced: bool,
    },
    /// The CPU waited on a fence
    WaitFence(FenceId),
    /// An image was presented
    Present {
        /// Presented image index
        image_index: u32,
    },
}

#[derive(Debug, Default)]
struct Counter {
    created: usize,
    destroyed: usize,
}

/// Instrumented [`GpuDevice`] for tests and headless runs
#[derive(Debug)]
pub struct RecordingDevice {
    next_id: u32,
    counters: HashMap<ResourceKind, Counter>,
    events: Vec<DeviceEvent>,
    // true = signaled
    fences: HashMap<FenceId, bool>,
    // Command buffers owned by GPU work whose fence has not been waited on.
    guards: HashMap<CommandBufferId, FenceId>,
    // Buffers submitted since the last fenced submission; a fenced submit
    // adopts them, matching how one slot fence covers the whole chain.
    unfenced: Vec<CommandBufferId>,
    recording: Vec<CommandBufferId>,
    extent: Extent2d,
    image_count: u32,
    next_image: u32,
    out_of_date_on_acquire: bool,
    out_of_date_on_present: bool,
    suboptimal_on_present: bool,
}

impl RecordingDevice {
    /// Create a device presenting a surface of the given extent
    pub fn new(extent: Extent2d) -> Self {
        let mut device = Self {
            next_id: 0,
            counters: HashMap::new(),
            events: Vec::new(),
            fences: HashMap::new(),
            guards: HashMap::new(),
            unfenced: Vec::new(),
            recording: Vec::new(),
            extent,
            image_count: 3,
            next_image: 0,
            out_of_date_on_acquire: false,
            out_of_date_on_present: false,
            suboptimal_on_present: false,
        };
        device.count_create(ResourceKind::Swapchain);
        device
    }

    /// All recorded events, in program order
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    /// Drop recorded events (counters are kept)
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Number of objects of a class created so far
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.counters.get(&kind).map_or(0, |c| c.created)
    }

    /// Number of objects of a class destroyed so far
    pub fn destroyed(&self, kind: ResourceKind) -> usize {
        self.counters.get(&kind).map_or(0, |c| c.destroyed)
    }

    /// Objects of a class currently alive
    pub fn live(&self, kind: ResourceKind) -> usize {
        self.created(kind) - self.destroyed(kind)
    }

    /// Change the extent the window system reports
    pub fn set_surface_extent(&mut self, extent: Extent2d) {
        self.extent = extent;
    }

    /// Make the next acquire report an out-of-date surface
    pub fn force_out_of_date_on_acquire(&mut self) {
        self.out_of_date_on_acquire = true;
    }

    /// Make the next present report an out-of-date surface
    pub fn force_out_of_date_on_present(&mut self) {
        self.out_of_date_on_present = true;
    }

    /// Make the next present report a suboptimal surface
    pub fn force_suboptimal_on_present(&mut self) {
        self.suboptimal_on_present = true;
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn count_create(&mut self, kind: ResourceKind) {
        self.counters.entry(kind).or_default().created += 1;
    }

    fn count_destroy(&mut self, kind: ResourceKind) {
        self.counters.entry(kind).or_default().destroyed += 1;
    }

    fn require_recording(&self, buffer: CommandBufferId) -> RenderResult<()> {
        if self.recording.contains(&buffer) {
            Ok(())
        } else {
            Err(RenderError::Device(format!(
                "command buffer {buffer:?} is not recording"
            )))
        }
    }
}

impl GpuDevice for RecordingDevice {
    fn create_mesh_buffers(&mut self, _filepath: &str) -> RenderResult<MeshBuffers> {
        Ok(MeshBuffers {
            vertex_buffer: BufferHandle(self.fresh_id() as i32),
            index_buffer: BufferHandle(self.fresh_id() as i32),
            index_count: 36,
            geometry: GeometryKind::Triangles,
        })
    }

    fn create_texture(&mut self, _filepath: &str) -> RenderResult<TextureId> {
        Ok(TextureId(self.fresh_id()))
    }

    fn create_shader(&mut self, _vert_path: &str, _frag_path: &str) -> RenderResult<ShaderId> {
        Ok(ShaderId(self.fresh_id()))
    }

    fn create_descriptor_set(
        &mut self,
        _shader: ShaderId,
        _textures: &[TextureId],
    ) -> RenderResult<DescriptorId> {
        Ok(DescriptorId(self.fresh_id()))
    }

    fn create_attachment_descriptor(
        &mut self,
        _shader: ShaderId,
        _attachments: &[AttachmentId],
    ) -> RenderResult<DescriptorId> {
        self.count_create(ResourceKind::Descriptor);
        Ok(DescriptorId(self.fresh_id()))
    }

    fn destroy_descriptor_set(&mut self, _descriptor: DescriptorId) {
        self.count_destroy(ResourceKind::Descriptor);
    }

    fn surface_extent(&self) -> Extent2d {
        self.extent
    }

    fn recreate_swapchain(&mut self, extent: Extent2d) -> RenderResult<u32> {
        self.count_destroy(ResourceKind::Swapchain);
        self.count_create(ResourceKind::Swapchain);
        self.extent = extent;
        self.next_image = 0;
        Ok(self.image_count)
    }

    fn swapchain_image_count(&self) -> u32 {
        self.image_count
    }

    fn create_attachment(&mut self, _desc: &AttachmentDesc) -> RenderResult<AttachmentId> {
        self.count_create(ResourceKind::Attachment);
        Ok(AttachmentId(self.fresh_id()))
    }

    fn destroy_attachment(&mut self, _attachment: AttachmentId) {
        self.count_destroy(ResourceKind::Attachment);
    }

    fn create_framebuffer(
        &mut self,
        _color: &[AttachmentId],
        _depth: Option<AttachmentId>,
        _extent: Extent2d,
    ) -> RenderResult<FramebufferId> {
        self.count_create(ResourceKind::Framebuffer);
        Ok(FramebufferId(self.fresh_id()))
    }

    fn destroy_framebuffer(&mut self, _framebuffer: FramebufferId) {
        self.count_destroy(ResourceKind::Framebuffer);
    }

    fn create_semaphore(&mut self) -> RenderResult<SemaphoreId> {
        self.count_create(ResourceKind::Semaphore);
        Ok(SemaphoreId(self.fresh_id()))
    }

    fn destroy_semaphore(&mut self, _semaphore: SemaphoreId) {
        self.count_destroy(ResourceKind::Semaphore);
    }

    fn create_fence(&mut self, signaled: bool) -> RenderResult<FenceId> {
        self.count_create(ResourceKind::Fence);
        let fence = FenceId(self.fresh_id());
        self.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        self.count_destroy(ResourceKind::Fence);
        self.fences.remove(&fence);
    }

    fn wait_fence(&mut self, fence: FenceId, _timeout_ns: u64) -> RenderResult<()> {
        self.events.push(DeviceEvent::WaitFence(fence));
        if !self.fences.contains_key(&fence) {
            return Err(RenderError::Device(format!("unknown fence {fence:?}")));
        }
        // The wait stands in for GPU completion: the fence signals and the
        // command buffers it guards become reusable.
        self.fences.insert(fence, true);
        self.guards.retain(|_, &mut f| f != fence);
        Ok(())
    }

    fn reset_fence(&mut self, fence: FenceId) -> RenderResult<()> {
        match self.fences.get_mut(&fence) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(RenderError::Device(format!("unknown fence {fence:?}"))),
        }
    }

    fn allocate_command_buffer(&mut self) -> RenderResult<CommandBufferId> {
        self.count_create(ResourceKind::CommandBuffer);
        Ok(CommandBufferId(self.fresh_id()))
    }

    fn free_command_buffer(&mut self, buffer: CommandBufferId) {
        self.count_destroy(ResourceKind::CommandBuffer);
        self.guards.remove(&buffer);
    }

    fn begin_commands(&mut self, buffer: CommandBufferId) -> RenderResult<()> {
        if let Some(fence) = self.guards.get(&buffer) {
            if !self.fences.get(fence).copied().unwrap_or(true) {
                return Err(RenderError::SlotInFlight);
            }
            let fence = *fence;
            self.guards.retain(|_, &mut f| f != fence);
        }
        self.recording.push(buffer);
        Ok(())
    }

    fn end_commands(&mut self, buffer: CommandBufferId) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.recording.retain(|&b| b != buffer);
        Ok(())
    }

    fn begin_pass(
        &mut self,
        buffer: CommandBufferId,
        _target: PassTarget,
        label: &'static str,
    ) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::BeginPass { buffer, label });
        Ok(())
    }

    fn end_pass(&mut self, buffer: CommandBufferId) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::EndPass { buffer });
        Ok(())
    }

    fn bind_pipeline(&mut self, buffer: CommandBufferId, shader: ShaderId) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::BindPipeline(shader));
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        buffer: CommandBufferId,
        descriptor: DescriptorId,
    ) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::BindDescriptor(descriptor));
        Ok(())
    }

    fn bind_mesh(
        &mut self,
        buffer: CommandBufferId,
        vertex: BufferHandle,
        index: BufferHandle,
    ) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::BindMesh(vertex, index));
        Ok(())
    }

    fn push_matrix(
        &mut self,
        buffer: CommandBufferId,
        _matrix: &[[f32; 4]; 4],
    ) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::PushMatrix);
        Ok(())
    }

    fn upload_instances(&mut self, slot: usize, instances: &[InstanceData]) -> RenderResult<()> {
        self.events.push(DeviceEvent::UploadInstances {
            slot,
            count: instances.len(),
        });
        Ok(())
    }

    fn draw_instanced(
        &mut self,
        buffer: CommandBufferId,
        instance_count: u32,
        first_instance: u32,
    ) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::DrawInstanced {
            first_instance,
            instance_count,
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self, buffer: CommandBufferId) -> RenderResult<()> {
        self.require_recording(buffer)?;
        self.events.push(DeviceEvent::DrawFullscreen);
        Ok(())
    }

    fn acquire_image(&mut self, _signal: SemaphoreId) -> RenderResult<AcquireOutcome> {
        if self.out_of_date_on_acquire {
            self.out_of_date_on_acquire = false;
            return Ok(AcquireOutcome::OutOfDate);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.events.push(DeviceEvent::Acquire { image_index });
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn submit(
        &mut self,
        buffer: CommandBufferId,
        waits: &[SemaphoreId],
        signals: &[SemaphoreId],
        fence: Option<FenceId>,
    ) -> RenderResult<()> {
        self.events.push(DeviceEvent::Submit {
            buffer,
            wait_count: waits.len(),
            signal_count: signals.len(),
            fenced: fence.is_some(),
        });
        self.unfenced.push(buffer);
        if let Some(fence) = fence {
            if self.fences.get(&fence).copied().unwrap_or(false) {
                return Err(RenderError::Device(
                    "fence submitted while still signaled".into(),
                ));
            }
            for guarded in self.unfenced.drain(..) {
                self.guards.insert(guarded, fence);
            }
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32, _wait: SemaphoreId) -> RenderResult<PresentOutcome> {
        self.events.push(DeviceEvent::Present { image_index });
        if self.out_of_date_on_present {
            self.out_of_date_on_present = false;
            return Ok(PresentOutcome::OutOfDate);
        }
        let suboptimal = self.suboptimal_on_present;
        self.suboptimal_on_present = false;
        Ok(PresentOutcome::Presented { suboptimal })
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        for signaled in self.fences.values_mut() {
            *signaled = true;
        }
        self.guards.clear();
        self.unfenced.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_counters() {
        let mut device = RecordingDevice::new(Extent2d::new(640, 480));
        let a = device
            .create_attachment(&AttachmentDesc {
                format: super::super::device::AttachmentFormat::ColorSrgb,
                extent: Extent2d::new(640, 480),
                sampled: true,
            })
            .unwrap();
        assert_eq!(device.live(ResourceKind::Attachment), 1);
        device.destroy_attachment(a);
        assert_eq!(device.live(ResourceKind::Attachment), 0);
        assert_eq!(device.created(ResourceKind::Attachment), 1);
    }

    #[test]
    fn test_fence_guards_command_buffer_reuse() {
        let mut device = RecordingDevice::new(Extent2d::new(640, 480));
        let cb = device.allocate_command_buffer().unwrap();
        let fence = device.create_fence(false).unwrap();

        device.begin_commands(cb).unwrap();
        device.end_commands(cb).unwrap();
        device.submit(cb, &[], &[], Some(fence)).unwrap();

        // Reuse before the fence wait is the frame-pacing violation.
        assert!(matches!(
            device.begin_commands(cb),
            Err(RenderError::SlotInFlight)
        ));

        device.wait_fence(fence, u64::MAX).unwrap();
        assert!(device.begin_commands(cb).is_ok());
    }

    #[test]
    fn test_fenced_submit_adopts_unfenced_chain() {
        let mut device = RecordingDevice::new(Extent2d::new(640, 480));
        let cb_a = device.allocate_command_buffer().unwrap();
        let cb_b = device.allocate_command_buffer().unwrap();
        let fence = device.create_fence(false).unwrap();

        for cb in [cb_a, cb_b] {
            device.begin_commands(cb).unwrap();
            device.end_commands(cb).unwrap();
        }
        device.submit(cb_a, &[], &[], None).unwrap();
        device.submit(cb_b, &[], &[], Some(fence)).unwrap();

        // Both buffers in the chain are covered by the one slot fence.
        assert!(matches!(
            device.begin_commands(cb_a),
            Err(RenderError::SlotInFlight)
        ));
        device.wait_fence(fence, u64::MAX).unwrap();
        assert!(device.begin_commands(cb_a).is_ok());
    }
}
