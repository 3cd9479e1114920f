//! Frame synchronization ledger
//!
//! Owns the per-frame-in-flight slots and the semaphores chaining the
//! passes on the GPU timeline. The only CPU-side block is the bounded
//! fence wait that stops the CPU racing more than `max_frames_in_flight`
//! frames ahead; execution order between passes is imposed entirely by
//! semaphores, never by CPU waits.
//!
//! Per frame the chain is:
//! acquire → shadow → geometry → lighting/forward → post → present,
//! each submission waiting on its predecessor's completion semaphore.
//! The slot's one fence rides on the final submission, covering every
//! command buffer of the chain.

use super::device::GpuDevice;
use super::handles::{CommandBufferId, FenceId, SemaphoreId};
use super::RenderResult;

/// Bounded wait for a slot fence; a stuck GPU surfaces as an error
/// instead of a hang.
const FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// One reusable set of per-frame objects
///
/// Allocated once at startup and never resized; slots cycle round-robin
/// by frame index modulo the slot count.
#[derive(Debug)]
pub struct FrameSlot {
    pub(crate) shadow_buffer: CommandBufferId,
    pub(crate) geometry_buffer: CommandBufferId,
    pub(crate) lighting_buffer: CommandBufferId,
    pub(crate) post_buffer: CommandBufferId,
    pub(crate) image_available: SemaphoreId,
    pub(crate) shadow_done: SemaphoreId,
    pub(crate) geometry_done: SemaphoreId,
    pub(crate) lighting_done: SemaphoreId,
    pub(crate) frame_done: SemaphoreId,
    pub(crate) in_flight: FenceId,
    submitted: bool,
}

impl FrameSlot {
    fn new<D: GpuDevice>(device: &mut D) -> RenderResult<Self> {
        Ok(Self {
            shadow_buffer: device.allocate_command_buffer()?,
            geometry_buffer: device.allocate_command_buffer()?,
            lighting_buffer: device.allocate_command_buffer()?,
            post_buffer: device.allocate_command_buffer()?,
            image_available: device.create_semaphore()?,
            shadow_done: device.create_semaphore()?,
            geometry_done: device.create_semaphore()?,
            lighting_done: device.create_semaphore()?,
            frame_done: device.create_semaphore()?,
            // Created signaled so the first use of the slot never waits.
            in_flight: device.create_fence(true)?,
            submitted: false,
        })
    }

    fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
        device.free_command_buffer(self.shadow_buffer);
        device.free_command_buffer(self.geometry_buffer);
        device.free_command_buffer(self.lighting_buffer);
        device.free_command_buffer(self.post_buffer);
        device.destroy_semaphore(self.image_available);
        device.destroy_semaphore(self.shadow_done);
        device.destroy_semaphore(self.geometry_done);
        device.destroy_semaphore(self.lighting_done);
        device.destroy_semaphore(self.frame_done);
        device.destroy_fence(self.in_flight);
    }
}

/// Owns frame slots and sequences the pass chain on the GPU
#[derive(Debug)]
pub struct SynchronizationLedger {
    slots: Vec<FrameSlot>,
    frame_index: u64,
}

impl SynchronizationLedger {
    /// Create `max_frames_in_flight` slots
    pub fn new<D: GpuDevice>(device: &mut D, max_frames_in_flight: usize) -> RenderResult<Self> {
        log::debug!("creating {max_frames_in_flight} frame slot(s)");
        let mut slots = Vec::with_capacity(max_frames_in_flight);
        for _ in 0..max_frames_in_flight {
            slots.push(FrameSlot::new(device)?);
        }
        Ok(Self {
            slots,
            frame_index: 0,
        })
    }

    /// Number of frame slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Monotonic frame counter
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The slot index the current frame uses
    pub fn current_slot(&self) -> usize {
        (self.frame_index % self.slots.len() as u64) as usize
    }

    pub(crate) fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    /// Claim the current slot, waiting on its fence if its previous
    /// frame is still in flight
    ///
    /// This is the frame-pacing bound: the CPU may not touch the slot's
    /// command buffers or per-slot memory until the GPU work submitted
    /// under it `slot_count` frames ago has completed.
    pub fn begin_frame<D: GpuDevice>(&mut self, device: &mut D) -> RenderResult<usize> {
        let index = self.current_slot();
        if self.slots[index].submitted {
            device.wait_fence(self.slots[index].in_flight, FENCE_TIMEOUT_NS)?;
        }
        Ok(index)
    }

    /// Submit the recorded pass chain for a slot
    ///
    /// Returns the semaphore that gates the present call. The slot fence
    /// is reset here, just before it is re-armed on the final
    /// submission.
    pub fn submit_passes<D: GpuDevice>(
        &mut self,
        device: &mut D,
        index: usize,
        with_post: bool,
    ) -> RenderResult<SemaphoreId> {
        let slot = &self.slots[index];
        device.reset_fence(slot.in_flight)?;

        device.submit(
            slot.shadow_buffer,
            &[slot.image_available],
            &[slot.shadow_done],
            None,
        )?;
        device.submit(
            slot.geometry_buffer,
            &[slot.shadow_done],
            &[slot.geometry_done],
            None,
        )?;

        if with_post {
            device.submit(
                slot.lighting_buffer,
                &[slot.geometry_done],
                &[slot.lighting_done],
                None,
            )?;
            device.submit(
                slot.post_buffer,
                &[slot.lighting_done],
                &[slot.frame_done],
                Some(slot.in_flight),
            )?;
        } else {
            // The lighting pass is the final consumer: it signals the
            // present semaphore and carries the slot fence itself.
            device.submit(
                slot.lighting_buffer,
                &[slot.geometry_done],
                &[slot.frame_done],
                Some(slot.in_flight),
            )?;
        }

        self.slots[index].submitted = true;
        Ok(self.slots[index].frame_done)
    }

    /// Advance to the next frame's slot
    pub fn advance(&mut self) {
        self.frame_index += 1;
    }

    /// Drain every in-flight slot fence (resize drains and shutdown)
    pub fn wait_all<D: GpuDevice>(&mut self, device: &mut D) -> RenderResult<()> {
        for slot in &mut self.slots {
            if slot.submitted {
                device.wait_fence(slot.in_flight, FENCE_TIMEOUT_NS)?;
            }
        }
        Ok(())
    }

    /// Release every slot's device objects
    pub fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
        for slot in &mut self.slots {
            slot.destroy(device);
        }
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::handles::Extent2d;
    use crate::render::recording::{RecordingDevice, ResourceKind};

    #[test]
    fn test_slots_cycle_round_robin() {
        let mut device = RecordingDevice::new(Extent2d::new(640, 480));
        let mut ledger = SynchronizationLedger::new(&mut device, 2).unwrap();
        assert_eq!(ledger.current_slot(), 0);
        ledger.advance();
        assert_eq!(ledger.current_slot(), 1);
        ledger.advance();
        assert_eq!(ledger.current_slot(), 0);
    }

    #[test]
    fn test_first_use_of_slot_does_not_wait() {
        let mut device = RecordingDevice::new(Extent2d::new(640, 480));
        let mut ledger = SynchronizationLedger::new(&mut device, 2).unwrap();
        device.clear_events();
        ledger.begin_frame(&mut device).unwrap();
        assert!(device.events().is_empty());
    }

    #[test]
    fn test_destroy_releases_all_slot_objects() {
        let mut device = RecordingDevice::new(Extent2d::new(640, 480));
        let mut ledger = SynchronizationLedger::new(&mut device, 2).unwrap();
        ledger.destroy(&mut device);
        assert_eq!(device.live(ResourceKind::Semaphore), 0);
        assert_eq!(device.live(ResourceKind::Fence), 0);
        assert_eq!(device.live(ResourceKind::CommandBuffer), 0);
    }
}
