//! The graphics device seam
//!
//! [`GpuDevice`] is the single trait the frame pipeline records against.
//! It abstracts the graphics API as paired create/destroy operations on
//! opaque handles, command recording, and queue submission with explicit
//! semaphore/fence wiring. Loaders (mesh, texture, shader) sit behind the
//! same seam and hand back integer ids; the engine never sees file
//! formats or API objects.

use bytemuck::{Pod, Zeroable};

use super::handles::{
    AttachmentId, BufferHandle, CommandBufferId, DescriptorId, Extent2d, FenceId, FramebufferId,
    SemaphoreId, ShaderId, TextureId,
};
use super::RenderResult;
use crate::ecs::GeometryKind;

/// Pixel format of a render-target attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentFormat {
    /// 8-bit sRGB color (albedo, final targets)
    ColorSrgb,
    /// High-precision color (lighting accumulation, post chain)
    ColorHdr,
    /// Signed-normalized normals
    NormalRgb10,
    /// 32-bit depth
    Depth32,
}

/// Description of an attachment to create
#[derive(Debug, Clone, Copy)]
pub struct AttachmentDesc {
    /// Pixel format
    pub format: AttachmentFormat,
    /// Pixel extent
    pub extent: Extent2d,
    /// Whether later passes sample this attachment as a texture
    pub sampled: bool,
}

/// Where a render pass writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// An offscreen framebuffer
    Offscreen(FramebufferId),
    /// The swap-chain image acquired for this frame
    Swapchain(u32),
}

/// Outcome of a swap-chain image acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` flags a surface that still
    /// works but no longer matches the window exactly
    Acquired {
        /// Index of the acquired swap-chain image
        image_index: u32,
        /// Surface no longer matches the window exactly
        suboptimal: bool,
    },
    /// The surface is stale; nothing was acquired
    OutOfDate,
}

/// Outcome of a present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued for presentation
    Presented {
        /// Surface no longer matches the window exactly
        suboptimal: bool,
    },
    /// The surface is stale; the image was not presented
    OutOfDate,
}

/// Buffer handles returned by the mesh loader collaborator
#[derive(Debug, Clone, Copy)]
pub struct MeshBuffers {
    /// Vertex buffer handle
    pub vertex_buffer: BufferHandle,
    /// Index buffer handle
    pub index_buffer: BufferHandle,
    /// Number of indices in the index buffer
    pub index_count: u32,
    /// Primitive topology of the index stream
    pub geometry: GeometryKind,
}

/// Per-instance record uploaded once per frame slot
///
/// Vertex shading indexes this array with `first_instance + gl_InstanceIndex`
/// to fetch the correct world matrix, which is what lets one instanced
/// draw cover a whole batch run.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceData {
    /// Column-major world matrix
    pub model: [[f32; 4]; 4],
}

/// Graphics device abstraction the frame pipeline records against
///
/// Every `create_*` has a matching `destroy_*`; the resize rebuild and
/// shutdown paths call them in pairs, which the tests verify by count.
pub trait GpuDevice {
    // --- collaborator loaders (opaque ids only) ---

    /// Load a mesh file and return its buffer handles
    fn create_mesh_buffers(&mut self, filepath: &str) -> RenderResult<MeshBuffers>;

    /// Load a texture file and return its id
    fn create_texture(&mut self, filepath: &str) -> RenderResult<TextureId>;

    /// Compile a shader pair and return its pipeline id
    fn create_shader(&mut self, vert_path: &str, frag_path: &str) -> RenderResult<ShaderId>;

    /// Build a descriptor set binding textures to a shader
    fn create_descriptor_set(
        &mut self,
        shader: ShaderId,
        textures: &[TextureId],
    ) -> RenderResult<DescriptorId>;

    /// Build a descriptor set sampling render-target attachments
    ///
    /// Used by the lighting and post passes; recreated whenever the
    /// attachments it references are rebuilt.
    fn create_attachment_descriptor(
        &mut self,
        shader: ShaderId,
        attachments: &[AttachmentId],
    ) -> RenderResult<DescriptorId>;

    /// Destroy a descriptor set
    fn destroy_descriptor_set(&mut self, descriptor: DescriptorId);

    // --- surface and window-extent resources ---

    /// Current surface extent as reported by the window system
    fn surface_extent(&self) -> Extent2d;

    /// Recreate the swap chain at a new extent, returning the image count
    fn recreate_swapchain(&mut self, extent: Extent2d) -> RenderResult<u32>;

    /// Number of swap-chain images
    fn swapchain_image_count(&self) -> u32;

    /// Create a render-target attachment
    fn create_attachment(&mut self, desc: &AttachmentDesc) -> RenderResult<AttachmentId>;

    /// Destroy an attachment
    fn destroy_attachment(&mut self, attachment: AttachmentId);

    /// Create a framebuffer over attachments
    fn create_framebuffer(
        &mut self,
        color: &[AttachmentId],
        depth: Option<AttachmentId>,
        extent: Extent2d,
    ) -> RenderResult<FramebufferId>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    // --- synchronization objects ---

    /// Create a GPU-side ordering semaphore
    fn create_semaphore(&mut self) -> RenderResult<SemaphoreId>;

    /// Destroy a semaphore
    fn destroy_semaphore(&mut self, semaphore: SemaphoreId);

    /// Create a fence, optionally already signaled
    fn create_fence(&mut self, signaled: bool) -> RenderResult<FenceId>;

    /// Destroy a fence
    fn destroy_fence(&mut self, fence: FenceId);

    /// Block until a fence signals or the timeout elapses
    fn wait_fence(&mut self, fence: FenceId, timeout_ns: u64) -> RenderResult<()>;

    /// Reset a signaled fence to unsignaled
    fn reset_fence(&mut self, fence: FenceId) -> RenderResult<()>;

    // --- command buffers and recording ---

    /// Allocate a reusable command buffer
    fn allocate_command_buffer(&mut self) -> RenderResult<CommandBufferId>;

    /// Free a command buffer
    fn free_command_buffer(&mut self, buffer: CommandBufferId);

    /// Begin re-recording a command buffer
    ///
    /// Fails if the buffer is still owned by in-flight GPU work, i.e. the
    /// fence guarding its last submission has not been waited on.
    fn begin_commands(&mut self, buffer: CommandBufferId) -> RenderResult<()>;

    /// Finish recording a command buffer
    fn end_commands(&mut self, buffer: CommandBufferId) -> RenderResult<()>;

    /// Begin a render pass targeting a framebuffer or swap-chain image
    fn begin_pass(
        &mut self,
        buffer: CommandBufferId,
        target: PassTarget,
        label: &'static str,
    ) -> RenderResult<()>;

    /// End the current render pass
    fn end_pass(&mut self, buffer: CommandBufferId) -> RenderResult<()>;

    /// Bind a shader pipeline
    fn bind_pipeline(&mut self, buffer: CommandBufferId, shader: ShaderId) -> RenderResult<()>;

    /// Bind a descriptor set
    fn bind_descriptor_set(
        &mut self,
        buffer: CommandBufferId,
        descriptor: DescriptorId,
    ) -> RenderResult<()>;

    /// Bind a mesh's vertex and index buffers
    fn bind_mesh(
        &mut self,
        buffer: CommandBufferId,
        vertex: BufferHandle,
        index: BufferHandle,
    ) -> RenderResult<()>;

    /// Push a matrix constant (light or camera view-projection)
    fn push_matrix(
        &mut self,
        buffer: CommandBufferId,
        matrix: &[[f32; 4]; 4],
    ) -> RenderResult<()>;

    /// Upload the frame's per-instance records into a frame slot's buffer
    fn upload_instances(&mut self, slot: usize, instances: &[InstanceData]) -> RenderResult<()>;

    /// Record one instanced draw of the currently bound mesh
    fn draw_instanced(
        &mut self,
        buffer: CommandBufferId,
        instance_count: u32,
        first_instance: u32,
    ) -> RenderResult<()>;

    /// Record a full-screen triangle draw (lighting resolve, post passes)
    fn draw_fullscreen(&mut self, buffer: CommandBufferId) -> RenderResult<()>;

    // --- submission and presentation ---

    /// Acquire the next swap-chain image, signaling `signal` when ready
    fn acquire_image(&mut self, signal: SemaphoreId) -> RenderResult<AcquireOutcome>;

    /// Submit a command buffer with semaphore waits/signals and an
    /// optional completion fence
    fn submit(
        &mut self,
        buffer: CommandBufferId,
        waits: &[SemaphoreId],
        signals: &[SemaphoreId],
        fence: Option<FenceId>,
    ) -> RenderResult<()>;

    /// Present a swap-chain image once `wait` signals
    fn present(&mut self, image_index: u32, wait: SemaphoreId) -> RenderResult<PresentOutcome>;

    /// Block until all submitted GPU work completes
    fn wait_idle(&mut self) -> RenderResult<()>;
}
