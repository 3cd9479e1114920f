//! Opaque handles for collaborator-owned GPU objects
//!
//! Everything the engine consumes from loaders and the graphics device
//! is an integer id. The engine never dereferences these; it only passes
//! them back across the [`GpuDevice`](crate::render::GpuDevice) seam.

use serde::{Deserialize, Serialize};

/// Handle to a vertex or index buffer owned by the device
///
/// `-1` means "no geometry"; a mesh component carrying two such handles
/// contributes nothing to any pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub i32);

impl BufferHandle {
    /// The "no geometry" sentinel
    pub const NONE: Self = Self(-1);

    /// Whether this handle refers to a real buffer
    pub fn is_some(self) -> bool {
        self.0 >= 0
    }
}

/// Handle to a texture created by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle to a compiled shader pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Handle to a descriptor set binding textures/uniforms to a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub u32);

/// Handle to a render-target attachment image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentId(pub u32);

/// Handle to a framebuffer combining attachments at one extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Handle to a GPU-side ordering semaphore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreId(pub u32);

/// Handle to a CPU-visible completion fence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub u32);

/// Handle to a reusable command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u32);

/// A 2D pixel extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent2d {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Extent2d {
    /// Construct an extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero extent; nothing can be rendered
    /// until it becomes non-zero again.
    pub fn is_zero(self) -> bool {
        self.width == 0 || self.height == 0
    }
}
