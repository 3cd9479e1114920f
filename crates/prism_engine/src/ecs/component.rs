//! Component data types
//!
//! Plain data associated with entities: mesh geometry handles, material
//! render state, and world transforms. All GPU-facing fields are opaque
//! handles produced by collaborator loaders; the components themselves
//! carry no graphics-API state.

use bitflags::bitflags;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};

use crate::render::handles::{BufferHandle, DescriptorId, ShaderId};

/// Stable small-integer tag identifying a component kind
///
/// Used as the compile-time registry key for typed manager lookup; no
/// runtime type reflection is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentKind {
    /// Mesh geometry handles
    Mesh = 0,
    /// Material render state
    Material = 1,
    /// World transform
    Transform = 2,
}

/// Marker trait for component data
pub trait Component: 'static + Send + Sync {
    /// The stable registry tag for this component kind
    const KIND: ComponentKind;
}

/// Primitive topology of a mesh's index stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryKind {
    /// Indexed triangle list
    #[default]
    Triangles,
    /// Indexed line list (debug geometry)
    Lines,
}

/// Mesh component: geometry buffer handles plus topology
#[derive(Debug, Clone, Copy)]
pub struct MeshComponent {
    /// Vertex buffer handle, or [`BufferHandle::NONE`]
    pub vertex_buffer: BufferHandle,
    /// Index buffer handle, or [`BufferHandle::NONE`]
    pub index_buffer: BufferHandle,
    /// Number of indices to draw
    pub index_count: u32,
    /// Primitive topology
    pub geometry: GeometryKind,
}

impl MeshComponent {
    /// A mesh with no geometry; contributes nothing to any pass
    pub const EMPTY: Self = Self {
        vertex_buffer: BufferHandle::NONE,
        index_buffer: BufferHandle::NONE,
        index_count: 0,
        geometry: GeometryKind::Triangles,
    };

    /// Whether this mesh has real geometry to draw
    pub fn has_geometry(&self) -> bool {
        self.vertex_buffer.is_some() && self.index_buffer.is_some()
    }
}

impl Component for MeshComponent {
    const KIND: ComponentKind = ComponentKind::Mesh;
}

bitflags! {
    /// Capability bits of a material
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaterialCapabilities: u8 {
        /// Geometry using this material is drawn into the shadow map
        const CASTS_SHADOWS = 1 << 0;
        /// Lighting samples the shadow map for this material
        const RECEIVES_SHADOWS = 1 << 1;
    }
}

/// Render layer a material belongs to
///
/// Opaque geometry goes through the deferred path; translucent geometry
/// is forward-shaded after lighting resolve. A layer change always
/// terminates a draw batch, even between key-identical entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderLayer {
    /// Deferred-shaded, depth-tested geometry
    #[default]
    Opaque,
    /// Forward-shaded, blended geometry, drawn back-to-front
    Translucent,
}

/// Material component: render layer, shader state handles, capabilities
#[derive(Debug, Clone, Copy)]
pub struct MaterialComponent {
    /// Which layer this material renders in
    pub layer: RenderLayer,
    /// Shader pipeline handle
    pub shader: ShaderId,
    /// Descriptor set handle
    pub descriptor: DescriptorId,
    /// Capability bitmask
    pub capabilities: MaterialCapabilities,
}

impl MaterialComponent {
    /// An opaque material with the given shader state and all capabilities
    pub fn opaque(shader: ShaderId, descriptor: DescriptorId) -> Self {
        Self {
            layer: RenderLayer::Opaque,
            shader,
            descriptor,
            capabilities: MaterialCapabilities::all(),
        }
    }

    /// A translucent material; translucent geometry never casts shadows
    pub fn translucent(shader: ShaderId, descriptor: DescriptorId) -> Self {
        Self {
            layer: RenderLayer::Translucent,
            shader,
            descriptor,
            capabilities: MaterialCapabilities::RECEIVES_SHADOWS,
        }
    }

    /// Whether this material is drawn into the shadow map
    pub fn casts_shadows(&self) -> bool {
        self.capabilities
            .contains(MaterialCapabilities::CASTS_SHADOWS)
    }
}

impl Component for MaterialComponent {
    const KIND: ComponentKind = ComponentKind::Material;
}

/// Transform component: TRS plus the cached composed matrix
///
/// The matrix is recomposed eagerly on every mutation, so the render
/// phase can read it without any per-frame recompute pass.
#[derive(Debug, Clone, Copy)]
pub struct TransformComponent {
    translation: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    scale: Vector3<f32>,
    matrix: Matrix4<f32>,
}

impl TransformComponent {
    /// Identity transform
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            matrix: Matrix4::identity(),
        }
    }

    /// Build a transform from translation, rotation, and scale
    pub fn new(
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        let mut transform = Self {
            translation,
            rotation,
            scale,
            matrix: Matrix4::identity(),
        };
        transform.recompose();
        transform
    }

    /// Set the translation
    pub fn set_translation(&mut self, translation: Vector3<f32>) {
        self.translation = translation;
        self.recompose();
    }

    /// Set the rotation
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rotation = rotation;
        self.recompose();
    }

    /// Set the scale
    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.recompose();
    }

    /// Current translation
    pub fn translation(&self) -> Vector3<f32> {
        self.translation
    }

    /// Current rotation
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    /// Current scale
    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    /// The cached composed world matrix
    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    fn recompose(&mut self) {
        self.matrix = Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale);
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::identity()
    }
}

impl Component for TransformComponent {
    const KIND: ComponentKind = ComponentKind::Transform;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mesh_without_geometry() {
        assert!(!MeshComponent::EMPTY.has_geometry());
        let mesh = MeshComponent {
            vertex_buffer: BufferHandle(0),
            index_buffer: BufferHandle(1),
            index_count: 36,
            geometry: GeometryKind::Triangles,
        };
        assert!(mesh.has_geometry());
    }

    #[test]
    fn test_material_capabilities() {
        let opaque = MaterialComponent::opaque(ShaderId(0), DescriptorId(0));
        assert!(opaque.casts_shadows());
        let glass = MaterialComponent::translucent(ShaderId(1), DescriptorId(1));
        assert!(!glass.casts_shadows());
        assert!(glass
            .capabilities
            .contains(MaterialCapabilities::RECEIVES_SHADOWS));
    }

    #[test]
    fn test_transform_matrix_cache_follows_mutation() {
        let mut transform = TransformComponent::identity();
        transform.set_translation(Vector3::new(1.0, 2.0, 3.0));
        let m = transform.matrix();
        assert_relative_eq!(m[(0, 3)], 1.0);
        assert_relative_eq!(m[(1, 3)], 2.0);
        assert_relative_eq!(m[(2, 3)], 3.0);

        transform.set_scale(Vector3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(transform.matrix()[(0, 0)], 2.0);
        // Translation survives the recompose.
        assert_relative_eq!(transform.matrix()[(0, 3)], 1.0);
    }
}
