//! Entity-Component storage
//!
//! Sparse-set backed component storage with O(1) add/remove/lookup and
//! hole-free dense iteration, typed managers over it, and entity id
//! recycling. This layer feeds the render pipeline its per-frame
//! component streams.

pub mod component;
pub mod entity;
pub mod manager;
pub mod sparse_set;

pub use component::{
    Component, ComponentKind, GeometryKind, MaterialCapabilities, MaterialComponent,
    MeshComponent, RenderLayer, TransformComponent,
};
pub use entity::{Entity, EntityManager};
pub use manager::{ComponentManager, ComponentStore, Components};
pub use sparse_set::SparseSet;

/// Result type for storage operations
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors from component storage access
///
/// These are programmer/index errors: silent continuation would corrupt
/// the dense-array invariant every downstream pass relies on, so they
/// always fail fast.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EcsError {
    /// The entity has no component in this set
    #[error("entity {0} has no component in this set")]
    NotFound(u32),

    /// The entity id is outside the indirection table or maps past the
    /// dense region
    #[error("entity {0} is out of range for this set")]
    OutOfRange(u32),

    /// The entity already has a component in this set
    #[error("entity {0} already has a component in this set")]
    AlreadyPresent(u32),
}
