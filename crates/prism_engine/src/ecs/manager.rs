//! Typed component managers and the compile-time registry
//!
//! [`ComponentManager`] is the scene layer's façade over a
//! [`SparseSet`]; [`Components`] bundles one manager per component kind
//! and resolves "the manager for type `T`" statically through the
//! [`ComponentStore`] trait instead of any runtime type lookup.

use super::component::{
    Component, ComponentKind, MaterialComponent, MeshComponent, TransformComponent,
};
use super::entity::Entity;
use super::sparse_set::SparseSet;
use super::EcsResult;

/// Typed façade over a sparse set, exposed to the scene layer
#[derive(Debug)]
pub struct ComponentManager<T: Component> {
    set: SparseSet<T>,
}

impl<T: Component> ComponentManager<T> {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            set: SparseSet::new(),
        }
    }

    /// The registry tag of the component type this manager stores
    pub fn kind(&self) -> ComponentKind {
        T::KIND
    }

    /// Attach a new component to an entity
    pub fn add_new_component(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        log::trace!("entity {} gained a {:?} component", entity.id(), T::KIND);
        self.set.add(entity, value)
    }

    /// Overwrite an entity's component in place
    pub fn set_component(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        self.set.set(entity, value)
    }

    /// Read an entity's component
    pub fn get_component(&self, entity: Entity) -> EcsResult<&T> {
        self.set.get(entity)
    }

    /// Mutate an entity's component
    pub fn get_component_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.set.get_mut(entity)
    }

    /// Detach an entity's component
    pub fn remove_component(&mut self, entity: Entity) -> EcsResult<()> {
        self.set.remove(entity)
    }

    /// Whether the entity has this component
    pub fn has_component(&self, entity: Entity) -> bool {
        self.set.contains(entity)
    }

    /// Number of live components
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether no components are stored
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// The current component stream, hole-free and contiguous
    pub fn components(&self) -> &[T] {
        self.set.as_slice()
    }

    /// Mutable iteration over the component stream
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.set.iter_mut()
    }

    /// Entity ids parallel to [`ComponentManager::components`]
    pub fn entities(&self) -> impl Iterator<Item = u32> + '_ {
        self.set.entities()
    }
}

// Derived `Default` would demand `T: Default`, which component types
// like meshes and materials deliberately do not implement.
impl<T: Component> Default for ComponentManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statically resolves the manager owning components of type `T`
pub trait ComponentStore<T: Component> {
    /// The manager for `T`
    fn store(&self) -> &ComponentManager<T>;
    /// The manager for `T`, mutably
    fn store_mut(&mut self) -> &mut ComponentManager<T>;
}

/// One manager per component kind
///
/// Mutated only by the single-threaded scene/update phase and read only
/// by the render phase of the same tick, never concurrently.
#[derive(Debug, Default)]
pub struct Components {
    meshes: ComponentManager<MeshComponent>,
    materials: ComponentManager<MaterialComponent>,
    transforms: ComponentManager<TransformComponent>,
}

impl Components {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a component of any registered kind
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()>
    where
        Self: ComponentStore<T>,
    {
        self.store_mut().add_new_component(entity, value)
    }

    /// Read a component of any registered kind
    pub fn get_component<T: Component>(&self, entity: Entity) -> EcsResult<&T>
    where
        Self: ComponentStore<T>,
    {
        self.store().get_component(entity)
    }

    /// Overwrite a component of any registered kind
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()>
    where
        Self: ComponentStore<T>,
    {
        self.store_mut().set_component(entity, value)
    }

    /// Remove all components attached to an entity
    ///
    /// Called before the entity id is recycled so a reused id never
    /// aliases stale component data.
    pub fn remove_all(&mut self, entity: Entity) {
        let _ = self.meshes.remove_component(entity);
        let _ = self.materials.remove_component(entity);
        let _ = self.transforms.remove_component(entity);
    }

    /// The mesh manager
    pub fn meshes(&self) -> &ComponentManager<MeshComponent> {
        &self.meshes
    }

    /// The material manager
    pub fn materials(&self) -> &ComponentManager<MaterialComponent> {
        &self.materials
    }

    /// The transform manager
    pub fn transforms(&self) -> &ComponentManager<TransformComponent> {
        &self.transforms
    }

    /// The transform manager, mutably
    pub fn transforms_mut(&mut self) -> &mut ComponentManager<TransformComponent> {
        &mut self.transforms
    }
}

impl ComponentStore<MeshComponent> for Components {
    fn store(&self) -> &ComponentManager<MeshComponent> {
        &self.meshes
    }
    fn store_mut(&mut self) -> &mut ComponentManager<MeshComponent> {
        &mut self.meshes
    }
}

impl ComponentStore<MaterialComponent> for Components {
    fn store(&self) -> &ComponentManager<MaterialComponent> {
        &self.materials
    }
    fn store_mut(&mut self) -> &mut ComponentManager<MaterialComponent> {
        &mut self.materials
    }
}

impl ComponentStore<TransformComponent> for Components {
    fn store(&self) -> &ComponentManager<TransformComponent> {
        &self.transforms
    }
    fn store_mut(&mut self) -> &mut ComponentManager<TransformComponent> {
        &mut self.transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EcsError;
    use crate::ecs::EntityManager;
    use nalgebra::Vector3;

    #[test]
    fn test_default_construction_without_component_defaults() {
        // Mesh and material components have no `Default`; the managers
        // and the registry must still construct empty.
        let manager = ComponentManager::<MaterialComponent>::default();
        assert!(manager.is_empty());
        let components = Components::default();
        assert!(components.meshes().is_empty());
        assert!(components.materials().is_empty());
        assert!(components.transforms().is_empty());
    }

    #[test]
    fn test_managers_report_their_registry_tag() {
        let components = Components::new();
        assert_eq!(components.meshes().kind(), ComponentKind::Mesh);
        assert_eq!(components.materials().kind(), ComponentKind::Material);
        assert_eq!(components.transforms().kind(), ComponentKind::Transform);
    }

    #[test]
    fn test_typed_store_resolution() {
        let mut entities = EntityManager::new();
        let mut components = Components::new();
        let e = entities.create();

        components
            .add_component(e, TransformComponent::identity())
            .unwrap();
        components.add_component(e, MeshComponent::EMPTY).unwrap();

        assert!(components.get_component::<TransformComponent>(e).is_ok());
        assert!(components.get_component::<MeshComponent>(e).is_ok());
        assert!(matches!(
            components.get_component::<MaterialComponent>(e),
            Err(EcsError::NotFound(_) | EcsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_set_component_updates_stream() {
        let mut entities = EntityManager::new();
        let mut components = Components::new();
        let e = entities.create();

        components
            .add_component(e, TransformComponent::identity())
            .unwrap();
        let mut moved = TransformComponent::identity();
        moved.set_translation(Vector3::new(4.0, 0.0, 0.0));
        components.set_component(e, moved).unwrap();

        let stream = components.transforms().components();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].translation().x, 4.0);
    }

    #[test]
    fn test_remove_all_clears_every_kind() {
        let mut entities = EntityManager::new();
        let mut components = Components::new();
        let e = entities.create();
        components.add_component(e, MeshComponent::EMPTY).unwrap();
        components
            .add_component(e, TransformComponent::identity())
            .unwrap();

        components.remove_all(e);
        assert!(components.meshes().is_empty());
        assert!(components.transforms().is_empty());
    }
}
