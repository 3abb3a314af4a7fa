//! World state: entity identity and component storage.
//!
//! Components are schema-described records rather than Rust types, so each
//! component type gets one column mapping entities to their
//! [`ComponentInstance`]. Columns are ordered by entity, which gives every
//! query a stable creation-order iteration.
//!
//! The world applies mutations immediately. Deferring them while a tick is
//! running is the job of the command queue in [`crate::command`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use engine_component::{
    ComponentInstance, ComponentRegistry, ComponentSchema, Entity, EntityAllocator, Signature,
};
use serde_json::Value;

use crate::error::EngineError;

/// Which component types each live entity carries.
#[derive(Debug, Default)]
pub struct EntityIndex {
    entities: BTreeMap<Entity, BTreeSet<String>>,
}

impl EntityIndex {
    /// Returns `true` if `entity` is alive.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Returns `true` if `entity` is alive and carries `component`.
    #[must_use]
    pub fn has(&self, entity: Entity, component: &str) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|types| types.contains(component))
    }

    /// Component type names attached to `entity`, sorted.
    #[must_use]
    pub fn component_names(&self, entity: Entity) -> Option<Vec<&str>> {
        self.entities
            .get(&entity)
            .map(|types| types.iter().map(String::as_str).collect())
    }

    /// Live entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Per-type component columns.
///
/// Every change to a column bumps that type's generation, which lets the
/// query matcher tell whether a cached result is still current.
#[derive(Debug, Default)]
pub struct Storage {
    columns: HashMap<String, BTreeMap<Entity, ComponentInstance>>,
    generations: HashMap<String, u64>,
}

impl Storage {
    fn insert(&mut self, entity: Entity, instance: ComponentInstance) -> Option<ComponentInstance> {
        let ty = instance.type_name().to_string();
        self.bump(&ty);
        self.columns.entry(ty).or_default().insert(entity, instance)
    }

    fn remove(&mut self, entity: Entity, ty: &str) -> Option<ComponentInstance> {
        let removed = self.columns.get_mut(ty)?.remove(&entity);
        if removed.is_some() {
            self.bump(ty);
        }
        removed
    }

    fn bump(&mut self, ty: &str) {
        *self.generations.entry(ty.to_string()).or_insert(0) += 1;
    }

    /// Returns the component of type `ty` attached to `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity, ty: &str) -> Option<&ComponentInstance> {
        self.columns.get(ty)?.get(&entity)
    }

    /// Mutable access to a component's field values.
    pub fn get_mut(&mut self, entity: Entity, ty: &str) -> Option<&mut ComponentInstance> {
        self.columns.get_mut(ty)?.get_mut(&entity)
    }

    /// Change counter for a component type; 0 if the type was never stored.
    #[must_use]
    pub fn generation(&self, ty: &str) -> u64 {
        self.generations.get(ty).copied().unwrap_or(0)
    }

    /// Entities carrying every type in `types`, in creation order.
    ///
    /// Walks the smallest column and probes the others.
    #[must_use]
    pub fn intersect(&self, types: &[String]) -> Vec<Entity> {
        let mut columns = Vec::with_capacity(types.len());
        for ty in types {
            match self.columns.get(ty) {
                Some(column) => columns.push(column),
                None => return Vec::new(),
            }
        }
        columns.sort_by_key(|column| column.len());
        let Some((smallest, rest)) = columns.split_first() else {
            return Vec::new();
        };
        smallest
            .keys()
            .copied()
            .filter(|entity| rest.iter().all(|column| column.contains_key(entity)))
            .collect()
    }

    /// Lift `entity`'s components for `signature` out of their columns, in
    /// signature order, so a system can mutate them while the rest of the
    /// storage stays readable. Returns `None` and leaves storage untouched if
    /// any of them is missing. Generations are not bumped; hand the
    /// instances back with [`Storage::restore`].
    pub(crate) fn take(
        &mut self,
        entity: Entity,
        signature: &Signature,
    ) -> Option<Vec<ComponentInstance>> {
        let present = signature.types().iter().all(|ty| {
            self.columns
                .get(ty)
                .is_some_and(|column| column.contains_key(&entity))
        });
        if !present {
            return None;
        }
        signature
            .types()
            .iter()
            .map(|ty| self.columns.get_mut(ty)?.remove(&entity))
            .collect()
    }

    /// Put back instances lifted by [`Storage::take`].
    pub(crate) fn restore(&mut self, entity: Entity, instances: Vec<ComponentInstance>) {
        for instance in instances {
            self.columns
                .entry(instance.type_name().to_string())
                .or_default()
                .insert(entity, instance);
        }
    }
}

/// One entity's components for a system signature, handed to the system's
/// update function. Mutations through the view are written back to storage
/// once the update returns.
#[derive(Debug)]
pub struct EntityView<'a> {
    entity: Entity,
    signature: &'a Signature,
    components: &'a mut [ComponentInstance],
}

impl<'a> EntityView<'a> {
    pub(crate) fn new(
        entity: Entity,
        signature: &'a Signature,
        components: &'a mut [ComponentInstance],
    ) -> Self {
        Self {
            entity,
            signature,
            components,
        }
    }

    /// The entity being updated.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// The signature this view was built for.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        self.signature
    }

    /// Component at signature position `idx`.
    #[must_use]
    pub fn at(&self, idx: usize) -> Option<&ComponentInstance> {
        self.components.get(idx)
    }

    /// Mutable component at signature position `idx`.
    pub fn at_mut(&mut self, idx: usize) -> Option<&mut ComponentInstance> {
        self.components.get_mut(idx)
    }

    /// Component of type `ty`.
    #[must_use]
    pub fn get(&self, ty: &str) -> Option<&ComponentInstance> {
        self.at(self.signature.position(ty)?)
    }

    /// Mutable component of type `ty`.
    pub fn get_mut(&mut self, ty: &str) -> Option<&mut ComponentInstance> {
        let idx = self.signature.position(ty)?;
        self.at_mut(idx)
    }

    /// Components in signature order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInstance> {
        self.components.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Disjoint borrows of the world, so a context can read the index and the
/// storage while it reserves entity ids and registers schemas.
pub(crate) struct WorldParts<'w> {
    pub allocator: &'w mut EntityAllocator,
    pub index: &'w EntityIndex,
    pub components: &'w mut ComponentRegistry,
    pub storage: &'w mut Storage,
}

/// The entity store: identity, component registry, and component storage.
#[derive(Debug, Default)]
pub struct World {
    allocator: EntityAllocator,
    index: EntityIndex,
    components: ComponentRegistry,
    storage: Storage,
}

impl World {
    /// Create a new empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn split(&mut self) -> WorldParts<'_> {
        WorldParts {
            allocator: &mut self.allocator,
            index: &self.index,
            components: &mut self.components,
            storage: &mut self.storage,
        }
    }

    // -- Schemas --

    /// The component schema registry.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Register or overwrite a component schema.
    pub fn register_schema(&mut self, schema: ComponentSchema) -> Option<ComponentSchema> {
        self.components.register(schema)
    }

    // -- Entity lifecycle --

    /// Allocate a fresh entity with no components.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.index.entities.insert(entity, BTreeSet::new());
        entity
    }

    /// Make a previously reserved id live. Returns `false` if it already was.
    pub(crate) fn spawn_reserved(&mut self, entity: Entity) -> bool {
        if self.index.contains(entity) {
            return false;
        }
        self.index.entities.insert(entity, BTreeSet::new());
        true
    }

    /// Destroy an entity together with all of its components.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), EngineError> {
        let types = self
            .index
            .entities
            .remove(&entity)
            .ok_or(EngineError::UnknownEntity(entity))?;
        for ty in &types {
            self.storage.remove(entity, ty);
        }
        Ok(())
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn exists(&self, entity: Entity) -> bool {
        self.index.contains(entity)
    }

    /// Live entities in creation order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.index.iter().collect()
    }

    /// Return the count of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.index.len()
    }

    /// The entity → component types index.
    #[must_use]
    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    // -- Component operations --

    /// Attach an already materialised component, replacing any previous
    /// instance of the same type. Returns the replaced instance.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive.
    pub fn attach(
        &mut self,
        entity: Entity,
        instance: ComponentInstance,
    ) -> Result<Option<ComponentInstance>, EngineError> {
        let types = self
            .index
            .entities
            .get_mut(&entity)
            .ok_or(EngineError::UnknownEntity(entity))?;
        types.insert(instance.type_name().to_string());
        Ok(self.storage.insert(entity, instance))
    }

    /// Instantiate `component` with `overrides` and attach it to `entity`.
    ///
    /// # Errors
    ///
    /// Fails for a dead entity, an unregistered component, or overrides that
    /// break the component's shape.
    pub fn add_component(
        &mut self,
        entity: Entity,
        component: &str,
        overrides: &Value,
    ) -> Result<(), EngineError> {
        if !self.exists(entity) {
            return Err(EngineError::UnknownEntity(entity));
        }
        let instance = self.components.instantiate(component, overrides)?;
        self.attach(entity, instance)?;
        Ok(())
    }

    /// Detach a component. Removing a component the entity does not carry is
    /// a no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: &str,
    ) -> Result<Option<ComponentInstance>, EngineError> {
        let types = self
            .index
            .entities
            .get_mut(&entity)
            .ok_or(EngineError::UnknownEntity(entity))?;
        if !types.remove(component) {
            return Ok(None);
        }
        Ok(self.storage.remove(entity, component))
    }

    /// Get a component from an entity.
    #[must_use]
    pub fn get_component(&self, entity: Entity, component: &str) -> Option<&ComponentInstance> {
        self.storage.get(entity, component)
    }

    /// Mutable access to a component's field values.
    pub fn get_component_mut(
        &mut self,
        entity: Entity,
        component: &str,
    ) -> Option<&mut ComponentInstance> {
        self.storage.get_mut(entity, component)
    }

    /// Check if an entity has a specific component.
    #[must_use]
    pub fn has_component(&self, entity: Entity, component: &str) -> bool {
        self.index.has(entity, component)
    }

    /// The component storage columns.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    // -- Query --

    /// Entities carrying every type of `signature`, by a full scan of the
    /// index. The query matcher's cached answer must always equal this.
    #[must_use]
    pub fn scan(&self, signature: &Signature) -> Vec<Entity> {
        self.index
            .entities
            .iter()
            .filter(|(_, types)| signature.types().iter().all(|ty| types.contains(ty)))
            .map(|(entity, _)| *entity)
            .collect()
    }
}
