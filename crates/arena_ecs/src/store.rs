//! The component store.
//!
//! [`ComponentStore`] owns all entity and component state for one world:
//! entity allocation, archetype tables, and the entity → (archetype, row)
//! location map. Archetype tables live in a `BTreeMap` so iteration order is
//! deterministic, which replay determinism depends on.
//!
//! Structural changes (spawn, despawn, insert, remove) move entities between
//! archetype tables and invalidate previously obtained references; concurrent
//! code must never perform them directly and instead records them into a
//! [`CommandBuffer`](crate::CommandBuffer) for playback at a barrier.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::archetype::{ArchetypeId, ArchetypeTable};
use crate::component::{BufferComponent, Component, ComponentMeta, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator};
use crate::error::StoreError;

/// A type-erased component value: metadata plus the raw bytes of one
/// instance.
///
/// Ownership semantics: the bytes hold a live value until they are written
/// into a column; if the `RawComponent` is dropped beforehand, the value is
/// dropped in place.
pub struct RawComponent {
    meta: ComponentMeta,
    bytes: Option<Vec<u8>>,
}

impl RawComponent {
    /// Capture a typed value into its raw representation.
    #[must_use]
    pub fn new<T: Component>(value: T) -> Self {
        let meta = T::meta();
        let mut bytes = vec![0u8; std::mem::size_of::<T>()];
        // SAFETY: The buffer is exactly sized for one `T`; ownership of
        // `value` moves into it.
        unsafe {
            std::ptr::write(bytes.as_mut_ptr() as *mut T, value);
        }
        Self {
            meta,
            bytes: Some(bytes),
        }
    }

    /// The component type this value belongs to.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.meta.type_id
    }

    fn into_parts(mut self) -> (ComponentMeta, Vec<u8>) {
        let bytes = self.bytes.take().unwrap_or_default();
        (self.meta, bytes)
    }
}

impl Drop for RawComponent {
    fn drop(&mut self) {
        if let Some(mut bytes) = self.bytes.take()
            && let Some(drop_fn) = self.meta.drop_fn
        {
            // SAFETY: The bytes still hold the captured value.
            unsafe { drop_fn(bytes.as_mut_ptr()) };
        }
    }
}

impl std::fmt::Debug for RawComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawComponent")
            .field("type", &self.meta.name)
            .finish()
    }
}

/// Where an entity's row lives.
#[derive(Debug, Clone, Copy)]
struct EntityLocation {
    archetype: ArchetypeId,
    row: usize,
}

/// Entity-component storage grouped by archetype.
#[derive(Debug, Default)]
pub struct ComponentStore {
    allocator: EntityAllocator,
    archetypes: BTreeMap<ArchetypeId, ArchetypeTable>,
    by_types: HashMap<BTreeSet<ComponentTypeId>, ArchetypeId>,
    locations: HashMap<Entity, EntityLocation>,
    metas: HashMap<ComponentTypeId, ComponentMeta>,
}

impl ComponentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin spawning an entity.
    ///
    /// The entity becomes visible to queries only when
    /// [`EntityBuilder::finish`] commits all initial components at once, so
    /// iteration never observes a partially constructed entity.
    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        EntityBuilder {
            store: self,
            components: Vec::new(),
        }
    }

    /// Spawn an entity from type-erased components (command-buffer playback
    /// path).
    pub fn spawn_raw(&mut self, components: Vec<RawComponent>) -> Entity {
        // Set semantics: a later duplicate of the same type wins.
        let mut by_type: BTreeMap<ComponentTypeId, RawComponent> = BTreeMap::new();
        for component in components {
            self.metas
                .entry(component.type_id())
                .or_insert(component.meta);
            by_type.insert(component.type_id(), component);
        }

        let type_set: BTreeSet<ComponentTypeId> = by_type.keys().copied().collect();
        let archetype_id = self.get_or_create_archetype(&type_set);
        let entity = self.allocator.allocate();

        let table = self
            .archetypes
            .get_mut(&archetype_id)
            .expect("archetype was just created");
        // BTreeMap iteration matches the table's sorted column order.
        for (column, (_, component)) in table.columns.iter_mut().zip(by_type) {
            let (_, bytes) = component.into_parts();
            column.push_raw(&bytes);
        }
        table.entities.push(entity);
        let row = table.len() - 1;
        self.locations.insert(
            entity,
            EntityLocation {
                archetype: archetype_id,
                row,
            },
        );
        entity
    }

    /// Destroy an entity, dropping all its components.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] if the handle is stale.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.validate(entity)?;
        let location = self
            .locations
            .remove(&entity)
            .ok_or(StoreError::StaleEntity(entity))?;
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");
        for column in &mut table.columns {
            column.swap_remove_drop(location.row);
        }
        table.entities.swap_remove(location.row);
        if let Some(&moved) = table.entities.get(location.row) {
            self.locations
                .insert(moved, EntityLocation { row: location.row, ..location });
        }
        self.allocator.free(entity);
        Ok(())
    }

    /// Validate that the handle still refers to a live entity.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] if it does not.
    pub fn validate(&self, entity: Entity) -> Result<(), StoreError> {
        if self.allocator.is_live(entity) {
            Ok(())
        } else {
            Err(StoreError::StaleEntity(entity))
        }
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.allocator.is_live(entity)
    }

    /// Returns `true` if the entity is live and carries `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.location_and_column::<T>(entity).is_ok()
    }

    /// Immutable access to an entity's `T`.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] or [`StoreError::MissingComponent`].
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        let (location, column_index) = self.location_and_column::<T>(entity)?;
        let table = &self.archetypes[&location.archetype];
        // SAFETY: The column was selected by `T`'s type id, so the stored
        // type matches.
        Ok(unsafe { table.columns[column_index].get::<T>(location.row) }
            .expect("row is in bounds for a live entity"))
    }

    /// Mutable access to an entity's `T`.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] or [`StoreError::MissingComponent`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        let (location, column_index) = self.location_and_column::<T>(entity)?;
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");
        // SAFETY: The column was selected by `T`'s type id.
        Ok(unsafe { table.columns[column_index].get_mut::<T>(location.row) }
            .expect("row is in bounds for a live entity"))
    }

    /// Append one element to an entity's buffer component.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] or [`StoreError::MissingComponent`].
    pub fn append<B: BufferComponent>(
        &mut self,
        entity: Entity,
        element: B::Element,
    ) -> Result<(), StoreError> {
        self.get_mut::<B>(entity)?.push(element);
        Ok(())
    }

    /// The enabled bit of an entity's `T`.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] or [`StoreError::MissingComponent`].
    pub fn is_enabled<T: Component>(&self, entity: Entity) -> Result<bool, StoreError> {
        let (location, column_index) = self.location_and_column::<T>(entity)?;
        let table = &self.archetypes[&location.archetype];
        Ok(table.columns[column_index].is_enabled(location.row))
    }

    /// Set the enabled bit of an entity's `T`.
    ///
    /// Flipping the bit is a value mutation, not a structural one — the
    /// entity stays in its archetype.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] or [`StoreError::MissingComponent`].
    pub fn set_enabled<T: Component>(
        &mut self,
        entity: Entity,
        enabled: bool,
    ) -> Result<(), StoreError> {
        let (location, column_index) = self.location_and_column::<T>(entity)?;
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");
        table.columns[column_index].set_enabled(location.row, enabled);
        Ok(())
    }

    /// Type-erased [`set_enabled`](Self::set_enabled) (command-buffer
    /// playback path).
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`], [`StoreError::UnregisteredType`], or
    /// [`StoreError::MissingComponent`].
    pub fn set_enabled_raw(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        enabled: bool,
    ) -> Result<(), StoreError> {
        self.validate(entity)?;
        let meta = *self
            .metas
            .get(&type_id)
            .ok_or(StoreError::UnregisteredType(type_id))?;
        let location = self.locations[&entity];
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");
        let column_index =
            table
                .column_index(type_id)
                .ok_or(StoreError::MissingComponent {
                    entity,
                    name: meta.name,
                })?;
        table.columns[column_index].set_enabled(location.row, enabled);
        Ok(())
    }

    /// Attach or overwrite a component on an entity.
    ///
    /// If the entity already carries the type, the value is overwritten in
    /// place; otherwise the entity moves to the archetype for its new
    /// component set.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] if the handle is stale.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), StoreError> {
        self.insert_raw(entity, RawComponent::new(value))
    }

    /// Type-erased [`insert`](Self::insert) (command-buffer playback path).
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] if the handle is stale.
    pub fn insert_raw(
        &mut self,
        entity: Entity,
        component: RawComponent,
    ) -> Result<(), StoreError> {
        self.validate(entity)?;
        self.metas
            .entry(component.type_id())
            .or_insert(component.meta);
        let location = self.locations[&entity];
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");

        if let Some(column_index) = table.column_index(component.type_id()) {
            // Overwrite in place.
            let column = &mut table.columns[column_index];
            let (meta, bytes) = component.into_parts();
            if let Some(drop_fn) = meta.drop_fn
                && let Some(old) = column.get_raw_mut(location.row)
            {
                // SAFETY: The row holds a valid instance being replaced.
                unsafe { drop_fn(old.as_mut_ptr()) };
            }
            column
                .get_raw_mut(location.row)
                .expect("row is in bounds for a live entity")
                .copy_from_slice(&bytes);
            return Ok(());
        }

        // Archetype move: old components plus the new one.
        let mut new_types = table.component_types.clone();
        new_types.insert(component.type_id());
        let mut parts = self.detach_row(entity, location);
        parts.push((component.type_id(), {
            let (_, bytes) = component.into_parts();
            (bytes, true)
        }));
        self.attach_row(entity, &new_types, parts);
        Ok(())
    }

    /// Detach a component from an entity, dropping its value.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] or [`StoreError::MissingComponent`].
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.remove_raw(entity, ComponentTypeId::of::<T>())
    }

    /// Type-erased [`remove`](Self::remove).
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`], [`StoreError::MissingComponent`], or
    /// [`StoreError::UnregisteredType`].
    pub fn remove_raw(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<(), StoreError> {
        self.validate(entity)?;
        let meta = *self
            .metas
            .get(&type_id)
            .ok_or(StoreError::UnregisteredType(type_id))?;
        let location = self.locations[&entity];
        let table = &self.archetypes[&location.archetype];
        if !table.has_component(type_id) {
            return Err(StoreError::MissingComponent {
                entity,
                name: meta.name,
            });
        }

        let mut new_types = table.component_types.clone();
        new_types.remove(&type_id);
        let mut parts = self.detach_row(entity, location);
        if let Some(pos) = parts.iter().position(|(tid, _)| *tid == type_id) {
            let (_, (mut bytes, _)) = parts.swap_remove(pos);
            if let Some(drop_fn) = meta.drop_fn {
                // SAFETY: The detached bytes hold the removed value.
                unsafe { drop_fn(bytes.as_mut_ptr()) };
            }
        }
        self.attach_row(entity, &new_types, parts);
        Ok(())
    }

    /// All live entities whose archetype contains every listed type, batched
    /// by archetype table in deterministic order.
    #[must_use]
    pub fn entities_with(&self, types: &[ComponentTypeId]) -> Vec<Entity> {
        let mut matched = Vec::new();
        for table in self.archetypes.values() {
            if types.iter().all(|&ty| table.has_component(ty)) {
                matched.extend_from_slice(&table.entities);
            }
        }
        matched
    }

    /// Raw storage bytes of one component instance (replication snapshot
    /// path).
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`], [`StoreError::UnregisteredType`], or
    /// [`StoreError::MissingComponent`].
    pub fn component_bytes(
        &self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<&[u8], StoreError> {
        self.validate(entity)?;
        let meta = self
            .metas
            .get(&type_id)
            .ok_or(StoreError::UnregisteredType(type_id))?;
        let location = self.locations[&entity];
        let table = &self.archetypes[&location.archetype];
        let column_index =
            table
                .column_index(type_id)
                .ok_or(StoreError::MissingComponent {
                    entity,
                    name: meta.name,
                })?;
        Ok(table.columns[column_index]
            .get_raw(location.row)
            .expect("row is in bounds for a live entity"))
    }

    /// Overwrite one component instance from raw storage bytes (replication
    /// correction path). The previous value is dropped.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`], [`StoreError::UnregisteredType`], or
    /// [`StoreError::MissingComponent`].
    pub fn overwrite_component_bytes(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        raw: &[u8],
    ) -> Result<(), StoreError> {
        self.validate(entity)?;
        let meta = *self
            .metas
            .get(&type_id)
            .ok_or(StoreError::UnregisteredType(type_id))?;
        let location = self.locations[&entity];
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");
        let column_index =
            table
                .column_index(type_id)
                .ok_or(StoreError::MissingComponent {
                    entity,
                    name: meta.name,
                })?;
        let row = table.columns[column_index]
            .get_raw_mut(location.row)
            .expect("row is in bounds for a live entity");
        if let Some(drop_fn) = meta.drop_fn {
            // SAFETY: The row holds a valid instance being replaced.
            unsafe { drop_fn(row.as_mut_ptr()) };
        }
        row.copy_from_slice(raw);
        Ok(())
    }

    /// Metadata for a registered component type.
    #[must_use]
    pub fn meta_of(&self, type_id: ComponentTypeId) -> Option<&ComponentMeta> {
        self.metas.get(&type_id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    /// Number of archetype tables.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // -- internals --

    fn location_and_column<T: Component>(
        &self,
        entity: Entity,
    ) -> Result<(EntityLocation, usize), StoreError> {
        self.validate(entity)?;
        let location = self.locations[&entity];
        let table = &self.archetypes[&location.archetype];
        let column_index = table.column_index(ComponentTypeId::of::<T>()).ok_or(
            StoreError::MissingComponent {
                entity,
                name: T::type_name(),
            },
        )?;
        Ok((location, column_index))
    }

    fn get_or_create_archetype(&mut self, types: &BTreeSet<ComponentTypeId>) -> ArchetypeId {
        if let Some(&id) = self.by_types.get(types) {
            return id;
        }
        let metas: Vec<ComponentMeta> = types
            .iter()
            .map(|ty| {
                *self
                    .metas
                    .get(ty)
                    .expect("all types in the set were registered by the caller")
            })
            .collect();
        let table = ArchetypeTable::new(metas);
        let id = table.id;
        self.archetypes.insert(id, table);
        self.by_types.insert(types.clone(), id);
        id
    }

    /// Pull an entity's row out of its table without dropping any values,
    /// returning (type, bytes, enabled) per component and fixing up the
    /// swapped entity's location.
    fn detach_row(
        &mut self,
        entity: Entity,
        location: EntityLocation,
    ) -> Vec<(ComponentTypeId, (Vec<u8>, bool))> {
        let table = self
            .archetypes
            .get_mut(&location.archetype)
            .expect("location refers to an existing archetype");
        let mut parts = Vec::with_capacity(table.columns.len());
        for column in &mut table.columns {
            let type_id = column.meta.type_id;
            let part = column
                .swap_remove_raw(location.row)
                .expect("row is in bounds for a live entity");
            parts.push((type_id, part));
        }
        table.entities.swap_remove(location.row);
        if let Some(&moved) = table.entities.get(location.row) {
            self.locations.insert(
                moved,
                EntityLocation {
                    archetype: location.archetype,
                    row: location.row,
                },
            );
        }
        parts
    }

    /// Push detached component parts into the archetype for `types`,
    /// preserving each row's enabled bit, and record the new location.
    fn attach_row(
        &mut self,
        entity: Entity,
        types: &BTreeSet<ComponentTypeId>,
        parts: Vec<(ComponentTypeId, (Vec<u8>, bool))>,
    ) {
        let archetype_id = self.get_or_create_archetype(types);
        let by_type: BTreeMap<ComponentTypeId, (Vec<u8>, bool)> = parts.into_iter().collect();
        let table = self
            .archetypes
            .get_mut(&archetype_id)
            .expect("archetype was just created");
        for (column, (_, (bytes, enabled))) in table.columns.iter_mut().zip(by_type) {
            column.push_raw(&bytes);
            column.set_last_enabled(enabled);
        }
        table.entities.push(entity);
        let row = table.len() - 1;
        self.locations.insert(
            entity,
            EntityLocation {
                archetype: archetype_id,
                row,
            },
        );
    }
}

/// Collects an entity's initial components and commits them atomically.
pub struct EntityBuilder<'a> {
    store: &'a mut ComponentStore,
    components: Vec<RawComponent>,
}

impl EntityBuilder<'_> {
    /// Attach an initial component.
    #[must_use]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.components.push(RawComponent::new(value));
        self
    }

    /// Commit the entity with all collected components.
    pub fn finish(self) -> Entity {
        let Self { store, components } = self;
        store.spawn_raw(components)
    }
}
