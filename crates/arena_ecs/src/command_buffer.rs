//! Deferred structural mutation.
//!
//! Systems running inside a parallel stage never mutate the store directly.
//! They record operations into a [`CommandWriter`] tagged with a [`SortKey`],
//! and the buffer plays everything back single-threaded at the next barrier.
//! Batches are applied in ascending sort-key order with ties broken by no
//! one: concurrent writers must hold distinct keys (the executor hands each
//! archetype batch its index), so playback order is independent of thread
//! scheduling and identical on every replay.
//!
//! A recorded operation can target an entity that an earlier batch destroys
//! in the same playback. That is expected during combat (a tower dies while
//! minions still have attacks queued against it); playback logs the stale
//! handle and skips the operation.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::component::{BufferComponent, Component, ComponentTypeId};
use crate::entity::Entity;
use crate::error::StoreError;
use crate::store::{ComponentStore, RawComponent};

/// Deterministic ordering key for a recorded batch.
///
/// Writers recording concurrently must use distinct keys; the executor
/// assigns each parallel work chunk its index so equal keys never race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(pub u32);

enum CommandOp {
    Spawn(Vec<RawComponent>),
    Despawn(Entity),
    Insert {
        entity: Entity,
        component: RawComponent,
    },
    Remove {
        entity: Entity,
        type_id: ComponentTypeId,
    },
    SetEnabled {
        entity: Entity,
        type_id: ComponentTypeId,
        enabled: bool,
    },
    Append {
        entity: Entity,
        append: Box<dyn BufferAppend>,
    },
}

impl std::fmt::Debug for CommandOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(components) => f.debug_tuple("Spawn").field(&components.len()).finish(),
            Self::Despawn(entity) => f.debug_tuple("Despawn").field(entity).finish(),
            Self::Insert { entity, component } => f
                .debug_struct("Insert")
                .field("entity", entity)
                .field("component", component)
                .finish(),
            Self::Remove { entity, type_id } => f
                .debug_struct("Remove")
                .field("entity", entity)
                .field("type_id", type_id)
                .finish(),
            Self::SetEnabled {
                entity,
                type_id,
                enabled,
            } => f
                .debug_struct("SetEnabled")
                .field("entity", entity)
                .field("type_id", type_id)
                .field("enabled", enabled)
                .finish(),
            Self::Append { entity, .. } => {
                f.debug_struct("Append").field("entity", entity).finish()
            }
        }
    }
}

/// A deferred element append, erased over the buffer component type.
trait BufferAppend: Send {
    fn apply(self: Box<Self>, store: &mut ComponentStore, entity: Entity)
    -> Result<(), StoreError>;
}

struct AppendElement<B: BufferComponent> {
    element: B::Element,
}

impl<B: BufferComponent> BufferAppend for AppendElement<B> {
    fn apply(
        self: Box<Self>,
        store: &mut ComponentStore,
        entity: Entity,
    ) -> Result<(), StoreError> {
        store.append::<B>(entity, self.element)
    }
}

#[derive(Debug)]
struct RecordedBatch {
    key: SortKey,
    ops: Vec<CommandOp>,
}

/// Collects batches of deferred operations from any number of writers and
/// plays them back at a barrier.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    batches: Arc<Mutex<Vec<RecordedBatch>>>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a writer for one batch of operations.
    ///
    /// The writer flushes its batch into the buffer when dropped. Writers
    /// used concurrently must hold distinct keys.
    #[must_use]
    pub fn writer(&self, key: SortKey) -> CommandWriter {
        CommandWriter {
            key,
            ops: Vec::new(),
            sink: Arc::clone(&self.batches),
        }
    }

    /// Returns `true` if no operations have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches
            .lock()
            .map(|batches| batches.iter().all(|b| b.ops.is_empty()))
            .unwrap_or(true)
    }

    /// Apply all recorded operations to the store in ascending sort-key
    /// order, preserving each writer's insertion order within a batch.
    ///
    /// Operations whose target entity was destroyed by an earlier operation
    /// are logged and skipped. Returns the number of operations applied.
    pub fn playback(self, store: &mut ComponentStore) -> usize {
        let mut batches = match Arc::try_unwrap(self.batches) {
            Ok(mutex) => mutex.into_inner().unwrap_or_default(),
            Err(shared) => {
                // A writer is still alive; its batch is not yet flushed.
                warn!("command buffer played back while a writer is still open");
                match shared.lock() {
                    Ok(mut guard) => std::mem::take(&mut *guard),
                    Err(_) => Vec::new(),
                }
            }
        };
        batches.sort_by_key(|batch| batch.key);

        let mut applied = 0;
        for batch in batches {
            for op in batch.ops {
                match Self::apply(store, op) {
                    Ok(()) => applied += 1,
                    Err(StoreError::StaleEntity(entity)) => {
                        debug!(%entity, "skipping command against destroyed entity");
                    }
                    Err(error) => {
                        warn!(%error, "skipping unapplicable command");
                    }
                }
            }
        }
        applied
    }

    fn apply(store: &mut ComponentStore, op: CommandOp) -> Result<(), StoreError> {
        match op {
            CommandOp::Spawn(components) => {
                store.spawn_raw(components);
                Ok(())
            }
            CommandOp::Despawn(entity) => store.despawn(entity),
            CommandOp::Insert { entity, component } => store.insert_raw(entity, component),
            CommandOp::Remove { entity, type_id } => store.remove_raw(entity, type_id),
            CommandOp::SetEnabled {
                entity,
                type_id,
                enabled,
            } => store.set_enabled_raw(entity, type_id, enabled),
            CommandOp::Append { entity, append } => append.apply(store, entity),
        }
    }
}

/// Records one batch of deferred operations under a single [`SortKey`].
///
/// Cheap to create per work chunk. Dropping the writer flushes the batch.
pub struct CommandWriter {
    key: SortKey,
    ops: Vec<CommandOp>,
    sink: Arc<Mutex<Vec<RecordedBatch>>>,
}

impl CommandWriter {
    /// Record spawning an entity; components are collected on the returned
    /// builder and the entity is created whole at playback.
    #[must_use]
    pub fn spawn(&mut self) -> SpawnRecord<'_> {
        SpawnRecord {
            writer: self,
            components: Vec::new(),
        }
    }

    /// Record destroying an entity.
    pub fn despawn(&mut self, entity: Entity) {
        self.ops.push(CommandOp::Despawn(entity));
    }

    /// Record attaching (or overwriting) a component.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) {
        self.ops.push(CommandOp::Insert {
            entity,
            component: RawComponent::new(value),
        });
    }

    /// Record detaching a component.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        self.ops.push(CommandOp::Remove {
            entity,
            type_id: ComponentTypeId::of::<T>(),
        });
    }

    /// Record flipping a component's enabled bit.
    pub fn set_enabled<T: Component>(&mut self, entity: Entity, enabled: bool) {
        self.ops.push(CommandOp::SetEnabled {
            entity,
            type_id: ComponentTypeId::of::<T>(),
            enabled,
        });
    }

    /// Record appending one element to a buffer component.
    pub fn append<B: BufferComponent>(&mut self, entity: Entity, element: B::Element) {
        self.ops.push(CommandOp::Append {
            entity,
            append: Box::new(AppendElement::<B> { element }),
        });
    }

    /// Number of operations recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Drop for CommandWriter {
    fn drop(&mut self) {
        if self.ops.is_empty() {
            return;
        }
        let batch = RecordedBatch {
            key: self.key,
            ops: std::mem::take(&mut self.ops),
        };
        if let Ok(mut batches) = self.sink.lock() {
            batches.push(batch);
        }
    }
}

impl std::fmt::Debug for CommandWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWriter")
            .field("key", &self.key)
            .field("ops", &self.ops.len())
            .finish()
    }
}

/// Collects the initial components of a deferred spawn.
pub struct SpawnRecord<'a> {
    writer: &'a mut CommandWriter,
    components: Vec<RawComponent>,
}

impl SpawnRecord<'_> {
    /// Attach an initial component.
    #[must_use]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.components.push(RawComponent::new(value));
        self
    }

    /// Commit the spawn record.
    pub fn finish(self) {
        let Self { writer, components } = self;
        writer.ops.push(CommandOp::Spawn(components));
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Hp(i32);
    impl Component for Hp {
        fn type_name() -> &'static str {
            "Hp"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Team(u8);
    impl Component for Team {
        fn type_name() -> &'static str {
            "Team"
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct PendingDamage(Vec<i32>);
    impl Component for PendingDamage {
        fn type_name() -> &'static str {
            "PendingDamage"
        }
    }
    impl BufferComponent for PendingDamage {
        type Element = i32;
        fn push(&mut self, element: i32) {
            self.0.push(element);
        }
    }

    #[test]
    fn test_deferred_spawn_commits_whole_entity() {
        let mut store = ComponentStore::new();
        let buffer = CommandBuffer::new();
        {
            let mut writer = buffer.writer(SortKey(0));
            writer.spawn().with(Hp(100)).with(Team(1)).finish();
        }
        assert_eq!(store.entity_count(), 0);
        assert_eq!(buffer.playback(&mut store), 1);
        assert_eq!(store.entity_count(), 1);
        let entities = store.entities_with(&[ComponentTypeId::of::<Hp>()]);
        assert_eq!(store.get::<Team>(entities[0]).unwrap(), &Team(1));
    }

    #[test]
    fn test_playback_applies_batches_in_sort_key_order() {
        let mut store = ComponentStore::new();
        let e = store.spawn().with(Hp(0)).finish();

        let buffer = CommandBuffer::new();
        // Recorded high key first; playback must reorder.
        {
            let mut late = buffer.writer(SortKey(7));
            late.insert(e, Hp(2));
        }
        {
            let mut early = buffer.writer(SortKey(3));
            early.insert(e, Hp(1));
        }
        buffer.playback(&mut store);
        assert_eq!(store.get::<Hp>(e).unwrap(), &Hp(2));
    }

    #[test]
    fn test_writer_insertion_order_preserved_within_batch() {
        let mut store = ComponentStore::new();
        let e = store.spawn().with(Hp(0)).finish();

        let buffer = CommandBuffer::new();
        {
            let mut writer = buffer.writer(SortKey(0));
            writer.insert(e, Hp(1));
            writer.insert(e, Hp(2));
            writer.insert(e, Hp(3));
        }
        buffer.playback(&mut store);
        assert_eq!(store.get::<Hp>(e).unwrap(), &Hp(3));
    }

    #[test]
    fn test_command_against_destroyed_entity_is_skipped() {
        let mut store = ComponentStore::new();
        let victim = store.spawn().with(Hp(10)).finish();
        let survivor = store.spawn().with(Hp(20)).finish();

        let buffer = CommandBuffer::new();
        {
            let mut first = buffer.writer(SortKey(0));
            first.despawn(victim);
        }
        {
            let mut second = buffer.writer(SortKey(1));
            second.insert(victim, Hp(99));
            second.insert(survivor, Hp(21));
        }
        let applied = buffer.playback(&mut store);
        // Despawn and the survivor's insert; the stale insert is dropped.
        assert_eq!(applied, 2);
        assert_eq!(store.get::<Hp>(survivor).unwrap(), &Hp(21));
        assert!(!store.contains(victim));
    }

    #[test]
    fn test_deferred_buffer_append() {
        let mut store = ComponentStore::new();
        let e = store.spawn().with(PendingDamage::default()).finish();
        let buffer = CommandBuffer::new();
        {
            let mut writer = buffer.writer(SortKey(0));
            writer.append::<PendingDamage>(e, 30);
            writer.append::<PendingDamage>(e, 45);
        }
        buffer.playback(&mut store);
        assert_eq!(store.get::<PendingDamage>(e).unwrap().0, vec![30, 45]);
    }

    #[test]
    fn test_deferred_enable_toggle_and_remove() {
        let mut store = ComponentStore::new();
        let e = store.spawn().with(Hp(5)).with(Team(0)).finish();
        let buffer = CommandBuffer::new();
        {
            let mut writer = buffer.writer(SortKey(0));
            writer.set_enabled::<Hp>(e, false);
            writer.remove::<Team>(e);
        }
        buffer.playback(&mut store);
        assert!(!store.is_enabled::<Hp>(e).unwrap());
        assert!(!store.has::<Team>(e));
    }

    #[test]
    fn test_replay_from_same_ops_is_deterministic() {
        let run = || {
            let mut store = ComponentStore::new();
            let e = store.spawn().with(Hp(0)).finish();
            let buffer = CommandBuffer::new();
            for key in [4u32, 1, 3, 0, 2] {
                let mut writer = buffer.writer(SortKey(key));
                writer.insert(e, Hp(key as i32));
                writer.spawn().with(Team(key as u8)).finish();
            }
            buffer.playback(&mut store);
            (*store.get::<Hp>(e).unwrap(), store.entity_count())
        };
        assert_eq!(run(), run());
        assert_eq!(run().0, Hp(4));
    }
}
