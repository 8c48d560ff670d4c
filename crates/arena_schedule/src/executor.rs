//! Schedule execution.
//!
//! A [`Schedule`] owns the registered systems and the stage assignment
//! computed at build time. Each step it runs stages in order: parallel
//! systems fan out over rayon workers against a read-only store view and
//! record mutations into a shared command buffer, which plays back at the
//! stage's merge barrier; exclusive systems run alone with mutable store
//! access.

use arena_clock::Tick;
use arena_ecs::{CommandBuffer, CommandWriter, ComponentStore, SortKey};
use rayon::prelude::*;
use tracing::trace;

use crate::access::SystemAccess;
use crate::error::ScheduleError;
use crate::stage::{Stage, SystemKind, SystemSpec, compute_stages, validate};

/// Sort keys are partitioned per system: the high half identifies the
/// system, the low half the work chunk within it.
const CHUNK_KEY_BITS: u32 = 16;

/// A system that runs on worker threads.
///
/// The body sees an immutable store and the current tick; every mutation is
/// recorded through the context's command writers and becomes visible at the
/// stage barrier.
pub trait ParallelSystem: Send + Sync {
    /// Stable system name, used in stage logs.
    fn name(&self) -> &'static str;

    /// Declared data access, checked at schedule build.
    fn access(&self) -> SystemAccess;

    /// Execute one step.
    fn run(&self, ctx: &SystemContext<'_>);
}

/// A system that runs alone with mutable store access.
pub trait ExclusiveSystem: Send {
    /// Stable system name, used in stage logs.
    fn name(&self) -> &'static str;

    /// Declared data access, checked at schedule build.
    fn access(&self) -> SystemAccess {
        SystemAccess::new()
    }

    /// Execute one step.
    fn run(&mut self, store: &mut ComponentStore, tick: Tick);
}

/// Per-system execution context handed to parallel bodies.
pub struct SystemContext<'a> {
    store: &'a ComponentStore,
    tick: Tick,
    buffer: &'a CommandBuffer,
    base_key: u32,
}

impl<'a> SystemContext<'a> {
    /// Read-only view of the store.
    #[must_use]
    pub fn store(&self) -> &'a ComponentStore {
        self.store
    }

    /// The tick being simulated.
    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// A command writer for single-threaded parts of the body.
    #[must_use]
    pub fn commands(&self) -> CommandWriter {
        self.buffer.writer(SortKey(self.base_key))
    }

    /// Run `body` over contiguous chunks of `items` on rayon workers.
    ///
    /// Each chunk gets its own [`CommandWriter`] keyed by the chunk index,
    /// so no two workers share a sort key and playback order is independent
    /// of which worker finished first. Items are typically entities, but any
    /// sliceable work list (trigger events, records) fans out the same way.
    pub fn par_chunks<T, F>(&self, items: &[T], chunk_size: usize, body: F)
    where
        T: Sync,
        F: Fn(&[T], &mut CommandWriter) + Send + Sync,
    {
        let chunk_size = chunk_size.max(1);
        items
            .par_chunks(chunk_size)
            .enumerate()
            .for_each(|(chunk_index, chunk)| {
                let key = SortKey(self.base_key + 1 + chunk_index as u32);
                let mut writer = self.buffer.writer(key);
                body(chunk, &mut writer);
            });
    }
}

enum Entry {
    Parallel(Box<dyn ParallelSystem>),
    Exclusive(Box<dyn ExclusiveSystem>),
}

impl Entry {
    fn spec(&self) -> SystemSpec {
        match self {
            Self::Parallel(system) => SystemSpec {
                name: system.name().to_string(),
                access: system.access(),
                kind: SystemKind::Parallel,
            },
            Self::Exclusive(system) => SystemSpec {
                name: system.name().to_string(),
                access: system.access(),
                kind: SystemKind::Exclusive,
            },
        }
    }
}

/// Registers systems in execution order and builds a [`Schedule`].
#[derive(Default)]
pub struct ScheduleBuilder {
    entries: Vec<Entry>,
}

impl ScheduleBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parallel system.
    #[must_use]
    pub fn add_parallel(mut self, system: impl ParallelSystem + 'static) -> Self {
        self.entries.push(Entry::Parallel(Box::new(system)));
        self
    }

    /// Register an exclusive system.
    #[must_use]
    pub fn add_exclusive(mut self, system: impl ExclusiveSystem + 'static) -> Self {
        self.entries.push(Entry::Exclusive(Box::new(system)));
        self
    }

    /// Validate access declarations and compute stages.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::StructuralRaceViolation`] if a parallel system
    /// declares a direct write.
    pub fn build(self) -> Result<Schedule, ScheduleError> {
        let specs: Vec<SystemSpec> = self.entries.iter().map(Entry::spec).collect();
        validate(&specs)?;
        let stages = compute_stages(&specs);
        trace!(
            systems = specs.len(),
            stages = stages.len(),
            "schedule built"
        );
        Ok(Schedule {
            entries: self.entries,
            stages,
        })
    }
}

/// An executable system schedule.
pub struct Schedule {
    entries: Vec<Entry>,
    stages: Vec<Stage>,
}

impl Schedule {
    /// Run all stages for one tick. Returns the number of deferred
    /// operations applied at stage barriers.
    pub fn run(&mut self, store: &mut ComponentStore, tick: Tick) -> usize {
        let mut applied = 0;
        for stage_index in 0..self.stages.len() {
            let indices = self.stages[stage_index].system_indices.clone();
            // An exclusive system is always alone in its stage.
            if indices.len() == 1
                && let Entry::Exclusive(system) = &mut self.entries[indices[0]]
            {
                trace!(system = system.name(), stage = stage_index, "exclusive");
                system.run(store, tick);
                continue;
            }

            let buffer = CommandBuffer::new();
            let systems: Vec<(usize, &dyn ParallelSystem)> = indices
                .iter()
                .map(|&idx| match &self.entries[idx] {
                    Entry::Parallel(system) => (idx, system.as_ref()),
                    Entry::Exclusive(_) => {
                        unreachable!("exclusive systems never share a stage")
                    }
                })
                .collect();
            let store_view: &ComponentStore = store;
            systems.par_iter().for_each(|&(entry_index, system)| {
                let ctx = SystemContext {
                    store: store_view,
                    tick,
                    buffer: &buffer,
                    base_key: (entry_index as u32) << CHUNK_KEY_BITS,
                };
                system.run(&ctx);
            });
            // Merge barrier: deferred mutations land before the next stage.
            applied += buffer.playback(store);
        }
        applied
    }

    /// Number of execution stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use arena_ecs::{Component, ComponentTypeId};
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Counter(u64);
    impl Component for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    struct Increment;
    impl ParallelSystem for Increment {
        fn name(&self) -> &'static str {
            "increment"
        }
        fn access(&self) -> SystemAccess {
            SystemAccess::new()
                .read(ComponentTypeId::of::<Counter>())
                .deferred_write(ComponentTypeId::of::<Counter>())
        }
        fn run(&self, ctx: &SystemContext<'_>) {
            let entities = ctx.store().entities_with(&[ComponentTypeId::of::<Counter>()]);
            ctx.par_chunks(&entities, 2, |chunk, commands| {
                for &entity in chunk {
                    if let Ok(counter) = ctx.store().get::<Counter>(entity) {
                        commands.insert(entity, Counter(counter.0 + 1));
                    }
                }
            });
        }
    }

    struct Double;
    impl ExclusiveSystem for Double {
        fn name(&self) -> &'static str {
            "double"
        }
        fn run(&mut self, store: &mut ComponentStore, _tick: Tick) {
            for entity in store.entities_with(&[ComponentTypeId::of::<Counter>()]) {
                if let Ok(counter) = store.get_mut::<Counter>(entity) {
                    counter.0 *= 2;
                }
            }
        }
    }

    #[test]
    fn test_parallel_then_exclusive_in_order() {
        let mut store = ComponentStore::new();
        let entities: Vec<_> = (0..7).map(|_| store.spawn().with(Counter(0)).finish()).collect();

        let mut schedule = ScheduleBuilder::new()
            .add_parallel(Increment)
            .add_exclusive(Double)
            .build()
            .unwrap();
        schedule.run(&mut store, Tick::new(0));

        // Increment lands at the barrier before double runs: (0 + 1) * 2.
        for entity in entities {
            assert_eq!(store.get::<Counter>(entity).unwrap(), &Counter(2));
        }
    }

    #[test]
    fn test_deferred_writes_invisible_within_stage() {
        struct Observe(std::sync::Arc<std::sync::atomic::AtomicU64>);
        impl ParallelSystem for Observe {
            fn name(&self) -> &'static str {
                "observe"
            }
            fn access(&self) -> SystemAccess {
                SystemAccess::new().read(ComponentTypeId::of::<Counter>())
            }
            fn run(&self, ctx: &SystemContext<'_>) {
                let total: u64 = ctx
                    .store()
                    .entities_with(&[ComponentTypeId::of::<Counter>()])
                    .iter()
                    .filter_map(|&e| ctx.store().get::<Counter>(e).ok())
                    .map(|c| c.0)
                    .sum();
                self.0.store(total, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let observed = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(u64::MAX));
        let mut store = ComponentStore::new();
        store.spawn().with(Counter(0)).finish();

        // Observe conflicts with increment's deferred write, so it lands in
        // a later stage and sees the post-barrier value.
        let mut schedule = ScheduleBuilder::new()
            .add_parallel(Increment)
            .add_parallel(Observe(std::sync::Arc::clone(&observed)))
            .build()
            .unwrap();
        assert_eq!(schedule.stage_count(), 2);
        schedule.run(&mut store, Tick::new(0));
        assert_eq!(observed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_runs_deterministic() {
        let run_once = || {
            let mut store = ComponentStore::new();
            let entities: Vec<_> =
                (0..32).map(|i| store.spawn().with(Counter(i)).finish()).collect();
            let mut schedule = ScheduleBuilder::new()
                .add_parallel(Increment)
                .add_exclusive(Double)
                .build()
                .unwrap();
            for _ in 0..4 {
                schedule.run(&mut store, Tick::new(0));
            }
            entities
                .iter()
                .map(|&e| store.get::<Counter>(e).unwrap().0)
                .collect::<Vec<_>>()
        };
        assert_eq!(run_once(), run_once());
    }
}
