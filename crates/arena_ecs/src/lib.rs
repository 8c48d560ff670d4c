//! Entity-component storage for the simulation core.
//!
//! Entities are generational handles; components are plain serialisable
//! value types grouped into archetype tables for cache-friendly iteration.
//! All structural mutation from concurrent code goes through the
//! [`CommandBuffer`], which replays deterministically at stage barriers.

mod archetype;
mod command_buffer;
mod component;
mod entity;
mod error;
mod store;

pub use archetype::{ArchetypeId, ArchetypeTable, Column};
pub use command_buffer::{CommandBuffer, CommandWriter, SortKey, SpawnRecord};
pub use component::{BufferComponent, Component, ComponentMeta, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use error::StoreError;
pub use store::{ComponentStore, EntityBuilder, RawComponent};
