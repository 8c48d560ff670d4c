//! Archetype storage.
//!
//! An archetype is a distinct set of component types. Entities sharing a set
//! are grouped into one [`ArchetypeTable`] in struct-of-arrays layout, so
//! iterating "all entities with {A, B}" touches only matching tables and
//! their contiguous columns.
//!
//! Each column row also carries an *enabled* bit. Toggleable states (the
//! dead flag, aim mode) flip this bit instead of adding or removing the
//! component, avoiding archetype churn during prediction replay.

use std::collections::BTreeSet;

use crate::component::{ComponentMeta, ComponentTypeId};
use crate::entity::Entity;

/// A unique identifier for an archetype, computed from its sorted set of
/// [`ComponentTypeId`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub u64);

impl ArchetypeId {
    /// Compute the archetype id for a set of component types.
    ///
    /// Deterministic: the same set always yields the same id regardless of
    /// insertion order, because `BTreeSet` iterates sorted.
    #[must_use]
    pub fn from_component_types(types: &BTreeSet<ComponentTypeId>) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for ty in types {
            ty.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// A column of one component type within an archetype table.
///
/// Values are stored as raw bytes at a fixed stride. Typed access is a
/// size-checked cast; the store guarantees the requested type matches the
/// column's [`ComponentMeta`] before casting.
#[derive(Debug)]
pub struct Column {
    /// Metadata of the stored component type.
    pub meta: ComponentMeta,
    /// Raw storage. Length is always `meta.layout.size() * rows`.
    data: Vec<u8>,
    /// Per-row enabled bit, parallel to the rows.
    enabled: Vec<bool>,
}

impl Column {
    /// Create an empty column for the given component type.
    ///
    /// Component alignment must not exceed 8: raw rows live in `Vec<u8>`
    /// storage, so wider-aligned types (SIMD vectors) cannot be stored
    /// directly.
    #[must_use]
    pub fn new(meta: ComponentMeta) -> Self {
        assert!(
            meta.layout.align() <= 8,
            "component '{}' alignment {} exceeds column storage alignment",
            meta.name,
            meta.layout.align()
        );
        Self {
            meta,
            data: Vec::new(),
            enabled: Vec::new(),
        }
    }

    /// Number of rows stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    /// Returns `true` if the column holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    fn stride(&self) -> usize {
        self.meta.layout.size()
    }

    /// Append a row from raw bytes. The new row starts enabled.
    ///
    /// Ownership of the value transfers into the column; the caller must not
    /// drop the source bytes afterwards.
    pub fn push_raw(&mut self, bytes: &[u8]) {
        assert_eq!(
            bytes.len(),
            self.stride(),
            "byte size mismatch for component '{}': expected {}, got {}",
            self.meta.name,
            self.stride(),
            bytes.len()
        );
        self.data.extend_from_slice(bytes);
        self.enabled.push(true);
    }

    /// Raw bytes of the row at `row`.
    #[must_use]
    pub fn get_raw(&self, row: usize) -> Option<&[u8]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.stride();
        Some(&self.data[start..start + self.stride()])
    }

    /// Mutable raw bytes of the row at `row`.
    #[must_use]
    pub fn get_raw_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        if row >= self.len() {
            return None;
        }
        let stride = self.stride();
        let start = row * stride;
        Some(&mut self.data[start..start + stride])
    }

    /// Remove the row at `row` by swapping in the last row, returning the
    /// removed value's bytes *without dropping it* (ownership moves to the
    /// caller). Also returns the removed row's enabled bit.
    pub fn swap_remove_raw(&mut self, row: usize) -> Option<(Vec<u8>, bool)> {
        if row >= self.len() {
            return None;
        }
        let stride = self.stride();
        let last = self.len() - 1;
        let removed = self.data[row * stride..(row + 1) * stride].to_vec();
        let was_enabled = self.enabled[row];
        if row != last {
            let (head, tail) = self.data.split_at_mut(last * stride);
            head[row * stride..(row + 1) * stride].copy_from_slice(&tail[..stride]);
        }
        self.data.truncate(last * stride);
        self.enabled.swap_remove(row);
        Some((removed, was_enabled))
    }

    /// Remove the row at `row` and drop its value in place.
    pub fn swap_remove_drop(&mut self, row: usize) {
        if let Some((mut bytes, _)) = self.swap_remove_raw(row)
            && let Some(drop_fn) = self.meta.drop_fn
        {
            // SAFETY: The bytes hold a valid instance whose ownership was
            // transferred out of the column and nowhere else.
            unsafe { drop_fn(bytes.as_mut_ptr()) };
        }
    }

    /// Enabled bit of the row at `row`.
    #[must_use]
    pub fn is_enabled(&self, row: usize) -> bool {
        self.enabled.get(row).copied().unwrap_or(false)
    }

    /// Set the enabled bit of the row at `row`.
    pub fn set_enabled(&mut self, row: usize, value: bool) {
        if let Some(flag) = self.enabled.get_mut(row) {
            *flag = value;
        }
    }

    /// Restore a row's enabled bit after a raw push (rows pushed from a
    /// table move must keep their previous state).
    pub fn set_last_enabled(&mut self, value: bool) {
        if let Some(flag) = self.enabled.last_mut() {
            *flag = value;
        }
    }

    /// Typed reference to the row at `row`.
    ///
    /// # Safety
    ///
    /// `T` must be the exact type described by this column's meta.
    #[must_use]
    pub unsafe fn get<T>(&self, row: usize) -> Option<&T> {
        debug_assert_eq!(std::mem::size_of::<T>(), self.stride());
        let bytes = self.get_raw(row)?;
        // SAFETY: Caller guarantees the type matches.
        Some(unsafe { &*(bytes.as_ptr() as *const T) })
    }

    /// Typed mutable reference to the row at `row`.
    ///
    /// # Safety
    ///
    /// `T` must be the exact type described by this column's meta.
    #[must_use]
    pub unsafe fn get_mut<T>(&mut self, row: usize) -> Option<&mut T> {
        debug_assert_eq!(std::mem::size_of::<T>(), self.stride());
        let bytes = self.get_raw_mut(row)?;
        // SAFETY: Caller guarantees the type matches.
        Some(unsafe { &mut *(bytes.as_mut_ptr() as *mut T) })
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.meta.drop_fn {
            let stride = self.stride();
            for row in 0..self.len() {
                // SAFETY: Each row holds a valid, not-yet-dropped instance.
                unsafe { drop_fn(self.data.as_mut_ptr().add(row * stride)) };
            }
        }
    }
}

/// A table of entities sharing one archetype.
///
/// `entities[i]` corresponds to row `i` of every column. Removal is
/// swap-remove; the store fixes up the moved entity's recorded row.
#[derive(Debug)]
pub struct ArchetypeTable {
    /// The archetype identifier.
    pub id: ArchetypeId,
    /// Sorted component types defining this archetype.
    pub component_types: BTreeSet<ComponentTypeId>,
    /// Entities in row order.
    pub entities: Vec<Entity>,
    /// One column per component type, in `component_types` order.
    pub columns: Vec<Column>,
}

impl ArchetypeTable {
    /// Create an empty table for the given component metas.
    ///
    /// `metas` must be sorted by type id (the store passes them in
    /// `BTreeSet` iteration order).
    #[must_use]
    pub fn new(metas: Vec<ComponentMeta>) -> Self {
        let component_types: BTreeSet<ComponentTypeId> =
            metas.iter().map(|m| m.type_id).collect();
        let id = ArchetypeId::from_component_types(&component_types);
        let columns = metas.into_iter().map(Column::new).collect();
        Self {
            id,
            component_types,
            entities: Vec::new(),
            columns,
        }
    }

    /// Number of entities in this table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the table has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if this archetype contains the component type.
    #[must_use]
    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.component_types.contains(&type_id)
    }

    /// Column index for a component type, if present.
    #[must_use]
    pub fn column_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.component_types.iter().position(|&tid| tid == type_id)
    }
}
