//! System data-access declarations.
//!
//! A [`SystemAccess`] declares which component types a system reads, writes
//! directly, and writes through the command buffer. The scheduler uses these
//! declarations to detect conflicts between systems and assign execution
//! stages.

use arena_ecs::ComponentTypeId;

/// Describes the data access requirements of a system.
///
/// Direct writes mutate the store in place and are only legal for exclusive
/// systems. Deferred writes go through the command buffer and become visible
/// at the next barrier; they still count as writes for conflict detection so
/// a reader of the same type lands in a later stage and observes them.
#[derive(Debug, Clone, Default)]
pub struct SystemAccess {
    /// Component types read immutably.
    pub reads: Vec<ComponentTypeId>,
    /// Component types written in place (exclusive systems only).
    pub writes: Vec<ComponentTypeId>,
    /// Component types written through the command buffer.
    pub deferred_writes: Vec<ComponentTypeId>,
}

impl SystemAccess {
    /// Create an empty access declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, type_id: ComponentTypeId) -> Self {
        self.reads.push(type_id);
        self
    }

    /// Add a direct (in-place) component write.
    #[must_use]
    pub fn write(mut self, type_id: ComponentTypeId) -> Self {
        self.writes.push(type_id);
        self
    }

    /// Add a command-buffer-routed component write.
    #[must_use]
    pub fn deferred_write(mut self, type_id: ComponentTypeId) -> Self {
        self.deferred_writes.push(type_id);
        self
    }

    fn writes_type(&self, type_id: ComponentTypeId) -> bool {
        self.writes.contains(&type_id) || self.deferred_writes.contains(&type_id)
    }

    fn touches_type(&self, type_id: ComponentTypeId) -> bool {
        self.reads.contains(&type_id) || self.writes_type(type_id)
    }

    /// Checks whether this access conflicts with another.
    ///
    /// Two systems conflict when one writes a component type the other reads
    /// or writes:
    ///
    /// ```text
    /// A.writes ∩ (B.reads ∪ B.writes) ≠ ∅  OR
    /// B.writes ∩ (A.reads ∪ A.writes) ≠ ∅
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &SystemAccess) -> bool {
        self.writes
            .iter()
            .chain(&self.deferred_writes)
            .any(|&w| other.touches_type(w))
            || other
                .writes
                .iter()
                .chain(&other.deferred_writes)
                .any(|&w| self.touches_type(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_conflict_both_read() {
        let transform = ComponentTypeId(1);
        let a = SystemAccess::new().read(transform);
        let b = SystemAccess::new().read(transform);
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_conflict_read_vs_write() {
        let transform = ComponentTypeId(1);
        let a = SystemAccess::new().read(transform);
        let b = SystemAccess::new().write(transform);
        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn test_conflict_write_vs_write() {
        let velocity = ComponentTypeId(2);
        let a = SystemAccess::new().write(velocity);
        let b = SystemAccess::new().write(velocity);
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn test_deferred_write_counts_as_write() {
        let hp = ComponentTypeId(3);
        let writer = SystemAccess::new().deferred_write(hp);
        let reader = SystemAccess::new().read(hp);
        assert!(writer.conflicts_with(&reader));
    }

    #[test]
    fn test_no_conflict_disjoint_types() {
        let a = SystemAccess::new().read(ComponentTypeId(1)).write(ComponentTypeId(2));
        let b = SystemAccess::new().read(ComponentTypeId(1)).write(ComponentTypeId(3));
        assert!(!a.conflicts_with(&b));
    }
}
