//! Scheduling error types.

/// Errors from schedule construction and partitioned lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// A system declared for parallel execution also declared a direct
    /// component write. Parallel bodies must route all writes through the
    /// command buffer; anything else is a data race waiting to happen, so
    /// the schedule refuses to build.
    #[error("parallel system '{system}' declares a direct write to '{component}'")]
    StructuralRaceViolation {
        /// Name of the offending system.
        system: String,
        /// Name of the directly written component type.
        component: String,
    },

    /// A partition handle was given a key belonging to another partition.
    #[error("key belongs to partition {expected}, handle owns partition {actual}")]
    WrongPartition {
        /// The partition the key hashes into.
        expected: usize,
        /// The partition the handle owns.
        actual: usize,
    },
}
