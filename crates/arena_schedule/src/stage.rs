//! Stage computation — conflict detection and greedy colouring.
//!
//! Systems are grouped into **stages**: systems within a stage have no
//! access conflicts and run in parallel, stages execute sequentially with a
//! command-buffer merge barrier between them. Exclusive systems form
//! single-system stages that also act as ordering fences — no later system
//! may be hoisted into a stage before one.

use crate::access::SystemAccess;
use crate::error::ScheduleError;

/// How a system executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    /// Runs on worker threads over a read-only store view; all writes go
    /// through the command buffer.
    Parallel,
    /// Runs alone with mutable store access.
    Exclusive,
}

/// A registered system with its name, access declaration, and kind.
#[derive(Debug, Clone)]
pub struct SystemSpec {
    /// The system name (e.g. `"targeting"`).
    pub name: String,
    /// The system's data access requirements.
    pub access: SystemAccess,
    /// Parallel or exclusive execution.
    pub kind: SystemKind,
}

/// A stage is a group of systems that can run in parallel (no conflicts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Indices into the schedule's system list.
    pub system_indices: Vec<usize>,
}

/// Rejects schedules where a parallel system declares a direct write.
///
/// Direct writes from worker threads would race; the command buffer is the
/// only legal write path for parallel bodies, and the check runs at build
/// time so the race can never reach execution.
///
/// # Errors
///
/// [`ScheduleError::StructuralRaceViolation`] naming the first offender.
pub fn validate(systems: &[SystemSpec]) -> Result<(), ScheduleError> {
    for system in systems {
        if system.kind == SystemKind::Parallel
            && let Some(&component) = system.access.writes.first()
        {
            return Err(ScheduleError::StructuralRaceViolation {
                system: system.name.clone(),
                component: format!("{component:?}"),
            });
        }
    }
    Ok(())
}

/// Computes execution stages from a set of registered systems.
///
/// The algorithm is a greedy graph colouring:
/// 1. For each system, check if it conflicts with any system already placed
///    in the current stage.
/// 2. If no conflict, add it to the current stage.
/// 3. If conflict, try the next stage, or create a new one.
///
/// Exclusive systems always open a new stage of their own and fence it:
/// systems registered after an exclusive one are only considered for stages
/// created after it, so registration order across exclusives is preserved.
#[must_use]
pub fn compute_stages(systems: &[SystemSpec]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();
    // Index of the first stage later systems may still join.
    let mut floor = 0;

    for (sys_idx, system) in systems.iter().enumerate() {
        if system.kind == SystemKind::Exclusive {
            stages.push(Stage {
                system_indices: vec![sys_idx],
            });
            floor = stages.len();
            continue;
        }

        let mut placed = false;
        for stage in stages.iter_mut().skip(floor) {
            let conflicts = stage
                .system_indices
                .iter()
                .any(|&existing| system.access.conflicts_with(&systems[existing].access));
            if !conflicts {
                stage.system_indices.push(sys_idx);
                placed = true;
                break;
            }
        }
        if !placed {
            stages.push(Stage {
                system_indices: vec![sys_idx],
            });
        }
    }

    stages
}

#[cfg(test)]
mod tests {
    use arena_ecs::ComponentTypeId;

    use super::*;

    fn parallel(name: &str, reads: &[u64], deferred: &[u64]) -> SystemSpec {
        let mut access = SystemAccess::new();
        for &r in reads {
            access = access.read(ComponentTypeId(r));
        }
        for &w in deferred {
            access = access.deferred_write(ComponentTypeId(w));
        }
        SystemSpec {
            name: name.to_string(),
            access,
            kind: SystemKind::Parallel,
        }
    }

    fn exclusive(name: &str, writes: &[u64]) -> SystemSpec {
        let mut access = SystemAccess::new();
        for &w in writes {
            access = access.write(ComponentTypeId(w));
        }
        SystemSpec {
            name: name.to_string(),
            access,
            kind: SystemKind::Exclusive,
        }
    }

    #[test]
    fn test_no_systems_no_stages() {
        assert!(compute_stages(&[]).is_empty());
    }

    #[test]
    fn test_non_conflicting_systems_share_a_stage() {
        // movement: reads Transform(1), deferred-writes Velocity(2)
        // targeting: reads Transform(1), deferred-writes Target(3)
        let systems = vec![parallel("movement", &[1], &[2]), parallel("targeting", &[1], &[3])];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 1, "non-conflicting systems should share a stage");
        assert_eq!(stages[0].system_indices, vec![0, 1]);
    }

    #[test]
    fn test_conflicting_systems_split_stages() {
        let systems = vec![parallel("a", &[1], &[2]), parallel("b", &[2], &[1])];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 2, "conflicting systems must be in separate stages");
    }

    #[test]
    fn test_exclusive_system_fences_later_systems() {
        // c does not conflict with a, but the exclusive b between them
        // forbids hoisting c into a's stage.
        let systems = vec![
            parallel("a", &[1], &[2]),
            exclusive("b", &[5]),
            parallel("c", &[1], &[3]),
        ];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].system_indices, vec![0]);
        assert_eq!(stages[1].system_indices, vec![1]);
        assert_eq!(stages[2].system_indices, vec![2]);
    }

    #[test]
    fn test_parallel_direct_write_rejected() {
        let mut bad = parallel("apply_damage", &[1], &[]);
        bad.access = bad.access.write(ComponentTypeId(9));
        let err = validate(&[bad]).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::StructuralRaceViolation { ref system, .. } if system == "apply_damage"
        ));
    }

    #[test]
    fn test_exclusive_direct_write_allowed() {
        assert!(validate(&[exclusive("apply_damage", &[9])]).is_ok());
    }
}
