//! Unit movement.
//!
//! Champions follow their historized move command (so resimulation replays
//! the same path); minions and projectiles follow a waypoint path. Dead
//! units do not move. All position updates go through the command buffer.

use arena_clock::TickRate;
use arena_ecs::ComponentTypeId;
use arena_schedule::{ParallelSystem, SystemAccess, SystemContext};
use glam::Vec3;

use crate::components::{Dead, LanePath, MoveHistory, MoveSpeed, Transform};
use crate::systems::is_dead;

const ARRIVAL_EPSILON: f32 = 1e-3;
const CHUNK_SIZE: usize = 32;

/// Advances every mobile unit toward its destination.
pub struct Movement {
    rate: TickRate,
}

impl Movement {
    /// A movement system stepping at the given rate.
    #[must_use]
    pub fn new(rate: TickRate) -> Self {
        Self { rate }
    }
}

fn advanced(position: Vec3, destination: Vec3, step: f32) -> Option<(Vec3, f32)> {
    let to_target = destination - position;
    let distance = to_target.length();
    if distance <= ARRIVAL_EPSILON {
        return None;
    }
    let direction = to_target / distance;
    let new_position = if distance <= step {
        destination
    } else {
        position + direction * step
    };
    Some((new_position, direction.x.atan2(direction.z)))
}

impl ParallelSystem for Movement {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .read(ComponentTypeId::of::<MoveSpeed>())
            .read(ComponentTypeId::of::<MoveHistory>())
            .read(ComponentTypeId::of::<Dead>())
            .deferred_write(ComponentTypeId::of::<Transform>())
            .deferred_write(ComponentTypeId::of::<LanePath>())
    }

    fn run(&self, ctx: &SystemContext<'_>) {
        let store = ctx.store();
        let tick = ctx.tick();
        let step_seconds = self.rate.tick_duration();
        let movers = store.entities_with(&[
            ComponentTypeId::of::<Transform>(),
            ComponentTypeId::of::<MoveSpeed>(),
        ]);

        ctx.par_chunks(&movers, CHUNK_SIZE, |chunk, commands| {
            for &entity in chunk {
                if is_dead(store, entity) {
                    continue;
                }
                let (Ok(transform), Ok(speed)) =
                    (store.get::<Transform>(entity), store.get::<MoveSpeed>(entity))
                else {
                    continue;
                };
                if speed.current <= 0.0 {
                    continue;
                }

                let destination = if let Ok(history) = store.get::<MoveHistory>(entity) {
                    match history.0.at_tick(tick) {
                        Ok((_, command)) => command.destination,
                        Err(_) => continue,
                    }
                } else if let Ok(path) = store.get::<LanePath>(entity) {
                    let Some(&waypoint) = path.waypoints.get(path.next as usize) else {
                        continue;
                    };
                    // Advance to the next waypoint once this one is reached.
                    if transform.position.distance(waypoint) <= ARRIVAL_EPSILON
                        && (path.next as usize) < path.waypoints.len() - 1
                    {
                        let mut advanced_path = path.clone();
                        advanced_path.next += 1;
                        commands.insert(entity, advanced_path);
                        continue;
                    }
                    waypoint
                } else {
                    continue;
                };

                let step = speed.current * step_seconds;
                if let Some((position, yaw)) = advanced(transform.position, destination, step) {
                    commands.insert(
                        entity,
                        Transform {
                            position,
                            yaw,
                            scale: transform.scale,
                        },
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_toward_destination() {
        let (position, _) =
            advanced(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0).unwrap();
        assert!((position.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_advance_snaps_when_step_overshoots() {
        let destination = Vec3::new(0.5, 0.0, 0.0);
        let (position, _) = advanced(Vec3::ZERO, destination, 2.0).unwrap();
        assert_eq!(position, destination);
    }

    #[test]
    fn test_no_motion_when_arrived() {
        assert!(advanced(Vec3::ZERO, Vec3::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_yaw_faces_direction_of_travel() {
        let (_, yaw) = advanced(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0), 1.0).unwrap();
        assert!(yaw.abs() < 1e-5);
        let (_, yaw) = advanced(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), 1.0).unwrap();
        assert!((yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
