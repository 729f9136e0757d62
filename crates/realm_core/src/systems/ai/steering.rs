use glam::Vec3;

use crate::app::geometry::{planar, yaw_towards};
use crate::app::EntityId;

/// Average of push-away vectors from neighbors closer than `radius`, each
/// weighted by the inverse of its distance. Coincident neighbors are skipped.
pub fn separation(
    self_id: EntityId,
    position: Vec3,
    neighbors: &[(EntityId, Vec3)],
    radius: f32,
) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0u32;
    for (other_id, other_position) in neighbors {
        if *other_id == self_id {
            continue;
        }
        let away = planar(position - *other_position);
        let distance = away.length();
        if distance >= radius || distance <= f32::EPSILON {
            continue;
        }
        sum += away / distance / distance;
        count += 1;
    }
    if count == 0 {
        Vec3::ZERO
    } else {
        sum / count as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub position: Vec3,
    /// Facing toward the target; `None` when already there.
    pub yaw: Option<f32>,
    pub moved: bool,
}

/// One movement step toward `target`. The direction blends the heading with
/// `separation`, but facing follows the heading alone. The step never
/// exceeds the remaining distance.
pub fn move_towards(position: Vec3, target: Vec3, speed: f32, dt: f32, separation: Vec3) -> Step {
    let to_target = planar(target - position);
    let distance = to_target.length();
    if distance <= 1.0e-4 || speed <= 0.0 || dt <= 0.0 {
        return Step {
            position,
            yaw: None,
            moved: false,
        };
    }
    let heading = to_target / distance;
    let blended = (heading + planar(separation)).normalize_or_zero();
    let direction = if blended == Vec3::ZERO { heading } else { blended };
    let step = (speed * dt).min(distance);
    Step {
        position: position + direction * step,
        yaw: yaw_towards(heading),
        moved: true,
    }
}
