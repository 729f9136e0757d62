use glam::Vec3;

use crate::app::geometry::planar;

/// Distance kept outside the sphere when snapping to its border.
const BORDER_MARGIN: f32 = 0.01;

/// Sphere hostile NPCs may not enter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeZone {
    pub center: Vec3,
    pub radius: f32,
}

impl SafeZone {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    /// Strictly inside; points on the surface are outside.
    pub fn contains(&self, point: Vec3) -> bool {
        (point - self.center).length() < self.radius
    }

    /// Point just outside the zone on the ray from the center toward
    /// `toward`, at height `height`. When `toward` sits on the center axis the
    /// ray toward `fallback` is used instead.
    pub fn border_point(&self, toward: Vec3, fallback: Vec3, height: f32) -> Vec3 {
        let direction = self.outward_direction(toward, fallback);
        let flat = self.center + direction * (self.radius + BORDER_MARGIN);
        Vec3::new(flat.x, height, flat.z)
    }

    /// Moves `point` radially out of the zone if it is inside.
    pub fn push_outside(&self, point: Vec3, fallback: Vec3) -> Vec3 {
        if !self.contains(point) {
            return point;
        }
        self.border_point(point, fallback, point.y)
    }

    fn outward_direction(&self, toward: Vec3, fallback: Vec3) -> Vec3 {
        let primary = planar(toward - self.center);
        if primary.length_squared() > f32::EPSILON {
            return primary.normalize();
        }
        let secondary = planar(fallback - self.center);
        if secondary.length_squared() > f32::EPSILON {
            return secondary.normalize();
        }
        Vec3::X
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_point_faces_target_and_stays_outside() {
        let zone = SafeZone::new(Vec3::ZERO, 5.0);
        let border = zone.border_point(Vec3::new(0.0, 0.0, 2.0), Vec3::X, 0.0);
        assert!(!zone.contains(border));
        assert!((border.z - 5.01).abs() < 1e-4);
        assert!(border.x.abs() < 1e-6);
    }

    #[test]
    fn centered_target_uses_fallback_direction() {
        let zone = SafeZone::new(Vec3::new(1.0, 0.0, 1.0), 2.0);
        let border = zone.border_point(Vec3::new(1.0, 3.0, 1.0), Vec3::new(1.0, 0.0, -9.0), 0.0);
        assert!((border - Vec3::new(1.0, 0.0, -1.01)).length() < 1e-4);
    }

    #[test]
    fn push_outside_only_moves_inside_points() {
        let zone = SafeZone::new(Vec3::ZERO, 3.0);
        let outside = Vec3::new(4.0, 0.0, 0.0);
        assert_eq!(zone.push_outside(outside, Vec3::X), outside);
        let pushed = zone.push_outside(Vec3::new(0.0, 0.0, -1.0), Vec3::X);
        assert!(!zone.contains(pushed));
        assert!(pushed.z < -3.0);
    }
}
