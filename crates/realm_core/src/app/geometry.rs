use glam::Vec3;

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Strict overlap test. Boxes that only share a face do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Per-axis penetration depth. Only meaningful when the boxes intersect.
    pub fn overlap(&self, other: &Aabb) -> Vec3 {
        self.max.min(other.max) - self.min.max(other.min)
    }
}

pub fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    planar(b - a).length()
}

/// Yaw (rotation about +Y) that makes a model whose forward is +Z face `direction`.
pub fn yaw_towards(direction: Vec3) -> Option<f32> {
    let flat = planar(direction);
    if flat.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(flat.x.atan2(flat.z))
}

pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Rotates `v` about +Y by `yaw` radians.
pub fn rotate_y(v: Vec3, yaw: f32) -> Vec3 {
    let (sin, cos) = yaw.sin_cos();
    Vec3::new(v.x * cos + v.z * sin, v.y, -v.x * sin + v.z * cos)
}

pub fn is_finite_vec3(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_boxes_do_not_intersect() {
        let a = Aabb::from_center_size(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_center_size(Vec3::new(1.0, 0.0, 0.0), Vec3::ONE);
        assert!(!a.intersects(&b));

        let c = Aabb::from_center_size(Vec3::new(0.99, 0.0, 0.0), Vec3::ONE);
        assert!(a.intersects(&c));
    }

    #[test]
    fn overlap_reports_penetration_per_axis() {
        let a = Aabb::from_center_size(Vec3::ZERO, Vec3::splat(2.0));
        let b = Aabb::from_center_size(Vec3::new(1.5, 0.0, 0.5), Vec3::splat(2.0));
        let overlap = a.overlap(&b);
        assert!((overlap.x - 0.5).abs() < 1e-6);
        assert!((overlap.y - 2.0).abs() < 1e-6);
        assert!((overlap.z - 1.5).abs() < 1e-6);
    }

    #[test]
    fn negative_size_is_treated_as_magnitude() {
        let a = Aabb::from_center_size(Vec3::ZERO, Vec3::new(-2.0, 2.0, 2.0));
        assert_eq!(a.min, Vec3::splat(-1.0));
        assert_eq!(a.max, Vec3::splat(1.0));
    }

    #[test]
    fn yaw_round_trips_through_forward_vector() {
        let yaw = yaw_towards(Vec3::new(1.0, 5.0, 0.0)).expect("yaw");
        let forward = forward_from_yaw(yaw);
        assert!((forward - Vec3::X).length() < 1e-5);
        assert!(yaw_towards(Vec3::new(0.0, 3.0, 0.0)).is_none());
    }

    #[test]
    fn rotate_y_matches_forward_from_yaw() {
        let yaw = 0.7;
        assert!((rotate_y(Vec3::Z, yaw) - forward_from_yaw(yaw)).length() < 1e-6);
    }
}
