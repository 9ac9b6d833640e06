//! Math primitives.
//!
//! Re-exports the vector/matrix/quaternion types from `glam` and adds the
//! engine-local types the BVH, scene grid, and render graph need: an
//! axis-aligned bounding box and a ray with a precomputed reciprocal
//! direction for the slab test.

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec3A, Vec4};

/// An axis-aligned bounding box.
///
/// `min`/`max` are kept inverted (`min > max` component-wise) to represent
/// an empty box, matching the convention in
/// `examples/original_source/Source/Math/include/Bounds.h`: an empty box
/// unions correctly with any point or box without a separate "is valid"
/// flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty box that unions correctly with anything.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn union_point(&self, p: Vec3) -> Aabb {
        Aabb {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area, used by SAH cost estimation. Zero for an empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extent();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Index of the axis along which this box is widest.
    pub fn max_extent_axis(&self) -> usize {
        let e = self.extent();
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// The eight corners, transformed by `m`, re-unioned into a new box.
    /// Used when a mesh's local-space bounds need to be placed in world
    /// space under a non-axis-aligned transform.
    pub fn transformed(&self, m: Mat4) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let mut result = Aabb::EMPTY;
        for c in corners {
            result = result.union_point(m.transform_point3(c));
        }
        result
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

/// A ray with a precomputed reciprocal direction and sign mask, used by
/// the BVH's slab intersection test to avoid dividing per-node.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t_max: f32,
    inv_direction: Vec3,
    sign: [usize; 3],
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, t_max: f32) -> Self {
        let inv_direction = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let sign = [
            usize::from(inv_direction.x < 0.0),
            usize::from(inv_direction.y < 0.0),
            usize::from(inv_direction.z < 0.0),
        ];
        Self {
            origin,
            direction,
            t_max,
            inv_direction,
            sign,
        }
    }

    pub fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    pub fn sign(&self) -> [usize; 3] {
        self.sign
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test against an AABB. `Gamma(3)` widens the bounds slightly to
    /// absorb the floating point error accumulated over three
    /// multiply-adds, matching the epsilon the original BVH traversal
    /// uses to avoid false misses at box boundaries.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let bounds = [aabb.min, aabb.max];
        let gamma3 = gamma(3);

        let mut t_min = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let mut t_max = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        t_max *= 1.0 + 2.0 * gamma3;

        let ty_min = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let mut ty_max = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        ty_max *= 1.0 + 2.0 * gamma3;

        if t_min > ty_max || ty_min > t_max {
            return false;
        }
        if ty_min > t_min {
            t_min = ty_min;
        }
        if ty_max < t_max {
            t_max = ty_max;
        }

        let tz_min = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let mut tz_max = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        tz_max *= 1.0 + 2.0 * gamma3;

        if t_min > tz_max || tz_min > t_max {
            return false;
        }
        if tz_min > t_min {
            t_min = tz_min;
        }
        if tz_max < t_max {
            t_max = tz_max;
        }

        t_min < self.t_max && t_max > 0.0
    }
}

/// `Gamma(n) = (n * eps) / (1 - n * eps)`, the standard conservative error
/// bound for `n` floating point operations (Pharr/Jakob/Humphreys).
fn gamma(n: i32) -> f32 {
    let n_eps = n as f32 * f32::EPSILON * 0.5;
    n_eps / (1.0 - n_eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aabb_unions_to_point() {
        let a = Aabb::EMPTY;
        let b = a.union_point(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn aabb_union_is_commutative() {
        let a = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Vec3::new(-1.0, 2.0, 0.5), Vec3::new(0.5, 3.0, 2.0));
        assert_eq!(a.union(&b), b.union(&a));
    }

    #[test]
    fn ray_hits_enclosing_box() {
        let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), f32::MAX);
        let b = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(r.intersects_aabb(&b));
    }

    #[test]
    fn ray_misses_box_behind_origin_direction() {
        let r = Ray::new(Vec3::new(-5.0, 5.0, 5.0), Vec3::new(1.0, 0.0, 0.0), f32::MAX);
        let b = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(!r.intersects_aabb(&b));
    }

    #[test]
    fn surface_area_of_unit_cube_is_six() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!((b.surface_area() - 6.0).abs() < 1e-6);
    }
}
