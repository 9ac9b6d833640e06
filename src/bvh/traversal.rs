use smallvec::SmallVec;

use crate::math::Ray;

use super::build::{BvhAccel, BvhNode};

/// Traversal never recurses; this is the fixed depth of the explicit
/// stack, generous enough for any tree this builder produces (a
/// balanced SAH/HLBVH tree over billions of primitives is well under 64
/// levels deep).
pub const MAX_TRAVERSAL_STACK: usize = 64;

/// The nearest intersection found by [`traverse`].
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub t: f32,
    pub primitive_index: u32,
}

/// Traverses `accel` along `ray`, calling `intersect(primitive_index,
/// ray)` for every primitive in every leaf whose bounds the ray passes
/// through, and keeping the closest hit (`intersect` returns the hit
/// distance, or `None` for a miss). Iterative with a fixed-size stack —
/// never recursive — so traversal depth cannot overflow the call stack
/// regardless of tree depth.
pub fn traverse<F>(accel: &BvhAccel, ray: &Ray, mut intersect: F) -> Option<Hit>
where
    F: FnMut(u32, &Ray) -> Option<f32>,
{
    if accel.is_empty() {
        return None;
    }

    let nodes = accel.nodes();
    let ordered = accel.ordered_primitive_indices();
    let mut stack: SmallVec<[u32; MAX_TRAVERSAL_STACK]> = SmallVec::new();
    let mut current = 0u32;
    let mut closest: Option<Hit> = None;
    let mut ray = *ray;

    loop {
        let node: &BvhNode = &nodes[current as usize];
        if node.bounds().is_empty() || !ray.intersects_aabb(&node.bounds()) {
            match stack.pop() {
                Some(next) => {
                    current = next;
                    continue;
                }
                None => break,
            }
        }

        if node.is_leaf() {
            for &primitive_index in &ordered[node.leaf_range().start as usize..node.leaf_range().end as usize] {
                if let Some(t) = intersect(primitive_index, &ray) {
                    if t >= 0.0 && t < ray.t_max {
                        ray.t_max = t;
                        closest = Some(Hit { t, primitive_index });
                    }
                }
            }
            match stack.pop() {
                Some(next) => current = next,
                None => break,
            }
        } else {
            // Visit the near child first (per the split axis' ray sign) so
            // a later, farther hit can be pruned sooner by the updated
            // `ray.t_max`.
            let first_child = current + 1;
            let second_child = node.second_child_offset();
            if ray.sign()[node.split_axis()] == 0 {
                stack.push(second_child);
                current = first_child;
            } else {
                stack.push(first_child);
                current = second_child;
            }
        }
    }

    closest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::build::{Primitive, SplitMethod};
    use crate::concurrency::ThreadPool;
    use crate::math::{Aabb, Vec3};

    #[test]
    fn traversal_finds_the_single_intersecting_primitive() {
        let prims: Vec<Primitive> = (0..10)
            .map(|i| {
                let x = i as f32 * 3.0;
                let min = Vec3::new(x, 0.0, 0.0);
                let max = Vec3::new(x + 1.0, 1.0, 1.0);
                Primitive {
                    bounds: Aabb::new(min, max),
                    centroid: (min + max) * 0.5,
                    index: i,
                }
            })
            .collect();
        let pool = ThreadPool::new(2);
        let accel = BvhAccel::build(&prims, SplitMethod::Sah, &pool);

        let target = 5usize;
        let ray = Ray::new(
            Vec3::new(target as f32 * 3.0 + 0.5, 0.5, -10.0),
            Vec3::new(0.0, 0.0, 1.0),
            1000.0,
        );

        let hit = traverse(&accel, &ray, |primitive_index, ray| {
            let p = &prims[primitive_index as usize];
            if ray.intersects_aabb(&p.bounds) {
                Some(10.0 + p.bounds.min.x)
            } else {
                None
            }
        });

        assert!(hit.is_some());
        assert_eq!(hit.unwrap().primitive_index, target as u32);
    }

    #[test]
    fn traversal_of_empty_bvh_misses() {
        let pool = ThreadPool::new(1);
        let accel = BvhAccel::build(&[], SplitMethod::Sah, &pool);
        let ray = Ray::new(Vec3::ZERO, Vec3::X, 100.0);
        assert!(traverse(&accel, &ray, |_, _| Some(1.0)).is_none());
    }
}
