//! Distance-field component: a per-submesh signed distance volume used
//! for GI ray-marching, baked on the GPU and persisted to a `.sdf` cache
//! file (see [`super::cache_file`]).

use crate::bvh::{BvhAccel, Primitive, SplitMethod};
use crate::concurrency::ThreadPool;
use crate::math::{Aabb, Mat4, Vec3};

/// Voxel resolution baked along every axis. The cache file header
/// records this value so a stale cache (baked at a different
/// resolution) is detected and rebuilt rather than silently
/// misinterpreted — spec §6 "SDF cache file format".
pub const SDF_RESOLUTION: u32 = 32;

/// One submesh's baked (or pending) distance field.
pub struct MeshDistanceField {
    pub sdf_texture_name: String,
    /// Local-space AABB the voxel grid covers.
    pub sdf_box: Aabb,
    /// Populated only when loaded from an on-disk cache; empty means
    /// baking on the GPU will populate it (and a BVH is needed to drive
    /// that bake).
    pub sdf_data: Vec<f32>,
    /// A per-submesh BVH used by the bake compute shader to query
    /// closest-triangle distance; freed once the bake finishes and the
    /// result is cached (mirrors `FinishPass`'s `Bvh.Clear()`).
    pub bvh: Option<BvhAccel>,
}

impl MeshDistanceField {
    pub fn is_cached(&self) -> bool {
        !self.sdf_data.is_empty()
    }

    /// Builds a BVH over `positions`/`indices` (one triangle per 3
    /// indices) to drive a pending bake, and sets `sdf_box` to the
    /// mesh's local bounds.
    pub fn build_bvh(positions: &[Vec3], indices: &[u32], pool: &ThreadPool) -> Self {
        let mut bounds = Aabb::EMPTY;
        let primitives: Vec<Primitive> = indices
            .chunks_exact(3)
            .enumerate()
            .map(|(tri_index, tri)| {
                let a = positions[tri[0] as usize];
                let b = positions[tri[1] as usize];
                let c = positions[tri[2] as usize];
                let tri_bounds = Aabb::from_point(a).union_point(b).union_point(c);
                bounds = bounds.union(&tri_bounds);
                Primitive {
                    bounds: tri_bounds,
                    centroid: tri_bounds.centroid(),
                    index: tri_index as u32,
                }
            })
            .collect();

        let bvh = if primitives.is_empty() {
            None
        } else {
            Some(BvhAccel::build(&primitives, SplitMethod::LocallyOrderedClustering, pool))
        };

        Self {
            sdf_texture_name: String::new(),
            sdf_box: bounds,
            sdf_data: Vec::new(),
            bvh,
        }
    }

    /// Returns the world-space AABB of `sdf_box` under `transform`, plus
    /// the matrix mapping a world-space point to `[0,1]³` SDF-texture
    /// UVW coordinates (i.e. the inverse of `transform`-then-box-extent
    /// composed together).
    pub fn get_transformed(&self, transform: Mat4) -> (Aabb, Mat4) {
        let corners = [
            Vec3::new(self.sdf_box.min.x, self.sdf_box.min.y, self.sdf_box.min.z),
            Vec3::new(self.sdf_box.max.x, self.sdf_box.min.y, self.sdf_box.min.z),
            Vec3::new(self.sdf_box.min.x, self.sdf_box.max.y, self.sdf_box.min.z),
            Vec3::new(self.sdf_box.max.x, self.sdf_box.max.y, self.sdf_box.min.z),
            Vec3::new(self.sdf_box.min.x, self.sdf_box.min.y, self.sdf_box.max.z),
            Vec3::new(self.sdf_box.max.x, self.sdf_box.min.y, self.sdf_box.max.z),
            Vec3::new(self.sdf_box.min.x, self.sdf_box.max.y, self.sdf_box.max.z),
            Vec3::new(self.sdf_box.max.x, self.sdf_box.max.y, self.sdf_box.max.z),
        ];
        let world_aabb = corners
            .iter()
            .fold(Aabb::EMPTY, |acc, &c| acc.union_point(transform.transform_point3(c)));

        let extent = self.sdf_box.extent();
        let safe_extent = Vec3::new(
            if extent.x.abs() < f32::EPSILON { 1.0 } else { extent.x },
            if extent.y.abs() < f32::EPSILON { 1.0 } else { extent.y },
            if extent.z.abs() < f32::EPSILON { 1.0 } else { extent.z },
        );
        // world -> local (transform^-1) -> [0,1]^3 (subtract box min, divide by extent).
        let to_local = transform.inverse();
        let normalize = Mat4::from_scale(1.0 / safe_extent)
            * Mat4::from_translation(-self.sdf_box.min);
        let coord_matrix = normalize * to_local;

        (world_aabb, coord_matrix)
    }
}

#[derive(Default)]
pub struct DistanceField {
    pub submeshes: Vec<MeshDistanceField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_transformed_maps_box_corners_into_unit_cube() {
        let field = MeshDistanceField {
            sdf_texture_name: String::new(),
            sdf_box: Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
            sdf_data: Vec::new(),
            bvh: None,
        };
        let (world_aabb, coord_matrix) = field.get_transformed(Mat4::IDENTITY);
        assert_eq!(world_aabb.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(world_aabb.max, Vec3::new(1.0, 1.0, 1.0));

        let uvw_min = coord_matrix.transform_point3(Vec3::new(-1.0, -1.0, -1.0));
        let uvw_max = coord_matrix.transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!(uvw_min.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(uvw_max.abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn build_bvh_covers_single_triangle() {
        let pool = ThreadPool::new(1);
        let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let indices = vec![0u32, 1, 2];
        let field = MeshDistanceField::build_bvh(&positions, &indices, &pool);
        assert!(field.bvh.is_some());
        assert!(!field.is_cached());
    }
}
