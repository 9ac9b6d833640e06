//! Mesh and material components, and the vertex-cache optimisation pass
//! applied to a freshly loaded model's index buffers.

use crate::math::{Aabb, Mat4, Vec2, Vec3};

/// One drawable portion of a loaded model: an interleaved vertex soup,
/// its index buffer (already vertex-cache optimised, see
/// [`optimize_vertex_order`]), the submesh's world matrix, and which
/// material slot it samples.
#[derive(Clone, Debug)]
pub struct Submesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub world_matrix: Mat4,
    pub material_index: u32,
}

impl Submesh {
    /// Local-space AABB over this submesh's vertex positions.
    pub fn local_bounds(&self) -> Aabb {
        self.positions
            .iter()
            .fold(Aabb::EMPTY, |acc, &p| acc.union_point(p))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub submeshes: Vec<Submesh>,
}

#[derive(Clone, Copy, Debug)]
pub struct MaterialFactors {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialFactors {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            emissive: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MaterialTextures {
    pub base_color: Option<String>,
    pub metallic_roughness: Option<String>,
    pub normal: Option<String>,
    pub occlusion: Option<String>,
    pub emissive: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SubmeshMaterial {
    pub factors: MaterialFactors,
    pub textures: MaterialTextures,
}

#[derive(Clone, Debug, Default)]
pub struct Material {
    pub submeshes: Vec<SubmeshMaterial>,
}

/// A glTF file's flat submesh/material output, handed to the model-load
/// system by a [`crate::rhi::backend::GltfSource`] implementation before
/// it is wrapped into `Mesh`/`Material` components.
pub struct LoadedModel {
    pub mesh: Mesh,
    pub material: Material,
}

const VERTEX_CACHE_SIZE: usize = 32;
/// Per Forsyth's vertex-cache-optimisation scheme: the most recent 3
/// cache entries (just-used vertices) get a flat bonus rather than the
/// decaying by-position one, since immediately re-using them indicates a
/// cache trashing pattern rather than reuse.
const LAST_TRIANGLE_SCORE: f32 = 0.75;
const CACHE_DECAY_POWER: f32 = 1.5;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = -0.5;

fn vertex_score(cache_position: Option<usize>, live_triangle_count: usize) -> f32 {
    if live_triangle_count == 0 {
        return 0.0;
    }
    let cache_score = match cache_position {
        Some(pos) if pos < 3 => LAST_TRIANGLE_SCORE,
        Some(pos) => {
            let scaler = (VERTEX_CACHE_SIZE - pos) as f32 / (VERTEX_CACHE_SIZE - 3) as f32;
            scaler.powf(CACHE_DECAY_POWER)
        }
        None => 0.0,
    };
    let valence_boost = VALENCE_BOOST_SCALE * (live_triangle_count as f32).powf(VALENCE_BOOST_POWER);
    cache_score + valence_boost
}

/// Reorders `indices` (a flat triangle list, length a multiple of 3) to
/// improve post-transform vertex-cache hit rate, using Tom Forsyth's
/// greedy scoring scheme: at each step, emit the live triangle with the
/// highest sum-of-vertex-scores, where a vertex's score rewards being
/// near the front of a simulated FIFO cache and having few remaining
/// triangles (so "finishing off" low-valence vertices is preferred over
/// leaving them dangling). `vertex_count` must be at least one past the
/// largest index.
pub fn optimize_vertex_order(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    let triangle_count = indices.len() / 3;
    if triangle_count == 0 {
        return indices.to_vec();
    }

    let mut vertex_triangles: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
    for (tri, chunk) in indices.chunks_exact(3).enumerate() {
        for &v in chunk {
            vertex_triangles[v as usize].push(tri as u32);
        }
    }

    let mut live_counts: Vec<usize> = vertex_triangles.iter().map(Vec::len).collect();
    let mut cache_position: Vec<Option<usize>> = vec![None; vertex_count];
    let mut scores: Vec<f32> = (0..vertex_count)
        .map(|v| vertex_score(cache_position[v], live_counts[v]))
        .collect();
    let mut triangle_score: Vec<f32> = indices
        .chunks_exact(3)
        .map(|tri| tri.iter().map(|&v| scores[v as usize]).sum())
        .collect();
    let mut triangle_emitted = vec![false; triangle_count];

    let mut cache: Vec<u32> = Vec::with_capacity(VERTEX_CACHE_SIZE + 3);
    let mut output = Vec::with_capacity(indices.len());

    let mut best_triangle = (0..triangle_count)
        .max_by(|&a, &b| triangle_score[a].total_cmp(&triangle_score[b]));

    while let Some(tri) = best_triangle {
        if triangle_emitted[tri] {
            best_triangle = (0..triangle_count)
                .filter(|&t| !triangle_emitted[t])
                .max_by(|&a, &b| triangle_score[a].total_cmp(&triangle_score[b]));
            continue;
        }
        triangle_emitted[tri] = true;
        let tri_verts = [
            indices[tri * 3],
            indices[tri * 3 + 1],
            indices[tri * 3 + 2],
        ];
        output.extend_from_slice(&tri_verts);

        for &v in &tri_verts {
            live_counts[v as usize] -= 1;
            vertex_triangles[v as usize].retain(|&t| t != tri as u32);
            cache.retain(|&c| c != v);
        }
        // New vertices enter at the front (index 0 is most-recently-used).
        for &v in tri_verts.iter().rev() {
            cache.insert(0, v);
        }
        cache.truncate(VERTEX_CACHE_SIZE);

        let mut touched: Vec<u32> = tri_verts.to_vec();
        for (pos, &v) in cache.iter().enumerate() {
            cache_position[v as usize] = Some(pos);
            touched.push(v);
        }
        for &v in &tri_verts {
            if !cache.contains(&v) {
                cache_position[v as usize] = None;
            }
        }

        touched.sort_unstable();
        touched.dedup();
        for v in touched {
            scores[v as usize] = vertex_score(cache_position[v as usize], live_counts[v as usize]);
        }
        let mut affected_triangles: Vec<u32> = Vec::new();
        for v in &tri_verts {
            affected_triangles.extend(vertex_triangles[*v as usize].iter().copied());
        }
        for pos in cache.iter() {
            affected_triangles.extend(vertex_triangles[*pos as usize].iter().copied());
        }
        affected_triangles.sort_unstable();
        affected_triangles.dedup();
        for t in affected_triangles {
            let t = t as usize;
            triangle_score[t] = indices[t * 3..t * 3 + 3]
                .iter()
                .map(|&v| scores[v as usize])
                .sum();
        }

        best_triangle = (0..triangle_count)
            .filter(|&t| !triangle_emitted[t])
            .max_by(|&a, &b| triangle_score[a].total_cmp(&triangle_score[b]));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_vertex_order_preserves_every_triangle() {
        let indices: Vec<u32> = vec![0, 1, 2, 2, 1, 3, 3, 1, 4, 4, 1, 5];
        let optimized = optimize_vertex_order(&indices, 6);
        assert_eq!(optimized.len(), indices.len());

        let mut original_tris: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let mut optimized_tris: Vec<[u32; 3]> = optimized
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        original_tris.sort_unstable();
        optimized_tris.sort_unstable();
        assert_eq!(original_tris, optimized_tris);
    }

    #[test]
    fn optimize_vertex_order_handles_single_triangle() {
        let indices = vec![0u32, 1, 2];
        let optimized = optimize_vertex_order(&indices, 3);
        assert_eq!(optimized.len(), 3);
    }

    #[test]
    fn optimize_vertex_order_handles_empty_input() {
        let optimized = optimize_vertex_order(&[], 0);
        assert!(optimized.is_empty());
    }

    #[test]
    fn submesh_local_bounds_covers_every_vertex() {
        let submesh = Submesh {
            positions: vec![
                Vec3::new(-1.0, 0.0, 0.0),
                Vec3::new(1.0, 2.0, 0.0),
                Vec3::new(0.0, -3.0, 5.0),
            ],
            normals: vec![Vec3::Y; 3],
            tangents: vec![Vec3::X; 3],
            uvs: vec![Vec2::ZERO; 3],
            indices: vec![0, 1, 2],
            world_matrix: Mat4::IDENTITY,
            material_index: 0,
        };
        let bounds = submesh.local_bounds();
        assert_eq!(bounds.min, Vec3::new(-1.0, -3.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 5.0));
    }
}
