use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rustc_hash::FxHashMap;

use crate::math::Vec3;

/// A symmetric 4x4 quadric matrix packed into its 10 distinct
/// coefficients, representing the sum of squared-distance-to-plane
/// error functionals for a vertex (Garland & Heckbert). `a*a, a*b, a*c,
/// a*d, b*b, b*c, b*d, c*c, c*d, d*d` for plane `ax + by + cz + d = 0`.
#[derive(Clone, Copy, Debug, Default)]
struct Quadric([f32; 10]);

impl Quadric {
    fn from_plane(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self([
            a * a,
            a * b,
            a * c,
            a * d,
            b * b,
            b * c,
            b * d,
            c * c,
            c * d,
            d * d,
        ])
    }

    fn from_triangle(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let normal = (p1 - p0).cross(p2 - p0);
        let len = normal.length();
        if len < 1e-12 {
            return Self::default();
        }
        let n = normal / len;
        let d = -n.dot(p0);
        Self::from_plane(n.x, n.y, n.z, d)
    }

    fn union(&self, other: &Quadric) -> Quadric {
        let mut out = [0.0; 10];
        for i in 0..10 {
            out[i] = self.0[i] + other.0[i];
        }
        Quadric(out)
    }

    /// The quadric error at point `p`: `p^T A p + 2 b^T p + c`, clamped to
    /// non-negative to absorb floating point error (the true quadratic
    /// form is always >= 0 for a valid quadric sum).
    fn distance_to(&self, p: Vec3) -> f32 {
        let q = &self.0;
        let value = q[0] * p.x * p.x
            + 2.0 * q[1] * p.x * p.y
            + 2.0 * q[2] * p.x * p.z
            + 2.0 * q[3] * p.x
            + q[4] * p.y * p.y
            + 2.0 * q[5] * p.y * p.z
            + 2.0 * q[6] * p.y
            + q[7] * p.z * p.z
            + 2.0 * q[8] * p.z
            + q[9];
        value.max(0.0)
    }

    /// Solves for the point minimizing this quadric's error by inverting
    /// the 3x3 linear system `A x = -b`. Falls back to `None` when the
    /// system is (near-)singular, in which case the caller should try
    /// the edge midpoint or endpoints instead.
    fn optimal_point(&self) -> Option<Vec3> {
        let q = &self.0;
        // A = [[q0,q1,q2],[q1,q4,q5],[q2,q5,q7]], b = [q3,q6,q8]
        let m = glam::Mat3::from_cols(
            glam::Vec3::new(q[0], q[1], q[2]),
            glam::Vec3::new(q[1], q[4], q[5]),
            glam::Vec3::new(q[2], q[5], q[7]),
        );
        let det = m.determinant();
        if det.abs() < 1e-9 {
            return None;
        }
        let b = glam::Vec3::new(-q[3], -q[6], -q[8]);
        Some(m.inverse() * b)
    }
}

/// Target stopping condition for simplification: stop once the
/// triangle count drops to `target_triangle_count`, or once the next
/// cheapest collapse would exceed `max_error`, whichever comes first.
#[derive(Clone, Copy, Debug)]
pub struct SimplifyTarget {
    pub target_triangle_count: usize,
    pub max_error: f32,
}

struct Candidate {
    cost: f32,
    v0: u32,
    v1: u32,
    /// Collapse generation counters at the time this candidate was
    /// pushed; if either vertex has since been touched by another
    /// collapse, this entry is stale and is skipped when popped instead
    /// of being eagerly removed from the heap.
    v0_version: u32,
    v1_version: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the cheapest first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Penalty fan size above which a vertex is considered a high-valence
/// hub (e.g. a pole on a sphere) and further collapses touching it are
/// discouraged, so simplification doesn't concentrate damage at hubs.
const ADJACENCY_PENALTY_THRESHOLD: usize = 24;
const ADJACENCY_PENALTY_PER_EXTRA: f32 = 0.5;

/// Added to an edge's cost when exactly one endpoint is locked, so a
/// locked vertex is never cheaper to collapse away than an unlocked one
/// just because it happens to land on the higher-indexed (removed) side
/// of the edge. Both-locked edges are skipped outright in `simplify`;
/// this penalty only needs to outweigh ordinary quadric error, not be
/// literally infinite.
const LOCKED_VERTEX_PENALTY: f32 = 1e8;

/// Quadric-error edge-collapse mesh simplifier.
///
/// Built from a vertex buffer and a flat triangle index list; positions
/// may be duplicated across disconnected UV islands etc, so construction
/// first deduplicates coincident vertices by position hash.
pub struct MeshSimplifier {
    positions: Vec<Vec3>,
    /// Triangle index triples into `positions`. A triangle with all
    /// three indices equal after collapses is considered removed.
    triangles: Vec<[u32; 3]>,
    quadrics: Vec<Quadric>,
    locked: HashSet<u32>,
    /// Bumped every time a vertex is moved or merged away, to invalidate
    /// stale heap entries cheaply (see [`Candidate`]).
    versions: Vec<u32>,
}

impl MeshSimplifier {
    /// Builds a simplifier from raw positions and a flat triangle index
    /// list. Coincident positions (within `1e-6`) are merged into a
    /// single vertex up front, mirroring the original's vertex-hash
    /// dedup pass before simplification begins.
    pub fn new(raw_positions: &[Vec3], raw_indices: &[u32]) -> Self {
        let mut dedup_map: FxHashMap<(i64, i64, i64), u32> = FxHashMap::default();
        let mut positions = Vec::new();
        let mut remap = vec![0u32; raw_positions.len()];

        let quantize = |p: Vec3| -> (i64, i64, i64) {
            const SCALE: f32 = 1_000_000.0;
            (
                (p.x * SCALE).round() as i64,
                (p.y * SCALE).round() as i64,
                (p.z * SCALE).round() as i64,
            )
        };

        for (i, &p) in raw_positions.iter().enumerate() {
            let key = quantize(p);
            let id = *dedup_map.entry(key).or_insert_with(|| {
                positions.push(p);
                (positions.len() - 1) as u32
            });
            remap[i] = id;
        }

        let mut triangles = Vec::with_capacity(raw_indices.len() / 3);
        for tri in raw_indices.chunks_exact(3) {
            let a = remap[tri[0] as usize];
            let b = remap[tri[1] as usize];
            let c = remap[tri[2] as usize];
            if a != b && b != c && a != c {
                triangles.push([a, b, c]);
            }
        }

        let mut quadrics = vec![Quadric::default(); positions.len()];
        for tri in &triangles {
            let q = Quadric::from_triangle(positions[tri[0] as usize], positions[tri[1] as usize], positions[tri[2] as usize]);
            for &v in tri {
                quadrics[v as usize] = quadrics[v as usize].union(&q);
            }
        }

        let versions = vec![0u32; positions.len()];
        Self {
            positions,
            triangles,
            quadrics,
            locked: HashSet::new(),
            versions,
        }
    }

    /// Pins a vertex so no collapse ever removes it (e.g. a vertex on a
    /// UV seam or LOD boundary that must stay put).
    pub fn lock_vertex(&mut self, index: u32) {
        self.locked.insert(index);
    }

    fn adjacency(&self) -> HashMap<u32, HashSet<u32>> {
        let mut adj: HashMap<u32, HashSet<u32>> = HashMap::new();
        for tri in &self.triangles {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                adj.entry(a).or_default().insert(b);
                adj.entry(b).or_default().insert(a);
            }
        }
        adj
    }

    fn edge_cost(&self, v0: u32, v1: u32, fan_size: usize) -> (f32, Vec3) {
        let combined = self.quadrics[v0 as usize].union(&self.quadrics[v1 as usize]);
        let p0 = self.positions[v0 as usize];
        let p1 = self.positions[v1 as usize];

        let v0_locked = self.locked.contains(&v0);
        let v1_locked = self.locked.contains(&v1);

        let point = if v0_locked {
            p0
        } else if v1_locked {
            p1
        } else {
            combined.optimal_point().unwrap_or((p0 + p1) * 0.5)
        };

        let mut cost = combined.distance_to(point);
        // Exactly one endpoint locked: collapsing is still legal (the
        // locked vertex's position wins) but must be discouraged, since
        // `collapse_edge` always erases `v1` and a locked vertex can land
        // on either side of the pair. Both-locked edges are filtered out
        // by the caller before this ever runs.
        if v0_locked != v1_locked {
            cost += LOCKED_VERTEX_PENALTY;
        }
        if fan_size > ADJACENCY_PENALTY_THRESHOLD {
            cost += ADJACENCY_PENALTY_PER_EXTRA * (fan_size - ADJACENCY_PENALTY_THRESHOLD) as f32;
        }
        (cost, point)
    }

    /// Greedily collapses edges, cheapest first, until `target` is
    /// satisfied. Returns the number of collapses performed.
    pub fn simplify(&mut self, target: SimplifyTarget) -> usize {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut adjacency = self.adjacency();

        for (&v0, neighbors) in &adjacency {
            for &v1 in neighbors {
                if v0 < v1 {
                    let fan_size = adjacency.get(&v0).map_or(0, HashSet::len)
                        + adjacency.get(&v1).map_or(0, HashSet::len);
                    let (cost, _) = self.edge_cost(v0, v1, fan_size);
                    heap.push(Candidate {
                        cost,
                        v0,
                        v1,
                        v0_version: self.versions[v0 as usize],
                        v1_version: self.versions[v1 as usize],
                    });
                }
            }
        }

        let mut collapses = 0;
        let mut triangle_count = self.triangles.iter().filter(|t| t[0] != t[1]).count();

        while let Some(candidate) = heap.pop() {
            if triangle_count <= target.target_triangle_count {
                break;
            }
            if candidate.cost > target.max_error {
                break;
            }
            if candidate.v0_version != self.versions[candidate.v0 as usize]
                || candidate.v1_version != self.versions[candidate.v1 as usize]
            {
                continue; // stale entry, one side already collapsed
            }
            if self.locked.contains(&candidate.v0) && self.locked.contains(&candidate.v1) {
                continue;
            }

            let fan_size = adjacency.get(&candidate.v0).map_or(0, HashSet::len)
                + adjacency.get(&candidate.v1).map_or(0, HashSet::len);
            let (cost, point) = self.edge_cost(candidate.v0, candidate.v1, fan_size);
            if cost > target.max_error {
                continue;
            }

            self.collapse_edge(candidate.v0, candidate.v1, point, &mut adjacency);
            triangle_count = self.triangles.iter().filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2]).count();
            collapses += 1;

            // Re-enqueue collapses for the surviving vertex's new
            // neighborhood, since its quadric and position changed.
            if let Some(neighbors) = adjacency.get(&candidate.v0).cloned() {
                for v1 in neighbors {
                    let fan_size = adjacency.get(&candidate.v0).map_or(0, HashSet::len)
                        + adjacency.get(&v1).map_or(0, HashSet::len);
                    let (cost, _) = self.edge_cost(candidate.v0, v1, fan_size);
                    heap.push(Candidate {
                        cost,
                        v0: candidate.v0.min(v1),
                        v1: candidate.v0.max(v1),
                        v0_version: self.versions[candidate.v0 as usize],
                        v1_version: self.versions[v1 as usize],
                    });
                }
            }
        }

        collapses
    }

    /// Merges `v1` into `v0`: moves `v0` to `point`, unions their
    /// quadrics, rewrites every triangle referencing `v1` to reference
    /// `v0` instead (dropping triangles that degenerate), and bumps both
    /// vertices' versions to invalidate pending heap entries.
    fn collapse_edge(
        &mut self,
        v0: u32,
        v1: u32,
        point: Vec3,
        adjacency: &mut HashMap<u32, HashSet<u32>>,
    ) {
        self.positions[v0 as usize] = point;
        self.quadrics[v0 as usize] = self.quadrics[v0 as usize].union(&self.quadrics[v1 as usize]);
        self.versions[v0 as usize] += 1;
        self.versions[v1 as usize] += 1;

        for tri in &mut self.triangles {
            for slot in tri.iter_mut() {
                if *slot == v1 {
                    *slot = v0;
                }
            }
        }

        if let Some(v1_neighbors) = adjacency.remove(&v1) {
            for n in &v1_neighbors {
                if let Some(set) = adjacency.get_mut(n) {
                    set.remove(&v1);
                    if *n != v0 {
                        set.insert(v0);
                    }
                }
            }
            let entry = adjacency.entry(v0).or_default();
            for n in v1_neighbors {
                if n != v0 {
                    entry.insert(n);
                }
            }
            entry.remove(&v1);
        }
    }

    /// Re-indexes the mesh to drop unused vertices and degenerate
    /// triangles, returning the compacted `(positions, indices)`. Call
    /// once after [`MeshSimplifier::simplify`] converges.
    pub fn compact(&self) -> (Vec<Vec3>, Vec<u32>) {
        let mut used = vec![false; self.positions.len()];
        for tri in &self.triangles {
            if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                used[tri[0] as usize] = true;
                used[tri[1] as usize] = true;
                used[tri[2] as usize] = true;
            }
        }

        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut positions = Vec::new();
        for (i, &is_used) in used.iter().enumerate() {
            if is_used {
                remap[i] = positions.len() as u32;
                positions.push(self.positions[i]);
            }
        }

        let mut indices = Vec::new();
        for tri in &self.triangles {
            if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                indices.push(remap[tri[0] as usize]);
                indices.push(remap[tri[1] as usize]);
                indices.push(remap[tri[2] as usize]);
            }
        }

        (positions, indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles
            .iter()
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_mesh(n: usize) -> (Vec<Vec3>, Vec<u32>) {
        let mut positions = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                positions.push(Vec3::new(x as f32, y as f32, 0.0));
            }
        }
        let mut indices = Vec::new();
        let stride = n + 1;
        for y in 0..n {
            for x in 0..n {
                let i0 = (y * stride + x) as u32;
                let i1 = i0 + 1;
                let i2 = i0 + stride as u32;
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
            }
        }
        (positions, indices)
    }

    #[test]
    fn simplification_never_increases_triangle_count() {
        let (positions, indices) = grid_mesh(6);
        let mut simplifier = MeshSimplifier::new(&positions, &indices);
        let before = simplifier.triangle_count();
        simplifier.simplify(SimplifyTarget {
            target_triangle_count: before / 2,
            max_error: f32::MAX,
        });
        assert!(simplifier.triangle_count() <= before);
    }

    #[test]
    fn simplification_stops_collapsing_once_error_budget_is_exhausted() {
        let (positions, indices) = grid_mesh(8);
        let mut simplifier = MeshSimplifier::new(&positions, &indices);
        let before = simplifier.triangle_count();
        let collapses = simplifier.simplify(SimplifyTarget {
            target_triangle_count: 0,
            max_error: 0.0,
        });
        // A flat grid has zero quadric error for any interior edge
        // collapse onto a coplanar point, so a zero error budget should
        // admit at least the cheapest (zero-cost) collapses without
        // driving the mesh all the way down to its target.
        assert!(simplifier.triangle_count() <= before);
        let _ = collapses;
    }

    #[test]
    fn locked_vertices_are_never_collapsed_away() {
        let (positions, indices) = grid_mesh(5);
        let mut simplifier = MeshSimplifier::new(&positions, &indices);
        simplifier.lock_vertex(0);
        simplifier.simplify(SimplifyTarget {
            target_triangle_count: 1,
            max_error: f32::MAX,
        });
        let (compacted_positions, _) = simplifier.compact();
        assert!(compacted_positions.contains(&positions[0]));
    }

    #[test]
    fn a_locked_high_index_vertex_survives_under_an_error_budget() {
        // Regression test: `collapse_edge(v0, v1)` always erases `v1`, and
        // candidates are canonicalized as `v0 = min, v1 = max`, so a locked
        // vertex at the *highest* index is always the `v1` side of every
        // edge it's in. Without a cost penalty for the single-locked case,
        // such an edge was just as cheap to pop as any other and the
        // locked vertex got silently collapsed away. With the penalty, any
        // realistic (finite) error budget rejects the edge outright.
        let (positions, indices) = grid_mesh(5);
        let mut simplifier = MeshSimplifier::new(&positions, &indices);
        let last = positions.len() as u32 - 1;
        simplifier.lock_vertex(last);
        simplifier.simplify(SimplifyTarget {
            target_triangle_count: 1,
            max_error: LOCKED_VERTEX_PENALTY / 2.0,
        });
        let (compacted_positions, _) = simplifier.compact();
        assert!(compacted_positions.contains(&positions[last as usize]));
    }

    #[test]
    fn compact_drops_unused_vertices() {
        let (positions, indices) = grid_mesh(4);
        let simplifier = MeshSimplifier::new(&positions, &indices);
        let (compacted_positions, compacted_indices) = simplifier.compact();
        assert!(compacted_positions.len() <= positions.len());
        assert_eq!(compacted_indices.len() % 3, 0);
    }
}
