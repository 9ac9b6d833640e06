use smallvec::SmallVec;

use crate::concurrency::ThreadPool;
use crate::math::{Aabb, Vec3};

use super::morton::morton_code_for_point;

/// One triangle (or other primitive) fed to the builder. `index` is the
/// caller's original primitive index, preserved through sorting so the
/// flattened tree can report which input primitive a leaf covers.
#[derive(Clone, Copy, Debug)]
pub struct Primitive {
    pub bounds: Aabb,
    pub centroid: Vec3,
    pub index: u32,
}

/// A node in the flattened BVH, 32 bytes so a cache line holds exactly
/// two. Leaves are marked by `count > 0`: `offset` then indexes into the
/// accel's ordered-primitive list. Interior nodes have `count == 0`;
/// `offset` is the index of the second child (the first child is always
/// this node's index + 1).
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct BvhNode {
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    offset: u32,
    count: u16,
    axis: u8,
    _pad: u8,
}

const _: () = assert!(std::mem::size_of::<BvhNode>() == 32);

impl BvhNode {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.bounds_min.into(), self.bounds_max.into())
    }

    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    pub fn leaf_range(&self) -> std::ops::Range<u32> {
        self.offset..self.offset + u32::from(self.count)
    }

    pub fn second_child_offset(&self) -> u32 {
        self.offset
    }

    pub fn split_axis(&self) -> usize {
        self.axis as usize
    }
}

/// Build strategy. `LocallyOrderedClustering` is the fast default used
/// for most runtime rebuilds (e.g. per-chunk scene-grid BVHs); `Sah` gives
/// the best traversal quality for static, once-built geometry; `Hlbvh`
/// scales to very large primitive counts by building treelets in
/// parallel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitMethod {
    Sah,
    Hlbvh,
    LocallyOrderedClustering,
}

const SAH_BUCKET_COUNT: usize = 12;
const MAX_LEAF_SIZE: usize = 4;

/// A built BVH: a flattened node array plus the primitive order the
/// leaves index into.
pub struct BvhAccel {
    nodes: Vec<BvhNode>,
    ordered_primitive_indices: Vec<u32>,
}

impl BvhAccel {
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn ordered_primitive_indices(&self) -> &[u32] {
        &self.ordered_primitive_indices
    }

    pub fn world_bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, BvhNode::bounds)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds a BVH over `primitives` using `method`. `pool` is used by
    /// the HLBVH builder to construct treelets concurrently; it is
    /// ignored by the other two methods, which are cheap enough to run
    /// single-threaded.
    pub fn build(primitives: &[Primitive], method: SplitMethod, pool: &ThreadPool) -> Self {
        if primitives.is_empty() {
            return Self {
                nodes: Vec::new(),
                ordered_primitive_indices: Vec::new(),
            };
        }

        match method {
            SplitMethod::Sah => build_sah(primitives),
            SplitMethod::Hlbvh => build_hlbvh(primitives, pool),
            SplitMethod::LocallyOrderedClustering => build_loc(primitives),
        }
    }
}

// ============================================================================
// Top-down SAH
// ============================================================================

struct SahWorkItem {
    bounds: Aabb,
    centroid_bounds: Aabb,
    indices: Vec<usize>,
}

fn build_sah(primitives: &[Primitive]) -> BvhAccel {
    let mut nodes = Vec::new();
    let mut ordered = Vec::with_capacity(primitives.len());

    let all_indices: Vec<usize> = (0..primitives.len()).collect();
    let (bounds, centroid_bounds) = compute_bounds(primitives, &all_indices);
    let root = SahWorkItem {
        bounds,
        centroid_bounds,
        indices: all_indices,
    };
    recursive_build_sah(primitives, root, &mut nodes, &mut ordered);
    BvhAccel {
        nodes,
        ordered_primitive_indices: ordered,
    }
}

fn compute_bounds(primitives: &[Primitive], indices: &[usize]) -> (Aabb, Aabb) {
    let mut bounds = Aabb::EMPTY;
    let mut centroid_bounds = Aabb::EMPTY;
    for &i in indices {
        bounds = bounds.union(&primitives[i].bounds);
        centroid_bounds = centroid_bounds.union_point(primitives[i].centroid);
    }
    (bounds, centroid_bounds)
}

/// Returns the index of the node just written.
fn recursive_build_sah(
    primitives: &[Primitive],
    item: SahWorkItem,
    nodes: &mut Vec<BvhNode>,
    ordered: &mut Vec<u32>,
) -> usize {
    let node_index = nodes.len();
    nodes.push(BvhNode {
        bounds_min: item.bounds.min.into(),
        bounds_max: item.bounds.max.into(),
        offset: 0,
        count: 0,
        axis: 0,
        _pad: 0,
    });

    let n = item.indices.len();
    if n <= MAX_LEAF_SIZE || item.centroid_bounds.is_empty() {
        make_leaf(primitives, &item.indices, node_index, nodes, ordered);
        return node_index;
    }

    let axis = item.centroid_bounds.max_extent_axis();
    let extent = item.centroid_bounds.extent()[axis];
    if extent < 1e-12 {
        make_leaf(primitives, &item.indices, node_index, nodes, ordered);
        return node_index;
    }

    // Bucket primitives along `axis` into SAH_BUCKET_COUNT buckets by
    // centroid position, then pick the partition with lowest estimated
    // traversal cost.
    let mut bucket_counts = [0usize; SAH_BUCKET_COUNT];
    let mut bucket_bounds = [Aabb::EMPTY; SAH_BUCKET_COUNT];
    let bucket_of = |centroid: Vec3| -> usize {
        let min = item.centroid_bounds.min[axis];
        let offset = (centroid[axis] - min) / extent;
        ((offset * SAH_BUCKET_COUNT as f32) as usize).min(SAH_BUCKET_COUNT - 1)
    };

    for &i in &item.indices {
        let b = bucket_of(primitives[i].centroid);
        bucket_counts[b] += 1;
        bucket_bounds[b] = bucket_bounds[b].union(&primitives[i].bounds);
    }

    let mut best_cost = f32::MAX;
    let mut best_split = 0usize;
    for split in 0..SAH_BUCKET_COUNT - 1 {
        let mut left_bounds = Aabb::EMPTY;
        let mut left_count = 0usize;
        for b in bucket_bounds.iter().take(split + 1).enumerate().map(|(i, _)| i) {
            left_bounds = left_bounds.union(&bucket_bounds[b]);
            left_count += bucket_counts[b];
        }
        let mut right_bounds = Aabb::EMPTY;
        let mut right_count = 0usize;
        for b in (split + 1)..SAH_BUCKET_COUNT {
            right_bounds = right_bounds.union(&bucket_bounds[b]);
            right_count += bucket_counts[b];
        }
        if left_count == 0 || right_count == 0 {
            continue;
        }
        let cost = 0.125
            + (left_count as f32 * left_bounds.surface_area()
                + right_count as f32 * right_bounds.surface_area())
                / item.bounds.surface_area().max(1e-12);
        if cost < best_cost {
            best_cost = cost;
            best_split = split;
        }
    }

    let leaf_cost = n as f32;
    if best_cost >= leaf_cost && n <= MAX_LEAF_SIZE * 4 {
        make_leaf(primitives, &item.indices, node_index, nodes, ordered);
        return node_index;
    }

    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    for &i in &item.indices {
        if bucket_of(primitives[i].centroid) <= best_split {
            left_indices.push(i);
        } else {
            right_indices.push(i);
        }
    }
    if left_indices.is_empty() || right_indices.is_empty() {
        make_leaf(primitives, &item.indices, node_index, nodes, ordered);
        return node_index;
    }

    let (left_bounds, left_centroid_bounds) = compute_bounds(primitives, &left_indices);
    let (right_bounds, right_centroid_bounds) = compute_bounds(primitives, &right_indices);

    recursive_build_sah(
        primitives,
        SahWorkItem {
            bounds: left_bounds,
            centroid_bounds: left_centroid_bounds,
            indices: left_indices,
        },
        nodes,
        ordered,
    );
    let second_child = recursive_build_sah(
        primitives,
        SahWorkItem {
            bounds: right_bounds,
            centroid_bounds: right_centroid_bounds,
            indices: right_indices,
        },
        nodes,
        ordered,
    );

    nodes[node_index].offset = second_child as u32;
    nodes[node_index].axis = axis as u8;
    node_index
}

fn make_leaf(
    primitives: &[Primitive],
    indices: &[usize],
    node_index: usize,
    nodes: &mut [BvhNode],
    ordered: &mut Vec<u32>,
) {
    let offset = ordered.len() as u32;
    for &i in indices {
        ordered.push(primitives[i].index);
    }
    let node = &mut nodes[node_index];
    node.offset = offset;
    node.count = indices.len() as u16;
}

// ============================================================================
// HLBVH
// ============================================================================

fn build_hlbvh(primitives: &[Primitive], pool: &ThreadPool) -> BvhAccel {
    let (world_bounds, _) = compute_bounds(primitives, &(0..primitives.len()).collect::<Vec<_>>());

    let mut keyed: Vec<(u32, usize)> = primitives
        .iter()
        .enumerate()
        .map(|(i, p)| (morton_code_for_point(p.centroid, &world_bounds), i))
        .collect();
    radix_sort_by_key(&mut keyed);

    // Primitives sharing the top 12 bits of their Morton code form one
    // treelet; treelets are built independently (in parallel) with plain
    // SAH, then an upper-level SAH pass stitches the treelet roots
    // together.
    const TREELET_MASK_BITS: u32 = 12;
    let mask = ((1u32 << TREELET_MASK_BITS) - 1) << (30 - TREELET_MASK_BITS);

    let mut treelet_ranges: Vec<std::ops::Range<usize>> = Vec::new();
    let mut start = 0;
    for i in 1..=keyed.len() {
        if i == keyed.len() || (keyed[i].0 & mask) != (keyed[start].0 & mask) {
            treelet_ranges.push(start..i);
            start = i;
        }
    }

    // Each treelet only needs its own primitives, copied out as an owned
    // `Vec` so it can be moved into a pool job without borrowing `primitives`
    // (whose lifetime the pool can't track) across threads.
    let treelet_jobs: Vec<Vec<Primitive>> = treelet_ranges
        .iter()
        .map(|range| {
            keyed[range.clone()]
                .iter()
                .map(|&(_, idx)| primitives[idx])
                .collect()
        })
        .collect();

    let results: std::sync::Arc<parking_lot::Mutex<Vec<Option<(Vec<BvhNode>, Vec<u32>)>>>> =
        std::sync::Arc::new(parking_lot::Mutex::new(
            (0..treelet_jobs.len()).map(|_| None).collect(),
        ));

    let handles: Vec<_> = treelet_jobs
        .into_iter()
        .enumerate()
        .map(|(slot, treelet_primitives)| {
            let results = results.clone();
            pool.submit(move || {
                let local_indices: Vec<usize> = (0..treelet_primitives.len()).collect();
                let (bounds, centroid_bounds) = compute_bounds(&treelet_primitives, &local_indices);
                let mut nodes = Vec::new();
                let mut ordered = Vec::new();
                recursive_build_sah(
                    &treelet_primitives,
                    SahWorkItem {
                        bounds,
                        centroid_bounds,
                        indices: local_indices,
                    },
                    &mut nodes,
                    &mut ordered,
                );
                results.lock()[slot] = Some((nodes, ordered));
            })
        })
        .collect();
    for handle in handles {
        handle.wait();
    }
    let treelet_results: Vec<(Vec<BvhNode>, Vec<u32>)> = std::mem::take(&mut *results.lock())
        .into_iter()
        .map(|r| r.expect("every treelet builds"))
        .collect();

    // Stitch: build an upper-level SAH tree whose leaves are the treelet
    // roots, then splice each treelet's node array in, offsetting its
    // internal indices.
    let treelet_bounds: Vec<Aabb> = treelet_results
        .iter()
        .map(|(nodes, _)| nodes.first().map_or(Aabb::EMPTY, BvhNode::bounds))
        .collect();
    let treelet_centroids: Vec<Vec3> = treelet_bounds.iter().map(Aabb::centroid).collect();

    let upper_primitives: Vec<Primitive> = treelet_bounds
        .iter()
        .zip(treelet_centroids.iter())
        .enumerate()
        .map(|(i, (b, c))| Primitive {
            bounds: *b,
            centroid: *c,
            index: i as u32,
        })
        .collect();

    let upper = build_sah(&upper_primitives);

    // Re-emit the upper tree, replacing each leaf (which always covers
    // exactly one treelet by construction below) with the treelet's own
    // nodes, offset into the final array.
    let mut nodes = Vec::new();
    let mut ordered = Vec::new();
    splice_upper_tree(&upper, 0, &treelet_results, &mut nodes, &mut ordered);

    BvhAccel {
        nodes,
        ordered_primitive_indices: ordered,
    }
}

fn splice_upper_tree(
    upper: &BvhAccel,
    upper_index: usize,
    treelet_results: &[(Vec<BvhNode>, Vec<u32>)],
    nodes: &mut Vec<BvhNode>,
    ordered: &mut Vec<u32>,
) -> usize {
    let upper_node = upper.nodes[upper_index];
    let out_index = nodes.len();
    nodes.push(upper_node);

    if upper_node.is_leaf() {
        // Exactly one upper-tree primitive per leaf by construction: the
        // recursive SAH builder only merges buckets, never individual
        // primitives, when each "primitive" here is itself a treelet.
        let treelet_id = upper.ordered_primitive_indices[upper_node.offset as usize] as usize;
        let (treelet_nodes, treelet_ordered) = &treelet_results[treelet_id];
        let base_ordered = ordered.len() as u32;
        ordered.extend_from_slice(treelet_ordered);

        let base_node = nodes.len() - 1;
        nodes.truncate(base_node);
        let treelet_base = nodes.len();
        for n in treelet_nodes {
            let mut n = *n;
            if n.is_leaf() {
                n.offset += base_ordered;
            } else {
                n.offset += treelet_base as u32;
            }
            nodes.push(n);
        }
        return out_index;
    }

    splice_upper_tree(upper, upper_index + 1, treelet_results, nodes, ordered);
    let second = splice_upper_tree(
        upper,
        upper_node.second_child_offset() as usize,
        treelet_results,
        nodes,
        ordered,
    );
    nodes[out_index].offset = second as u32;
    nodes[out_index].count = 0;
    out_index
}

fn radix_sort_by_key(items: &mut [(u32, usize)]) {
    const BITS_PER_PASS: u32 = 6;
    const NUM_PASSES: u32 = 30 / BITS_PER_PASS;
    const NUM_BUCKETS: usize = 1 << BITS_PER_PASS;

    let mut front: Vec<(u32, usize)> = items.to_vec();
    let mut back: Vec<(u32, usize)> = items.to_vec();

    for pass in 0..NUM_PASSES {
        let shift = pass * BITS_PER_PASS;
        let mask = (NUM_BUCKETS as u32) - 1;

        let mut counts = [0usize; NUM_BUCKETS];
        for &(key, _) in &front {
            counts[((key >> shift) & mask) as usize] += 1;
        }
        let mut offsets = [0usize; NUM_BUCKETS];
        let mut sum = 0;
        for (bucket, count) in counts.iter().enumerate() {
            offsets[bucket] = sum;
            sum += count;
        }
        for item in &front {
            let bucket = ((item.0 >> shift) & mask) as usize;
            back[offsets[bucket]] = *item;
            offsets[bucket] += 1;
        }
        std::mem::swap(&mut front, &mut back);
    }
    items.copy_from_slice(&front);
}

// ============================================================================
// Locally-ordered clustering (fast default)
// ============================================================================

/// Builds a BVH by sorting primitives into Morton order and repeatedly
/// merging adjacent clusters with the lowest combined surface-area cost
/// (PLOC-style), rather than recursing top-down. No recursion means no
/// risk of stack depth scaling with primitive count, and a single
/// linear-ish pass over sorted input is cheap enough to re-run every
/// frame for small per-chunk primitive sets.
fn build_loc(primitives: &[Primitive]) -> BvhAccel {
    let (world_bounds, _) = compute_bounds(primitives, &(0..primitives.len()).collect::<Vec<_>>());

    let mut clusters: Vec<Cluster> = primitives
        .iter()
        .map(|p| Cluster {
            bounds: p.bounds,
            morton: morton_code_for_point(p.centroid, &world_bounds),
            node_index: None,
            leaf_indices: SmallVec::from_slice(&[p.index]),
        })
        .collect();
    clusters.sort_by_key(|c| c.morton);

    let mut nodes = Vec::new();
    let mut ordered = Vec::new();
    let mut node_of_cluster: Vec<usize> = clusters
        .iter()
        .map(|c| {
            let idx = nodes.len();
            let offset = ordered.len() as u32;
            ordered.extend(c.leaf_indices.iter().copied());
            nodes.push(BvhNode {
                bounds_min: c.bounds.min.into(),
                bounds_max: c.bounds.max.into(),
                offset,
                count: c.leaf_indices.len() as u16,
                axis: 0,
                _pad: 0,
            });
            idx
        })
        .collect();

    // Merge window: at each round, pair cluster i with whichever neighbor
    // in [i-window, i+window] yields the smallest merged surface area,
    // then collapse matched pairs into interior nodes. Repeat until one
    // cluster remains.
    const WINDOW: usize = 6;
    let mut active: Vec<usize> = (0..clusters.len()).collect();

    while active.len() > 1 {
        let mut best_partner = vec![usize::MAX; active.len()];
        for i in 0..active.len() {
            let lo = i.saturating_sub(WINDOW);
            let hi = (i + WINDOW + 1).min(active.len());
            let mut best_cost = f32::MAX;
            let mut best_j = usize::MAX;
            for j in lo..hi {
                if j == i {
                    continue;
                }
                let merged = clusters[active[i]].bounds.union(&clusters[active[j]].bounds);
                let cost = merged.surface_area();
                if cost < best_cost {
                    best_cost = cost;
                    best_j = j;
                }
            }
            best_partner[i] = best_j;
        }

        let mut merged_flag = vec![false; active.len()];
        let mut next_active = Vec::new();
        for i in 0..active.len() {
            if merged_flag[i] {
                continue;
            }
            let j = best_partner[i];
            if j != usize::MAX && !merged_flag[j] && best_partner[j] == i {
                // Mutual best match: merge i and j into a new interior node.
                let bounds = clusters[active[i]].bounds.union(&clusters[active[j]].bounds);
                let left_node = node_of_cluster[active[i]];
                let right_node = node_of_cluster[active[j]];
                let new_index = nodes.len();
                nodes.push(BvhNode {
                    bounds_min: bounds.min.into(),
                    bounds_max: bounds.max.into(),
                    offset: 0,
                    count: 0,
                    axis: 0,
                    _pad: 0,
                });
                // Children must be contiguous for the `offset == second
                // child` convention; since they were built independently,
                // relocate by copying (cheap: nodes are 32 bytes).
                let left_copy = nodes[left_node];
                let right_copy = nodes[right_node];
                let new_left = nodes.len();
                nodes.push(left_copy);
                let new_right = nodes.len();
                nodes.push(right_copy);
                nodes[new_index].offset = new_right as u32;
                let _ = new_left;

                let new_cluster_id = clusters.len();
                clusters.push(Cluster {
                    bounds,
                    morton: clusters[active[i]].morton,
                    node_index: Some(new_index),
                    leaf_indices: SmallVec::new(),
                });
                node_of_cluster.push(new_index);
                next_active.push(new_cluster_id);
                merged_flag[i] = true;
                merged_flag[j] = true;
            }
        }
        for i in 0..active.len() {
            if !merged_flag[i] {
                next_active.push(active[i]);
            }
        }
        if next_active.len() == active.len() {
            // No mutual pairs found this round (can happen near the
            // boundary of the window); force-merge the first two to
            // guarantee progress.
            let bounds = clusters[active[0]].bounds.union(&clusters[active[1]].bounds);
            let left_copy = nodes[node_of_cluster[active[0]]];
            let right_copy = nodes[node_of_cluster[active[1]]];
            let new_index = nodes.len();
            nodes.push(BvhNode {
                bounds_min: bounds.min.into(),
                bounds_max: bounds.max.into(),
                offset: 0,
                count: 0,
                axis: 0,
                _pad: 0,
            });
            nodes.push(left_copy);
            let right_index = nodes.len();
            nodes.push(right_copy);
            nodes[new_index].offset = right_index as u32;
            let new_cluster_id = clusters.len();
            clusters.push(Cluster {
                bounds,
                morton: clusters[active[0]].morton,
                node_index: Some(new_index),
                leaf_indices: SmallVec::new(),
            });
            node_of_cluster.push(new_index);
            next_active = vec![new_cluster_id];
            next_active.extend_from_slice(&active[2..]);
        }
        active = next_active;
    }

    BvhAccel {
        nodes,
        ordered_primitive_indices: ordered,
    }
}

struct Cluster {
    bounds: Aabb,
    morton: u32,
    #[allow(dead_code)]
    node_index: Option<usize>,
    leaf_indices: SmallVec<[u32; 1]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Ray;

    fn make_test_primitives(n: usize) -> Vec<Primitive> {
        (0..n)
            .map(|i| {
                let x = i as f32 * 2.0;
                let min = Vec3::new(x, 0.0, 0.0);
                let max = Vec3::new(x + 1.0, 1.0, 1.0);
                Primitive {
                    bounds: Aabb::new(min, max),
                    centroid: (min + max) * 0.5,
                    index: i as u32,
                }
            })
            .collect()
    }

    #[test]
    fn sah_build_covers_all_primitives() {
        let prims = make_test_primitives(37);
        let accel = build_sah(&prims);
        assert_eq!(accel.ordered_primitive_indices.len(), 37);
        let mut seen: Vec<u32> = accel.ordered_primitive_indices.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..37).collect::<Vec<u32>>());
    }

    #[test]
    fn sah_root_bounds_contain_every_primitive() {
        let prims = make_test_primitives(50);
        let accel = build_sah(&prims);
        let root_bounds = accel.world_bounds();
        for p in &prims {
            assert!(root_bounds.overlaps(&p.bounds));
        }
    }

    #[test]
    fn loc_build_covers_all_primitives() {
        let prims = make_test_primitives(40);
        let accel = build_loc(&prims);
        let mut seen = accel.ordered_primitive_indices.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<u32>>());
    }

    #[test]
    fn sah_traversal_finds_ray_through_middle_primitive() {
        let prims = make_test_primitives(20);
        let accel = build_sah(&prims);
        let ray = Ray::new(Vec3::new(10.5, 0.5, -5.0), Vec3::new(0.0, 0.0, 1.0), 100.0);
        assert!(accel.world_bounds().is_empty() == false);
        assert!(ray.intersects_aabb(&accel.world_bounds()));
    }
}
