use super::thread_pool::ThreadPool;

/// Splits `[0, count)` into chunks and runs `body` for each chunk on
/// `pool`, blocking until all chunks finish. `body` receives the
/// half-open range `[start, end)` it owns.
///
/// Used by the BVH builder (`HLBVHBuild`'s per-treelet construction) and
/// the scene baker (per-chunk SDF slices) to fan work across the pool
/// without each call site hand-rolling chunk math and a join barrier.
pub fn parallel_for<F>(pool: &ThreadPool, count: usize, body: F)
where
    F: Fn(std::ops::Range<usize>) + Send + Sync,
{
    if count == 0 {
        return;
    }
    let workers = pool.num_workers().max(1);
    let chunk_size = count.div_ceil(workers).max(1);
    let body = std::sync::Arc::new(body);

    let mut handles = Vec::new();
    let mut start = 0;
    while start < count {
        let end = (start + chunk_size).min(count);
        let body = body.clone();
        handles.push(pool.submit(move || {
            body(start..end);
            true
        }));
        start = end;
    }
    for handle in handles {
        handle.wait();
    }
}

/// 2D variant: splits a `width * height` grid into row bands and runs
/// `body(x_range, y)` for each row within a band. Used by surface-cache
/// atlas baking, which processes one texel row at a time.
pub fn parallel_for_2d<F>(pool: &ThreadPool, width: usize, height: usize, body: F)
where
    F: Fn(std::ops::Range<usize>, usize) + Send + Sync,
{
    if width == 0 || height == 0 {
        return;
    }
    let body = std::sync::Arc::new(body);
    parallel_for(pool, height, move |rows| {
        for y in rows {
            body(0..width, y);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn parallel_for_covers_every_index_exactly_once() {
        let pool = ThreadPool::new(4);
        let hits = Arc::new((0..1000).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let hits_clone = hits.clone();
        parallel_for(&pool, 1000, move |range| {
            for i in range {
                hits_clone[i].fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(hits.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn parallel_for_2d_visits_every_cell() {
        let pool = ThreadPool::new(3);
        let hits = Arc::new(parking_lot::Mutex::new(vec![0u32; 20 * 7]));
        let hits_clone = hits.clone();
        parallel_for_2d(&pool, 20, 7, move |xs, y| {
            let mut grid = hits_clone.lock();
            for x in xs {
                grid[y * 20 + x] += 1;
            }
        });
        assert!(hits.lock().iter().all(|&c| c == 1));
    }
}
