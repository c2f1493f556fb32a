//! Parallel map on a bounded number of worker threads.
//!
//! Work items here are whole image pairs, each of which fans out further on
//! rayon. Nested work runs on the same bounded workers.

use rayon::prelude::*;

/// Resolves a requested concurrency, where 0 means one item per rayon thread.
pub fn effective_concurrency(requested: usize) -> usize {
    if requested == 0 {
        rayon::current_num_threads().max(1)
    } else {
        requested
    }
}

/// Maps `f` over `items` on at most `max_concurrent` worker threads,
/// preserving input order. `max_concurrent == 0` uses the current pool as is.
///
/// A capped run gets its own thread pool of that size, so a slow item only
/// holds up one worker. If the pool cannot be built the items are processed
/// in chunks of `max_concurrent` on the current pool instead.
pub fn par_map_limited<T, R, F>(items: &[T], max_concurrent: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let limit = effective_concurrency(max_concurrent);
    if limit >= rayon::current_num_threads() || items.len() <= 1 {
        return items.par_iter().map(&f).collect();
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(limit)
        .thread_name(|i| format!("item-worker-{i}"))
        .build()
    {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(err) => {
            tracing::warn!("Failed to build a {limit}-thread pool, running in chunks: {err}");
            items
                .chunks(limit)
                .flat_map(|chunk| chunk.par_iter().map(&f).collect::<Vec<R>>())
                .collect()
        }
    }
}
