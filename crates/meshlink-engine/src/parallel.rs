//! Bounded, order-restoring parallel map.
//!
//! Each task pushes its result into a lock-free queue tagged with the
//! position of its input. After every task has joined, the single
//! consumer drains the queue and sorts by that tag, so the output order
//! never depends on thread scheduling.

use crossbeam::queue::SegQueue;
use rayon::prelude::*;

/// Number of worker threads a pool built for `max_parallelism` will use.
///
/// Zero means one per available core.
#[must_use]
pub fn effective_parallelism(max_parallelism: usize) -> usize {
    if max_parallelism == 0 {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    } else {
        max_parallelism
    }
}

/// Apply `f` to every item on a dedicated pool of at most
/// `max_parallelism` threads, returning results in input order.
///
/// # Errors
///
/// Returns the pool construction error if the worker threads cannot be
/// spawned. No item has been processed in that case.
pub fn map_ordered<T, R, F>(
    items: &[T],
    max_parallelism: usize,
    f: F,
) -> Result<Vec<R>, rayon::ThreadPoolBuildError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_parallelism)
        .thread_name(|i| format!("meshlink-resolve-{i}"))
        .build()?;

    let queue = SegQueue::new();
    pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .for_each(|(position, item)| queue.push((position, f(item))));
    });

    let mut tagged = Vec::with_capacity(queue.len());
    while let Some(entry) = queue.pop() {
        tagged.push(entry);
    }
    tagged.sort_unstable_by_key(|&(position, _)| position);
    Ok(tagged.into_iter().map(|(_, result)| result).collect())
}
