//! Process-wide work-stealing executor, shared by the note store's
//! parallel sort, its parallel visitor, and pass 2 of the emission
//! pipeline.
//!
//! Mirrors the `OnceLock`-backed singleton pattern used for
//! `difficulty::registry::global_registry` elsewhere in this codebase:
//! constructed lazily on first use, torn down only with the process.

use std::sync::OnceLock;

static POOL: OnceLock<rayon::ThreadPool> = OnceLock::new();

/// Returns the shared work-stealing pool, building it on first access.
///
/// Falls back to a single-thread pool if the platform refuses to report
/// hardware concurrency or the pool fails to build; callers never see a
/// panic from this path.
pub fn global_pool() -> &'static rayon::ThreadPool {
    POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to a single-thread pool: {e}");
                rayon::ThreadPoolBuilder::new()
                    .num_threads(1)
                    .build()
                    .expect("single-thread rayon pool always builds")
            })
    })
}

/// Hardware thread count as rayon sees it, for threshold decisions.
pub fn hardware_threads() -> usize {
    global_pool().current_num_threads()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_has_at_least_one_thread() {
        assert!(hardware_threads() >= 1);
    }
}
