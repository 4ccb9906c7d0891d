//! Shared worker pool sizing.
//!
//! Subscriber logic and long-running skills run on one multi-threaded
//! runtime sized to half the machine's cores; the transport keeps its
//! own dedicated thread and never blocks on user code.

use tokio::runtime::{Builder, Runtime};

/// Default worker count: half the cores, at least two.
pub fn default_worker_threads() -> usize {
    (num_cpus::get() / 2).max(2)
}

/// Build the shared runtime the substrate and skills run on.
pub fn build_runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(default_worker_threads())
        .thread_name("waymark-worker")
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_has_floor() {
        assert!(default_worker_threads() >= 2);
    }

    #[test]
    fn runtime_builds_and_runs() {
        let rt = build_runtime().unwrap();
        let out = rt.block_on(async { 21 * 2 });
        assert_eq!(out, 42);
    }
}
