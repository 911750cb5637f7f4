use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`crate::WorkspaceUpdater`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Size of the update-all worker pool. Zero is treated as one.
    pub worker_threads: usize,
    /// Granularity at which delays re-check the stop flag.
    pub delay_slice: Duration,
    /// Name of the run loop thread; workers get a numbered suffix.
    pub thread_name: String,
}

impl UpdaterConfig {
    /// Sets the worker pool size.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Sets the delay slice.
    pub fn with_delay_slice(mut self, delay_slice: Duration) -> Self {
        self.delay_slice = delay_slice;
        self
    }

    /// Sets the run loop thread name.
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Worker count actually spawned.
    pub fn effective_workers(&self) -> usize {
        self.worker_threads.max(1)
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            worker_threads: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            delay_slice: Duration::from_millis(5),
            thread_name: "workspace-updater".to_string(),
        }
    }
}
