use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use log::{trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named threads draining a bounded job queue.
///
/// Jobs must not unwind; callers wrap fallible work themselves.
pub(crate) struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(size: usize, name: &str) -> io::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = bounded::<Job>(size);
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-worker-{index}"))
                .spawn(move || {
                    for job in rx.iter() {
                        job();
                    }
                })?;
            workers.push(handle);
        }
        trace!("worker pool started size={size}");
        Ok(Self {
            jobs: Some(tx),
            workers,
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job`, blocking while the queue is full. Runs it inline if no
    /// worker is left to take it.
    pub(crate) fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        let Some(jobs) = &self.jobs else {
            job();
            return;
        };
        if let Err(rejected) = jobs.send(job) {
            warn!("worker pool disconnected, running job inline");
            (rejected.into_inner())();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}
