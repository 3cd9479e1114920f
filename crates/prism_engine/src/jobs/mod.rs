//! Fork/join job pool
//!
//! A fixed set of worker threads fed from one channel, with an epoch
//! barrier for the frame loop: dispatch a batch of independent jobs
//! (transform updates, simulation steps), then `join_epoch` before the
//! render phase reads what they wrote. The barrier busy-waits rather
//! than parking; epochs are short and a frame is already CPU-bound on
//! them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Sender};

/// Result type for job pool operations
pub type JobResult<T> = Result<T, JobError>;

/// Errors from the job pool
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Dispatch after the pool shut down
    #[error("job pool is shut down")]
    ShutDown,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool with epoch joins
#[derive(Debug)]
pub struct JobPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl JobPool {
    /// Spawn `worker_count` workers (at least one)
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let builder = thread::Builder::new().name(format!("job-worker-{index}"));
            match builder.spawn(move || {
                // recv errors once every sender is gone; that is shutdown.
                while let Ok(job) = receiver.recv() {
                    // A panicking job must still count toward the epoch,
                    // or join_epoch spins forever; the worker stays alive.
                    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
                        log::warn!("job panicked; continuing");
                    }
                    pending.fetch_sub(1, Ordering::Release);
                }
            }) {
                Ok(handle) => workers.push(handle),
                Err(e) => log::warn!("failed to spawn job worker {index}: {e}"),
            }
        }

        log::debug!("job pool started with {} worker(s)", workers.len());
        Self {
            sender: Some(sender),
            workers,
            pending,
        }
    }

    /// Number of live workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue one job for the current epoch
    pub fn dispatch<F>(&self, job: F) -> JobResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(JobError::ShutDown)?;
        self.pending.fetch_add(1, Ordering::Acquire);
        if sender.send(Box::new(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::Release);
            return Err(JobError::ShutDown);
        }
        Ok(())
    }

    /// Block until every dispatched job has finished
    pub fn join_epoch(&self) {
        while self.pending.load(Ordering::Acquire) != 0 {
            std::hint::spin_loop();
        }
    }

    /// Drain outstanding work and stop the workers
    pub fn shutdown(&mut self) {
        if self.sender.take().is_some() {
            for worker in self.workers.drain(..) {
                if worker.join().is_err() {
                    log::warn!("job worker panicked during shutdown");
                }
            }
            log::debug!("job pool shut down");
        }
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_epoch_sees_all_jobs() {
        let pool = JobPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.dispatch(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }
        pool.join_epoch();
        assert_eq!(counter.load(Ordering::Relaxed), 64);
    }

    #[test]
    fn test_epochs_are_reusable() {
        let pool = JobPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for epoch in 1..=3 {
            for _ in 0..8 {
                let counter = Arc::clone(&counter);
                pool.dispatch(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }
            pool.join_epoch();
            assert_eq!(counter.load(Ordering::Relaxed), epoch * 8);
        }
    }

    #[test]
    fn test_panicking_job_does_not_stall_the_barrier() {
        let pool = JobPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        pool.dispatch(|| panic!("deliberate job failure")).unwrap();
        let survivor = Arc::clone(&counter);
        pool.dispatch(move || {
            survivor.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        // The barrier must terminate, and the worker must have survived
        // to run the job queued behind the panicking one.
        pool.join_epoch();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_dispatch_after_shutdown_errors() {
        let mut pool = JobPool::new(1);
        pool.shutdown();
        assert!(matches!(pool.dispatch(|| {}), Err(JobError::ShutDown)));
    }

    #[test]
    fn test_join_with_no_jobs_returns_immediately() {
        let pool = JobPool::new(1);
        pool.join_epoch();
    }
}
