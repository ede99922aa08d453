//! Bounded admission for background fetches.
//!
//! Tasks are handed to at most `capacity` worker threads over a rendezvous
//! channel: `submit` only returns once an idle worker has taken the task, so
//! no more than `capacity` tasks are ever outstanding. Workers are started on
//! demand and live until [`ConcurrencyGate::drain`].

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::ConfigError;

pub const DEFAULT_CONCURRENCY: usize = 10;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct ConcurrencyGate {
    capacity: usize,
    jobs: Sender<Job>,
    idle: Receiver<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidConcurrency { value: 0 });
        }
        let (jobs, idle) = crossbeam_channel::bounded(0);
        Ok(Self {
            capacity,
            jobs,
            idle,
            workers: Mutex::new(Vec::with_capacity(capacity)),
        })
    }

    /// Waits for a free worker, then hands `task` to it and returns.
    pub fn submit<F>(&self, task: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let job = match self.jobs.try_send(Box::new(task)) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Disconnected(_)) => return Err(stopped()),
        };

        {
            let mut workers = self.workers.lock();
            if workers.len() < self.capacity {
                let worker = self.spawn_worker(workers.len())?;
                workers.push(worker);
            }
        }

        self.jobs.send(job).map_err(|_| stopped())
    }

    /// Blocks until every submitted task has completed.
    pub fn drain(self) {
        let Self { jobs, idle, workers, .. } = self;
        drop(jobs);
        drop(idle);
        for worker in workers.into_inner() {
            if worker.join().is_err() {
                warn!("fetch worker exited abnormally");
            }
        }
    }

    fn spawn_worker(&self, id: usize) -> io::Result<JoinHandle<()>> {
        let jobs = self.idle.clone();
        thread::Builder::new()
            .name(format!("hls-fetch-{id}"))
            .spawn(move || {
                for job in jobs {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!(worker = id, "fetch task panicked");
                    }
                }
                trace!(worker = id, "worker stopped");
            })
    }
}

fn stopped() -> io::Error {
    io::Error::other("fetch workers have stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            ConcurrencyGate::new(0),
            Err(ConfigError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn runs_up_to_capacity_in_parallel() {
        for capacity in [1, 3] {
            let gate = ConcurrencyGate::new(capacity).unwrap();
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let done = Arc::new(AtomicUsize::new(0));

            for _ in 0..9 {
                let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
                gate.submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    running.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
            gate.drain();

            assert_eq!(done.load(Ordering::SeqCst), 9);
            assert_eq!(peak.load(Ordering::SeqCst), capacity);
        }
    }

    #[test]
    fn submit_returns_before_task_finishes() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let (release, wait) = crossbeam_channel::bounded::<()>(0);
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();

        gate.submit(move || {
            wait.recv().unwrap();
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 0);
        release.send(()).unwrap();
        gate.drain();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_keeps_worker_alive() {
        let gate = ConcurrencyGate::new(1).unwrap();
        gate.submit(|| panic!("boom")).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        gate.submit(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        gate.drain();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_without_tasks_returns() {
        ConcurrencyGate::new(DEFAULT_CONCURRENCY).unwrap().drain();
    }
}
