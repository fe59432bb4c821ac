//! Long-lived worker pool.
//!
//! Motion jobs block for the whole length of a trajectory (sleep-paced), so
//! they run on dedicated OS threads instead of an async executor. Threads
//! are spawned once and fed through a shared queue; each batch collects its
//! results through its own channel, which also tells the caller when every
//! job of the batch has finished.

use parking_lot::Mutex;
use sorter_common::arm::error::ArmError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Result of one job submitted with [`WorkerPool::submit`].
#[must_use = "dropping a Pending detaches the job"]
pub struct Pending<T> {
    receiver: mpsc::Receiver<T>,
    label: String,
}

impl<T> Pending<T> {
    /// Block until the job has run.
    ///
    /// # Errors
    /// `ArmError::WorkerLost` if the job panicked or the pool shut down
    /// before running it.
    pub fn wait(self) -> Result<T, ArmError> {
        self.receiver
            .recv()
            .map_err(|_| ArmError::WorkerLost(self.label))
    }
}

/// Fixed-size pool of named worker threads.
pub struct WorkerPool {
    name: String,
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers named `<name>-<n>`.
    pub fn new(name: &str, size: usize) -> Result<Self, ArmError> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let receiver = Arc::clone(&receiver);
            let thread_name = format!("{name}-{n}");
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker_loop(&thread_name, &receiver))
                .map_err(|e| ArmError::WorkerLost(format!("spawning {name}-{n}: {e}")))?;
            workers.push(handle);
        }
        debug!("Worker pool '{}' started with {} threads", name, size);

        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            workers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    fn dispatch(&self, job: Job) -> Result<(), ArmError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ArmError::WorkerLost(format!("pool '{}' shut down", self.name)))?;
        sender
            .send(job)
            .map_err(|_| ArmError::WorkerLost(format!("pool '{}' has no workers", self.name)))
    }

    /// Queue one job and return a handle to its result.
    pub fn submit<T, F>(&self, label: impl Into<String>, job: F) -> Result<Pending<T>, ArmError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.dispatch(Box::new(move || {
            let _ = tx.send(job());
        }))?;
        Ok(Pending {
            receiver: rx,
            label: label.into(),
        })
    }

    /// Queue every job at once and block until all of them have finished.
    ///
    /// Results are returned in submission order. A job that could not be
    /// queued or that panicked yields `ArmError::WorkerLost`; the remaining
    /// jobs still run to completion before this returns.
    pub fn run_batch<T, F>(&self, jobs: Vec<F>) -> Vec<Result<T, ArmError>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<(usize, T)>();
        let mut results: Vec<Option<T>> = jobs.iter().map(|_| None).collect();
        let mut dispatch_errors: Vec<Option<ArmError>> = jobs.iter().map(|_| None).collect();

        for (idx, job) in jobs.into_iter().enumerate() {
            let tx = tx.clone();
            if let Err(e) = self.dispatch(Box::new(move || {
                let _ = tx.send((idx, job()));
            })) {
                dispatch_errors[idx] = Some(e);
            }
        }
        drop(tx);

        // Ends once every queued job has either reported or dropped its sender.
        for (idx, value) in rx {
            results[idx] = Some(value);
        }

        results
            .into_iter()
            .zip(dispatch_errors)
            .enumerate()
            .map(|(idx, (result, dispatch_error))| match (result, dispatch_error) {
                (Some(value), _) => Ok(value),
                (None, Some(e)) => Err(e),
                (None, None) => Err(ArmError::WorkerLost(format!(
                    "job {idx} in pool '{}' did not report",
                    self.name
                ))),
            })
            .collect()
    }
}

fn worker_loop(thread_name: &str, receiver: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("Job panicked on worker {}", thread_name);
                }
            }
            Err(_) => break,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets every worker fall out of its loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker of pool '{}' terminated abnormally", self.name);
            }
        }
        debug!("Worker pool '{}' stopped", self.name);
    }
}
