// Worker pool
// Fixed set of threads fed through a bounded queue. When the queue is full the
// submitting thread runs the job itself.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Worker threads
    pub workers: usize,
    /// Jobs that may wait for a free worker
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let workers = num_cpus::get().max(1);
        Self {
            workers,
            queue_capacity: workers * 2,
        }
    }
}

/// Cooperative cancellation shared between a caller and its jobs
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Count of outstanding jobs that can be waited on
#[derive(Default)]
pub(super) struct Latch {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Latch {
    pub(super) fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    pub(super) fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub(super) fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Run a job, containing any panic to the job itself
fn run_job(job: Job, pending: &Latch) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        log::warn!("Worker job panicked");
    }
    pending.done();
}

pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    handles: Vec<JoinHandle<()>>,
    pending: Arc<Latch>,
}

impl WorkerPool {
    pub fn new(config: &WorkerPoolConfig) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Job>(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(Latch::default());

        let handles = (0..config.workers.max(1))
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                let pending = Arc::clone(&pending);
                thread::Builder::new()
                    .name(format!("tile-worker-{}", i))
                    .spawn(move || worker_loop(&receiver, &pending))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("Failed to spawn worker thread: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Worker pool started with {} threads, queue {}",
            handles.len(),
            config.queue_capacity
        );

        Self {
            sender: Some(sender),
            handles,
            pending,
        }
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job. If no queue slot is free (or no worker is running) the job
    /// runs on the calling thread before this returns.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.add();
        let job: Job = Box::new(job);
        let job = match &self.sender {
            Some(sender) if !self.handles.is_empty() => match sender.try_send(job) {
                Ok(()) => return,
                Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => job,
            },
            _ => job,
        };
        run_job(job, &self.pending);
    }

    /// Block until every submitted job has finished
    pub fn wait_idle(&self) {
        self.pending.wait();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(&WorkerPoolConfig::default())
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>, pending: &Latch) {
    loop {
        let job = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        match job {
            Ok(job) => run_job(job, pending),
            // pool dropped
            Err(_) => break,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("Worker thread ended with a panic");
            }
        }
    }
}
