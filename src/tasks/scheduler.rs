//! Worker-thread scheduler for CPU-bound tasks.
//!
//! The owning thread (usually the main loop) appends tasks and calls
//! [`Scheduler::update`] once per frame. `update` reaps finished tasks and
//! runs their `join` phase, then hands pending tasks to idle workers after
//! running their `init` phase. Neither call ever blocks on a worker.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::api::config::SchedulerConfig;
use crate::api::stats::{Progress, SchedulerStats};
use crate::tasks::task::Task;
use crate::tasks::worker::{Finished, Worker};
use crate::{ft_emit, ft_trace};

/// Errors returned when starting a scheduler.
#[derive(Debug)]
pub enum SchedulerError {
    /// The operating system refused to spawn a worker thread.
    Spawn {
        /// Index of the worker that failed to start
        index: usize,
        source: io::Error,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Spawn { index, source } => {
                write!(f, "failed to spawn worker {}: {}", index, source)
            }
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchedulerError::Spawn { source, .. } => Some(source),
        }
    }
}

/// Fixed pool of persistent worker threads fed from a FIFO queue.
///
/// # Example
///
/// ```rust
/// use frametask::{FnTask, Scheduler, SchedulerConfig};
///
/// let mut scheduler = Scheduler::start(SchedulerConfig::default()).unwrap();
/// scheduler.append(FnTask::new(|| {
///     // build a mesh, decode a texture, ...
/// }));
///
/// while !scheduler.is_idle() {
///     scheduler.update();
///     std::thread::yield_now();
/// }
/// scheduler.shutdown();
/// ```
pub struct Scheduler {
    workers: Vec<Worker>,
    queue: VecDeque<Box<dyn Task>>,

    total_jobs: usize,
    completed_jobs: usize,

    stats: SchedulerStats,
    stopped: bool,
}

impl Scheduler {
    /// Spawn `config.worker_count` workers.
    ///
    /// Starting with zero workers succeeds but emits `FT101`: appended tasks
    /// will never run.
    pub fn start(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        if config.worker_count == 0 {
            ft_emit!(FT101);
        }

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            match Worker::spawn(index, &config) {
                Ok(worker) => workers.push(worker),
                Err(source) => {
                    ft_emit!(FT901, "worker {}: {}", index, source);
                    // Workers spawned so far are joined as they drop
                    return Err(SchedulerError::Spawn { index, source });
                }
            }
        }

        ft_trace!("scheduler started with {} workers", workers.len());

        Ok(Self {
            workers,
            queue: VecDeque::new(),
            total_jobs: 0,
            completed_jobs: 0,
            stats: SchedulerStats::default(),
            stopped: false,
        })
    }

    /// Queue a task behind every task already pending.
    pub fn append<T: Task>(&mut self, task: T) {
        self.append_boxed(Box::new(task));
    }

    /// Queue an already boxed task.
    pub fn append_boxed(&mut self, task: Box<dyn Task>) {
        self.queue.push_back(task);
        self.total_jobs += 1;
    }

    /// Reap finished tasks and dispatch pending ones.
    ///
    /// For each worker in order: a finished task is taken back and its `join`
    /// phase runs here; then, if the worker is parked and a pending task can
    /// start, that task's `init` phase runs here and the task is handed over.
    /// Once every appended task has been joined the progress counters reset.
    ///
    /// Panics from `init`, `join` or `can_start` propagate to the caller.
    /// A task whose `init` or `can_start` panicked is dropped and no longer
    /// counts towards [`progress`](Self::progress).
    pub fn update(&mut self) {
        for i in 0..self.workers.len() {
            if let Some(finished) = self.workers[i].take_finished() {
                self.reap(i, finished);
            }

            if self.workers[i].ready() && !self.queue.is_empty() {
                if let Some(mut task) = self.pop_next() {
                    self.drop_on_panic(|| task.init());
                    self.workers[i].start(task);
                    self.stats.dispatched += 1;
                }
            }
        }

        self.reset_finished_batch();
    }

    fn reset_finished_batch(&mut self) {
        if self.completed_jobs == self.total_jobs {
            self.completed_jobs = 0;
            self.total_jobs = 0;
        }
    }

    /// Run a main-thread phase of a task that has left the queue.
    ///
    /// If it panics the task is forgotten by the counters before the panic
    /// resumes, since it will be dropped during unwinding.
    fn drop_on_panic<R>(&mut self, phase: impl FnOnce() -> R) -> R {
        match panic::catch_unwind(AssertUnwindSafe(phase)) {
            Ok(value) => value,
            Err(payload) => {
                self.total_jobs -= 1;
                self.reset_finished_batch();
                panic::resume_unwind(payload)
            }
        }
    }

    fn reap(&mut self, worker: usize, finished: Finished) {
        let Finished { mut task, panic } = finished;
        self.completed_jobs += 1;
        self.stats.completed += 1;

        match panic {
            None => task.join(),
            Some(message) => {
                self.stats.panicked += 1;
                ft_emit!(FT201, "worker {}: {}", worker, message);
            }
        }
    }

    /// Take the first pending task that can start.
    ///
    /// Tasks that cannot start are rotated to the back, and the scan gives up
    /// after one pass over the queue. A task whose `can_start` never turns
    /// true therefore stays pending forever without blocking the rest.
    fn pop_next(&mut self) -> Option<Box<dyn Task>> {
        for _ in 0..self.queue.len() {
            let task = self.queue.pop_front()?;
            if self.drop_on_panic(|| task.can_start()) {
                return Some(task);
            }
            self.queue.push_back(task);
            self.stats.requeued += 1;
        }
        None
    }

    /// Completed and total counters of the current batch.
    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed_jobs,
            total: self.total_jobs,
        }
    }

    /// Tasks waiting to be dispatched.
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers holding a task that has not been reaped yet.
    pub fn busy_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.busy()).count()
    }

    /// No task is pending, running or waiting to be joined.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.busy_workers() == 0
    }

    /// Lifetime statistics.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Stop every worker and join the tasks they still hold.
    ///
    /// Each worker first finishes the task it is running, so this blocks for
    /// as long as the slowest of them. Tasks still pending are dropped
    /// without running.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        for worker in &self.workers {
            worker.request_join();
        }
        for worker in &mut self.workers {
            worker.join_thread();
        }

        // Joins must not run while unwinding from a panic in a previous join
        let run_joins = !thread::panicking();

        for worker in &mut self.workers {
            let Some(Finished { mut task, panic }) = worker.take_remaining() else {
                continue;
            };
            self.completed_jobs += 1;
            self.stats.completed += 1;

            match panic {
                None if run_joins => task.join(),
                None => {}
                Some(message) => {
                    self.stats.panicked += 1;
                    ft_emit!(FT202, "worker {}: {}", worker.index(), message);
                }
            }
        }

        if !self.queue.is_empty() {
            ft_trace!("dropping {} pending tasks at shutdown", self.queue.len());
            self.queue.clear();
        }

        ft_trace!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers.len())
            .field("busy", &self.busy_workers())
            .field("pending", &self.queue.len())
            .field("progress", &self.progress())
            .finish()
    }
}
