//! One persistent worker thread.
//!
//! The owning thread hands a task over through the worker's slot and wakes
//! it with the condition variable; the worker takes the task out, runs it
//! without holding the lock, puts it back and publishes `complete`.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::api::config::SchedulerConfig;
use crate::ft_trace;
use crate::sync::mutex::{Condvar, Mutex};
use crate::tasks::task::Task;

/// Task handed over to a worker, plus the panic message of its run body.
#[derive(Default)]
struct Slot {
    task: Option<Box<dyn Task>>,
    panic: Option<String>,
}

/// State shared between the owning thread and the worker thread.
struct WorkerShared {
    slot: Mutex<Slot>,
    cond: Condvar,

    /// Set by the worker while it waits on `cond`
    parked: AtomicBool,

    /// Set by the worker once the slot's task has run
    complete: AtomicBool,

    join_requested: AtomicBool,
}

/// A task reaped from a worker.
pub(crate) struct Finished {
    pub task: Box<dyn Task>,
    /// Panic message if the run body panicked
    pub panic: Option<String>,
}

/// Owning-thread handle to one worker thread.
pub(crate) struct Worker {
    index: usize,
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,

    /// A task was handed over and not yet reaped
    busy: bool,
}

impl Worker {
    /// Spawn the worker thread.
    pub fn spawn(index: usize, config: &SchedulerConfig) -> io::Result<Self> {
        let shared = Arc::new(WorkerShared {
            slot: Mutex::new(Slot::default()),
            cond: Condvar::new(),
            parked: AtomicBool::new(false),
            complete: AtomicBool::new(false),
            join_requested: AtomicBool::new(false),
        });

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, index));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let remote = Arc::clone(&shared);
        let thread = builder.spawn(move || run_worker(&remote))?;

        Ok(Self {
            index,
            shared,
            thread: Some(thread),
            busy: false,
        })
    }

    /// Idle and parked, so a new task can be handed over.
    pub fn ready(&self) -> bool {
        !self.busy && self.shared.parked.load(Ordering::Acquire)
    }

    /// A task is assigned and not yet reaped.
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// The assigned task has finished running.
    pub fn finished(&self) -> bool {
        self.busy && self.shared.complete.load(Ordering::Acquire)
    }

    /// Hand a task to the worker and wake it.
    pub fn start(&mut self, task: Box<dyn Task>) {
        debug_assert!(!self.busy, "worker {} already holds a task", self.index);

        let mut slot = self.shared.slot.lock();
        slot.task = Some(task);
        slot.panic = None;
        self.shared.complete.store(false, Ordering::Release);
        self.shared.cond.notify_one();
        drop(slot);

        self.busy = true;
        ft_trace!("worker {}: task dispatched", self.index);
    }

    /// Take back a completed task.
    pub fn take_finished(&mut self) -> Option<Finished> {
        if !self.finished() {
            return None;
        }
        self.take_slot()
    }

    fn take_slot(&mut self) -> Option<Finished> {
        let mut slot = self.shared.slot.lock();
        let task = slot.task.take()?;
        let panic = slot.panic.take();
        self.shared.complete.store(false, Ordering::Release);
        drop(slot);

        self.busy = false;
        ft_trace!("worker {}: task reaped", self.index);
        Some(Finished { task, panic })
    }

    /// Ask the worker to exit once it has finished its current task.
    pub fn request_join(&self) {
        self.shared.join_requested.store(true, Ordering::Release);
        let _slot = self.shared.slot.lock();
        self.shared.cond.notify_one();
    }

    /// Wait for the worker thread to exit.
    ///
    /// Blocks for as long as the task it is running takes.
    pub fn join_thread(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Task panics are caught inside the loop, so the thread itself
            // only ends by returning.
            let _ = thread.join();
        }
    }

    /// After `join_thread`, the task the worker still holds, if any.
    pub fn take_remaining(&mut self) -> Option<Finished> {
        debug_assert!(self.thread.is_none());
        self.take_slot()
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.request_join();
            self.join_thread();
        }
    }
}

/// Worker thread body.
///
/// An assigned task is always run before a join request is honoured, so
/// shutdown never drops work that was already handed over.
fn run_worker(shared: &WorkerShared) {
    let mut slot = shared.slot.lock();

    loop {
        let pending = if shared.complete.load(Ordering::Acquire) {
            None
        } else {
            slot.task.take()
        };

        if let Some(mut task) = pending {
            drop(slot);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run()));

            slot = shared.slot.lock();
            slot.task = Some(task);
            slot.panic = outcome.err().map(panic_message);
            shared.complete.store(true, Ordering::Release);
            continue;
        }

        if shared.join_requested.load(Ordering::Acquire) {
            break;
        }

        shared.parked.store(true, Ordering::Release);
        slot = shared.cond.wait(slot);
        shared.parked.store(false, Ordering::Release);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("non-string panic payload")
    }
}
