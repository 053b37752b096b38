//! The unit of schedulable work.

use std::fmt;

/// A unit of work run by the [`Scheduler`](crate::Scheduler).
///
/// Phases, in order:
///
/// 1. [`can_start`](Task::can_start) is polled on the owning thread each
///    time the task reaches the front of the queue while a worker is idle.
/// 2. [`init`](Task::init) runs on the owning thread right before dispatch.
/// 3. [`run`](Task::run) runs exactly once on a worker thread.
/// 4. [`join`](Task::join) runs on the owning thread during the first
///    `update()` that sees the task completed.
///
/// `init` and `join` of all tasks are serialized with each other and with
/// the rest of the owning thread's work; `run` bodies execute in parallel.
pub trait Task: Send + 'static {
    /// Main-thread preparation, right before the task is handed to a worker.
    fn init(&mut self) {}

    /// The worker-thread body.
    fn run(&mut self);

    /// Main-thread completion, after `run` has returned.
    fn join(&mut self) {}

    /// Readiness predicate consulted before dispatch.
    ///
    /// A task whose predicate never returns true stays queued forever. The
    /// scheduler skips past it to runnable tasks but never reports it;
    /// breaking such a dependency is the caller's responsibility.
    fn can_start(&self) -> bool {
        true
    }
}

type Phase = Box<dyn FnOnce() + Send>;
type Predicate = Box<dyn Fn() -> bool + Send>;

/// A [`Task`] assembled from closures with [`TaskBuilder`].
pub struct FnTask {
    init: Option<Phase>,
    run: Option<Phase>,
    join: Option<Phase>,
    can_start: Option<Predicate>,
}

impl FnTask {
    /// A task with only a run body.
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        TaskBuilder::new(run).build()
    }

    /// Start building a task around a run body.
    pub fn builder<F>(run: F) -> TaskBuilder
    where
        F: FnOnce() + Send + 'static,
    {
        TaskBuilder::new(run)
    }
}

impl Task for FnTask {
    fn init(&mut self) {
        if let Some(init) = self.init.take() {
            init();
        }
    }

    fn run(&mut self) {
        if let Some(run) = self.run.take() {
            run();
        }
    }

    fn join(&mut self) {
        if let Some(join) = self.join.take() {
            join();
        }
    }

    fn can_start(&self) -> bool {
        self.can_start.as_ref().map_or(true, |ready| ready())
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("init", &self.init.is_some())
            .field("run", &self.run.is_some())
            .field("join", &self.join.is_some())
            .field("can_start", &self.can_start.is_some())
            .finish()
    }
}

/// Builder for [`FnTask`].
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use frametask::FnTask;
///
/// let cells = Arc::new(Mutex::new(Vec::new()));
/// let out = Arc::clone(&cells);
///
/// let task = FnTask::builder(move || {
///         out.lock().unwrap().extend((0..64).map(|i| i as f32 * 0.5));
///     })
///     .join(move || println!("{} cells ready", cells.lock().unwrap().len()))
///     .build();
/// # drop(task);
/// ```
pub struct TaskBuilder {
    task: FnTask,
}

impl TaskBuilder {
    /// Start a task around its worker-thread body.
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task: FnTask {
                init: None,
                run: Some(Box::new(run)),
                join: None,
                can_start: None,
            },
        }
    }

    /// Set the main-thread step that runs at dispatch.
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.task.init = Some(Box::new(init));
        self
    }

    /// Set the main-thread step that runs after completion.
    pub fn join<F>(mut self, join: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.task.join = Some(Box::new(join));
        self
    }

    /// Set the readiness predicate.
    pub fn can_start<F>(mut self, ready: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.task.can_start = Some(Box::new(ready));
        self
    }

    /// Finish building.
    pub fn build(self) -> FnTask {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_phases_run_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let (a, b, c) = (Arc::clone(&count), Arc::clone(&count), Arc::clone(&count));

        let mut task = FnTask::builder(move || {
            b.fetch_add(10, Ordering::SeqCst);
        })
        .init(move || {
            a.fetch_add(1, Ordering::SeqCst);
        })
        .join(move || {
            c.fetch_add(100, Ordering::SeqCst);
        })
        .build();

        task.init();
        task.run();
        task.run();
        task.join();
        assert_eq!(count.load(Ordering::SeqCst), 111);
    }

    #[test]
    fn test_can_start_defaults_to_true() {
        let task = FnTask::new(|| {});
        assert!(task.can_start());
    }

    #[test]
    fn test_can_start_predicate() {
        let gate = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&gate);
        let task = FnTask::builder(|| {})
            .can_start(move || probe.load(Ordering::SeqCst))
            .build();

        assert!(!task.can_start());
        gate.store(true, Ordering::SeqCst);
        assert!(task.can_start());
    }

    #[test]
    fn test_debug_lists_phases() {
        let task = FnTask::builder(|| {}).join(|| {}).build();
        let text = format!("{:?}", task);
        assert!(text.contains("join: true"));
        assert!(text.contains("init: false"));
    }
}
