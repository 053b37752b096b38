//! Two-stage queue for work that must stay on the graphics thread.
//!
//! A task's submit step runs in one [`GpuTaskQueue::kick`] and its complete
//! step in a later [`GpuTaskQueue::join`], which gives the device a frame to
//! finish the submitted work before its results are consumed.

use std::collections::VecDeque;
use std::fmt;

type Complete = Box<dyn FnOnce()>;
type Submit = Box<dyn FnOnce() -> Option<Complete>>;

/// Submit step plus an optional completion step.
///
/// Closures run on the thread that owns the queue and need not be `Send`.
pub struct GpuTask {
    submit: Submit,
}

impl GpuTask {
    /// Task with a submit step only; it ends once submitted.
    pub fn new(submit: impl FnOnce() + 'static) -> Self {
        Self {
            submit: Box::new(move || {
                submit();
                None
            }),
        }
    }

    /// Task that runs `complete` some tick after `submit`.
    pub fn with_complete(submit: impl FnOnce() + 'static, complete: impl FnOnce() + 'static) -> Self {
        Self {
            submit: Box::new(move || {
                submit();
                Some(Box::new(complete) as Complete)
            }),
        }
    }

    /// Task whose completion step receives the submit step's result.
    ///
    /// ```rust
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use frametask::{GpuTask, GpuTaskQueue};
    ///
    /// let uploaded = Rc::new(Cell::new(0));
    /// let out = uploaded.clone();
    ///
    /// let mut queue = GpuTaskQueue::new();
    /// queue.append(GpuTask::chained(|| 4096usize, move |bytes| out.set(bytes)));
    ///
    /// queue.tick(); // submit
    /// assert_eq!(uploaded.get(), 0);
    /// queue.tick(); // complete
    /// assert_eq!(uploaded.get(), 4096);
    /// ```
    pub fn chained<T: 'static>(
        submit: impl FnOnce() -> T + 'static,
        complete: impl FnOnce(T) + 'static,
    ) -> Self {
        Self {
            submit: Box::new(move || {
                let value = submit();
                Some(Box::new(move || complete(value)) as Complete)
            }),
        }
    }

    fn submit(self) -> Option<Complete> {
        (self.submit)()
    }
}

impl fmt::Debug for GpuTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTask").finish_non_exhaustive()
    }
}

/// FIFO of graphics-thread tasks, advanced one step per call.
///
/// `kick` submits at most one pending task and `join` completes at most one
/// kicked task, so the cost per frame stays bounded. Both stages keep append
/// order.
#[derive(Default)]
pub struct GpuTaskQueue {
    pending: VecDeque<GpuTask>,
    kicked: VecDeque<Complete>,

    submitted: u64,
    completed: u64,
}

impl GpuTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task behind every pending one.
    pub fn append(&mut self, task: GpuTask) {
        self.pending.push_back(task);
    }

    /// Submit the oldest pending task.
    ///
    /// Returns false if nothing was pending.
    pub fn kick(&mut self) -> bool {
        let Some(task) = self.pending.pop_front() else {
            return false;
        };
        if let Some(complete) = task.submit() {
            self.kicked.push_back(complete);
        }
        self.submitted += 1;
        true
    }

    /// Complete the oldest kicked task.
    ///
    /// Returns false if nothing was waiting for completion.
    pub fn join(&mut self) -> bool {
        let Some(complete) = self.kicked.pop_front() else {
            return false;
        };
        complete();
        self.completed += 1;
        true
    }

    /// One frame's worth of work: `join`, then `kick`.
    ///
    /// A completion never runs in the tick that submitted its task.
    pub fn tick(&mut self) {
        self.join();
        self.kick();
    }

    /// Tasks not yet submitted.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Submitted tasks waiting for their completion step.
    pub fn kicked_len(&self) -> usize {
        self.kicked.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.kicked.is_empty()
    }

    /// Submit steps run so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Completion steps run so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }
}

impl fmt::Debug for GpuTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTaskQueue")
            .field("pending", &self.pending.len())
            .field("kicked", &self.kicked.len())
            .field("submitted", &self.submitted)
            .field("completed", &self.completed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn task(log: &Log, name: &'static str) -> GpuTask {
        let (s, c) = (log.clone(), log.clone());
        GpuTask::with_complete(
            move || s.borrow_mut().push(format!("submit {}", name)),
            move || c.borrow_mut().push(format!("complete {}", name)),
        )
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = GpuTaskQueue::new();
        assert!(!queue.kick());
        assert!(!queue.join());
        queue.tick();
        assert!(queue.is_idle());
    }

    #[test]
    fn test_kick_and_join_one_at_a_time() {
        let log = Log::default();
        let mut queue = GpuTaskQueue::new();
        queue.append(task(&log, "a"));
        queue.append(task(&log, "b"));

        assert!(queue.kick());
        assert_eq!(queue.pending_len(), 1);
        assert_eq!(queue.kicked_len(), 1);

        assert!(queue.kick());
        assert!(!queue.kick());
        assert!(queue.join());
        assert!(queue.join());
        assert!(!queue.join());

        assert_eq!(*log.borrow(), ["submit a", "submit b", "complete a", "complete b"]);
        assert_eq!((queue.submitted(), queue.completed()), (2, 2));
    }

    #[test]
    fn test_tick_pipelines_tasks() {
        let log = Log::default();
        let mut queue = GpuTaskQueue::new();
        queue.append(task(&log, "a"));
        queue.append(task(&log, "b"));

        queue.tick();
        assert_eq!(*log.borrow(), ["submit a"]);
        queue.tick();
        assert_eq!(*log.borrow(), ["submit a", "complete a", "submit b"]);
        queue.tick();
        assert_eq!(log.borrow().last().map(String::as_str), Some("complete b"));
        assert!(queue.is_idle());
    }

    #[test]
    fn test_submit_only_task_is_not_kicked() {
        let log = Log::default();
        let out = log.clone();
        let mut queue = GpuTaskQueue::new();
        queue.append(GpuTask::new(move || out.borrow_mut().push("upload".into())));

        assert!(queue.kick());
        assert_eq!(queue.kicked_len(), 0);
        assert!(!queue.join());
        assert!(queue.is_idle());
        assert_eq!(*log.borrow(), ["upload"]);
    }
}
