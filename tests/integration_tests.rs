//! Integration tests for frametask.

use frametask::diagnostics::{set_sink, CollectingSink, DiagnosticSink};
use frametask::{
    FnTask, FrameArena, FrameVec, GpuTask, GpuTaskQueue, Pool, PoolAllocator, Progress, Scheduler,
    SchedulerConfig, StrictMode, StrictModeGuard, Task,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Diagnostics sink and strict mode are process-wide; tests that emit
/// diagnostics hold this lock for their whole body.
static DIAGNOSTICS_LOCK: Mutex<()> = Mutex::new(());

fn diagnostics_lock() -> MutexGuard<'static, ()> {
    DIAGNOSTICS_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Install a collecting sink for the duration of a test.
fn collect_diagnostics() -> Arc<CollectingSink> {
    let sink = Arc::new(CollectingSink::new());
    set_sink(Some(sink.clone() as Arc<dyn DiagnosticSink>));
    sink
}

/// Poll `update` until `cond` holds, sleeping briefly between polls.
fn update_until(scheduler: &mut Scheduler, mut cond: impl FnMut(&Scheduler) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        scheduler.update();
        if cond(scheduler) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

// ============================================================================
// Scheduler
// ============================================================================

#[test]
fn test_two_workers_three_tasks() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(2)).unwrap();
    let joined = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let counter = joined.clone();
        scheduler.append(FnTask::builder(|| {}).join(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }).build());
    }
    assert_eq!(scheduler.progress(), Progress { completed: 0, total: 3 });

    assert!(update_until(&mut scheduler, |s| s.is_idle()));

    assert_eq!(joined.load(Ordering::SeqCst), 3);
    assert_eq!(scheduler.progress(), Progress { completed: 0, total: 0 });
    assert_eq!(scheduler.stats().dispatched, 3);
    scheduler.shutdown();
}

/// Records the order of its phases and the thread each ran on.
struct PhaseRecorder {
    id: usize,
    events: Arc<Mutex<Vec<(usize, &'static str)>>>,
    main: thread::ThreadId,
}

impl Task for PhaseRecorder {
    fn init(&mut self) {
        assert_eq!(thread::current().id(), self.main);
        self.events.lock().unwrap().push((self.id, "init"));
    }

    fn run(&mut self) {
        assert_ne!(thread::current().id(), self.main);
        self.events.lock().unwrap().push((self.id, "run"));
    }

    fn join(&mut self) {
        assert_eq!(thread::current().id(), self.main);
        self.events.lock().unwrap().push((self.id, "join"));
    }
}

#[test]
fn test_every_task_runs_once_before_join() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default()).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let main = thread::current().id();

    for id in 0..20 {
        scheduler.append(PhaseRecorder { id, events: events.clone(), main });
    }
    assert!(update_until(&mut scheduler, |s| s.is_idle()));

    let events = events.lock().unwrap();
    for id in 0..20 {
        let phases: Vec<_> = events.iter().filter(|(i, _)| *i == id).map(|(_, p)| *p).collect();
        assert_eq!(phases, ["init", "run", "join"], "task {}", id);
    }
    assert_eq!(scheduler.stats().completed, 20);
}

#[test]
fn test_task_without_join_still_completes() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(1)).unwrap();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    scheduler.append(FnTask::new(move || flag.store(true, Ordering::SeqCst)));
    scheduler.append(FnTask::new(|| thread::sleep(Duration::from_millis(50))));

    assert!(update_until(&mut scheduler, |s| s.progress().completed == 1));
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(scheduler.progress().total, 2);

    assert!(update_until(&mut scheduler, |s| s.is_idle()));
    assert_eq!(scheduler.stats().completed, 2);
    assert_eq!(scheduler.progress(), Progress::default());
}

#[test]
fn test_update_with_nothing_queued() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default()).unwrap();
    for _ in 0..100 {
        scheduler.update();
        assert_eq!(scheduler.progress(), Progress { completed: 0, total: 0 });
    }
    assert_eq!(scheduler.stats().dispatched, 0);
}

#[test]
fn test_counters_never_cross() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(3)).unwrap();
    for i in 0..12u64 {
        scheduler.append(FnTask::new(move || thread::sleep(Duration::from_micros(200 * i))));
    }

    assert!(update_until(&mut scheduler, |s| {
        let p = s.progress();
        assert!(p.completed <= p.total);
        if p.total > 0 {
            assert!(p.completed < p.total, "equal counters must reset");
        }
        s.is_idle()
    }));
    assert!(scheduler.progress().is_idle());
}

#[test]
fn test_never_ready_task_is_bypassed() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(2)).unwrap();
    let blocked_ran = Arc::new(AtomicBool::new(false));
    let joined = Arc::new(AtomicUsize::new(0));

    let flag = blocked_ran.clone();
    scheduler.append(
        FnTask::builder(move || flag.store(true, Ordering::SeqCst))
            .can_start(|| false)
            .build(),
    );
    for _ in 0..4 {
        let counter = joined.clone();
        scheduler.append(FnTask::builder(|| {}).join(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }).build());
    }

    assert!(update_until(&mut scheduler, |_| joined.load(Ordering::SeqCst) == 4));
    for _ in 0..200 {
        scheduler.update();
    }

    assert!(!blocked_ran.load(Ordering::SeqCst));
    assert_eq!(scheduler.pending_len(), 1);
    assert_eq!(scheduler.progress(), Progress { completed: 4, total: 5 });
    assert!(scheduler.stats().requeued > 0);

    // Pending tasks are dropped at shutdown without running
    scheduler.shutdown();
    assert!(!blocked_ran.load(Ordering::SeqCst));
}

#[test]
fn test_can_start_waits_for_dependency() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(2)).unwrap();
    let heightmap_done = Arc::new(AtomicBool::new(false));
    let order = Arc::new(Mutex::new(Vec::new()));

    // The dependent task is appended first and must wait
    let ready = heightmap_done.clone();
    let log = order.clone();
    scheduler.append(
        FnTask::builder(move || log.lock().unwrap().push("mesh"))
            .can_start(move || ready.load(Ordering::SeqCst))
            .build(),
    );

    let done = heightmap_done.clone();
    let log = order.clone();
    scheduler.append(
        FnTask::builder(move || log.lock().unwrap().push("heightmap"))
            .join(move || done.store(true, Ordering::SeqCst))
            .build(),
    );

    assert!(update_until(&mut scheduler, |s| s.is_idle()));
    assert_eq!(*order.lock().unwrap(), ["heightmap", "mesh"]);
}

#[test]
fn test_shutdown_runs_join_of_running_task() {
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(2)).unwrap();
    let joined = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let counter = joined.clone();
        scheduler.append(
            FnTask::builder(|| thread::sleep(Duration::from_millis(30)))
                .join(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        );
    }

    assert!(update_until(&mut scheduler, |s| s.busy_workers() == 2));
    scheduler.shutdown();
    assert_eq!(joined.load(Ordering::SeqCst), 2);
}

#[test]
fn test_panicking_task_is_reported() {
    let _lock = diagnostics_lock();
    let sink = collect_diagnostics();

    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(1)).unwrap();
    let joined = Arc::new(AtomicBool::new(false));
    let after = Arc::new(AtomicBool::new(false));

    let flag = joined.clone();
    scheduler.append(
        FnTask::builder(|| panic!("chunk 12 out of bounds"))
            .join(move || flag.store(true, Ordering::SeqCst))
            .build(),
    );
    let flag = after.clone();
    scheduler.append(FnTask::new(move || flag.store(true, Ordering::SeqCst)));

    assert!(update_until(&mut scheduler, |s| s.is_idle()));
    set_sink(None);

    assert!(!joined.load(Ordering::SeqCst));
    assert!(after.load(Ordering::SeqCst));
    assert_eq!(scheduler.stats().panicked, 1);
    assert_eq!(scheduler.stats().completed, 2);
    assert_eq!(scheduler.progress(), Progress::default());

    assert!(sink.has_code("FT201"));
    let context = sink.context_for("FT201").unwrap();
    assert!(context.contains("chunk 12 out of bounds"), "{}", context);
}

#[test]
fn test_zero_workers_warns() {
    let _lock = diagnostics_lock();
    let sink = collect_diagnostics();

    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(0)).unwrap();
    set_sink(None);
    assert!(sink.has_code("FT101"));

    scheduler.append(FnTask::new(|| {}));
    for _ in 0..10 {
        scheduler.update();
    }
    assert_eq!(scheduler.pending_len(), 1);
    assert_eq!(scheduler.progress(), Progress { completed: 0, total: 1 });
}

// ============================================================================
// GPU task queue
// ============================================================================

#[test]
fn test_gpu_queue_fifo_order() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let mut queue = GpuTaskQueue::new();

    for (submit, complete) in [("submit A", "complete A"), ("submit B", "complete B")] {
        let (s, c) = (log.clone(), log.clone());
        queue.append(GpuTask::with_complete(
            move || s.borrow_mut().push(submit),
            move || c.borrow_mut().push(complete),
        ));
    }

    assert!(queue.kick());
    assert!(queue.kick());
    assert!(queue.join());
    assert!(queue.join());

    assert_eq!(*log.borrow(), ["submit A", "submit B", "complete A", "complete B"]);
}

#[test]
fn test_gpu_completion_waits_one_tick() {
    let ticks_seen = Rc::new(RefCell::new(Vec::new()));
    let tick = Rc::new(RefCell::new(0u32));
    let mut queue = GpuTaskQueue::new();

    for _ in 0..3 {
        let (t1, t2) = (tick.clone(), tick.clone());
        let out = ticks_seen.clone();
        queue.append(GpuTask::chained(
            move || *t1.borrow(),
            move |submitted| out.borrow_mut().push((submitted, *t2.borrow())),
        ));
    }

    while !queue.is_idle() {
        queue.tick();
        *tick.borrow_mut() += 1;
    }

    let seen = ticks_seen.borrow();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(submitted, completed)| completed > submitted));
    assert_eq!(queue.submitted(), 3);
    assert_eq!(queue.completed(), 3);
}

// ============================================================================
// Frame arena
// ============================================================================

#[test]
fn test_arena_reuses_blocks_after_clear() {
    let mut arena = FrameArena::new(4096);

    for _ in 0..10 {
        arena.alloc_bytes(1000);
    }
    let blocks = arena.block_count();
    let block_allocations = arena.stats().block_allocations;
    assert!(blocks > 1);

    for _ in 0..5 {
        arena.clear();
        for _ in 0..10 {
            arena.alloc_bytes(1000);
        }
        assert_eq!(arena.block_count(), blocks);
        assert_eq!(arena.stats().block_allocations, block_allocations);
    }
    assert_eq!(arena.stats().clears, 5);
}

#[test]
fn test_arena_same_addresses_after_clear() {
    let mut arena = FrameArena::new(4096);
    let first: Vec<usize> = (0..6).map(|_| arena.alloc_bytes(700).as_ptr() as usize).collect();
    arena.clear();
    let second: Vec<usize> = (0..6).map(|_| arena.alloc_bytes(700).as_ptr() as usize).collect();
    assert_eq!(first, second);
}

#[test]
fn test_frame_loop_with_collections() {
    let mut arena = FrameArena::new(64 * 1024);

    for frame in 0..4u32 {
        let mut visible = FrameVec::new_in(&arena);
        visible.extend((0..100).filter(|tile| tile % (frame + 2) == 0));

        let weights = arena.alloc_slice_fill_with(visible.len(), |i| i as f32 * 0.5);
        assert_eq!(weights.len(), visible.len());
        assert!(visible.iter().all(|tile| tile % (frame + 2) == 0));

        arena.clear();
        assert_eq!(arena.allocated_bytes(), 0);
    }
    assert_eq!(arena.block_count(), 1);
}

// ============================================================================
// Pools
// ============================================================================

#[test]
fn test_pool_lifo_reuse() {
    let mut pool = PoolAllocator::new(16, 48);
    let a = pool.alloc();
    let addr = pool.ptr(a).unwrap();
    assert!(pool.free(a));

    let b = pool.alloc();
    assert_eq!(pool.ptr(b), Some(addr));
}

#[test]
fn test_pool_stale_free_is_rejected() {
    let _lock = diagnostics_lock();
    let sink = collect_diagnostics();

    let mut pool = PoolAllocator::new(4, 32);
    let slot = pool.alloc();
    assert!(pool.free(slot));
    assert!(!pool.free(slot));
    set_sink(None);

    assert!(sink.has_code("FT301"));
    assert_eq!(pool.live_count(), 0);

    // The rejected free did not corrupt the freelist
    let a = pool.alloc();
    let b = pool.alloc();
    assert_ne!(pool.ptr(a), pool.ptr(b));
}

#[test]
#[should_panic(expected = "FT301")]
fn test_strict_mode_makes_misuse_fatal() {
    let _lock = diagnostics_lock();
    let _strict = StrictModeGuard::new(StrictMode::PanicOnWarning);

    let mut pool = PoolAllocator::new(4, 32);
    let slot = pool.alloc();
    pool.free(slot);
    pool.free(slot);
}

#[test]
fn test_config_from_env_applies_strict_mode() {
    let _lock = diagnostics_lock();
    let _restore = StrictModeGuard::new(StrictMode::Warn);

    std::env::set_var("FRAMETASK_STRICT", "warning");
    let _ = SchedulerConfig::from_env();
    std::env::remove_var("FRAMETASK_STRICT");

    assert_eq!(frametask::diagnostics::strict_mode(), StrictMode::PanicOnWarning);

    let sink = collect_diagnostics();
    let mut pool = PoolAllocator::new(4, 32);
    let slot = pool.alloc();
    pool.free(slot);
    let double_free = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.free(slot)));
    set_sink(None);

    assert!(double_free.is_err());
    assert!(sink.has_code("FT301"));

    // Unset variable leaves the current mode alone
    frametask::set_strict_mode(StrictMode::PanicOnError);
    let _ = SchedulerConfig::from_env();
    assert_eq!(frametask::diagnostics::strict_mode(), StrictMode::PanicOnError);
}

#[test]
fn test_remote_free_from_worker_task() {
    let mut pool = PoolAllocator::new(8, 64);
    let mut scheduler = Scheduler::start(SchedulerConfig::default().with_workers(2)).unwrap();

    let slots: Vec<_> = (0..8).map(|_| pool.alloc()).collect();
    assert_eq!(pool.stats().blocks, 1);

    for slot in slots {
        let remote = pool.remote();
        scheduler.append(FnTask::new(move || remote.free(slot)));
    }
    assert!(update_until(&mut scheduler, |s| s.is_idle()));

    assert_eq!(pool.remote().pending(), 8);
    assert_eq!(pool.drain_remote(), 8);
    assert_eq!(pool.live_count(), 0);

    // Reclaimed slots are reused before a second block is created
    for _ in 0..8 {
        pool.alloc();
    }
    assert_eq!(pool.stats().blocks, 1);
}

#[test]
fn test_typed_pool_with_scheduler_results() {
    #[derive(Debug, PartialEq)]
    struct Mesh {
        vertices: Vec<[f32; 3]>,
    }

    let mut meshes: Pool<Mesh> = Pool::new(4);
    let mut scheduler = Scheduler::start(SchedulerConfig::default()).unwrap();
    let built = Arc::new(Mutex::new(Vec::new()));

    for n in 1..=3usize {
        let out = built.clone();
        scheduler.append(FnTask::new(move || {
            out.lock().unwrap().push(Mesh { vertices: vec![[0.0; 3]; n] });
        }));
    }
    assert!(update_until(&mut scheduler, |s| s.is_idle()));

    let keys: Vec<_> = built.lock().unwrap().drain(..).map(|m| meshes.insert(m)).collect();
    assert_eq!(meshes.len(), 3);

    let mut sizes: Vec<_> = keys.iter().map(|k| meshes.get(*k).unwrap().vertices.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, [1, 2, 3]);

    let removed = meshes.remove(keys[0]).unwrap();
    assert!(!removed.vertices.is_empty());
    assert!(meshes.get(keys[0]).is_none());
}
