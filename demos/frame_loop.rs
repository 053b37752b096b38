//! Frame loop demo
//!
//! Streams in a ring of terrain chunks: heightmaps are generated on worker
//! threads, their meshes are built once the heightmap is ready, uploads go
//! through the GPU queue, and per-frame visibility lists live in the frame
//! arena.
//!
//! Run with `cargo run --example frame_loop`.

use frametask::{
    FnTask, FrameArena, FrameVec, GpuTask, GpuTaskQueue, Pool, PoolKey, Scheduler,
    SchedulerConfig,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const CHUNKS: usize = 12;
const CHUNK_SIZE: usize = 32;

struct Chunk {
    index: usize,
    heights: Vec<f32>,
    vertices: usize,
}

type Ready = Arc<Mutex<Vec<Chunk>>>;

fn generate_heights(index: usize) -> Vec<f32> {
    (0..CHUNK_SIZE * CHUNK_SIZE)
        .map(|i| {
            let x = (i % CHUNK_SIZE + index * CHUNK_SIZE) as f32 * 0.1;
            let z = (i / CHUNK_SIZE) as f32 * 0.1;
            (x.sin() + z.cos()) * 4.0
        })
        .collect()
}

fn queue_chunk(scheduler: &mut Scheduler, index: usize, ready: &Ready) {
    let heights = Arc::new(Mutex::new(Vec::new()));
    let heightmap_done = Arc::new(AtomicBool::new(false));

    // Heightmap: generated on a worker, published in join
    let out = heights.clone();
    let done = heightmap_done.clone();
    scheduler.append(
        FnTask::builder(move || *out.lock().unwrap() = generate_heights(index))
            .join(move || done.store(true, Ordering::Release))
            .build(),
    );

    // Mesh: may only start once its heightmap is joined
    let ready = ready.clone();
    scheduler.append(
        FnTask::builder(move || {
            let heights = std::mem::take(&mut *heights.lock().unwrap());
            let vertices = heights.iter().filter(|h| **h > -2.0).count() * 4;
            ready.lock().unwrap().push(Chunk { index, heights, vertices });
        })
        .can_start(move || heightmap_done.load(Ordering::Acquire))
        .build(),
    );
}

fn main() {
    let mut scheduler = Scheduler::start(SchedulerConfig::from_env()).expect("start scheduler");
    let mut gpu = GpuTaskQueue::new();
    let mut arena = FrameArena::default();
    let mut chunks: Pool<Chunk> = Pool::new(8);
    let uploaded: Rc<RefCell<Vec<PoolKey<Chunk>>>> = Rc::default();
    let uploaded_bytes = Rc::new(Cell::new(0usize));
    let ready: Ready = Arc::default();

    for index in (0..CHUNKS).rev() {
        queue_chunk(&mut scheduler, index, &ready);
    }

    let start = Instant::now();
    let mut frame = 0u32;

    while frame < 10 || !scheduler.is_idle() || !gpu.is_idle() {
        scheduler.update();

        // Meshes that finished this frame go through the upload queue
        for chunk in ready.lock().unwrap().drain(..) {
            let vertices = chunk.vertices;
            let key = chunks.insert(chunk);
            let done = uploaded.clone();
            let total = uploaded_bytes.clone();
            gpu.append(GpuTask::chained(
                move || vertices * 32,
                move |bytes| {
                    total.set(total.get() + bytes);
                    done.borrow_mut().push(key);
                },
            ));
        }
        gpu.tick();

        {
            let mut visible = FrameVec::new_in(&arena);
            for &key in uploaded.borrow().iter() {
                if chunks.get(key).map_or(false, |c| c.index % 2 == frame as usize % 2) {
                    visible.push(key);
                }
            }
            let peaks = arena.alloc_slice_fill_with(visible.len(), |i| {
                chunks.get(visible[i]).map_or(0.0, |c| c.heights.iter().fold(f32::MIN, |a, &h| a.max(h)))
            });
            let highest = peaks.iter().fold(0.0f32, |a, &h| a.max(h));

            println!(
                "frame {:>3}  tasks {:>5}  gpu {}/{}  visible {:>2}  peak {:>5.2}  arena {}",
                frame,
                scheduler.progress().to_string(),
                gpu.pending_len(),
                gpu.kicked_len(),
                visible.len(),
                highest,
                frametask::size::format_bytes(arena.allocated_bytes()),
            );
        }

        arena.clear();
        frame += 1;
        std::thread::sleep(Duration::from_millis(2));
    }

    println!();
    println!(
        "loaded {} chunks ({}) in {:?} over {} frames",
        chunks.len(),
        frametask::size::format_bytes(uploaded_bytes.get()),
        start.elapsed(),
        frame
    );
    println!("{}", scheduler.stats());
    println!("{}", arena.stats());

    scheduler.shutdown();
}
