use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shared::RenderFrame;
use sim::{observe, Simulation};

use crate::lock;

/// Bounded buffer between the snapshot producer and a renderer. When full,
/// the oldest frame is evicted before the newest goes in: the producer never
/// blocks on a slow consumer, memory stays bounded, and the consumer always
/// sees the most recent frames at the cost of dropped intermediates.
pub struct FrameQueue {
    frames: Mutex<VecDeque<Arc<RenderFrame>>>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, frame: Arc<RenderFrame>) {
        let mut frames = lock(&self.frames);
        while frames.len() >= self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Oldest available frame. `None` only means the consumer outpaced the
    /// producer; it should re-show its previous frame.
    pub fn pop(&self) -> Option<Arc<RenderFrame>> {
        lock(&self.frames).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.frames).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Captures immutable deep-copy snapshots on its own wall-clock cadence,
/// independent of the simulation's day rhythm: a fast run produces many days
/// per frame, a slow one many frames per day.
pub struct SnapshotProducer {
    sim: Arc<Mutex<Simulation>>,
    queue: Arc<FrameQueue>,
    selected: Arc<Mutex<Option<u64>>>,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotProducer {
    pub fn spawn(sim: Arc<Mutex<Simulation>>, queue: Arc<FrameQueue>, interval: Duration) -> Self {
        let selected = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let sim = Arc::clone(&sim);
            let queue = Arc::clone(&queue);
            let selected = Arc::clone(&selected);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || produce_loop(&sim, &queue, &selected, &shutdown, interval))
        };
        Self {
            sim,
            queue,
            selected,
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Point the tracker at an animal, or clear it. Later frames carry its
    /// view even after it moves to the dead collection.
    pub fn select_animal(&self, id: Option<u64>) {
        *lock(&self.selected) = id;
    }

    pub fn selected_animal(&self) -> Option<u64> {
        *lock(&self.selected)
    }

    /// Capture a frame immediately, bypassing the cadence.
    pub fn capture_now(&self) -> RenderFrame {
        let selected = self.selected_animal();
        let sim = lock(&self.sim);
        observe::capture_frame(&sim, selected)
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Stop the producer thread and wait for it. Idempotent.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn produce_loop(
    sim: &Arc<Mutex<Simulation>>,
    queue: &Arc<FrameQueue>,
    selected: &Arc<Mutex<Option<u64>>>,
    shutdown: &Arc<AtomicBool>,
    interval: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let tick = panic::catch_unwind(AssertUnwindSafe(|| {
            let selected = *lock(selected);
            let frame = {
                let sim = lock(sim);
                observe::capture_frame(&sim, selected)
            };
            queue.push(Arc::new(frame));
        }));
        // A missed snapshot is not fatal; keep the cadence going.
        if tick.is_err() {
            tracing::warn!("snapshot capture panicked, frame skipped");
        }
        thread::sleep(interval);
    }
}
