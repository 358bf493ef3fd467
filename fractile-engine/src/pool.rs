use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fractile_core::IterGrid;
use fractile_compute::Solver;

use crate::arena::NodeId;
use crate::queue::{JobQueue, RenderRequest};
use crate::tile::TileState;

/// A finished render job. The state handle identifies which tile incarnation
/// the grid belongs to; the tree compares it against the node's current tile
/// before accepting, so results for pruned or replaced tiles fall on the
/// floor instead of landing in a recycled slot.
pub struct CompletedTile {
    pub node: NodeId,
    pub grid: IterGrid,
    pub state: Arc<TileState>,
}

struct WorkerSlot {
    busy: AtomicBool,
}

/// Background render pool: one dispatcher pulling from the shared priority
/// queue and handing jobs to whichever worker is idle, workers pushing
/// finished grids back over a channel. The scheduler never blocks on it;
/// `submit` enqueues and `poll_completed` drains whatever is ready.
pub struct RenderPool {
    queue: Arc<Mutex<JobQueue>>,
    results: Receiver<CompletedTile>,
    slots: Vec<Arc<WorkerSlot>>,
    completed: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl RenderPool {
    pub fn new(solver: Arc<dyn Solver>, worker_count: usize, poll_interval: Duration) -> Self {
        let worker_count = worker_count.max(1);
        let queue = Arc::new(Mutex::new(JobQueue::new()));
        let completed = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = mpsc::channel();

        let mut slots = Vec::with_capacity(worker_count);
        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let slot = Arc::new(WorkerSlot {
                busy: AtomicBool::new(false),
            });
            let (job_tx, job_rx) = sync_channel(1);
            workers.push(spawn_worker(
                Arc::clone(&solver),
                job_rx,
                Arc::clone(&slot),
                result_tx.clone(),
                Arc::clone(&completed),
                Arc::clone(&shutdown),
                poll_interval,
            ));
            senders.push((job_tx, Arc::clone(&slot)));
            slots.push(slot);
        }
        drop(result_tx);

        let dispatcher = spawn_dispatcher(
            Arc::clone(&queue),
            senders,
            Arc::clone(&shutdown),
            poll_interval,
        );

        Self {
            queue,
            results: result_rx,
            slots,
            completed,
            shutdown,
            dispatcher: Some(dispatcher),
            workers,
        }
    }

    /// Hand a request to the pool. Returns immediately; the dispatcher picks
    /// it up by priority.
    pub fn submit(&self, request: RenderRequest) {
        self.lock_queue().push(request);
    }

    /// Everything the workers have finished since the last call.
    pub fn poll_completed(&self) -> Vec<CompletedTile> {
        let mut out = Vec::new();
        while let Ok(tile) = self.results.try_recv() {
            out.push(tile);
        }
        out
    }

    /// Requests still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn busy_workers(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.busy.load(Ordering::Relaxed))
            .count()
    }

    /// Total jobs completed over the pool's lifetime.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, JobQueue> {
        // A panicking worker never holds this lock, so poison is recoverable.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RenderPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spawn_dispatcher(
    queue: Arc<Mutex<JobQueue>>,
    senders: Vec<(SyncSender<RenderRequest>, Arc<WorkerSlot>)>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            let mut dispatched = false;
            for (sender, slot) in &senders {
                if slot.busy.load(Ordering::Relaxed) {
                    continue;
                }
                let Some(request) = pop_live(&queue) else {
                    break;
                };
                slot.busy.store(true, Ordering::Relaxed);
                if sender.send(request).is_err() {
                    // Worker is gone; engine is shutting down.
                    slot.busy.store(false, Ordering::Relaxed);
                    return;
                }
                dispatched = true;
            }
            if !dispatched {
                thread::sleep(poll_interval);
            }
        }
    })
}

/// Pop the next request that is still wanted, discarding cancelled ones.
fn pop_live(queue: &Mutex<JobQueue>) -> Option<RenderRequest> {
    let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        let request = queue.pop()?;
        if request.state.is_cancelled() {
            request.state.reset_empty();
            continue;
        }
        return Some(request);
    }
}

fn spawn_worker(
    solver: Arc<dyn Solver>,
    jobs: Receiver<RenderRequest>,
    slot: Arc<WorkerSlot>,
    results: Sender<CompletedTile>,
    completed: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        match jobs.recv_timeout(poll_interval) {
            Ok(request) => {
                run_job(&*solver, request, &results, &completed);
                slot.busy.store(false, Ordering::Relaxed);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}

fn run_job(
    solver: &dyn Solver,
    request: RenderRequest,
    results: &Sender<CompletedTile>,
    completed: &AtomicU64,
) {
    // Cancellation may land between dispatch and execution.
    if request.state.is_cancelled() {
        request.state.reset_empty();
        return;
    }
    if !request.state.try_claim() {
        return;
    }
    log::trace!("claimed {:?} at priority {}", request.node, request.priority);
    let window = request.window;
    match catch_unwind(AssertUnwindSafe(|| solver.solve(window))) {
        Ok(grid) => {
            completed.fetch_add(1, Ordering::Relaxed);
            let _ = results.send(CompletedTile {
                node: request.node,
                grid,
                state: request.state,
            });
        }
        Err(_) => {
            log::error!("render worker panicked, resetting tile");
            request.state.reset_empty();
        }
    }
}
