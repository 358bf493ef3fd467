use std::collections::BinaryHeap;
use std::sync::Arc;

use fractile_compute::SampleWindow;

use crate::arena::NodeId;
use crate::tile::TileState;

/// A unit of work for the pool: which node, where to sample, and how urgent.
/// Carries the tile's state cell so workers and the scheduler agree on
/// lifecycle and cancellation without going back through the tree.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub node: NodeId,
    pub window: SampleWindow,
    pub priority: i64,
    pub state: Arc<TileState>,
}

/// Heap entry: a request stamped with its enqueue sequence number.
#[derive(Debug)]
struct Job {
    request: RenderRequest,
    seq: u64,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.request.priority == other.request.priority && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Highest priority wins; equal priorities pop in enqueue order.
        self.request
            .priority
            .cmp(&other.request.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

/// Priority queue of pending render requests. Urgency decides pop order and
/// ties fall back to first-in first-out, so a burst of equal-priority tiles
/// renders in the order it was discovered.
#[derive(Debug, Default)]
pub struct JobQueue {
    heap: BinaryHeap<Job>,
    next_seq: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, request: RenderRequest) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Job { request, seq });
    }

    pub fn pop(&mut self) -> Option<RenderRequest> {
        self.heap.pop().map(|job| job.request)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
