use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use fractile_core::{IterGrid, Point2};
use fractile_compute::SampleWindow;

use crate::surface::Rgba;

/// Render pipeline stage of one tile.
///
/// Statuses only move forward, with two sanctioned reversals: a failed
/// texture upload drops `Uploading` back to `Rendered`, and a cancelled or
/// panicked job resets to `Empty`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TileStatus {
    Empty = 0,
    Queued = 1,
    Computing = 2,
    Rendered = 3,
    Uploading = 4,
    Uploaded = 5,
}

impl TileStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Empty,
            1 => Self::Queued,
            2 => Self::Computing,
            3 => Self::Rendered,
            4 => Self::Uploading,
            _ => Self::Uploaded,
        }
    }
}

/// Shared lifecycle cell for one tile, visible to the scheduler thread and
/// the worker that computes the tile. Orchestrator-side transitions are plain
/// stores guarded by `debug_assert`; the worker claim is a compare-exchange
/// so a job can be claimed at most once.
#[derive(Debug)]
pub struct TileState {
    status: AtomicU8,
    cancelled: AtomicBool,
}

impl TileState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(TileStatus::Empty as u8),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> TileStatus {
        TileStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    /// Empty -> Queued. Re-arming a tile clears any stale cancellation.
    pub fn mark_queued(&self) {
        debug_assert_eq!(self.status(), TileStatus::Empty);
        self.cancelled.store(false, Ordering::Relaxed);
        self.status
            .store(TileStatus::Queued as u8, Ordering::Relaxed);
    }

    /// Queued -> Computing, done by the worker that takes the job. Returns
    /// false if the tile is no longer queued.
    pub fn try_claim(&self) -> bool {
        self.status
            .compare_exchange(
                TileStatus::Queued as u8,
                TileStatus::Computing as u8,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Computing -> Rendered, once the iteration grid has landed in the tile.
    pub fn mark_rendered(&self) {
        debug_assert_eq!(self.status(), TileStatus::Computing);
        self.status
            .store(TileStatus::Rendered as u8, Ordering::Relaxed);
    }

    /// Rendered -> Uploading, while the tile waits for its texture slot.
    pub fn mark_uploading(&self) {
        debug_assert_eq!(self.status(), TileStatus::Rendered);
        self.status
            .store(TileStatus::Uploading as u8, Ordering::Relaxed);
    }

    /// Uploading -> Uploaded.
    pub fn mark_uploaded(&self) {
        debug_assert_eq!(self.status(), TileStatus::Uploading);
        self.status
            .store(TileStatus::Uploaded as u8, Ordering::Relaxed);
    }

    /// Uploading -> Rendered, after a failed texture upload. The tile keeps
    /// its grid and can retry.
    pub fn revert_rendered(&self) {
        debug_assert_eq!(self.status(), TileStatus::Uploading);
        self.status
            .store(TileStatus::Rendered as u8, Ordering::Relaxed);
    }

    /// Back to Empty from any stage. Used when a job is cancelled or its
    /// worker panicked; the tile becomes eligible for re-enqueue.
    pub fn reset_empty(&self) {
        self.status
            .store(TileStatus::Empty as u8, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Default for TileState {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU-side representation of a finished tile.
#[derive(Debug)]
pub enum TileResource<T> {
    /// Full texture, one texel per sample.
    Texture(T),
    /// The whole tile mapped to one color; drawn as a flat rectangle with no
    /// texture behind it.
    Uniform(Rgba),
}

/// One cache entry: the domain placement of a quad-tree node plus everything
/// the render pipeline has produced for it so far.
#[derive(Debug)]
pub struct Tile<T> {
    /// Domain coordinates of the tile's top-left corner.
    pub offset: Point2,
    /// Reciprocal of the tile's domain side length.
    pub scale: f64,
    pub priority: i64,
    pub state: Arc<TileState>,
    pub grid: Option<IterGrid>,
    pub resource: Option<TileResource<T>>,
}

impl<T> Tile<T> {
    pub fn new(offset: Point2, size: f64) -> Self {
        debug_assert!(size > 0.0);
        Self {
            offset,
            scale: 1.0 / size,
            priority: 0,
            state: Arc::new(TileState::new()),
            grid: None,
            resource: None,
        }
    }

    /// Domain side length.
    pub fn size(&self) -> f64 {
        1.0 / self.scale
    }

    /// Sample window covering this tile at the given resolution.
    pub fn sample_window(&self, resolution: u32) -> SampleWindow {
        SampleWindow::new(self.offset, self.size() / resolution as f64, resolution)
    }

    /// True once the tile's grid exists and is a single value throughout.
    /// Trivial tiles skip texture upload entirely.
    pub fn is_trivial(&self) -> bool {
        self.grid
            .as_ref()
            .map(|g| g.uniform_value().is_some())
            .unwrap_or(false)
    }
}
