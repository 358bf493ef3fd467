use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fractile_core::{EngineConfig, Viewport};
use fractile_compute::Solver;

use crate::arena::NodeId;
use crate::pool::RenderPool;
use crate::surface::{grayscale, ColorMap, Surface};
use crate::tile::{TileState, TileStatus};
use crate::tree::TileTree;

/// What one tick did, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Render requests handed to the worker pool.
    pub submitted: usize,
    /// Finished grids landed in their tiles.
    pub completed: usize,
    /// Tiles promoted to a renderable resource.
    pub promoted: usize,
    /// Nodes removed by eviction.
    pub pruned: usize,
}

/// Ties the tile tree, worker pool, and surface together. One [`Engine::tick`]
/// per frame drives the whole pipeline: finished grids are drained from the
/// pool, at most one tile is promoted to a texture, the visible region is
/// scheduled, stale tiles are evicted on an interval, and the tree is drawn.
///
/// The promotion cap spreads texture uploads across frames so a burst of
/// finished tiles cannot stall a single frame.
pub struct Engine<T> {
    config: EngineConfig,
    pub viewport: Viewport,
    tree: TileTree<T>,
    pool: RenderPool,
    uploads: VecDeque<(NodeId, Arc<TileState>)>,
    color_map: ColorMap,
    tick: u64,
}

impl<T> Engine<T> {
    pub fn new(config: EngineConfig, solver: Arc<dyn Solver>) -> Self {
        let pool = RenderPool::new(
            solver,
            config.worker_count,
            Duration::from_millis(config.poll_interval_ms),
        );
        let tree = TileTree::new(config.clone());
        log::info!(
            "tile tree ready: extent {}, {} samples per tile, {} workers",
            config.base_extent,
            config.tile_resolution,
            config.worker_count.max(1)
        );
        Self {
            config,
            viewport: Viewport::default(),
            tree,
            pool,
            uploads: VecDeque::new(),
            color_map: grayscale,
            tick: 0,
        }
    }

    pub fn set_color_map(&mut self, color_map: ColorMap) {
        self.color_map = color_map;
    }

    pub fn tree(&self) -> &TileTree<T> {
        &self.tree
    }

    /// Ticks run so far. Tick numbering starts at 1; zero is the
    /// never-touched sentinel in the tree's tap timestamps.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Jobs waiting in the render queue.
    pub fn pending_jobs(&self) -> usize {
        self.pool.pending()
    }

    /// Tiles waiting for their promotion slot.
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Tree depth the current zoom wants on screen. Doubling the zoom adds
    /// one level; zooming out never goes above the root.
    pub fn draw_depth(&self) -> u32 {
        self.viewport.scale.log2().floor().max(0.0) as u32
    }

    /// Run one frame of the pipeline against `surface`.
    pub fn tick<S: Surface<Texture = T>>(&mut self, surface: &mut S) -> TickStats {
        self.tick += 1;
        let mut stats = TickStats::default();

        for completed in self.pool.poll_completed() {
            let node = completed.node;
            let state = Arc::clone(&completed.state);
            if self.tree.complete(completed) {
                stats.completed += 1;
                self.uploads.push_back((node, state));
            }
        }

        self.promote_next(surface, &mut stats);

        let draw_depth = self.draw_depth();
        let requests = self
            .tree
            .prepare(&self.viewport, draw_depth + 1, self.tick);
        stats.submitted = requests.len();
        for request in requests {
            self.pool.submit(request);
        }

        if self.config.gc_interval > 0 && self.tick % self.config.gc_interval == 0 {
            stats.pruned = self.tree.garbage_collect(self.config.evict_age, self.tick);
        }
        // Textures dropped by eviction or re-splitting go back to the surface.
        for texture in self.tree.take_reclaimed() {
            surface.destroy_texture(texture);
        }

        self.tree.draw(surface, &self.viewport, draw_depth, self.tick);

        if stats.completed > 0 || stats.promoted > 0 || stats.pruned > 0 {
            log::debug!(
                "tick {}: submitted={} completed={} promoted={} pruned={} queue={} uploads={}",
                self.tick,
                stats.submitted,
                stats.completed,
                stats.promoted,
                stats.pruned,
                self.pool.pending(),
                self.uploads.len(),
            );
        }
        stats
    }

    /// Promote at most one waiting tile. A failed upload goes to the back of
    /// the line and retries on a later tick; a tile whose incarnation is gone
    /// is silently dropped.
    fn promote_next<S: Surface<Texture = T>>(&mut self, surface: &mut S, stats: &mut TickStats) {
        let Some((node, state)) = self.uploads.pop_front() else {
            return;
        };
        if state.status() != TileStatus::Rendered {
            return;
        }
        state.mark_uploading();
        match self.tree.promote(node, &state, self.color_map, surface) {
            Ok(true) => stats.promoted += 1,
            Ok(false) => {}
            Err(err) => {
                log::warn!("tile upload failed, retrying later: {err}");
                self.uploads.push_back((node, state));
            }
        }
    }
}
