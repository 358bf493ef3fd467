use std::sync::Arc;

use fractile_core::{EngineConfig, Point2, ScreenRect, Viewport};

use crate::arena::{Arena, NodeId};
use crate::error::SurfaceError;
use crate::pool::CompletedTile;
use crate::queue::RenderRequest;
use crate::surface::{ColorMap, Rgba, Surface, UvRect};
use crate::tile::{Tile, TileResource, TileState, TileStatus};

/// Flat color for regions where neither the tile nor any ancestor has data.
const PENDING_COLOR: Rgba = [0, 255, 0, 255];

/// One cell of the quad-tree: fixed domain placement plus the cached tile
/// and tap timestamps for eviction.
pub struct QuadNode<T> {
    center: Point2,
    depth: u32,
    parent: Option<NodeId>,
    children: Option<[NodeId; 4]>,
    tile: Tile<T>,
    last_tapped: u64,
    oldest_tap: u64,
}

impl<T> QuadNode<T> {
    fn new(center: Point2, size: f64, depth: u32, parent: Option<NodeId>) -> Self {
        let half = size / 2.0;
        Self {
            center,
            depth,
            parent,
            children: None,
            tile: Tile::new(Point2::new(center.x - half, center.y - half), size),
            last_tapped: 0,
            oldest_tap: 0,
        }
    }

    pub fn center(&self) -> Point2 {
        self.center
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }

    pub fn tile(&self) -> &Tile<T> {
        &self.tile
    }

    pub fn last_tapped(&self) -> u64 {
        self.last_tapped
    }

    pub fn oldest_tap(&self) -> u64 {
        self.oldest_tap
    }
}

/// Quadrant index for `point` relative to `center`: bit 0 picks the x half,
/// bit 1 the y half, with `>=` deciding ties toward the positive side.
fn child_index(center: Point2, point: Point2) -> usize {
    (point.x >= center.x) as usize | (((point.y >= center.y) as usize) << 1)
}

/// Adaptive tile cache over a square domain. The root covers the base
/// extent; each split halves the cell size. Nodes are arena-backed, so a
/// pruned subtree invalidates its ids rather than leaving dangling links.
///
/// Texture handles freed by pruning or re-splitting collect in an internal
/// buffer; the owner drains them with [`TileTree::take_reclaimed`] and
/// returns them to the surface.
pub struct TileTree<T> {
    config: EngineConfig,
    arena: Arena<QuadNode<T>>,
    root: NodeId,
    reclaimed: Vec<T>,
}

impl<T> TileTree<T> {
    pub fn new(config: EngineConfig) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(QuadNode::new(Point2::ZERO, config.base_extent, 0, None));
        Self {
            config,
            arena,
            root,
            reclaimed: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&QuadNode<T>> {
        self.arena.get(id)
    }

    /// Domain side length of a node at `depth`.
    pub fn node_size(&self, depth: u32) -> f64 {
        self.config.base_extent / 2f64.powi(depth as i32)
    }

    /// Texture handles released since the last drain. The caller owns their
    /// destruction.
    pub fn take_reclaimed(&mut self) -> Vec<T> {
        std::mem::take(&mut self.reclaimed)
    }

    /// Node containing `point` at exactly `depth`, or `None` if the path has
    /// not been split that far.
    pub fn get_node(&self, point: Point2, depth: u32) -> Option<NodeId> {
        let mut id = self.root;
        for _ in 0..depth {
            let node = self.arena.get(id)?;
            let children = node.children?;
            id = children[child_index(node.center, point)];
        }
        Some(id)
    }

    /// Node containing `point` at `depth`, splitting every missing level on
    /// the way down from the deepest existing ancestor.
    pub fn ensure_node(&mut self, point: Point2, depth: u32) -> NodeId {
        let mut id = self.root;
        for _ in 0..depth {
            let (center, children) = match self.arena.get(id) {
                Some(node) => (node.center, node.children),
                None => return id,
            };
            let children = match children {
                Some(children) => children,
                None => match self.split(id) {
                    Some(children) => children,
                    None => return id,
                },
            };
            id = children[child_index(center, point)];
        }
        id
    }

    /// Replace `id`'s children with a fresh quartet: half the parent size,
    /// centers offset diagonally by a quarter of the parent size, depth + 1.
    /// Any existing child subtrees are discarded first, so callers wanting
    /// the cheap path check for children before calling.
    pub fn split(&mut self, id: NodeId) -> Option<[NodeId; 4]> {
        let (center, depth, old_children) = {
            let node = self.arena.get_mut(id)?;
            (node.center, node.depth, node.children.take())
        };
        if let Some(children) = old_children {
            for child in children {
                self.drop_subtree(child);
            }
        }
        let quarter = self.node_size(depth) / 4.0;
        let child_size = self.node_size(depth + 1);
        let children = std::array::from_fn(|i| {
            let dx = if i & 1 == 0 { -quarter } else { quarter };
            let dy = if i & 2 == 0 { -quarter } else { quarter };
            self.arena.insert(QuadNode::new(
                Point2::new(center.x + dx, center.y + dy),
                child_size,
                depth + 1,
                Some(id),
            ))
        });
        if let Some(node) = self.arena.get_mut(id) {
            node.children = Some(children);
        }
        Some(children)
    }

    pub fn is_in_view(&self, viewport: &Viewport, id: NodeId) -> bool {
        match self.arena.get(id) {
            Some(node) => self.visible(viewport, node.center, node.depth),
            None => false,
        }
    }

    /// Circle-approximation culling: the node is visible when its screen
    /// distance from the viewport center, less its projected corner radius,
    /// stays under the view radius. Marginal tiles may flicker in and out;
    /// that is the accepted cost of the cheap test.
    fn visible(&self, viewport: &Viewport, center: Point2, depth: u32) -> bool {
        let unit = self.config.domain_unit_px;
        let screen = viewport.to_screen(center * unit);
        let half = self.node_size(depth) / 2.0;
        let radius = (2.0 * half * half).sqrt() * viewport.scale * unit;
        let dist = (screen.distance_to(viewport.screen_center()) - radius).max(0.0);
        dist < self.config.view_radius
    }

    /// Stamp `id` and every ancestor with the current tick.
    pub fn tap(&mut self, id: NodeId, tick: u64) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.arena.get_mut(node_id) else {
                return;
            };
            node.last_tapped = tick;
            if node.oldest_tap == 0 || tick < node.oldest_tap {
                node.oldest_tap = tick;
            }
            current = node.parent;
        }
    }

    /// Walk the visible subtree down to `required_depth`, splitting where
    /// needed and collecting a render request for every empty tile on the
    /// way. Culled branches are never split, enqueued, or tapped.
    pub fn prepare(
        &mut self,
        viewport: &Viewport,
        required_depth: u32,
        tick: u64,
    ) -> Vec<RenderRequest> {
        let required_depth = required_depth.max(1);
        let mut requests = Vec::new();
        self.prep_node(self.root, viewport, required_depth, tick, &mut requests);
        requests
    }

    fn prep_node(
        &mut self,
        id: NodeId,
        viewport: &Viewport,
        required_depth: u32,
        tick: u64,
        requests: &mut Vec<RenderRequest>,
    ) {
        let (center, depth, children) = match self.arena.get(id) {
            Some(node) => (node.center, node.depth, node.children),
            None => return,
        };
        if !self.visible(viewport, center, depth) {
            return;
        }
        self.tap(id, tick);
        self.push_request(id, self.config.base_priority, requests);
        if depth == required_depth {
            return;
        }
        let children = match children {
            Some(children) => children,
            None => match self.split(id) {
                Some(children) => children,
                None => return,
            },
        };
        for child in children {
            self.prep_node(child, viewport, required_depth, tick, requests);
        }
    }

    /// Request a render for the node containing `point` at `depth`, creating
    /// the node if needed. Empty ancestors are enqueued ahead of it with
    /// priority doubling per level climbed; they are the fallback imagery
    /// while the fine tile computes, so they must land first.
    pub fn request_render(
        &mut self,
        point: Point2,
        depth: u32,
        priority: i64,
    ) -> Vec<RenderRequest> {
        let mut requests = Vec::new();
        if priority < 0 {
            return requests;
        }
        let id = self.ensure_node(point, depth);
        self.push_request(id, priority, &mut requests);
        requests
    }

    fn push_request(&mut self, id: NodeId, priority: i64, requests: &mut Vec<RenderRequest>) {
        // Negative priority means "never render", per the scheduling contract.
        if priority < 0 {
            return;
        }
        let parent = match self.arena.get(id) {
            Some(node) if node.tile.state.status() == TileStatus::Empty => node.parent,
            _ => return,
        };
        if let Some(parent) = parent {
            self.push_request(parent, priority.saturating_mul(2), requests);
        }
        let resolution = self.config.tile_resolution;
        if let Some(node) = self.arena.get_mut(id) {
            node.tile.priority = priority;
            node.tile.state.mark_queued();
            requests.push(RenderRequest {
                node: id,
                window: node.tile.sample_window(resolution),
                priority,
                state: Arc::clone(&node.tile.state),
            });
        }
    }

    /// Land a finished grid in its tile. Rejects results whose node is gone
    /// or whose tile has been replaced since the job was queued; the state
    /// handle, not the node id, is what identifies the right incarnation.
    pub fn complete(&mut self, completed: CompletedTile) -> bool {
        let Some(node) = self.arena.get_mut(completed.node) else {
            return false;
        };
        if !Arc::ptr_eq(&node.tile.state, &completed.state) {
            return false;
        }
        node.tile.grid = Some(completed.grid);
        node.tile.state.mark_rendered();
        true
    }

    /// Turn a rendered tile's grid into a renderable resource. Uniform grids
    /// become a flat-color resource with no texture behind them; anything
    /// else is rasterized through the color map and uploaded. On upload
    /// failure the tile drops back to `Rendered` so a later tick can retry.
    pub fn promote<S: Surface<Texture = T>>(
        &mut self,
        id: NodeId,
        state: &Arc<TileState>,
        color_map: ColorMap,
        surface: &mut S,
    ) -> Result<bool, SurfaceError> {
        let Some(node) = self.arena.get_mut(id) else {
            return Ok(false);
        };
        if !Arc::ptr_eq(&node.tile.state, state) {
            return Ok(false);
        }
        debug_assert_eq!(node.tile.state.status(), TileStatus::Uploading);
        debug_assert!(node.tile.resource.is_none());
        let Some(grid) = node.tile.grid.as_ref() else {
            return Ok(false);
        };
        let max = grid.max_iterations();
        if let Some(value) = grid.uniform_value() {
            node.tile.resource = Some(TileResource::Uniform(color_map(value, max)));
            node.tile.state.mark_uploaded();
            return Ok(true);
        }
        let resolution = grid.resolution();
        let mut pixels = Vec::with_capacity((resolution * resolution * 4) as usize);
        for &value in grid.values() {
            pixels.extend_from_slice(&color_map(value, max));
        }
        match surface.create_texture(resolution, resolution, &pixels) {
            Ok(texture) => {
                node.tile.resource = Some(TileResource::Texture(texture));
                node.tile.state.mark_uploaded();
                Ok(true)
            }
            Err(err) => {
                node.tile.state.revert_rendered();
                Err(err)
            }
        }
    }

    /// Draw the visible subtree, showing nodes at `target_depth` (or a
    /// shallower node where the tree has not been split that far). Every
    /// visited node is tapped.
    pub fn draw<S: Surface<Texture = T>>(
        &mut self,
        surface: &mut S,
        viewport: &Viewport,
        target_depth: u32,
        tick: u64,
    ) {
        self.draw_node(self.root, surface, viewport, target_depth, tick);
    }

    fn draw_node<S: Surface<Texture = T>>(
        &mut self,
        id: NodeId,
        surface: &mut S,
        viewport: &Viewport,
        target_depth: u32,
        tick: u64,
    ) {
        let (center, depth, children) = match self.arena.get(id) {
            Some(node) => (node.center, node.depth, node.children),
            None => return,
        };
        if !self.visible(viewport, center, depth) {
            return;
        }
        self.tap(id, tick);
        if depth < target_depth {
            if let Some(children) = children {
                for child in children {
                    self.draw_node(child, surface, viewport, target_depth, tick);
                }
                return;
            }
            // Unsplit path below the target depth: this node is the best
            // data available for its whole extent.
        }
        self.draw_tile(id, surface, viewport);
    }

    fn draw_tile<S: Surface<Texture = T>>(
        &self,
        id: NodeId,
        surface: &mut S,
        viewport: &Viewport,
    ) {
        let Some(node) = self.arena.get(id) else {
            return;
        };
        let dest = self.screen_rect(viewport, node);
        match &node.tile.resource {
            Some(TileResource::Texture(texture)) => {
                surface.draw_texture(texture, dest, UvRect::FULL);
            }
            Some(TileResource::Uniform(color)) => surface.fill_rect(dest, *color),
            None => self.draw_fallback(id, dest, surface),
        }
    }

    /// Nearest uploaded ancestor stretched over `dest`, or the pending color
    /// if no ancestor within the search depth has anything either.
    fn draw_fallback<S: Surface<Texture = T>>(
        &self,
        id: NodeId,
        dest: ScreenRect,
        surface: &mut S,
    ) {
        if let Some((ancestor, uv)) = self.find_fallback(id) {
            if let Some(node) = self.arena.get(ancestor) {
                match &node.tile.resource {
                    Some(TileResource::Texture(texture)) => {
                        surface.draw_texture(texture, dest, uv);
                        return;
                    }
                    Some(TileResource::Uniform(color)) => {
                        surface.fill_rect(dest, *color);
                        return;
                    }
                    None => {}
                }
            }
        }
        surface.fill_rect(dest, PENDING_COLOR);
    }

    fn find_fallback(&self, id: NodeId) -> Option<(NodeId, UvRect)> {
        let node = self.arena.get(id)?;
        let size = self.node_size(node.depth);
        let offset = node.tile.offset;
        let mut current = node.parent;
        for _ in 0..self.config.ancestor_search_depth {
            let ancestor_id = current?;
            let ancestor = self.arena.get(ancestor_id)?;
            if ancestor.tile.resource.is_some() {
                let ancestor_size = self.node_size(ancestor.depth);
                let ratio = size / ancestor_size;
                let u0 = ((offset.x - ancestor.tile.offset.x) / ancestor_size).rem_euclid(1.0);
                let v0 = ((offset.y - ancestor.tile.offset.y) / ancestor_size).rem_euclid(1.0);
                return Some((ancestor_id, UvRect::new(u0, v0, u0 + ratio, v0 + ratio)));
            }
            current = ancestor.parent;
        }
        None
    }

    fn screen_rect(&self, viewport: &Viewport, node: &QuadNode<T>) -> ScreenRect {
        let unit = self.config.domain_unit_px;
        let size = self.node_size(node.depth);
        let top_left = viewport.to_screen(node.tile.offset * unit);
        let far = Point2::new(node.tile.offset.x + size, node.tile.offset.y + size);
        let bottom_right = viewport.to_screen(far * unit);
        ScreenRect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }

    /// Evict everything that has not been tapped within `age` ticks. A stale
    /// node loses its subtree and its own render state but stays in the tree
    /// as an empty leaf, so sibling quartets stay intact; the root is never
    /// evicted. In-flight jobs for evicted tiles are cancelled and uploaded
    /// textures land in the reclaimed buffer. Returns the number of nodes
    /// removed.
    pub fn garbage_collect(&mut self, age: u64, tick: u64) -> usize {
        let before = self.arena.len();
        let cutoff = tick.saturating_sub(age);
        self.gc_node(self.root, cutoff, true);
        before - self.arena.len()
    }

    /// Sweep one node; returns the recomputed `oldest_tap` for its subtree.
    fn gc_node(&mut self, id: NodeId, cutoff: u64, is_root: bool) -> u64 {
        let (last, oldest, children) = match self.arena.get(id) {
            Some(node) => (node.last_tapped, node.oldest_tap, node.children),
            None => return 0,
        };
        // Everything below was tapped recently; skip the whole subtree.
        if oldest > cutoff {
            return oldest;
        }
        if !is_root && last < cutoff {
            self.gut_node(id);
            if let Some(node) = self.arena.get_mut(id) {
                node.oldest_tap = last;
            }
            return last;
        }
        let mut recomputed = if last > 0 { Some(last) } else { None };
        if let Some(children) = children {
            for child in children {
                let child_oldest = self.gc_node(child, cutoff, false);
                if child_oldest > 0 {
                    recomputed = Some(recomputed.map_or(child_oldest, |o| o.min(child_oldest)));
                }
            }
        }
        let recomputed = recomputed.unwrap_or(0);
        if let Some(node) = self.arena.get_mut(id) {
            node.oldest_tap = recomputed;
        }
        recomputed
    }

    /// Drop a stale node's subtree and reset its own tile, leaving it as an
    /// empty leaf.
    fn gut_node(&mut self, id: NodeId) {
        let children = match self.arena.get_mut(id) {
            Some(node) => node.children.take(),
            None => return,
        };
        if let Some(children) = children {
            for child in children {
                self.drop_subtree(child);
            }
        }
        if let Some(node) = self.arena.get_mut(id) {
            let offset = node.tile.offset;
            let size = node.tile.size();
            let old = std::mem::replace(&mut node.tile, Tile::new(offset, size));
            old.state.cancel();
            if let Some(TileResource::Texture(texture)) = old.resource {
                self.reclaimed.push(texture);
            }
        }
    }

    /// Remove a whole subtree from the arena, cancelling jobs and reclaiming
    /// textures as it goes.
    fn drop_subtree(&mut self, id: NodeId) {
        let Some(node) = self.arena.remove(id) else {
            return;
        };
        node.tile.state.cancel();
        if let Some(TileResource::Texture(texture)) = node.tile.resource {
            self.reclaimed.push(texture);
        }
        if let Some(children) = node.children {
            for child in children {
                self.drop_subtree(child);
            }
        }
    }
}
