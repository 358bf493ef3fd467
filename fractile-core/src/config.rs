use serde::{Deserialize, Serialize};

/// Tunables for the tile engine.
///
/// `Default` reproduces the reference constants; serde defaults let a config
/// file override only the fields it cares about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per tile axis. One tile is `tile_resolution²` solver samples.
    pub tile_resolution: u32,
    /// Number of background compute threads.
    pub worker_count: usize,
    /// Priority given to a tile requested directly for display; ancestors
    /// are requested at doubled priority per level climbed.
    pub base_priority: i64,
    /// Screen-space radius (pixels) of the visibility circle test.
    pub view_radius: f64,
    /// Device units per domain unit at scale 1.0.
    pub domain_unit_px: f64,
    /// Domain-space side length of the depth-0 node.
    pub base_extent: f64,
    /// How many ancestor levels the LOD fallback searches for an uploaded tile.
    pub ancestor_search_depth: u32,
    /// Solver iteration cap; also the "did not escape" marker value.
    pub max_iterations: u32,
    /// Escape radius for the default solver.
    pub escape_radius: f64,
    /// Ticks without a tap before a subtree becomes evictable.
    pub evict_age: u64,
    /// Run eviction every this many ticks. Zero disables it.
    pub gc_interval: u64,
    /// Worker/dispatcher sleep between queue polls, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_resolution: 64,
            worker_count: 4,
            base_priority: 50,
            view_radius: 300.0,
            domain_unit_px: 16.0,
            base_extent: 8.0,
            ancestor_search_depth: 10,
            max_iterations: 2048,
            escape_radius: 2.0,
            evict_age: 120,
            gc_interval: 30,
            poll_interval_ms: 1,
        }
    }
}
