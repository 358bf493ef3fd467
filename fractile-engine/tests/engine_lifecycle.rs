//! End-to-end runs of the tile pipeline against the software surface:
//! schedule, compute on workers, drain, promote, draw, evict.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fractile_core::{EngineConfig, Point2};
use fractile_compute::{CheckerSolver, FlatSolver};
use fractile_engine::{Engine, NodeId, Rgba, SoftSurface, SoftTexture, TickStats, TileStatus};

fn test_config() -> EngineConfig {
    EngineConfig {
        tile_resolution: 16,
        worker_count: 2,
        ..EngineConfig::default()
    }
}

/// A solver whose output varies within every tile, so each one uploads a
/// real texture.
fn varied_engine(config: EngineConfig) -> Engine<SoftTexture> {
    Engine::new(config, Arc::new(CheckerSolver::new(100, 0.5)))
}

/// Tick until `done` says so, pausing briefly so the workers get scheduled.
fn run_until(
    engine: &mut Engine<SoftTexture>,
    surface: &mut SoftSurface,
    max_ticks: usize,
    mut done: impl FnMut(&Engine<SoftTexture>, &SoftSurface, TickStats) -> bool,
) -> bool {
    for _ in 0..max_ticks {
        let stats = engine.tick(surface);
        if done(engine, surface, stats) {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn status_of(engine: &Engine<SoftTexture>, id: NodeId) -> TileStatus {
    engine.tree().node(id).unwrap().tile().state.status()
}

#[test]
fn pipeline_brings_visible_tiles_to_uploaded() {
    let mut engine = varied_engine(test_config());
    let mut surface = SoftSurface::new(640, 640);
    let root = engine.tree().root();

    let uploaded = run_until(&mut engine, &mut surface, 500, |engine, _, _| {
        status_of(engine, root) == TileStatus::Uploaded
    });
    assert!(uploaded, "root tile never reached Uploaded");
    assert!(surface.live_textures() >= 1);

    // Once everything in flight lands, the screen center shows real tile
    // data instead of the pending placeholder.
    let drained = run_until(&mut engine, &mut surface, 500, |engine, _, _| {
        engine.pending_jobs() == 0 && engine.pending_uploads() == 0
    });
    assert!(drained, "pipeline never drained");
    assert_ne!(surface.pixel(320, 320), [0, 255, 0, 255]);
}

#[test]
fn at_most_one_tile_is_promoted_per_tick() {
    let mut engine = varied_engine(test_config());
    let mut surface = SoftSurface::new(640, 640);

    // Default view: root plus four depth-1 children, five grids total.
    let mut total_completed = 0;
    let settled = run_until(&mut engine, &mut surface, 500, |_, _, stats| {
        assert!(stats.promoted <= 1, "promotion cap violated");
        total_completed += stats.completed;
        total_completed >= 5
    });
    assert!(settled, "workers never finished the initial grids");

    // Whatever is still waiting drains exactly one tile per tick.
    let waiting = engine.pending_uploads();
    for _ in 0..waiting {
        let stats = engine.tick(&mut surface);
        assert_eq!(stats.promoted, 1);
    }
    assert_eq!(engine.pending_uploads(), 0);
    assert_eq!(surface.live_textures(), 5);
}

#[test]
fn offscreen_camera_schedules_and_draws_nothing() {
    let mut engine = varied_engine(test_config());
    let mut surface = SoftSurface::new(640, 640);
    engine.viewport.offset = Point2::new(100_000.0, 0.0);

    surface.clear([1, 2, 3, 255]);
    for _ in 0..5 {
        let stats = engine.tick(&mut surface);
        assert_eq!(stats.submitted, 0);
        assert_eq!(stats.completed, 0);
    }
    assert_eq!(engine.tree().len(), 1);
    assert_eq!(surface.pixel(320, 320), [1, 2, 3, 255]);
}

#[test]
fn eviction_prunes_offscreen_tiles_and_reclaims_textures() {
    let mut config = test_config();
    config.evict_age = 10;
    config.gc_interval = 5;
    let mut engine = varied_engine(config);
    let mut surface = SoftSurface::new(640, 640);
    // Zoomed in one level: prepare reaches depth 2, so depth-1 nodes carry
    // real subtrees that eviction can remove from the arena.
    engine.viewport.scale = 2.0;

    let built = run_until(&mut engine, &mut surface, 500, |engine, surface, _| {
        engine.pending_jobs() == 0
            && engine.pending_uploads() == 0
            && surface.live_textures() > 5
    });
    assert!(built, "tree never filled in");
    let peak_nodes = engine.tree().len();
    let peak_textures = surface.live_textures();

    // Walk away; taps stop, and the sweeps that follow gut everything but
    // the root.
    engine.viewport.offset = Point2::new(100_000.0, 0.0);
    let mut pruned_total = 0;
    let evicted = run_until(&mut engine, &mut surface, 500, |_, surface, stats| {
        pruned_total += stats.pruned;
        surface.live_textures() == 1
    });
    assert!(evicted, "textures were never reclaimed");
    assert!(pruned_total > 0, "no nodes were removed from the arena");
    assert!(engine.tree().len() < peak_nodes);
    assert!(surface.live_textures() < peak_textures);

    // Coming back re-schedules the gutted tiles from scratch.
    engine.viewport.offset = Point2::ZERO;
    let stats = engine.tick(&mut surface);
    assert!(stats.submitted >= 1, "returning camera should re-enqueue");
}

#[test]
fn failed_uploads_retry_until_the_budget_allows() {
    let mut engine = varied_engine(test_config());
    let mut surface = SoftSurface::with_texture_budget(640, 640, 0);
    let root = engine.tree().root();

    // With no texture budget every promotion fails and the tiles stay
    // Rendered, parked in the upload queue.
    let stuck = run_until(&mut engine, &mut surface, 500, |engine, surface, _| {
        assert_eq!(surface.live_textures(), 0);
        engine.pending_jobs() == 0 && status_of(engine, root) == TileStatus::Rendered
    });
    assert!(stuck, "root never reached Rendered");
    assert!(engine.pending_uploads() >= 1);

    surface.set_texture_budget(None);
    let recovered = run_until(&mut engine, &mut surface, 500, |engine, _, _| {
        status_of(engine, root) == TileStatus::Uploaded && engine.pending_uploads() == 0
    });
    assert!(recovered, "uploads never recovered after lifting the budget");
    assert_eq!(surface.live_textures(), 5);
}

#[test]
fn uniform_tiles_become_flat_fills_without_textures() {
    fn mono(value: u32, _max: u32) -> Rgba {
        [value as u8, value as u8, value as u8, 255]
    }

    let mut engine: Engine<SoftTexture> =
        Engine::new(test_config(), Arc::new(FlatSolver::new(100, 7)));
    engine.set_color_map(mono);
    let mut surface = SoftSurface::new(640, 640);

    let mut total_promoted = 0;
    let done = run_until(&mut engine, &mut surface, 500, |engine, _, stats| {
        total_promoted += stats.promoted;
        engine.pending_jobs() == 0 && engine.pending_uploads() == 0 && total_promoted >= 5
    });
    assert!(done, "flat tiles never promoted");

    assert_eq!(surface.live_textures(), 0);
    assert_eq!(surface.pixel(320, 320), [7, 7, 7, 255]);
}
