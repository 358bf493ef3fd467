//! Headless driver for the tile engine: runs a scripted zoom into the
//! Mandelbrot set against the software surface and writes PNG snapshots.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use fractile_compute::MandelbrotSolver;
use fractile_core::{EngineConfig, Point2};
use fractile_engine::{ember, grayscale, Engine, SoftSurface, TickStats};

#[derive(Parser)]
#[command(name = "fractile", version, about = "Zoom into the Mandelbrot set and snapshot frames")]
struct Cli {
    /// Number of engine ticks to run.
    #[arg(long, default_value_t = 240)]
    ticks: u64,

    /// Write a PNG every this many ticks. Zero writes only the final frame.
    #[arg(long, default_value_t = 60)]
    snapshot_every: u64,

    /// Directory for the PNG snapshots.
    #[arg(long, default_value = "frames")]
    out_dir: PathBuf,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 1440)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 1024)]
    height: u32,

    /// Zoom multiplier applied to the viewport scale each tick.
    #[arg(long, default_value_t = 1.08)]
    zoom_rate: f64,

    /// Domain x coordinate the camera glides toward.
    #[arg(long, default_value_t = -0.7436, allow_hyphen_values = true)]
    target_x: f64,

    /// Domain y coordinate the camera glides toward.
    #[arg(long, default_value_t = 0.1318, allow_hyphen_values = true)]
    target_y: f64,

    /// Color map for escaped points.
    #[arg(long, default_value = "grayscale")]
    color_map: String,

    /// Optional engine config as JSON; unset fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    Ok(config)
}

fn save_frame(surface: &SoftSurface, out_dir: &PathBuf, tick: u64) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(format!("frame_{tick:05}.png"));
    let frame = image::RgbaImage::from_raw(
        surface.width(),
        surface.height(),
        surface.frame().to_vec(),
    )
    .context("frame buffer does not match its dimensions")?;
    frame
        .save(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let color_map = match cli.color_map.as_str() {
        "ember" => ember,
        "grayscale" => grayscale,
        other => anyhow::bail!("unknown color map {other:?}, expected ember or grayscale"),
    };
    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    let solver = MandelbrotSolver::new(config.max_iterations, config.escape_radius);
    let target = Point2::new(cli.target_x, cli.target_y) * config.domain_unit_px;

    let mut engine = Engine::new(config, Arc::new(solver));
    engine.set_color_map(color_map);
    engine.viewport.size = (cli.width as f64, cli.height as f64);
    let mut surface = SoftSurface::new(cli.width, cli.height);

    log::info!(
        "zooming toward ({}, {}) for {} ticks at x{} per tick",
        cli.target_x,
        cli.target_y,
        cli.ticks,
        cli.zoom_rate
    );

    let started = Instant::now();
    let mut totals = TickStats::default();
    for tick in 1..=cli.ticks {
        // Glide toward the target while the zoom deepens, so early frames
        // show the approach and later ones the dive.
        engine.viewport.scale *= cli.zoom_rate;
        let offset = engine.viewport.offset;
        engine.viewport.offset = offset + (target - offset) * 0.08;

        surface.clear([0, 0, 0, 255]);
        let stats = engine.tick(&mut surface);
        totals.submitted += stats.submitted;
        totals.completed += stats.completed;
        totals.promoted += stats.promoted;
        totals.pruned += stats.pruned;

        if cli.snapshot_every > 0 && tick % cli.snapshot_every == 0 {
            let path = save_frame(&surface, &cli.out_dir, tick)?;
            log::info!(
                "tick {tick}: depth {} nodes {} textures {} -> {}",
                engine.draw_depth(),
                engine.tree().len(),
                surface.live_textures(),
                path.display()
            );
        }

        // Give the workers a slice of time between frames.
        thread::sleep(Duration::from_millis(4));
    }

    // Let stragglers land so the last frame is as filled-in as it gets.
    let mut quiet_ticks = 0;
    for _ in 0..600 {
        if quiet_ticks >= 3 {
            break;
        }
        surface.clear([0, 0, 0, 255]);
        let stats = engine.tick(&mut surface);
        totals.completed += stats.completed;
        totals.promoted += stats.promoted;
        if stats.completed == 0 && stats.promoted == 0 && engine.pending_uploads() == 0 {
            quiet_ticks += 1;
        } else {
            quiet_ticks = 0;
        }
        thread::sleep(Duration::from_millis(4));
    }
    let path = save_frame(&surface, &cli.out_dir, cli.ticks)?;

    log::info!(
        "done in {:.1}s: {} submitted, {} completed, {} promoted, {} pruned -> {}",
        started.elapsed().as_secs_f64(),
        totals.submitted,
        totals.completed,
        totals.promoted,
        totals.pruned,
        path.display()
    );
    Ok(())
}
