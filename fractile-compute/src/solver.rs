use fractile_core::{IterGrid, Point2};

/// Sample window for one tile: where sampling starts, how far apart samples
/// sit, and how many samples per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleWindow {
    /// Domain-space coordinate of sample (0, 0).
    pub origin: Point2,
    /// Domain-space distance between adjacent samples.
    pub spacing: f64,
    /// Samples per axis; the output grid is `resolution × resolution`.
    pub resolution: u32,
}

impl SampleWindow {
    pub fn new(origin: Point2, spacing: f64, resolution: u32) -> Self {
        Self {
            origin,
            spacing,
            resolution,
        }
    }

    /// Domain-space position of sample (x, y).
    pub fn sample_at(&self, x: u32, y: u32) -> Point2 {
        Point2::new(
            self.origin.x + x as f64 * self.spacing,
            self.origin.y + y as f64 * self.spacing,
        )
    }
}

/// A fractal kernel: turns a sample window into a grid of iteration counts.
///
/// Implementations must be pure (same window, same grid) and are shared
/// across worker threads, hence `Send + Sync`. Every output value lies in
/// `[0, max_iterations]`, with `max_iterations` meaning "did not escape".
pub trait Solver: Send + Sync {
    fn solve(&self, window: SampleWindow) -> IterGrid;
}
