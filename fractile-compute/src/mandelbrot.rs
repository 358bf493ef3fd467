use crate::solver::{SampleWindow, Solver};
use fractile_core::IterGrid;

/// Classic escape-time Mandelbrot kernel.
#[derive(Clone, Copy, Debug)]
pub struct MandelbrotSolver {
    max_iterations: u32,
    threshold_sq: f64,
}

impl MandelbrotSolver {
    pub fn new(max_iterations: u32, escape_radius: f64) -> Self {
        Self {
            max_iterations,
            threshold_sq: escape_radius * escape_radius,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Escape count for c = (cx, cy), or `max_iterations` for interior points.
    fn compute_point(&self, cx: f64, cy: f64) -> u32 {
        let mut zx = 0.0_f64;
        let mut zy = 0.0_f64;
        let mut i = 0;
        while i < self.max_iterations {
            let zx2 = zx * zx;
            let zy2 = zy * zy;
            if zx2 + zy2 > self.threshold_sq {
                return i;
            }
            zy = 2.0 * zx * zy + cy;
            zx = zx2 - zy2 + cx;
            i += 1;
        }
        self.max_iterations
    }
}

impl Default for MandelbrotSolver {
    fn default() -> Self {
        Self::new(2048, 2.0)
    }
}

impl Solver for MandelbrotSolver {
    fn solve(&self, window: SampleWindow) -> IterGrid {
        let res = window.resolution;
        let mut values = Vec::with_capacity((res * res) as usize);
        for y in 0..res {
            for x in 0..res {
                let c = window.sample_at(x, y);
                values.push(self.compute_point(c.x, c.y));
            }
        }
        IterGrid::new(res, self.max_iterations, values)
    }
}
