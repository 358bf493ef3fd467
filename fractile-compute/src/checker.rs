use crate::solver::{SampleWindow, Solver};
use fractile_core::IterGrid;

/// Deterministic checkerboard kernel. Cheap to evaluate, which makes it the
/// solver of choice for scheduler and lifecycle tests where Mandelbrot cost
/// would only add noise.
#[derive(Clone, Copy, Debug)]
pub struct CheckerSolver {
    max_iterations: u32,
    cell_size: f64,
}

impl CheckerSolver {
    pub fn new(max_iterations: u32, cell_size: f64) -> Self {
        Self {
            max_iterations,
            cell_size,
        }
    }
}

impl Solver for CheckerSolver {
    fn solve(&self, window: SampleWindow) -> IterGrid {
        let res = window.resolution;
        let mut values = Vec::with_capacity((res * res) as usize);
        for y in 0..res {
            for x in 0..res {
                let p = window.sample_at(x, y);
                let cx = (p.x / self.cell_size).floor() as i64;
                let cy = (p.y / self.cell_size).floor() as i64;
                let value = if (cx + cy) % 2 == 0 {
                    self.max_iterations
                } else {
                    0
                };
                values.push(value);
            }
        }
        IterGrid::new(res, self.max_iterations, values)
    }
}

/// Kernel that returns the same value everywhere. Produces uniform grids,
/// which exercises the trivial-tile path end to end.
#[derive(Clone, Copy, Debug)]
pub struct FlatSolver {
    max_iterations: u32,
    value: u32,
}

impl FlatSolver {
    pub fn new(max_iterations: u32, value: u32) -> Self {
        debug_assert!(value <= max_iterations);
        Self {
            max_iterations,
            value,
        }
    }
}

impl Solver for FlatSolver {
    fn solve(&self, window: SampleWindow) -> IterGrid {
        IterGrid::filled(window.resolution, self.max_iterations, self.value)
    }
}
