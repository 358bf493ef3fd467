pub mod checker;
pub mod mandelbrot;
pub mod solver;

pub use checker::{CheckerSolver, FlatSolver};
pub use mandelbrot::MandelbrotSolver;
pub use solver::{SampleWindow, Solver};
