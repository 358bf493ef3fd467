use serde::{Deserialize, Serialize};

/// Square grid of per-sample iteration counts produced by a solver.
///
/// Values are row-major and bounded by `max_iterations`; a value equal to
/// `max_iterations` means the sample never escaped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterGrid {
    resolution: u32,
    max_iterations: u32,
    values: Vec<u32>,
}

impl IterGrid {
    /// Wrap a row-major value buffer. The buffer length must be
    /// `resolution * resolution`.
    pub fn new(resolution: u32, max_iterations: u32, values: Vec<u32>) -> Self {
        debug_assert_eq!(
            values.len(),
            (resolution * resolution) as usize,
            "iteration buffer does not match resolution"
        );
        Self {
            resolution,
            max_iterations,
            values,
        }
    }

    /// Grid with every sample set to the same value.
    pub fn filled(resolution: u32, max_iterations: u32, value: u32) -> Self {
        Self {
            resolution,
            max_iterations,
            values: vec![value; (resolution * resolution) as usize],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Iteration count at sample (x, y).
    pub fn value_at(&self, x: u32, y: u32) -> u32 {
        self.values[(x + y * self.resolution) as usize]
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// If every sample holds the same count, return it.
    ///
    /// Uniform grids need no texture; they draw as a flat rectangle.
    pub fn uniform_value(&self) -> Option<u32> {
        let first = *self.values.first()?;
        self.values
            .iter()
            .all(|&v| v == first)
            .then_some(first)
    }
}
