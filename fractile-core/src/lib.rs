pub mod config;
pub mod geom;
pub mod grid;
pub mod viewport;

pub use config::EngineConfig;
pub use geom::{Point2, ScreenRect};
pub use grid::IterGrid;
pub use viewport::Viewport;
