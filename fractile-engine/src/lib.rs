pub mod arena;
pub mod engine;
pub mod error;
pub mod pool;
pub mod queue;
pub mod surface;
pub mod tile;
pub mod tree;

pub use arena::{Arena, NodeId};
pub use engine::{Engine, TickStats};
pub use error::SurfaceError;
pub use pool::{CompletedTile, RenderPool};
pub use queue::{JobQueue, RenderRequest};
pub use surface::{ember, grayscale, ColorMap, Rgba, SoftSurface, SoftTexture, Surface, UvRect};
pub use tile::{Tile, TileResource, TileState, TileStatus};
pub use tree::{QuadNode, TileTree};
