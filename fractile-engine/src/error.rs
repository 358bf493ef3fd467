use thiserror::Error;

/// Errors a drawing surface can raise when creating or updating textures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("pixel buffer is {len} bytes, expected {width}x{height}x4")]
    BufferSize { width: u32, height: u32, len: usize },

    #[error("texture budget exhausted ({0} textures live)")]
    TextureLimit(usize),

    #[error("surface backend error: {0}")]
    Backend(String),
}
