// Every variant states *where* things went wrong.
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("surface init error: {0}")]
    SurfaceInit(String), // Creating the window/surface failed
    #[error("surface present error: {0}")]
    SurfacePresent(String), // Pushing a frame to the surface failed
    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[from] io::Error),
    #[error("cannot allocate framebuffer of {pixels} pixels")]
    Allocation { pixels: usize }, // Overflow or allocator refusal; old storage kept
    #[error("invalid frame rate: {0} fps")]
    InvalidFrameRate(u32),
    #[error("retro context is closed")]
    Closed, // Shut down, or the window went away
    #[error("render thread panicked")]
    RenderThreadPanicked,
    #[error("config error: {0}")]
    Config(String),
    #[error("image export error: {0}")]
    Image(#[from] image::ImageError), // Writing a screenshot failed
}

pub type Result<T> = std::result::Result<T, Error>;
