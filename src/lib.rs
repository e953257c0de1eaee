// Retro-style video output.
//
// A producer thread writes raw RGB pixels into a shared framebuffer at its
// own pace. A render thread samples a rectangular viewport of that buffer on
// a fixed tick and presents it, raising a vsync bit the producer can pace
// itself against.
//
// Typical producer: `Retro::init_window`, size the framebuffer and viewport,
// then loop { write through `framebuffer()`, `wait_for_vsync()` } until
// `is_running()` goes false, and finish with `shutdown()`.

pub mod config;
pub mod error;
pub mod framebuffer;
pub mod render;
pub mod retro;
pub mod surface;
pub mod types;
pub mod viewport;
pub mod vsync;

pub use config::RetroConfig;
pub use error::{Error, Result};
pub use framebuffer::{FrameBuffer, FrameView};
pub use render::{SampledFrame, display_scale, sample_viewport};
pub use retro::{Retro, RetroHandle};
pub use surface::{HeadlessProbe, HeadlessSurface, MinifbSurface, Surface};
pub use types::{BYTES_PER_PIXEL, Rgb, ViewportRect, VsyncState};
pub use viewport::Viewport;
pub use vsync::{PacingMode, VsyncSignal};
