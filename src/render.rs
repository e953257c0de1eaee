// Render side: samples the viewport out of the framebuffer on a fixed tick
// and hands the result to a `Surface`.
//
// One pass looks like this:
// 1. vsync bit goes to `Painting`
// 2. framebuffer lock taken (a resize cannot overlap the pass)
// 3. every viewport cell is copied out; cells whose offset lands outside
//    the storage come out black
// 4. lock released, vsync bit back to `Idle`
// 5. the copy is presented
//
// When the viewport size changed since the last tick, the surface is first
// resized to the viewport times the display scale.

use crate::error::Result;
use crate::framebuffer::FrameView;
use crate::retro::Shared;
use crate::surface::Surface;
use crate::types::{Rgb, ViewportRect};
use crossbeam::channel::{Receiver, select, tick};
use log::{debug, info, trace, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Viewport contents copied out of the framebuffer by one pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampledFrame {
    width: usize,
    height: usize,
    cells: Vec<Rgb>, // row-major, width * height
}

impl SampledFrame {
    pub fn from_cells(width: usize, height: usize, cells: Vec<Rgb>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self { width, height, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }

    pub fn cells(&self) -> &[Rgb] {
        &self.cells
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let c = self.get(x as usize, y as usize).unwrap_or(Rgb::BLACK);
            image::Rgb(c.to_bytes())
        })
    }

    /// Write the frame as a PNG (one image pixel per cell).
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgb_image()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Largest viewport (in cells) a pass will copy out: 4096 x 4096.
pub const MAX_VIEWPORT_CELLS: usize = 4096 * 4096;

/// Copy the cells of `rect` out of a locked framebuffer.
///
/// Cell (vx, vy) reads pixel `(vy + y) * row_width + (vx + x)`. A viewport
/// larger than [`MAX_VIEWPORT_CELLS`], or one whose copy cannot be
/// allocated, yields an empty frame.
pub fn sample_viewport(view: &FrameView<'_>, rect: ViewportRect) -> SampledFrame {
    let (width, height) = (rect.width as usize, rect.height as usize);
    let count = match width.checked_mul(height) {
        Some(n) if n <= MAX_VIEWPORT_CELLS => n,
        _ => {
            warn!("viewport {width}x{height} is too large to sample; showing nothing");
            return SampledFrame::default();
        }
    };
    let mut cells = Vec::new();
    if cells.try_reserve_exact(count).is_err() {
        warn!("cannot allocate {count} cells for a {width}x{height} viewport");
        return SampledFrame::default();
    }

    let row_width = i64::try_from(view.row_width()).unwrap_or(i64::MAX);

    for vy in 0..rect.height as i64 {
        let row = (vy + rect.y as i64).saturating_mul(row_width);
        for vx in 0..rect.width as i64 {
            cells.push(view.sample(row.saturating_add(vx + rect.x as i64)));
        }
    }

    SampledFrame { width, height, cells }
}

/// Whole-number magnification that fits the viewport into the surface,
/// never less than 1.
pub fn display_scale(surface: (usize, usize), rect: ViewportRect) -> usize {
    if rect.width == 0 || rect.height == 0 {
        return 1;
    }
    let sx = surface.0 / rect.width as usize;
    let sy = surface.1 / rect.height as usize;
    sx.min(sy).max(1)
}

pub(crate) fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

#[derive(Debug)]
pub(crate) enum RenderCommand {
    SetFrameRate(u32),
    Shutdown,
}

pub(crate) struct Renderer<S: Surface> {
    shared: Arc<Shared>,
    surface: S,
}

impl<S: Surface> Renderer<S> {
    pub(crate) fn new(shared: Arc<Shared>, surface: S) -> Self {
        Self { shared, surface }
    }

    /// One timer tick: resize the surface if needed, then run a pass.
    pub(crate) fn tick(&mut self) -> Result<()> {
        if self.shared.viewport.take_resize_pending() {
            let rect = self.shared.viewport.snapshot();
            let scale = display_scale(self.surface.size(), rect);
            let w = (rect.width as usize).saturating_mul(scale);
            let h = (rect.height as usize).saturating_mul(scale);
            debug!("resizing surface to {w}x{h} (scale {scale})");
            self.surface.resize(w, h)?;
        }

        let (frame, rect) = self.sample_pass();
        let cell_size = display_scale(self.surface.size(), rect);
        self.surface.present(&frame, cell_size)
    }

    fn sample_pass(&self) -> (SampledFrame, ViewportRect) {
        let pass = self.shared.vsync.begin_pass();
        let view = self.shared.framebuffer.lock();
        let rect = self.shared.viewport.snapshot();
        let frame = sample_viewport(&view, rect);
        drop(view);
        drop(pass);
        trace!("sampled {}x{} viewport", rect.width, rect.height);
        (frame, rect)
    }
}

/// Body of the render thread. Returns when told to stop, when every command
/// sender is gone, or when the surface closes. Marking the context stopped is
/// left to the caller, so it also happens when this unwinds.
pub(crate) fn run_render_loop<S: Surface>(
    mut renderer: Renderer<S>,
    frame_rate: u32,
    commands: Receiver<RenderCommand>,
) {
    let mut ticker = tick(frame_interval(frame_rate));
    info!("render loop started at {frame_rate} fps");

    loop {
        let mut new_rate = None;
        select! {
            recv(ticker) -> _ => {
                if !renderer.surface.is_open() {
                    info!("surface closed; stopping render loop");
                    break;
                }
                if let Err(e) = renderer.tick() {
                    warn!("render pass failed: {e}");
                }
            }
            recv(commands) -> cmd => match cmd {
                Ok(RenderCommand::SetFrameRate(fps)) => new_rate = Some(fps),
                Ok(RenderCommand::Shutdown) | Err(_) => break,
            },
        }
        if let Some(fps) = new_rate {
            debug!("render loop now ticking at {fps} fps");
            ticker = tick(frame_interval(fps));
        }
    }

    info!("render loop stopped");
}
