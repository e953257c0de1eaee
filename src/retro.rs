// The `Retro` context: owns the shared framebuffer state and the render thread.
//
// The caller's thread is the producer. It sizes the framebuffer, writes
// pixels through `RetroHandle::framebuffer` and paces itself with
// `RetroHandle::wait_for_vsync`. The render thread owns the surface and
// samples the viewport on every tick.

use crate::config::RetroConfig;
use crate::error::{Error, Result};
use crate::framebuffer::{FrameBuffer, FrameView};
use crate::render::{RenderCommand, Renderer, SampledFrame, run_render_loop, sample_viewport};
use crate::surface::{HeadlessProbe, HeadlessSurface, MinifbSurface, Surface};
use crate::types::VsyncState;
use crate::viewport::Viewport;
use crate::vsync::{PacingMode, VsyncSignal};
use crossbeam::channel::{self, Sender};
use log::{debug, error, info, warn};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};

/// Everything both threads touch.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) framebuffer: FrameBuffer,
    pub(crate) viewport: Viewport,
    pub(crate) vsync: VsyncSignal,
    pub(crate) running: AtomicBool,
    pub(crate) frame_rate: AtomicU32,
}

impl Shared {
    pub(crate) fn new(frame_rate: u32) -> Self {
        Self {
            framebuffer: FrameBuffer::new(),
            viewport: Viewport::new(),
            vsync: VsyncSignal::new(),
            running: AtomicBool::new(true),
            frame_rate: AtomicU32::new(frame_rate),
        }
    }
}

/// Marks the context stopped when the render thread exits, including by
/// panic, so producers blocked in `wait_for_vsync` get `Error::Closed`.
struct CloseOnExit(Arc<Shared>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("render thread panicked; closing the context");
        }
        self.0.running.store(false, Ordering::Release);
        self.0.vsync.close();
    }
}

/// Cloneable producer-side access to a running context.
#[derive(Clone, Debug)]
pub struct RetroHandle {
    shared: Arc<Shared>,
    pacing: PacingMode,
    commands: Sender<RenderCommand>,
}

impl RetroHandle {
    /// Locked access to the pixel bytes. Hold it only while writing: the
    /// render thread cannot sample, and nobody can resize, until it drops.
    pub fn framebuffer(&self) -> FrameView<'_> {
        self.shared.framebuffer.lock()
    }

    /// Framebuffer size in pixels (3 bytes each).
    pub fn set_framebuffer_size(&self, pixels: usize) -> Result<()> {
        self.shared.framebuffer.set_size(pixels)
    }

    pub fn framebuffer_size(&self) -> usize {
        self.shared.framebuffer.pixel_count()
    }

    /// Pixels per framebuffer row. Not checked against the size.
    pub fn set_framebuffer_row_width(&self, pixels: usize) {
        self.shared.framebuffer.set_row_width(pixels);
    }

    pub fn set_viewport_position(&self, x: i32, y: i32) {
        self.shared.viewport.set_position(x, y);
    }

    /// Visible resolution; the surface is resized on the next tick.
    pub fn set_viewport_size(&self, width: u32, height: u32) {
        self.shared.viewport.set_size(width, height);
    }

    pub fn vsync_signal(&self) -> VsyncState {
        self.shared.vsync.get()
    }

    /// Render passes completed so far.
    pub fn frames_rendered(&self) -> u64 {
        self.shared.vsync.passes_completed()
    }

    /// Wait for the next render pass boundary using the configured pacing.
    /// Fails with [`Error::Closed`] once the context is shutting down.
    pub fn wait_for_vsync(&self) -> Result<()> {
        self.shared.vsync.wait_for_vsync(self.pacing)
    }

    pub fn pacing(&self) -> PacingMode {
        self.pacing
    }

    pub fn set_target_frame_rate(&self, fps: u32) -> Result<()> {
        if fps == 0 {
            return Err(Error::InvalidFrameRate(fps));
        }
        self.commands
            .send(RenderCommand::SetFrameRate(fps))
            .map_err(|_| Error::Closed)?;
        self.shared.frame_rate.store(fps, Ordering::Release);
        debug!("target frame rate set to {fps} fps");
        Ok(())
    }

    pub fn frame_rate(&self) -> u32 {
        self.shared.frame_rate.load(Ordering::Acquire)
    }

    /// False after shutdown or once the surface was closed.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire) && !self.shared.vsync.is_closed()
    }

    /// Sample the viewport on this thread, the same way a render pass does,
    /// without touching the vsync bit.
    pub fn capture(&self) -> SampledFrame {
        let view = self.shared.framebuffer.lock();
        sample_viewport(&view, self.shared.viewport.snapshot())
    }
}

/// A running context. Dropping it shuts the render thread down.
#[derive(Debug)]
pub struct Retro {
    handle: RetroHandle,
    render_thread: Option<JoinHandle<()>>,
}

impl Retro {
    /// Start the render thread with a surface built on that thread.
    ///
    /// Returns once the surface is up. If it cannot be created, or the
    /// thread cannot be spawned, nothing keeps running and the error is
    /// returned.
    pub fn init<S, F>(config: RetroConfig, make_surface: F) -> Result<Self>
    where
        S: Surface + 'static,
        F: FnOnce(&RetroConfig) -> Result<S> + Send + 'static,
    {
        config.validate()?;

        let shared = Arc::new(Shared::new(config.frame_rate));
        let (commands, command_rx) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded::<Result<()>>(1);

        let thread_shared = shared.clone();
        let thread_config = config.clone();
        let render_thread = thread::Builder::new()
            .name("retro-render".into())
            .spawn(move || {
                let _close = CloseOnExit(thread_shared.clone());
                let surface = match make_surface(&thread_config) {
                    Ok(surface) => {
                        let _ = ready_tx.send(Ok(()));
                        surface
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let renderer = Renderer::new(thread_shared, surface);
                run_render_loop(renderer, thread_config.frame_rate, command_rx);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = render_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = render_thread.join();
                return Err(Error::RenderThreadPanicked);
            }
        }

        info!(
            "retro started: \"{}\" at {} fps, {:?} pacing",
            config.title, config.frame_rate, config.pacing
        );
        Ok(Self {
            handle: RetroHandle {
                shared,
                pacing: config.pacing,
                commands,
            },
            render_thread: Some(render_thread),
        })
    }

    /// Start with a minifb window.
    pub fn init_window(config: RetroConfig) -> Result<Self> {
        Self::init(config, |c| {
            MinifbSurface::new(&c.title, c.surface_width, c.surface_height)
        })
    }

    /// Start with an in-memory surface; the probe shows what was presented.
    pub fn init_headless(config: RetroConfig) -> Result<(Self, HeadlessProbe)> {
        let surface = HeadlessSurface::new(config.surface_width, config.surface_height);
        let probe = surface.probe();
        let retro = Self::init(config, move |_| Ok(surface))?;
        Ok((retro, probe))
    }

    pub fn handle(&self) -> RetroHandle {
        self.handle.clone()
    }

    /// Stop the render thread, wake any waiting producer and free the
    /// framebuffer storage.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(render_thread) = self.render_thread.take() else {
            return Ok(());
        };

        let shared = &self.handle.shared;
        shared.running.store(false, Ordering::Release);
        shared.vsync.close();
        let _ = self.handle.commands.send(RenderCommand::Shutdown);

        let joined = render_thread.join();
        shared.framebuffer.release();
        joined.map_err(|_| Error::RenderThreadPanicked)?;
        info!("retro shut down");
        Ok(())
    }
}

impl Deref for Retro {
    type Target = RetroHandle;

    fn deref(&self) -> &RetroHandle {
        &self.handle
    }
}

impl Drop for Retro {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("shutdown on drop failed: {e}");
        }
    }
}
