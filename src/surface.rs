// Presentation surfaces: where sampled frames end up.
// • MinifbSurface: a real window, each viewport cell drawn as a square.
// • HeadlessSurface: remembers what it was asked to show (tests, no display).

use crate::error::{Error, Result};
use crate::render::SampledFrame;
use minifb::{Key, Window, WindowOptions};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the render loop needs from a window system.
pub trait Surface {
    /// False once the user closed it; the render loop then stops.
    fn is_open(&self) -> bool;

    /// Current drawable size in physical pixels.
    fn size(&self) -> (usize, usize);

    /// Resize the drawable area.
    fn resize(&mut self, width: usize, height: usize) -> Result<()>;

    /// Show a frame, each cell magnified to `cell_size` x `cell_size`.
    fn present(&mut self, frame: &SampledFrame, cell_size: usize) -> Result<()>;
}

pub struct MinifbSurface {
    title: String,
    window: Window,
    buffer: Vec<u32>, // 0x00RRGGBB, window-sized
}

impl MinifbSurface {
    /// Open a window. Must run on the thread that will present to it.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Self::open_window(title, width, height)?;
        Ok(Self {
            title: title.to_owned(),
            window,
            buffer: Vec::new(),
        })
    }

    fn open_window(title: &str, width: usize, height: usize) -> Result<Window> {
        let options = WindowOptions {
            resize: true,
            ..WindowOptions::default()
        };
        Window::new(title, width.max(1), height.max(1), options)
            .map_err(|e| Error::SurfaceInit(e.to_string()))
    }
}

impl Surface for MinifbSurface {
    fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    fn size(&self) -> (usize, usize) {
        self.window.get_size()
    }

    fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        // minifb cannot resize a window in place; open a new one at the new size.
        self.window = Self::open_window(&self.title, width, height)?;
        Ok(())
    }

    fn present(&mut self, frame: &SampledFrame, cell_size: usize) -> Result<()> {
        let (width, height) = self.window.get_size();
        let (width, height) = (width.max(1), height.max(1));
        rasterize(frame, cell_size, width, height, &mut self.buffer);
        self.window
            .update_with_buffer(&self.buffer, width, height)
            .map_err(|e| Error::SurfacePresent(e.to_string()))
    }
}

/// Paint `frame` into a `width` x `height` 0x00RRGGBB buffer, one
/// `cell_size` square per cell, clipping what does not fit.
pub fn rasterize(
    frame: &SampledFrame,
    cell_size: usize,
    width: usize,
    height: usize,
    out: &mut Vec<u32>,
) {
    out.clear();
    out.resize(width * height, 0);
    let cell = cell_size.max(1);

    for cy in 0..frame.height() {
        let y0 = cy * cell;
        if y0 >= height {
            break;
        }
        let y1 = (y0 + cell).min(height);
        for cx in 0..frame.width() {
            let x0 = cx * cell;
            if x0 >= width {
                break;
            }
            let x1 = (x0 + cell).min(width);
            let color = frame.get(cx, cy).map(|c| c.to_u32()).unwrap_or(0);
            for y in y0..y1 {
                out[y * width + x0..y * width + x1].fill(color);
            }
        }
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    width: usize,
    height: usize,
    closed: bool,
    resizes: usize,
    frames_presented: u64,
    last_cell_size: usize,
    last_frame: Option<SampledFrame>,
}

/// Shared view into a [`HeadlessSurface`], usable from any thread.
#[derive(Clone, Debug, Default)]
pub struct HeadlessProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl HeadlessProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn size(&self) -> (usize, usize) {
        let s = self.lock();
        (s.width, s.height)
    }

    pub fn resize_count(&self) -> usize {
        self.lock().resizes
    }

    pub fn frames_presented(&self) -> u64 {
        self.lock().frames_presented
    }

    pub fn last_cell_size(&self) -> usize {
        self.lock().last_cell_size
    }

    pub fn last_frame(&self) -> Option<SampledFrame> {
        self.lock().last_frame.clone()
    }

    /// Simulate the user closing the window.
    pub fn close(&self) {
        self.lock().closed = true;
    }
}

pub struct HeadlessSurface {
    probe: HeadlessProbe,
}

impl HeadlessSurface {
    pub fn new(width: usize, height: usize) -> Self {
        let probe = HeadlessProbe::default();
        {
            let mut s = probe.lock();
            s.width = width;
            s.height = height;
        }
        Self { probe }
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl Surface for HeadlessSurface {
    fn is_open(&self) -> bool {
        !self.probe.lock().closed
    }

    fn size(&self) -> (usize, usize) {
        self.probe.size()
    }

    fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        let mut s = self.probe.lock();
        s.width = width;
        s.height = height;
        s.resizes += 1;
        Ok(())
    }

    fn present(&mut self, frame: &SampledFrame, cell_size: usize) -> Result<()> {
        let mut s = self.probe.lock();
        if s.closed {
            return Err(Error::SurfacePresent("surface closed".into()));
        }
        s.frames_presented += 1;
        s.last_cell_size = cell_size;
        s.last_frame = Some(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rgb;

    fn two_by_one() -> SampledFrame {
        SampledFrame::from_cells(
            2,
            1,
            vec![Rgb::from_bytes(255, 0, 0), Rgb::from_bytes(0, 0, 255)],
        )
    }

    #[test]
    fn rasterize_magnifies_cells() {
        let mut out = Vec::new();
        rasterize(&two_by_one(), 2, 4, 2, &mut out);
        assert_eq!(
            out,
            vec![
                0xFF0000, 0xFF0000, 0x0000FF, 0x0000FF, //
                0xFF0000, 0xFF0000, 0x0000FF, 0x0000FF,
            ]
        );
    }

    #[test]
    fn rasterize_clips_and_pads_with_black() {
        let mut out = Vec::new();
        rasterize(&two_by_one(), 2, 3, 3, &mut out);
        assert_eq!(
            out,
            vec![
                0xFF0000, 0xFF0000, 0x0000FF, //
                0xFF0000, 0xFF0000, 0x0000FF, //
                0, 0, 0,
            ]
        );
    }

    #[test]
    fn headless_records_presents_and_resizes() {
        let mut surface = HeadlessSurface::new(200, 200);
        let probe = surface.probe();

        surface.resize(640, 400).unwrap();
        surface.present(&two_by_one(), 3).unwrap();

        assert_eq!(probe.size(), (640, 400));
        assert_eq!(probe.resize_count(), 1);
        assert_eq!(probe.frames_presented(), 1);
        assert_eq!(probe.last_cell_size(), 3);
        assert_eq!(probe.last_frame(), Some(two_by_one()));

        probe.close();
        assert!(!surface.is_open());
        assert!(surface.present(&two_by_one(), 1).is_err());
    }
}
