// Resizable RGB pixel storage shared between the producer and the renderer.
//
// The bytes live behind a single mutex. Every access goes through a
// `FrameView` guard, so nobody can keep a pointer into the storage across
// a resize. The row width is separate metadata stored in an atomic: it is
// not validated against the pixel count, and a reader may see a new row
// width together with an old size (or the reverse) while both are changing.

use crate::error::{Error, Result};
use crate::types::{BYTES_PER_PIXEL, Rgb};
use log::{debug, warn};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct FrameBuffer {
    storage: Mutex<Vec<u8>>,
    row_width: AtomicUsize,
}

impl FrameBuffer {
    /// Empty buffer; nothing is allocated until the first [`set_size`](Self::set_size).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize the storage to exactly `pixels * 3` bytes.
    ///
    /// Blocks while a [`FrameView`] (including a render pass) is alive.
    /// Existing bytes are kept up to the new length and grown space is
    /// zeroed, but callers should not rely on either. On failure the old
    /// storage is left untouched.
    pub fn set_size(&self, pixels: usize) -> Result<()> {
        let bytes = pixels
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or(Error::Allocation { pixels })?;

        let mut storage = self.lock_storage();
        let len = storage.len();
        if bytes > len {
            storage
                .try_reserve_exact(bytes - len)
                .map_err(|_| Error::Allocation { pixels })?;
        }
        storage.resize(bytes, 0);
        if storage.capacity() > bytes {
            storage.shrink_to_fit();
        }
        debug!("framebuffer resized to {pixels} pixels ({bytes} bytes)");
        Ok(())
    }

    /// Pixels per row used when turning (x, y) into an offset.
    pub fn set_row_width(&self, pixels: usize) {
        self.row_width.store(pixels, Ordering::Release);
        debug!("framebuffer row width set to {pixels} pixels");
    }

    pub fn row_width(&self) -> usize {
        self.row_width.load(Ordering::Acquire)
    }

    /// Current size in pixels (takes the lock).
    pub fn pixel_count(&self) -> usize {
        self.lock_storage().len() / BYTES_PER_PIXEL
    }

    /// Scoped access to the pixel bytes. The lock is held until the view drops.
    pub fn lock(&self) -> FrameView<'_> {
        FrameView {
            bytes: self.lock_storage(),
            row_width: self.row_width(),
        }
    }

    /// Free the storage. Used at shutdown; the buffer stays usable afterwards.
    pub fn release(&self) {
        let mut storage = self.lock_storage();
        *storage = Vec::new();
    }

    fn lock_storage(&self) -> MutexGuard<'_, Vec<u8>> {
        // Bytes are always valid pixels, so a panic mid-write leaves nothing to repair.
        self.storage.lock().unwrap_or_else(|poisoned| {
            warn!("framebuffer lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

/// Locked view of the framebuffer. Derefs to the raw RGB bytes.
pub struct FrameView<'a> {
    bytes: MutexGuard<'a, Vec<u8>>,
    row_width: usize,
}

impl FrameView<'_> {
    pub fn pixel_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_PIXEL
    }

    /// Row width as it was when the view was taken.
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Raw bytes of pixel `index`, if it is inside the storage.
    pub fn pixel(&self, index: usize) -> Option<[u8; 3]> {
        let start = index.checked_mul(BYTES_PER_PIXEL)?;
        let end = start.checked_add(BYTES_PER_PIXEL)?;
        let p = self.bytes.get(start..end)?;
        Some([p[0], p[1], p[2]])
    }

    /// Write pixel `index`. Returns false (and writes nothing) when out of range.
    pub fn put_pixel(&mut self, index: usize, rgb: [u8; 3]) -> bool {
        let Some(start) = index.checked_mul(BYTES_PER_PIXEL) else {
            return false;
        };
        let Some(end) = start.checked_add(BYTES_PER_PIXEL) else {
            return false;
        };
        match self.bytes.get_mut(start..end) {
            Some(p) => {
                p.copy_from_slice(&rgb);
                true
            }
            None => false,
        }
    }

    /// Write the pixel at (x, y) using the row width.
    pub fn put_pixel_xy(&mut self, x: usize, y: usize, rgb: [u8; 3]) -> bool {
        match y.checked_mul(self.row_width).and_then(|o| o.checked_add(x)) {
            Some(index) => self.put_pixel(index, rgb),
            None => false,
        }
    }

    /// Paint every pixel the same color.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for p in self.bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
            p.copy_from_slice(&rgb);
        }
    }

    /// Normalized color at a pixel offset, black when the offset falls
    /// outside the storage (including negative offsets).
    pub fn sample(&self, offset_pixels: i64) -> Rgb {
        if offset_pixels < 0 {
            return Rgb::BLACK;
        }
        match self.pixel(offset_pixels as usize) {
            Some([r, g, b]) => Rgb::from_bytes(r, g, b),
            None => Rgb::BLACK,
        }
    }
}

impl Deref for FrameView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for FrameView<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn storage_is_lazy_and_sized_in_pixels() {
        let fb = FrameBuffer::new();
        assert_eq!(fb.pixel_count(), 0);
        assert!(fb.lock().is_empty());

        fb.set_size(100).unwrap();
        assert_eq!(fb.pixel_count(), 100);
        assert_eq!(fb.lock().len(), 300);

        fb.set_size(10).unwrap();
        assert_eq!(fb.lock().len(), 30);
    }

    #[test]
    fn overflowing_size_is_rejected_and_keeps_old_storage() {
        let fb = FrameBuffer::new();
        fb.set_size(4).unwrap();
        fb.lock().fill([9, 9, 9]);

        let err = fb.set_size(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::Allocation { pixels } if pixels == usize::MAX));
        assert_eq!(fb.pixel_count(), 4);
        assert_eq!(fb.lock().pixel(3), Some([9, 9, 9]));
    }

    #[test]
    fn put_pixel_respects_bounds() {
        let fb = FrameBuffer::new();
        fb.set_size(2).unwrap();
        let mut view = fb.lock();
        assert!(view.put_pixel(1, [1, 2, 3]));
        assert!(!view.put_pixel(2, [1, 2, 3]));
        assert!(!view.put_pixel(usize::MAX, [1, 2, 3]));
        assert_eq!(&view[3..6], &[1, 2, 3]);
    }

    #[test]
    fn indices_near_the_top_of_the_address_space_are_rejected() {
        let fb = FrameBuffer::new();
        fb.set_size(2).unwrap();
        let mut view = fb.lock();
        // index * 3 fits in usize but index * 3 + 3 does not
        let index = usize::MAX / BYTES_PER_PIXEL;
        assert!(!view.put_pixel(index, [1, 2, 3]));
        assert_eq!(view.pixel(index), None);
        assert_eq!(view.sample(i64::MAX), Rgb::BLACK);
    }

    #[test]
    fn growing_twice_keeps_exact_length() {
        let fb = FrameBuffer::new();
        fb.set_size(3).unwrap();
        fb.set_size(7).unwrap();
        assert_eq!(fb.lock().len(), 21);
        assert_eq!(fb.pixel_count(), 7);
    }

    #[test]
    fn put_pixel_xy_uses_row_width() {
        let fb = FrameBuffer::new();
        fb.set_size(20).unwrap();
        fb.set_row_width(5);
        let mut view = fb.lock();
        assert!(view.put_pixel_xy(2, 3, [7, 8, 9]));
        assert_eq!(view.pixel(17), Some([7, 8, 9]));
        assert!(!view.put_pixel_xy(0, 4, [1, 1, 1]));
    }

    #[test]
    fn sample_out_of_range_is_black() {
        let fb = FrameBuffer::new();
        fb.set_size(1).unwrap();
        let mut view = fb.lock();
        view.fill([255, 255, 255]);
        assert_eq!(view.sample(0), Rgb::from_bytes(255, 255, 255));
        assert_eq!(view.sample(1), Rgb::BLACK);
        assert_eq!(view.sample(-1), Rgb::BLACK);
    }

    #[test]
    fn resize_waits_for_an_open_view() {
        let fb = Arc::new(FrameBuffer::new());
        fb.set_size(8).unwrap();

        let view = fb.lock();
        let done = Arc::new(AtomicBool::new(false));

        let resizer = {
            let fb = fb.clone();
            let done = done.clone();
            thread::spawn(move || {
                fb.set_size(64).unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst), "resize ran while the view was held");
        assert_eq!(view.pixel_count(), 8);
        drop(view);

        resizer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(fb.pixel_count(), 64);
    }

    #[test]
    fn release_frees_storage() {
        let fb = FrameBuffer::new();
        fb.set_size(16).unwrap();
        fb.release();
        assert_eq!(fb.pixel_count(), 0);
    }
}
