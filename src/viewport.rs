// Viewport rectangle shared between the producer and the render thread.
//
// The four fields are published with a generation counter: a writer marks
// the generation busy, stores the fields, then bumps the generation. Readers
// retry until they see the same idle generation before and after reading,
// so a snapshot never mixes an old origin with a new size.

use crate::types::ViewportRect;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

/// High bit of `generation` marks an update in progress.
const GENERATION_BUSY_BIT: u32 = 1 << 31;

#[derive(Debug, Default)]
pub struct Viewport {
    generation: AtomicU32,
    x: AtomicI32,
    y: AtomicI32,
    width: AtomicU32,
    height: AtomicU32,
    /// Raised by `set_size`, consumed once by whoever sizes the surface.
    resize_pending: AtomicBool,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the viewport origin. Takes effect on the next render pass.
    pub fn set_position(&self, x: i32, y: i32) {
        self.update(|rect| {
            rect.x = x;
            rect.y = y;
        });
        debug!("viewport moved to ({x}, {y})");
    }

    /// Change the viewport size and flag the surface for resizing.
    pub fn set_size(&self, width: u32, height: u32) {
        self.update(|rect| {
            rect.width = width;
            rect.height = height;
        });
        self.resize_pending.store(true, Ordering::Release);
        debug!("viewport resized to {width}x{height}");
    }

    /// Coherent copy of the current rectangle.
    pub fn snapshot(&self) -> ViewportRect {
        loop {
            let before = self.generation.load(Ordering::SeqCst);
            if before & GENERATION_BUSY_BIT != 0 {
                std::hint::spin_loop();
                continue;
            }

            let rect = self.load_fields();

            if self.generation.load(Ordering::SeqCst) == before {
                return rect;
            }
        }
    }

    /// Generation of the last completed update.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::SeqCst) & !GENERATION_BUSY_BIT
    }

    /// Returns true exactly once per batch of `set_size` calls.
    pub fn take_resize_pending(&self) -> bool {
        self.resize_pending.swap(false, Ordering::AcqRel)
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending.load(Ordering::Acquire)
    }

    fn update(&self, apply: impl FnOnce(&mut ViewportRect)) {
        // Claim the busy bit; other writers spin until it clears.
        let mut start = self.generation.load(Ordering::SeqCst);
        loop {
            if start & GENERATION_BUSY_BIT != 0 {
                std::hint::spin_loop();
                start = self.generation.load(Ordering::SeqCst);
                continue;
            }
            match self.generation.compare_exchange_weak(
                start,
                start | GENERATION_BUSY_BIT,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => start = actual,
            }
        }

        let mut rect = self.load_fields();
        apply(&mut rect);
        self.x.store(rect.x, Ordering::SeqCst);
        self.y.store(rect.y, Ordering::SeqCst);
        self.width.store(rect.width, Ordering::SeqCst);
        self.height.store(rect.height, Ordering::SeqCst);

        let next = start.wrapping_add(1) & !GENERATION_BUSY_BIT;
        self.generation.store(next, Ordering::SeqCst);
    }

    fn load_fields(&self) -> ViewportRect {
        ViewportRect {
            x: self.x.load(Ordering::SeqCst),
            y: self.y.load(Ordering::SeqCst),
            width: self.width.load(Ordering::SeqCst),
            height: self.height.load(Ordering::SeqCst),
        }
    }
}
