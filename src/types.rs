// Core value types shared by the framebuffer, the viewport and the renderer.

/// Fixed truecolor layout: R, G, B, one byte each.
pub const BYTES_PER_PIXEL: usize = 3;

/// A sampled color with each channel normalized to [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    /// Normalize three raw bytes (divide by 255).
    pub fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Back to bytes, rounding to the nearest step.
    pub fn to_bytes(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    /// Packed 0x00RRGGBB, the layout minifb wants.
    pub fn to_u32(self) -> u32 {
        let [r, g, b] = self.to_bytes();
        ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }
}

/// Viewport geometry in framebuffer pixels. Origin may be negative; such
/// cells simply sample as black.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// State of the vsync bit. The discriminants match the classic
/// `get_vsync_signal()` return values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VsyncState {
    /// A render pass is reading the framebuffer.
    Painting = 0,
    /// Resting between frames.
    Idle = 1,
}

impl VsyncState {
    pub(crate) fn from_u8(v: u8) -> Self {
        if v == VsyncState::Painting as u8 {
            VsyncState::Painting
        } else {
            VsyncState::Idle
        }
    }
}
