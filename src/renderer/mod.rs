//! Rendering module
//!
//! Composition happens on the CPU into a premultiplied ARGB8888 canvas which
//! the host then blits into its own 2D drawing context. This module also owns
//! the table that maps compositor pixel formats onto the formats a host
//! drawing surface understands.

pub mod software;

pub use software::{Canvas, PixelBuffer};

/// Pixel layouts the compositor can produce or receive from clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit, alpha in the high byte, premultiplied
    Argb8888,
    /// 32-bit, high byte ignored
    Xrgb8888,
    /// 32-bit, 10 bits per color channel
    Xrgb2101010,
    /// 8-bit alpha only
    A8,
    /// 1-bit alpha only
    A1,
    /// 16-bit RGB 5-6-5
    Rgb565,
    /// 32-bit float per channel, no alpha
    RgbFloat,
    /// 32-bit float per channel with alpha
    RgbaFloat,
    /// 32-bit, red in the low byte
    Abgr8888,
}

impl PixelFormat {
    /// Bits used by one pixel
    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Argb8888
            | PixelFormat::Xrgb8888
            | PixelFormat::Xrgb2101010
            | PixelFormat::Abgr8888 => 32,
            PixelFormat::A8 => 8,
            PixelFormat::A1 => 1,
            PixelFormat::Rgb565 => 16,
            PixelFormat::RgbFloat => 96,
            PixelFormat::RgbaFloat => 128,
        }
    }
}

/// Image formats accepted by the host drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFormat {
    Argb32,
    Rgb24,
    Rgb30,
    A8,
    A1,
    Rgb16_565,
    Rgb96F,
    Rgba128F,
}

/// Map a compositor pixel format onto the host's image format.
///
/// Formats without a host equivalent return `None`; the caller skips the
/// frame in that case.
pub fn host_format(format: PixelFormat) -> Option<HostFormat> {
    match format {
        PixelFormat::RgbaFloat => Some(HostFormat::Rgba128F),
        PixelFormat::RgbFloat => Some(HostFormat::Rgb96F),
        PixelFormat::Argb8888 => Some(HostFormat::Argb32),
        PixelFormat::Xrgb2101010 => Some(HostFormat::Rgb30),
        PixelFormat::Xrgb8888 => Some(HostFormat::Rgb24),
        PixelFormat::A8 => Some(HostFormat::A8),
        PixelFormat::A1 => Some(HostFormat::A1),
        PixelFormat::Rgb565 => Some(HostFormat::Rgb16_565),
        PixelFormat::Abgr8888 => None,
    }
}
