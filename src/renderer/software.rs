//! CPU composition
//!
//! Client buffers are copied out of shared memory into [`PixelBuffer`]s and
//! blended onto a [`Canvas`] back to front.

use super::PixelFormat;
use crate::compositor::Rect;

/// A CPU copy of a client buffer
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap already laid out pixel data
    pub fn new(width: u32, height: u32, stride: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            data,
        }
    }

    /// A buffer filled with a single 32-bit pixel value
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: u32) -> Self {
        let stride = width * 4;
        let data = pixel
            .to_le_bytes()
            .iter()
            .copied()
            .cycle()
            .take((stride * height) as usize)
            .collect();
        Self::new(width, height, stride, format, data)
    }

    /// Read a 32-bit pixel, `None` outside the buffer or for narrow formats
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height || self.format.bits_per_pixel() != 32 {
            return None;
        }
        let offset = (y * self.stride + x * 4) as usize;
        let bytes = self.data.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Premultiplied ARGB8888 render target
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    /// Create a cleared canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.width * 4
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Argb8888
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Resize, discarding content when the size changes
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            *self = Canvas::new(width, height);
        }
    }

    /// Fill with transparent black
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Read back one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let bytes = &self.data[offset..offset + 4];
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Blend a solid color (straight alpha, components in `[0, 1]`) over a rectangle
    pub fn fill_rect(&mut self, rect: Rect, color: [f32; 4]) {
        let Some(area) = rect.intersection(&self.bounds()) else {
            return;
        };
        let src = premultiply(color);
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.blend(x as u32, y as u32, src);
            }
        }
    }

    /// Blend a client buffer with its top-left corner at (x, y)
    pub fn blit(&mut self, x: i32, y: i32, buffer: &PixelBuffer) {
        let opaque = match buffer.format {
            PixelFormat::Argb8888 => false,
            PixelFormat::Xrgb8888 => true,
            _ => return,
        };
        let target = Rect::new(x, y, buffer.width as i32, buffer.height as i32);
        let Some(area) = target.intersection(&self.bounds()) else {
            return;
        };
        for dy in area.y..area.bottom() {
            for dx in area.x..area.right() {
                let Some(mut src) = buffer.pixel((dx - x) as u32, (dy - y) as u32) else {
                    continue;
                };
                if opaque {
                    src |= 0xff00_0000;
                }
                self.blend(dx as u32, dy as u32, src);
            }
        }
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn blend(&mut self, x: u32, y: u32, src: u32) {
        let offset = ((y * self.width + x) * 4) as usize;
        let src_alpha = src >> 24;
        if src_alpha == 0xff {
            self.data[offset..offset + 4].copy_from_slice(&src.to_le_bytes());
            return;
        }
        let dst = u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]);
        let inv = 255 - src_alpha;
        let mut out = 0u32;
        for shift in [0, 8, 16, 24] {
            let s = (src >> shift) & 0xff;
            let d = (dst >> shift) & 0xff;
            let c = (s + (d * inv + 127) / 255).min(255);
            out |= c << shift;
        }
        self.data[offset..offset + 4].copy_from_slice(&out.to_le_bytes());
    }
}

fn premultiply(color: [f32; 4]) -> u32 {
    let [r, g, b, a] = color.map(|c| c.clamp(0.0, 1.0));
    let channel = |c: f32| (c * a * 255.0).round() as u32;
    let alpha = (a * 255.0).round() as u32;
    (alpha << 24) | (channel(r) << 16) | (channel(g) << 8) | channel(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_clips_to_canvas() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(Rect::new(2, 2, 10, 10), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(canvas.pixel(3, 3), Some(0xffff_ffff));
        assert_eq!(canvas.pixel(1, 1), Some(0));
    }

    #[test]
    fn test_blit_opaque_replaces() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(Rect::new(0, 0, 4, 4), [1.0, 1.0, 1.0, 1.0]);
        let buffer = PixelBuffer::filled(2, 2, PixelFormat::Argb8888, 0xff00_00ff);
        canvas.blit(1, 1, &buffer);
        assert_eq!(canvas.pixel(1, 1), Some(0xff00_00ff));
        assert_eq!(canvas.pixel(0, 0), Some(0xffff_ffff));
    }

    #[test]
    fn test_blit_xrgb_forces_alpha() {
        let mut canvas = Canvas::new(2, 2);
        let buffer = PixelBuffer::filled(2, 2, PixelFormat::Xrgb8888, 0x0012_3456);
        canvas.blit(0, 0, &buffer);
        assert_eq!(canvas.pixel(0, 0), Some(0xff12_3456));
    }

    #[test]
    fn test_blit_translucent_blends() {
        let mut canvas = Canvas::new(1, 1);
        canvas.fill_rect(Rect::new(0, 0, 1, 1), [1.0, 1.0, 1.0, 1.0]);
        // Fully transparent premultiplied pixel leaves the destination alone
        canvas.blit(0, 0, &PixelBuffer::filled(1, 1, PixelFormat::Argb8888, 0));
        assert_eq!(canvas.pixel(0, 0), Some(0xffff_ffff));
    }

    #[test]
    fn test_blit_negative_offset() {
        let mut canvas = Canvas::new(2, 2);
        let buffer = PixelBuffer::filled(2, 2, PixelFormat::Argb8888, 0xff11_2233);
        canvas.blit(-1, -1, &buffer);
        assert_eq!(canvas.pixel(0, 0), Some(0xff11_2233));
        assert_eq!(canvas.pixel(1, 1), Some(0));
    }

    #[test]
    fn test_premultiply() {
        assert_eq!(premultiply([1.0, 0.0, 0.0, 0.5]), 0x8080_0000);
    }
}
