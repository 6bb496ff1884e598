//! Client cursor tracking
//!
//! A client sets its cursor by handing over a surface; the image is only
//! known once that surface commits. The cache keeps at most one pending
//! cursor surface and one current image.

use crate::compositor::SurfaceId;
use crate::host::CursorImage;
use crate::renderer::{PixelBuffer, PixelFormat};

/// Cursor image cache
#[derive(Debug, Default)]
pub struct CursorCache {
    /// Surface whose next commit provides the cursor image
    pending: Option<SurfaceId>,
    /// Hotspot as requested by the client, adjusted by buffer offsets
    hotspot: (i32, i32),
    /// Image currently applied to the widget
    image: Option<CursorImage>,
}

impl CursorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new cursor surface, replacing any pending one
    pub fn set_pending(&mut self, surface: SurfaceId, hotspot: (i32, i32)) {
        self.pending = Some(surface);
        self.hotspot = hotspot;
    }

    /// Surface waiting for its commit
    pub fn pending(&self) -> Option<SurfaceId> {
        self.pending
    }

    /// Stop waiting for a cursor surface commit
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Shift the hotspot by a committed buffer offset
    pub fn apply_offset(&mut self, dx: i32, dy: i32) {
        self.hotspot.0 -= dx;
        self.hotspot.1 -= dy;
    }

    pub fn hotspot(&self) -> (i32, i32) {
        self.hotspot
    }

    /// Build a cursor image from a committed buffer.
    ///
    /// Only premultiplied ARGB8888 buffers can become cursors.
    pub fn build_image(&mut self, buffer: &PixelBuffer) -> Option<&CursorImage> {
        if buffer.format != PixelFormat::Argb8888 {
            return None;
        }
        self.image = Some(CursorImage {
            width: buffer.width,
            height: buffer.height,
            stride: buffer.stride,
            hotspot: self.hotspot,
            pixels: buffer.data.clone(),
        });
        self.image.as_ref()
    }

    /// Image currently applied
    pub fn image(&self) -> Option<&CursorImage> {
        self.image.as_ref()
    }

    /// Drop the image and any pending surface
    pub fn reset(&mut self) {
        self.image = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_image_uses_adjusted_hotspot() {
        let mut cache = CursorCache::new();
        cache.set_pending(SurfaceId(9), (4, 6));
        cache.apply_offset(1, 2);

        let buffer = PixelBuffer::filled(2, 2, PixelFormat::Argb8888, 0xff00_0000);
        let image = cache.build_image(&buffer).unwrap();
        assert_eq!(image.hotspot, (3, 4));
        assert_eq!(image.pixels.len(), 16);
    }

    #[test]
    fn test_xrgb_rejected() {
        let mut cache = CursorCache::new();
        let buffer = PixelBuffer::filled(2, 2, PixelFormat::Xrgb8888, 0);
        assert!(cache.build_image(&buffer).is_none());
        assert!(cache.image().is_none());
    }

    #[test]
    fn test_new_pending_replaces_old() {
        let mut cache = CursorCache::new();
        cache.set_pending(SurfaceId(1), (0, 0));
        cache.set_pending(SurfaceId(2), (1, 1));
        assert_eq!(cache.pending(), Some(SurfaceId(2)));
        cache.reset();
        assert_eq!(cache.pending(), None);
    }
}
