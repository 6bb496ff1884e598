//! Host toolkit contract
//!
//! The compositor never talks to a windowing toolkit directly. Everything it
//! needs from the widget embedding it goes through [`Host`]: scheduling
//! paints, toggling the continuous frame clock, grabbing input focus and
//! setting the widget cursor. Painting itself is done against a
//! [`DrawContext`] handed in by the toolkit's paint callback.

use std::fmt;

use crate::renderer::HostFormat;

/// Services the embedding widget provides to the compositor
pub trait Host {
    /// Ask the toolkit to repaint the widget soon
    fn queue_draw(&mut self);

    /// Start continuous frame-clock ticks
    fn begin_updating(&mut self);

    /// Stop continuous frame-clock ticks
    fn end_updating(&mut self);

    /// Move toolkit keyboard focus to the widget
    fn grab_focus(&mut self);

    /// Replace the widget cursor, `None` restoring the default one
    fn set_cursor(&mut self, cursor: Option<&CursorImage>);

    /// Keymap currently used by the host, if it can provide one
    fn keymap(&self) -> Option<HostKeymap> {
        None
    }
}

/// The 2D drawing surface of a paint callback
pub trait DrawContext {
    /// Draw an image at the widget origin, unscaled
    fn draw_image(&mut self, image: &HostImage<'_>);
}

/// A borrowed frame in a host image format
#[derive(Debug, Clone, Copy)]
pub struct HostImage<'a> {
    pub format: HostFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub data: &'a [u8],
}

/// A cursor copied out of a client cursor surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorImage {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    /// Hotspot in image coordinates
    pub hotspot: (i32, i32),
    /// Premultiplied ARGB8888, little endian
    pub pixels: Vec<u8>,
}

/// An xkb keymap supplied by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeymap {
    /// Keymap in xkb text v1 format
    pub keymap: String,
    /// Layout group currently active on the host
    pub active_layout: Option<u32>,
}

/// Handle on the host frame-clock "about to paint" connection.
///
/// Dropping the subscription disconnects it.
pub struct FrameClockSubscription {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl FrameClockSubscription {
    /// Wrap the toolkit specific disconnect action
    pub fn new(disconnect: impl FnOnce() + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    /// Disconnect from the frame clock now
    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for FrameClockSubscription {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl fmt::Debug for FrameClockSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClockSubscription")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}
