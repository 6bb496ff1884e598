//! Backend module
//!
//! The compositor has no display hardware. A virtual backend owns a single
//! virtual output whose frames are driven by the host widget's frame clock.
//!
//! - `Backend` / `Output` capability traits
//! - The virtual backend and output
//! - A calloop event loop wrapper for hosts driving the compositor

pub mod event_loop;
pub mod virtual_output;

use bitflags::bitflags;

pub use event_loop::EventLoop;
pub use virtual_output::{VirtualBackend, VirtualOutput};

bitflags! {
    /// Buffer kinds a backend can consume
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferCaps: u32 {
        const DATA_PTR = 1 << 0;
        const DMABUF = 1 << 1;
        const SHM = 1 << 2;
    }
}

/// Output mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputMode {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Refresh rate in mHz, 0 when unknown
    pub refresh: i32,
}

/// An atomic output configuration change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputState {
    pub enabled: Option<bool>,
    pub mode: Option<OutputMode>,
}

impl OutputState {
    /// Enable the output with a custom mode
    pub fn enabled_with_mode(width: i32, height: i32) -> Self {
        Self {
            enabled: Some(true),
            mode: Some(OutputMode {
                width,
                height,
                refresh: 0,
            }),
        }
    }
}

/// A source of outputs
pub trait Backend {
    /// Start the backend; returns false on failure
    fn start(&mut self) -> bool;

    /// Release the outputs and the backend
    fn destroy(&mut self);

    /// Buffer kinds the backend accepts
    fn buffer_caps(&self) -> BufferCaps;
}

/// A display the scene is composed for
pub trait Output {
    /// Apply a configuration change; returns false if it was rejected
    fn commit(&mut self, state: &OutputState) -> bool;

    /// Tear the output down
    fn destroy(&mut self);
}
