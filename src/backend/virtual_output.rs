//! Virtual backend and output
//!
//! Nothing is probed and nothing is programmed: starting the backend only
//! flips a flag and output commits always succeed. The output tracks its
//! mode and whether a frame was requested, and holds the host frame-clock
//! subscription so destroying the output disconnects it.

use log::{debug, info};

use super::{Backend, BufferCaps, Output, OutputMode, OutputState};
use crate::host::FrameClockSubscription;

/// Output name advertised to clients
pub const OUTPUT_NAME: &str = "CasildaCompositor";
/// Output description advertised to clients
pub const OUTPUT_DESCRIPTION: &str = "CasildaCompositor output";

/// The single output of the virtual backend
#[derive(Debug)]
pub struct VirtualOutput {
    pub name: String,
    pub description: String,
    enabled: bool,
    mode: OutputMode,
    /// A client asked for a frame without posting damage
    needs_frame: bool,
    /// A frame event is queued for the next idle dispatch
    frame_pending: bool,
    frame_clock: Option<FrameClockSubscription>,
}

impl VirtualOutput {
    /// Create a disabled output without a mode
    pub fn new() -> Self {
        Self {
            name: OUTPUT_NAME.to_string(),
            description: OUTPUT_DESCRIPTION.to_string(),
            enabled: false,
            mode: OutputMode::default(),
            needs_frame: false,
            frame_pending: false,
            frame_clock: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Request a frame even without damage
    pub fn set_needs_frame(&mut self) {
        self.needs_frame = true;
        self.schedule_frame();
    }

    pub fn needs_frame(&self) -> bool {
        self.needs_frame
    }

    /// A frame was presented
    pub fn clear_needs_frame(&mut self) {
        self.needs_frame = false;
    }

    /// Queue a frame event for the next idle dispatch
    pub fn schedule_frame(&mut self) {
        self.frame_pending = true;
    }

    /// Consume a queued frame event
    pub fn take_scheduled_frame(&mut self) -> bool {
        std::mem::take(&mut self.frame_pending)
    }

    /// Keep the host frame-clock connection alive with the output
    pub fn attach_frame_clock(&mut self, subscription: FrameClockSubscription) {
        if let Some(old) = self.frame_clock.replace(subscription) {
            old.disconnect();
        }
    }

    /// Disconnect from the host frame clock
    pub fn detach_frame_clock(&mut self) {
        if let Some(subscription) = self.frame_clock.take() {
            debug!("Disconnecting frame clock");
            subscription.disconnect();
        }
    }

    pub fn has_frame_clock(&self) -> bool {
        self.frame_clock.is_some()
    }
}

impl Default for VirtualOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for VirtualOutput {
    fn commit(&mut self, state: &OutputState) -> bool {
        if let Some(enabled) = state.enabled {
            self.enabled = enabled;
        }
        if let Some(mode) = state.mode {
            debug!("Output mode {}x{}", mode.width, mode.height);
            self.mode = mode;
        }
        true
    }

    fn destroy(&mut self) {
        self.detach_frame_clock();
        self.enabled = false;
        self.needs_frame = false;
        self.frame_pending = false;
    }
}

/// Backend with a single virtual output
#[derive(Debug, Default)]
pub struct VirtualBackend {
    started: bool,
    output: Option<VirtualOutput>,
}

impl VirtualBackend {
    /// Create a backend with its output
    pub fn new() -> Self {
        Self {
            started: false,
            output: Some(VirtualOutput::new()),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn output(&self) -> Option<&VirtualOutput> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut VirtualOutput> {
        self.output.as_mut()
    }
}

impl Backend for VirtualBackend {
    fn start(&mut self) -> bool {
        info!("Starting Casilda backend");
        self.started = true;
        true
    }

    fn destroy(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.destroy();
        }
        self.started = false;
    }

    fn buffer_caps(&self) -> BufferCaps {
        BufferCaps::DATA_PTR | BufferCaps::SHM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_backend_lifecycle() {
        let mut backend = VirtualBackend::new();
        assert!(!backend.is_started());
        assert!(backend.start());
        assert!(backend.is_started());
        assert_eq!(backend.buffer_caps(), BufferCaps::DATA_PTR | BufferCaps::SHM);
        assert!(!backend.buffer_caps().contains(BufferCaps::DMABUF));

        backend.destroy();
        assert!(backend.output().is_none());
        assert!(!backend.is_started());
    }

    #[test]
    fn test_commit_applies_mode() {
        let mut output = VirtualOutput::new();
        assert!(output.commit(&OutputState::enabled_with_mode(640, 480)));
        assert!(output.is_enabled());
        assert_eq!((output.mode().width, output.mode().height), (640, 480));
    }

    #[test]
    fn test_destroy_disconnects_frame_clock() {
        let disconnected = Rc::new(Cell::new(false));
        let mut output = VirtualOutput::new();
        {
            let disconnected = disconnected.clone();
            output.attach_frame_clock(FrameClockSubscription::new(move || disconnected.set(true)));
        }
        assert!(output.has_frame_clock());
        output.destroy();
        assert!(disconnected.get());
        assert!(!output.has_frame_clock());
    }

    #[test]
    fn test_frame_scheduling() {
        let mut output = VirtualOutput::new();
        assert!(!output.take_scheduled_frame());
        output.set_needs_frame();
        assert!(output.needs_frame());
        assert!(output.take_scheduled_frame());
        assert!(!output.take_scheduled_frame());
        output.clear_needs_frame();
        assert!(!output.needs_frame());
    }
}
