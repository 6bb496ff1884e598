//! The embedded compositor facade
//!
//! [`EmbeddedCompositor`] is what a toolkit widget holds. It owns the
//! Wayland server and forwards the widget's lifecycle, paint and input
//! callbacks into the compositor. When the server cannot be created the
//! instance stays inert: every method is a no-op and `is_running` is false.

use std::os::unix::io::BorrowedFd;
use std::path::Path;

use log::{info, warn};

use crate::compositor::CompositorState;
use crate::config::CompositorConfig;
use crate::host::{DrawContext, FrameClockSubscription, Host};
use crate::input::HostModifiers;
use crate::server::{ClientResources, ServerError, WaylandServer};

/// A Wayland compositor living inside a host widget
pub struct EmbeddedCompositor {
    server: Option<WaylandServer>,
}

impl EmbeddedCompositor {
    /// Create a compositor, logging and going inert on failure
    pub fn new(config: CompositorConfig, host: Box<dyn Host>) -> Self {
        match Self::try_new(config, host) {
            Ok(compositor) => compositor,
            Err(e) => {
                warn!("Compositor disabled: {}", e);
                Self { server: None }
            }
        }
    }

    /// Create a compositor, reporting construction errors
    pub fn try_new(config: CompositorConfig, host: Box<dyn Host>) -> Result<Self, ServerError> {
        let server = WaylandServer::new(config, host)?;
        info!("Embedded compositor listening on {}", server.socket_path().display());
        Ok(Self { server: Some(server) })
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// Socket path clients should connect to
    pub fn socket_path(&self) -> Option<&Path> {
        self.server.as_ref().map(|s| s.socket_path())
    }

    /// Descriptor the host polls for protocol activity
    pub fn poll_fd(&self) -> Option<BorrowedFd<'_>> {
        self.server.as_ref().map(|s| s.poll_fd())
    }

    /// Flush outgoing messages; call before blocking on `poll_fd`
    pub fn prepare(&mut self) {
        if let Some(server) = &mut self.server {
            server.prepare();
        }
    }

    /// Process protocol work after `poll_fd` woke up
    pub fn dispatch(&mut self) {
        if let Some(server) = &mut self.server {
            if let Err(e) = server.dispatch() {
                warn!("Dispatch failed: {}", e);
            }
        }
    }

    /// Read access to the compositor state
    pub fn compositor(&self) -> Option<&CompositorState> {
        self.server.as_ref().map(|s| &s.state().compositor)
    }

    /// Run `f` against the compositor and the client resources, then flush
    fn with_state<R>(&mut self, f: impl FnOnce(&mut CompositorState, &mut ClientResources) -> R) -> Option<R> {
        let server = self.server.as_mut()?;
        let state = server.state_mut();
        let result = f(&mut state.compositor, &mut state.clients);
        server.prepare();
        Some(result)
    }

    // ========================================================================
    // Widget lifecycle
    // ========================================================================

    /// The widget got a frame clock
    pub fn realize(&mut self, subscription: FrameClockSubscription) {
        self.with_state(|compositor, _| compositor.realize(subscription));
    }

    /// The widget lost its frame clock
    pub fn unrealize(&mut self) {
        self.with_state(|compositor, _| compositor.unrealize());
    }

    /// One frame-clock period elapsed
    pub fn frame_clock_tick(&mut self) {
        self.with_state(|compositor, _| compositor.frame_clock_tick());
    }

    /// Minimum and natural size along either orientation.
    ///
    /// The compositor draws into an empty canvas with no content of its
    /// own, so it asks for nothing and takes whatever it is allocated.
    pub fn measure(&self) -> (i32, i32) {
        (0, 0)
    }

    /// The widget was allocated a new size
    pub fn size_allocate(&mut self, width: i32, height: i32) {
        self.with_state(|compositor, clients| compositor.size_allocate(width, height, clients));
    }

    /// Compose a frame into the paint callback's drawing context
    pub fn paint(&mut self, cx: &mut dyn DrawContext) -> bool {
        self.with_state(|compositor, clients| compositor.paint(cx, clients))
            .unwrap_or(false)
    }

    /// Straight alpha RGBA in `[0, 1]`
    pub fn set_background(&mut self, color: [f32; 4]) {
        self.with_state(|compositor, _| compositor.set_background(color));
    }

    pub fn background(&self) -> Option<[f32; 4]> {
        self.compositor().map(|c| c.config.background)
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn pointer_enter(&mut self, x: f64, y: f64) {
        self.with_state(|compositor, clients| compositor.pointer_enter(x, y, clients));
    }

    pub fn pointer_motion(&mut self, x: f64, y: f64) {
        self.with_state(|compositor, clients| compositor.pointer_motion(x, y, clients));
    }

    pub fn pointer_leave(&mut self) {
        self.with_state(|compositor, clients| compositor.pointer_leave(clients));
    }

    /// Discrete scroll in notches
    pub fn scroll(&mut self, dx: f64, dy: f64) {
        self.with_state(|compositor, clients| compositor.scroll(dx, dy, clients));
    }

    /// Click gesture press or release, `button` being the toolkit ordinal
    pub fn button(&mut self, button: u32, pressed: bool) {
        self.with_state(|compositor, clients| compositor.button(button, pressed, clients));
    }

    /// Key press or release with a platform (xkb) keycode
    pub fn key(&mut self, keycode: u32, pressed: bool) {
        self.with_state(|compositor, clients| compositor.key(keycode, pressed, clients));
    }

    pub fn modifiers(&mut self, modifiers: HostModifiers) {
        self.with_state(|compositor, clients| compositor.modifiers(modifiers, clients));
    }
}
