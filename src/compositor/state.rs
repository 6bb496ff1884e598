//! Global compositor state
//!
//! This module contains the central compositor state that coordinates
//! all subsystems: surfaces, the scene, toplevels and popups, input, the
//! virtual backend and the host widget.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{info, warn};

use crate::backend::{Backend, Output, OutputState, VirtualBackend};
use crate::compositor::{FrameBridge, PopupManager, Rect, SurfaceManager, ToplevelRegistry};
use crate::config::CompositorConfig;
use crate::host::Host;
use crate::input::{compile_keymap, CursorCache, PointerSession, Seat};
use crate::protocol::{ClientEvent, ClientSink};
use crate::scene::{NodeId, SceneGraph};

/// Source of protocol serials
#[derive(Debug)]
pub struct SerialCounter(AtomicU64);

impl SerialCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Get the next serial number for Wayland events
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) as u32
    }
}

impl Default for SerialCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The compositor state of one embedded instance
pub struct CompositorState {
    pub config: CompositorConfig,

    /// Surface manager - tracks all wl_surfaces
    pub surfaces: SurfaceManager,

    /// Toplevels, focus order and persisted geometry
    pub toplevels: ToplevelRegistry,

    /// Popups
    pub popups: PopupManager,

    /// Scene composed into the output
    pub scene: SceneGraph,

    /// Background rectangle, first child of the scene root
    pub background: NodeId,

    /// Input seat - manages keyboard and pointer
    pub seat: Seat,

    /// Interactive move/resize state
    pub session: PointerSession,

    /// Client cursor image
    pub cursor: CursorCache,

    /// Virtual backend and its output
    pub backend: VirtualBackend,

    /// Paint scheduling state
    pub frames: FrameBridge,

    /// The embedding widget
    pub host: Box<dyn Host>,

    /// Serial counter for Wayland events
    pub serials: SerialCounter,

    /// Widget size in logical pixels
    size: (i32, i32),

    clock: Instant,
}

impl CompositorState {
    /// Create a new compositor state
    pub fn new(config: CompositorConfig, host: Box<dyn Host>) -> Self {
        let (keymap, group) = match host.keymap() {
            Some(host_keymap) => (host_keymap.keymap, host_keymap.active_layout),
            None => match compile_keymap(&config.keymap) {
                Ok(keymap) => (keymap, None),
                Err(e) => {
                    warn!("{}", e);
                    (String::new(), None)
                }
            },
        };

        let mut seat = Seat::new(keymap);
        seat.keyboard_mut()
            .set_repeat_info(config.repeat.0, config.repeat.1);
        if let Some(group) = group {
            seat.keyboard_mut().set_group(group);
        }

        let mut scene = SceneGraph::new();
        let background = scene.create_rect(scene.root(), 0, 0, config.background);

        let mut backend = VirtualBackend::new();
        backend.start();

        info!("Compositor state created");

        Self {
            toplevels: ToplevelRegistry::new(config.identity_prefix.clone(), config.default_position),
            config,
            surfaces: SurfaceManager::new(),
            popups: PopupManager::new(),
            scene,
            background,
            seat,
            session: PointerSession::default(),
            cursor: CursorCache::new(),
            backend,
            frames: FrameBridge::new(),
            host,
            serials: SerialCounter::new(),
            size: (0, 0),
            clock: Instant::now(),
        }
    }

    /// Get the next serial number for Wayland events
    pub fn next_serial(&self) -> u32 {
        self.serials.next()
    }

    /// Milliseconds since the compositor started, for event timestamps
    pub fn time_msec(&self) -> u32 {
        self.clock.elapsed().as_millis() as u32
    }

    /// Widget size
    pub fn widget_size(&self) -> (i32, i32) {
        self.size
    }

    /// Widget bounds in layout coordinates
    pub fn widget_rect(&self) -> Rect {
        Rect::new(0, 0, self.size.0, self.size.1)
    }

    /// The widget was given a new size.
    ///
    /// Resizes the background, commits the new output mode and makes
    /// maximized or fullscreen windows follow the widget.
    pub fn size_allocate(&mut self, width: i32, height: i32, sink: &mut dyn ClientSink) {
        if self.size == (width, height) {
            return;
        }
        self.size = (width, height);
        self.scene.set_rect_size(self.background, width, height);

        if let Some(output) = self.backend.output_mut() {
            output.commit(&OutputState::enabled_with_mode(width, height));
        }
        sink.send(ClientEvent::OutputMode { width, height });

        self.resize_to_widget();
        self.schedule_frame();
    }

    /// Change the background color
    pub fn set_background(&mut self, color: [f32; 4]) {
        self.config.background = color;
        self.scene.set_rect_color(self.background, color);
        self.schedule_frame();
    }

    /// Release the seat, the scene and the backend.
    ///
    /// Clients must be disconnected first; nothing may reference a toplevel
    /// or surface afterwards.
    pub fn teardown(&mut self) {
        self.session.reset();
        self.seat.keyboard_mut().set_focus(None);
        self.seat.pointer_mut().set_focus(None, 0.0, 0.0);

        let nodes: Vec<NodeId> = self.toplevels.iter().map(|(_, t)| t.node).collect();
        for node in nodes {
            self.scene.destroy(node);
        }
        self.scene.destroy(self.background);

        self.backend.destroy();
        info!("Compositor state torn down");
    }

    /// Ask the output for a frame at the next idle dispatch
    pub fn schedule_frame(&mut self) {
        self.scene.damage();
        if let Some(output) = self.backend.output_mut() {
            output.schedule_frame();
        }
    }
}
