//! Toplevel windows
//!
//! Each xdg_toplevel is tracked as a [`Toplevel`] in the
//! [`ToplevelRegistry`]. The registry also keeps the focus order (most
//! recently focused first) and the geometry table that lets windows with a
//! recognised app id reopen where they were closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::compositor::{Rect, SurfaceId};
use crate::scene::NodeId;

/// Unique identifier for toplevels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToplevelId(pub u64);

impl ToplevelId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ToplevelId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Geometry remembered per application identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryState {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub maximized: bool,
    pub fullscreen: bool,
}

/// Contents of one `xdg_toplevel.configure`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToplevelConfigure {
    /// Zero lets the client pick
    pub width: i32,
    pub height: i32,
    pub maximized: bool,
    pub fullscreen: bool,
    pub activated: bool,
    pub resizing: bool,
}

/// Maximize/fullscreen as requested by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedState {
    pub maximized: bool,
    pub fullscreen: bool,
}

/// A client toplevel window
#[derive(Debug)]
pub struct Toplevel {
    /// Unique identifier
    pub id: ToplevelId,
    /// Associated surface
    pub surface: SurfaceId,
    /// Scene sub-tree root, positioned at the window origin
    pub node: NodeId,
    /// Scene node drawing the main surface
    pub surface_node: NodeId,
    /// Application ID (app_id)
    pub app_id: Option<String>,
    /// Window title
    pub title: Option<String>,
    /// Key into the geometry table, when the app id matched
    pub identity: Option<String>,
    /// Geometry to restore when leaving maximized/fullscreen
    pub old_geometry: GeometryState,
    /// Window geometry set by the client, pending and committed
    pub pending_geometry: Option<Rect>,
    pub geometry: Option<Rect>,
    /// Size limits, pending and committed (0 = unset)
    pub pending_min_size: (i32, i32),
    pub pending_max_size: (i32, i32),
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
    /// Last maximize/fullscreen request from the client
    pub requested: RequestedState,
    /// Configure the next flush will send
    pub scheduled: ToplevelConfigure,
    /// Configure sent, acknowledged and committed
    pub current: ToplevelConfigure,
    /// Configures sent but not yet acknowledged
    pub pending_configures: Vec<(u32, ToplevelConfigure)>,
    /// Acknowledged configure waiting for a commit
    pub acked: Option<ToplevelConfigure>,
    pub configure_scheduled: bool,
    /// Initial commit happened
    pub initialized: bool,
    /// At least one configure was acknowledged
    pub configured: bool,
    pub mapped: bool,
}

impl Toplevel {
    /// Create a new toplevel for a surface and its scene nodes
    pub fn new(surface: SurfaceId, node: NodeId, surface_node: NodeId) -> Self {
        Self {
            id: ToplevelId::new(),
            surface,
            node,
            surface_node,
            app_id: None,
            title: None,
            identity: None,
            old_geometry: GeometryState::default(),
            pending_geometry: None,
            geometry: None,
            pending_min_size: (0, 0),
            pending_max_size: (0, 0),
            min_size: (0, 0),
            max_size: (0, 0),
            requested: RequestedState::default(),
            scheduled: ToplevelConfigure::default(),
            current: ToplevelConfigure::default(),
            pending_configures: Vec::new(),
            acked: None,
            configure_scheduled: false,
            initialized: false,
            configured: false,
            mapped: false,
        }
    }

    /// Schedule a configure with a new size
    pub fn set_size(&mut self, width: i32, height: i32) {
        self.scheduled.width = width;
        self.scheduled.height = height;
        self.configure_scheduled = true;
    }

    /// Schedule a configure with a new activated state
    pub fn set_activated(&mut self, activated: bool) {
        self.scheduled.activated = activated;
        self.configure_scheduled = true;
    }

    /// Schedule a configure with a new resizing state
    pub fn set_resizing(&mut self, resizing: bool) {
        self.scheduled.resizing = resizing;
        self.configure_scheduled = true;
    }

    /// Record a configure as sent
    pub fn configure_sent(&mut self, serial: u32) -> ToplevelConfigure {
        self.configure_scheduled = false;
        self.pending_configures.push((serial, self.scheduled));
        self.scheduled
    }

    /// Acknowledge a configure; older ones are implicitly acknowledged too
    pub fn ack_configure(&mut self, serial: u32) -> bool {
        let Some(idx) = self.pending_configures.iter().position(|(s, _)| *s == serial) else {
            return false;
        };
        let (_, configure) = self.pending_configures[idx];
        self.pending_configures.drain(..=idx);
        self.acked = Some(configure);
        self.configured = true;
        true
    }

    /// Apply double-buffered toplevel state on commit
    pub fn apply_commit(&mut self) {
        if let Some(acked) = self.acked.take() {
            self.current = acked;
        }
        if let Some(geometry) = self.pending_geometry {
            self.geometry = Some(geometry);
        }
        self.min_size = self.pending_min_size;
        self.max_size = self.pending_max_size;
    }

    /// Forget the configure handshake, as after an unmap by null buffer
    pub fn reset_handshake(&mut self) {
        self.initialized = false;
        self.configured = false;
        self.pending_configures.clear();
        self.acked = None;
        self.current = ToplevelConfigure::default();
        self.scheduled = ToplevelConfigure::default();
        self.configure_scheduled = false;
    }

    /// Maximized or fullscreen in the current state
    pub fn fills_widget(&self) -> bool {
        self.current.maximized || self.current.fullscreen
    }
}

/// Registry of toplevels and persisted geometry
#[derive(Debug)]
pub struct ToplevelRegistry {
    toplevels: HashMap<ToplevelId, Toplevel>,
    by_surface: HashMap<SurfaceId, ToplevelId>,
    /// Mapped toplevels, most recently focused first
    order: Vec<ToplevelId>,
    /// Geometry table keyed by identity
    states: HashMap<String, GeometryState>,
    prefix: String,
    default_position: (i32, i32),
}

impl ToplevelRegistry {
    /// Create a registry remembering app ids starting with `prefix`
    pub fn new(prefix: impl Into<String>, default_position: (i32, i32)) -> Self {
        Self {
            toplevels: HashMap::new(),
            by_surface: HashMap::new(),
            order: Vec::new(),
            states: HashMap::new(),
            prefix: prefix.into(),
            default_position,
        }
    }

    /// Add a toplevel
    pub fn insert(&mut self, toplevel: Toplevel) -> ToplevelId {
        let id = toplevel.id;
        self.by_surface.insert(toplevel.surface, id);
        self.toplevels.insert(id, toplevel);
        id
    }

    /// Get a toplevel by ID
    pub fn get(&self, id: ToplevelId) -> Option<&Toplevel> {
        self.toplevels.get(&id)
    }

    /// Get a mutable toplevel by ID
    pub fn get_mut(&mut self, id: ToplevelId) -> Option<&mut Toplevel> {
        self.toplevels.get_mut(&id)
    }

    /// Find the toplevel whose main surface is `surface`
    pub fn for_surface(&self, surface: SurfaceId) -> Option<ToplevelId> {
        self.by_surface.get(&surface).copied()
    }

    /// Remove a toplevel
    pub fn remove(&mut self, id: ToplevelId) -> Option<Toplevel> {
        let toplevel = self.toplevels.remove(&id)?;
        self.by_surface.remove(&toplevel.surface);
        self.order.retain(|t| *t != id);
        Some(toplevel)
    }

    /// Iterate over all toplevels
    pub fn iter(&self) -> impl Iterator<Item = (&ToplevelId, &Toplevel)> {
        self.toplevels.iter()
    }

    /// Iterate mutably over all toplevels
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ToplevelId, &mut Toplevel)> {
        self.toplevels.iter_mut()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.toplevels.is_empty()
    }

    /// Mapped toplevels, most recently focused first
    pub fn order(&self) -> &[ToplevelId] {
        &self.order
    }

    /// The focused toplevel, if any
    pub fn front(&self) -> Option<ToplevelId> {
        self.order.first().copied()
    }

    /// Insert at the front of the focus order
    pub fn push_front(&mut self, id: ToplevelId) {
        self.order.retain(|t| *t != id);
        self.order.insert(0, id);
    }

    /// Move an already ordered toplevel to the front
    pub fn move_to_front(&mut self, id: ToplevelId) {
        if self.order.contains(&id) {
            self.push_front(id);
        }
    }

    /// Drop from the focus order
    pub fn remove_from_order(&mut self, id: ToplevelId) {
        self.order.retain(|t| *t != id);
    }

    /// Link a toplevel to the geometry state for its app id.
    ///
    /// Any previous link is cleared. App ids with the registry prefix get
    /// their state looked up, or created at the default position.
    pub fn assign_identity(&mut self, id: ToplevelId, app_id: &str) {
        let Some(toplevel) = self.toplevels.get_mut(&id) else {
            return;
        };
        toplevel.app_id = Some(app_id.to_string());
        toplevel.identity = None;

        if !app_id.starts_with(&self.prefix) {
            return;
        }

        let (x, y) = self.default_position;
        self.states
            .entry(app_id.to_string())
            .or_insert_with(|| GeometryState {
                x,
                y,
                ..GeometryState::default()
            });
        toplevel.identity = Some(app_id.to_string());
        debug!("Toplevel {:?} uses persisted state {:?}", id, app_id);
    }

    /// Geometry state linked to a toplevel
    pub fn state_of(&self, id: ToplevelId) -> Option<&GeometryState> {
        let identity = self.toplevels.get(&id)?.identity.as_ref()?;
        self.states.get(identity)
    }

    /// Mutable geometry state linked to a toplevel
    pub fn state_of_mut(&mut self, id: ToplevelId) -> Option<&mut GeometryState> {
        let identity = self.toplevels.get(&id)?.identity.as_ref()?;
        self.states.get_mut(identity)
    }

    #[cfg(test)]
    fn state(&self, identity: &str) -> Option<&GeometryState> {
        self.states.get(identity)
    }

    #[cfg(test)]
    fn state_count(&self) -> usize {
        self.states.len()
    }
}
