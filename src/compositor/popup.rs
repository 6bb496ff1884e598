//! xdg_popup tracking

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::{Rect, SurfaceId};
use crate::scene::NodeId;

/// Unique identifier for popups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupId(pub u64);

impl PopupId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        PopupId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A popup surface placed relative to its parent
#[derive(Debug)]
pub struct Popup {
    pub id: PopupId,
    pub surface: SurfaceId,
    /// xdg surface the popup is attached to
    pub parent: SurfaceId,
    /// Scene tree under the parent's tree
    pub node: NodeId,
    pub surface_node: NodeId,
    /// Placement relative to the parent's window geometry
    pub geometry: Rect,
    /// Window geometry set by the client, pending and committed
    pub pending_window_geometry: Option<Rect>,
    pub window_geometry: Option<Rect>,
    /// Token of a pending reposition request
    pub reposition_token: Option<u32>,
    pub pending_configures: Vec<u32>,
    pub configure_scheduled: bool,
    pub initialized: bool,
    pub configured: bool,
    pub mapped: bool,
}

impl Popup {
    /// Create a popup with the positioner's geometry
    pub fn new(surface: SurfaceId, parent: SurfaceId, node: NodeId, surface_node: NodeId, geometry: Rect) -> Self {
        Self {
            id: PopupId::new(),
            surface,
            parent,
            node,
            surface_node,
            geometry,
            pending_window_geometry: None,
            window_geometry: None,
            reposition_token: None,
            pending_configures: Vec::new(),
            configure_scheduled: false,
            initialized: false,
            configured: false,
            mapped: false,
        }
    }

    /// Acknowledge a configure
    pub fn ack_configure(&mut self, serial: u32) -> bool {
        let Some(idx) = self.pending_configures.iter().position(|s| *s == serial) else {
            return false;
        };
        self.pending_configures.drain(..=idx);
        self.configured = true;
        true
    }

    /// Apply double-buffered popup state on commit
    pub fn apply_commit(&mut self) {
        if let Some(geometry) = self.pending_window_geometry {
            self.window_geometry = Some(geometry);
        }
    }

    /// Offset of the window geometry inside the surface
    pub fn geometry_offset(&self) -> (i32, i32) {
        self.window_geometry.map(|g| (g.x, g.y)).unwrap_or((0, 0))
    }
}

/// Manager for all popups
#[derive(Debug, Default)]
pub struct PopupManager {
    popups: HashMap<PopupId, Popup>,
    by_surface: HashMap<SurfaceId, PopupId>,
}

impl PopupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, popup: Popup) -> PopupId {
        let id = popup.id;
        self.by_surface.insert(popup.surface, id);
        self.popups.insert(id, popup);
        id
    }

    pub fn get(&self, id: PopupId) -> Option<&Popup> {
        self.popups.get(&id)
    }

    pub fn get_mut(&mut self, id: PopupId) -> Option<&mut Popup> {
        self.popups.get_mut(&id)
    }

    /// Find the popup whose surface is `surface`
    pub fn for_surface(&self, surface: SurfaceId) -> Option<PopupId> {
        self.by_surface.get(&surface).copied()
    }

    pub fn remove(&mut self, id: PopupId) -> Option<Popup> {
        let popup = self.popups.remove(&id)?;
        self.by_surface.remove(&popup.surface);
        Some(popup)
    }

    /// Popups whose parent is `surface`
    pub fn children_of(&self, surface: SurfaceId) -> Vec<PopupId> {
        self.popups
            .values()
            .filter(|p| p.parent == surface)
            .map(|p| p.id)
            .collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PopupId, &mut Popup)> {
        self.popups.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.popups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.popups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_lookup_by_parent() {
        let mut popups = PopupManager::new();
        let id = popups.insert(Popup::new(
            SurfaceId(2),
            SurfaceId(1),
            NodeId(1),
            NodeId(2),
            Rect::new(0, 0, 10, 10),
        ));
        assert_eq!(popups.for_surface(SurfaceId(2)), Some(id));
        assert_eq!(popups.children_of(SurfaceId(1)), vec![id]);
        popups.remove(id);
        assert!(popups.is_empty());
    }

    #[test]
    fn test_popup_ack() {
        let mut popup = Popup::new(SurfaceId(2), SurfaceId(1), NodeId(1), NodeId(2), Rect::default());
        popup.pending_configures.extend([3, 4]);
        assert!(popup.ack_configure(3));
        assert!(popup.configured);
        assert_eq!(popup.pending_configures, vec![4]);
    }
}
