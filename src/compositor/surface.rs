//! Surface management
//!
//! This module tracks wl_surface state: the double-buffered pending state,
//! the buffer copied out of the client on commit, input regions and the
//! sub-surface hierarchy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::compositor::Region;
use crate::renderer::PixelBuffer;
use crate::scene::NodeId;

/// Unique identifier for surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SurfaceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A damage region on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Pending state for a surface (not yet committed)
#[derive(Debug, Default)]
pub struct SurfacePendingState {
    /// `Some(None)` detaches the current buffer, `None` keeps it
    pub buffer: Option<Option<PixelBuffer>>,
    /// Buffer offset requested with attach or offset
    pub dx: i32,
    pub dy: i32,
    /// Accumulated damage regions
    pub damage: Vec<DamageRect>,
    /// Buffer scale factor
    pub scale: Option<i32>,
    /// `Some(None)` resets to an infinite region
    pub input_region: Option<Option<Region>>,
}

/// What changed in the last commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// A new buffer (or a detach) was committed
    pub buffer_changed: bool,
    /// Surface has content after the commit
    pub has_buffer: bool,
    /// Offset applied by this commit
    pub dx: i32,
    pub dy: i32,
    /// Damage was posted
    pub damaged: bool,
}

/// Surface role determines how the surface is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceRole {
    /// No role assigned yet
    #[default]
    None,
    /// XDG toplevel window
    XdgToplevel,
    /// XDG popup
    XdgPopup,
    /// Subsurface
    Subsurface,
    /// Cursor surface
    Cursor,
}

/// Errors raised by surface operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface already has the {0:?} role")]
    RoleAlreadySet(SurfaceRole),
    #[error("unknown surface")]
    UnknownSurface,
}

/// A Wayland surface
#[derive(Debug)]
pub struct Surface {
    /// Unique identifier
    pub id: SurfaceId,
    /// Current buffer contents
    pub buffer: Option<PixelBuffer>,
    /// Current damage regions
    pub damage: Vec<DamageRect>,
    /// Buffer scale factor (default 1)
    pub scale: i32,
    /// Accepts input everywhere when `None`
    pub input_region: Option<Region>,
    /// Pending state (not yet committed)
    pub pending: SurfacePendingState,
    /// Role assigned by the shell or sub-compositor
    pub role: SurfaceRole,
    /// Parent surface (for subsurfaces)
    pub parent: Option<SurfaceId>,
    /// Child subsurfaces
    pub children: Vec<SurfaceId>,
    /// Position relative to the parent, for subsurfaces
    pub subsurface_position: (i32, i32),
    /// Position waiting for the parent's next commit
    pub pending_subsurface_position: Option<(i32, i32)>,
    /// Scene node displaying this surface's buffer
    pub node: Option<NodeId>,
}

impl Surface {
    /// Create a new surface
    pub fn new() -> Self {
        Self {
            id: SurfaceId::new(),
            buffer: None,
            damage: Vec::new(),
            scale: 1,
            input_region: None,
            pending: SurfacePendingState::default(),
            role: SurfaceRole::None,
            parent: None,
            children: Vec::new(),
            subsurface_position: (0, 0),
            pending_subsurface_position: None,
            node: None,
        }
    }

    /// Attach a buffer to the pending state
    pub fn attach(&mut self, buffer: Option<PixelBuffer>) {
        self.pending.buffer = Some(buffer);
    }

    /// Set the pending buffer offset
    pub fn offset(&mut self, dx: i32, dy: i32) {
        self.pending.dx = dx;
        self.pending.dy = dy;
    }

    /// Add damage to the pending state
    pub fn damage(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.pending.damage.push(DamageRect {
            x,
            y,
            width,
            height,
        });
    }

    /// Set the buffer scale
    pub fn set_scale(&mut self, scale: i32) {
        self.pending.scale = Some(scale.max(1));
    }

    /// Set the pending input region, `None` meaning infinite
    pub fn set_input_region(&mut self, region: Option<Region>) {
        self.pending.input_region = Some(region);
    }

    /// Commit pending state to current state
    pub fn commit(&mut self) -> CommitInfo {
        let mut info = CommitInfo {
            dx: std::mem::take(&mut self.pending.dx),
            dy: std::mem::take(&mut self.pending.dy),
            ..CommitInfo::default()
        };

        if let Some(buffer) = self.pending.buffer.take() {
            self.buffer = buffer;
            info.buffer_changed = true;
        }
        info.has_buffer = self.buffer.is_some();

        if !self.pending.damage.is_empty() {
            self.damage = std::mem::take(&mut self.pending.damage);
            info.damaged = true;
        }

        if let Some(scale) = self.pending.scale.take() {
            self.scale = scale;
        }

        if let Some(region) = self.pending.input_region.take() {
            self.input_region = region;
        }

        info
    }

    /// Set the surface role
    pub fn set_role(&mut self, role: SurfaceRole) -> Result<(), SurfaceError> {
        if self.role != SurfaceRole::None && self.role != role {
            return Err(SurfaceError::RoleAlreadySet(self.role));
        }
        self.role = role;
        Ok(())
    }

    /// Size in surface-local coordinates
    pub fn size(&self) -> (i32, i32) {
        match &self.buffer {
            Some(buffer) => (
                buffer.width as i32 / self.scale,
                buffer.height as i32 / self.scale,
            ),
            None => (0, 0),
        }
    }

    /// Check whether a surface-local point accepts input
    pub fn accepts_input(&self, sx: f64, sy: f64) -> bool {
        let (width, height) = self.size();
        if sx < 0.0 || sy < 0.0 || sx >= width as f64 || sy >= height as f64 {
            return false;
        }
        match &self.input_region {
            Some(region) => region.contains(sx.floor() as i32, sy.floor() as i32),
            None => true,
        }
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

/// Manager for all surfaces
#[derive(Debug)]
pub struct SurfaceManager {
    surfaces: HashMap<SurfaceId, Surface>,
}

impl SurfaceManager {
    /// Create a new surface manager
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
        }
    }

    /// Create a new surface and return its ID
    pub fn create_surface(&mut self) -> SurfaceId {
        let surface = Surface::new();
        let id = surface.id;
        self.surfaces.insert(id, surface);
        id
    }

    /// Get a surface by ID
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    /// Get a mutable surface by ID
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    /// Remove a surface, detaching it from its parent and children
    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        let surface = self.surfaces.remove(&id)?;
        if let Some(parent) = surface.parent.and_then(|p| self.surfaces.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        for child in &surface.children {
            if let Some(child) = self.surfaces.get_mut(child) {
                child.parent = None;
            }
        }
        Some(surface)
    }

    /// Walk up the subsurface hierarchy
    pub fn root_of(&self, id: SurfaceId) -> SurfaceId {
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|s| s.parent) {
            if parent == id {
                break;
            }
            current = parent;
        }
        current
    }

    /// Get all surfaces
    pub fn iter(&self) -> impl Iterator<Item = (&SurfaceId, &Surface)> {
        self.surfaces.iter()
    }

    /// Get count of surfaces
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl Default for SurfaceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::PixelFormat;

    fn buffer(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::filled(width, height, PixelFormat::Argb8888, 0xffff_ffff)
    }

    #[test]
    fn test_surface_id_unique() {
        let id1 = SurfaceId::new();
        let id2 = SurfaceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_commit_applies_buffer_once() {
        let mut surface = Surface::new();
        surface.attach(Some(buffer(10, 20)));
        surface.offset(2, 3);

        let info = surface.commit();
        assert!(info.buffer_changed);
        assert!(info.has_buffer);
        assert_eq!((info.dx, info.dy), (2, 3));
        assert_eq!(surface.size(), (10, 20));

        // Nothing pending: the buffer stays, the offset does not repeat
        let info = surface.commit();
        assert!(!info.buffer_changed);
        assert!(info.has_buffer);
        assert_eq!((info.dx, info.dy), (0, 0));
    }

    #[test]
    fn test_commit_detach() {
        let mut surface = Surface::new();
        surface.attach(Some(buffer(4, 4)));
        surface.commit();
        surface.attach(None);
        let info = surface.commit();
        assert!(info.buffer_changed);
        assert!(!info.has_buffer);
    }

    #[test]
    fn test_scaled_size() {
        let mut surface = Surface::new();
        surface.attach(Some(buffer(200, 100)));
        surface.set_scale(2);
        surface.commit();
        assert_eq!(surface.size(), (100, 50));
    }

    #[test]
    fn test_input_region() {
        let mut surface = Surface::new();
        surface.attach(Some(buffer(100, 100)));
        let mut region = Region::new();
        region.add(0, 0, 50, 50);
        surface.set_input_region(Some(region));
        surface.commit();

        assert!(surface.accepts_input(10.0, 10.0));
        assert!(!surface.accepts_input(75.0, 75.0));
        assert!(!surface.accepts_input(150.0, 10.0));
    }

    #[test]
    fn test_surface_role() {
        let mut surface = Surface::new();
        assert!(surface.set_role(SurfaceRole::XdgToplevel).is_ok());
        assert!(surface.set_role(SurfaceRole::XdgToplevel).is_ok());
        assert_eq!(
            surface.set_role(SurfaceRole::XdgPopup),
            Err(SurfaceError::RoleAlreadySet(SurfaceRole::XdgToplevel))
        );
    }

    #[test]
    fn test_remove_unlinks_parent() {
        let mut manager = SurfaceManager::new();
        let parent = manager.create_surface();
        let child = manager.create_surface();
        manager.get_mut(child).unwrap().parent = Some(parent);
        manager.get_mut(parent).unwrap().children.push(child);

        assert_eq!(manager.root_of(child), parent);
        manager.remove(child);
        assert!(manager.get(parent).unwrap().children.is_empty());
    }
}
