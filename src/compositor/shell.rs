//! Window management
//!
//! Shell behaviour on top of [`CompositorState`]: creating and mapping
//! toplevels, focus, maximize and fullscreen, geometry persistence, popups
//! and sub-surfaces. Protocol handlers call in here after decoding
//! requests; outgoing events go to the [`ClientSink`].

use log::debug;

use crate::compositor::{
    CommitInfo, CompositorState, GeometryState, Popup, PopupId, Rect, SurfaceError, SurfaceId,
    SurfaceRole, Toplevel, ToplevelId,
};
use crate::protocol::{ClientEvent, ClientSink};

impl CompositorState {
    // ========================================================================
    // Surfaces
    // ========================================================================

    /// Commit a surface's pending state and run its role's commit logic
    pub fn commit_surface(&mut self, id: SurfaceId, frame_callbacks: bool, sink: &mut dyn ClientSink) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        let info = surface.commit();
        let role = surface.role;
        let children = surface.children.clone();

        // Sub-surface positions are applied with the parent's state
        for child in children {
            let Some(child) = self.surfaces.get_mut(child) else {
                continue;
            };
            if let Some((x, y)) = child.pending_subsurface_position.take() {
                child.subsurface_position = (x, y);
                if let Some(node) = child.node {
                    self.scene.set_position(node, x, y);
                }
            }
        }

        match role {
            SurfaceRole::XdgToplevel => {
                if let Some(toplevel) = self.toplevels.for_surface(id) {
                    self.toplevel_commit(toplevel, info, sink);
                }
            }
            SurfaceRole::XdgPopup => {
                if let Some(popup) = self.popups.for_surface(id) {
                    self.popup_commit(popup, info);
                }
            }
            SurfaceRole::Subsurface => self.attach_subsurface_node(id),
            SurfaceRole::Cursor => {
                if self.cursor.pending() == Some(id) {
                    self.cursor_commit(id, info);
                }
            }
            SurfaceRole::None => {}
        }

        if info.buffer_changed || info.damaged {
            self.schedule_frame();
        }
        if frame_callbacks {
            if let Some(output) = self.backend.output_mut() {
                output.set_needs_frame();
            }
        }
    }

    /// Forget a destroyed surface and everything hanging off it
    pub fn destroy_surface(&mut self, id: SurfaceId, sink: &mut dyn ClientSink) {
        if let Some(toplevel) = self.toplevels.for_surface(id) {
            self.destroy_toplevel(toplevel, sink);
        }
        if let Some(popup) = self.popups.for_surface(id) {
            self.destroy_popup(popup);
        }

        if let Some(surface) = self.surfaces.get(id) {
            if let Some(node) = surface.node {
                self.scene.destroy(node);
            }
            // Child nodes went down with ours
            for child in surface.children.clone() {
                if let Some(child) = self.surfaces.get_mut(child) {
                    child.node = None;
                }
            }
        }

        self.seat.surface_destroyed(id);
        if self.cursor.pending() == Some(id) {
            self.cursor.clear_pending();
        }
        self.surfaces.remove(id);
        self.schedule_frame();
        debug!("Surface {:?} destroyed", id);
    }

    // ========================================================================
    // Toplevels
    // ========================================================================

    /// Give a surface the toplevel role and build its scene sub-tree
    pub fn new_toplevel(&mut self, surface: SurfaceId) -> Result<ToplevelId, SurfaceError> {
        self.surfaces
            .get_mut(surface)
            .ok_or(SurfaceError::UnknownSurface)?
            .set_role(SurfaceRole::XdgToplevel)?;

        let node = self.scene.create_tree(self.scene.root());
        self.scene.set_enabled(node, false);
        let surface_node = self.scene.create_surface(node, surface);
        if let Some(s) = self.surfaces.get_mut(surface) {
            s.node = Some(surface_node);
        }

        let id = self.toplevels.insert(Toplevel::new(surface, node, surface_node));
        self.scene.set_toplevel(node, id);
        debug!("New toplevel {:?} for surface {:?}", id, surface);
        Ok(id)
    }

    pub fn set_toplevel_app_id(&mut self, id: ToplevelId, app_id: &str) {
        self.toplevels.assign_identity(id, app_id);
    }

    pub fn set_toplevel_title(&mut self, id: ToplevelId, title: &str) {
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.title = Some(title.to_string());
        }
    }

    pub fn set_toplevel_min_size(&mut self, id: ToplevelId, width: i32, height: i32) {
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.pending_min_size = (width.max(0), height.max(0));
        }
    }

    pub fn set_toplevel_max_size(&mut self, id: ToplevelId, width: i32, height: i32) {
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.pending_max_size = (width.max(0), height.max(0));
        }
    }

    /// xdg_surface.set_window_geometry for toplevels and popups
    pub fn set_window_geometry(&mut self, surface: SurfaceId, geometry: Rect) {
        if let Some(toplevel) = self
            .toplevels
            .for_surface(surface)
            .and_then(|id| self.toplevels.get_mut(id))
        {
            toplevel.pending_geometry = Some(geometry);
        } else if let Some(popup) = self
            .popups
            .for_surface(surface)
            .and_then(|id| self.popups.get_mut(id))
        {
            popup.pending_window_geometry = Some(geometry);
        }
    }

    /// xdg_surface.ack_configure; returns false for an unknown serial
    pub fn ack_configure(&mut self, surface: SurfaceId, serial: u32) -> bool {
        if let Some(toplevel) = self
            .toplevels
            .for_surface(surface)
            .and_then(|id| self.toplevels.get_mut(id))
        {
            return toplevel.ack_configure(serial);
        }
        if let Some(popup) = self
            .popups
            .for_surface(surface)
            .and_then(|id| self.popups.get_mut(id))
        {
            return popup.ack_configure(serial);
        }
        false
    }

    fn toplevel_commit(&mut self, id: ToplevelId, info: CommitInfo, sink: &mut dyn ClientSink) {
        let Some(toplevel) = self.toplevels.get_mut(id) else {
            return;
        };
        toplevel.apply_commit();

        if !toplevel.initialized {
            // Let the client pick its own size
            toplevel.initialized = true;
            toplevel.set_size(0, 0);
            debug!("Toplevel {:?} initial commit", id);
            return;
        }

        if !toplevel.mapped && toplevel.configured && info.has_buffer {
            self.map_toplevel(id, sink);
        } else if toplevel.mapped && !info.has_buffer {
            self.unmap_toplevel(id, sink);
            if let Some(toplevel) = self.toplevels.get_mut(id) {
                toplevel.reset_handshake();
            }
            return;
        }

        let Some(toplevel) = self.toplevels.get(id) else {
            return;
        };
        let settled = toplevel.mapped
            && !toplevel.fills_widget()
            && !toplevel.configure_scheduled
            && toplevel.pending_configures.is_empty();
        if settled {
            let geometry = self.geometry_box(id);
            self.save_size(id, geometry.width, geometry.height);
        }
    }

    fn map_toplevel(&mut self, id: ToplevelId, sink: &mut dyn ClientSink) {
        let Some(toplevel) = self.toplevels.get_mut(id) else {
            return;
        };
        toplevel.mapped = true;
        let node = toplevel.node;
        self.scene.set_enabled(node, true);
        self.toplevels.push_front(id);
        debug!("Toplevel {:?} mapped", id);

        self.focus_toplevel(id, sink);

        let Some(state) = self.toplevels.state_of(id).copied() else {
            return;
        };
        let (width, height) = self.widget_size();
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.scheduled.fullscreen = state.fullscreen;
            toplevel.scheduled.maximized = state.maximized;
            toplevel.configure_scheduled = true;

            if state.fullscreen || state.maximized {
                toplevel.old_geometry = state;
                self.configure_toplevel(id, 0, 0, width, height);
                return;
            }
        }
        self.configure_toplevel(id, state.x, state.y, state.width, state.height);
    }

    fn unmap_toplevel(&mut self, id: ToplevelId, sink: &mut dyn ClientSink) {
        if self.session.is_grabbing(id) {
            self.end_pointer_session();
        }
        let Some(toplevel) = self.toplevels.get_mut(id) else {
            return;
        };
        toplevel.mapped = false;
        toplevel.identity = None;
        let (node, surface) = (toplevel.node, toplevel.surface);
        self.scene.set_enabled(node, false);
        self.toplevels.remove_from_order(id);

        if self.seat.keyboard_focus() == Some(surface) {
            self.seat.keyboard_clear_focus(&self.serials, sink);
        }
        if let Some(focus) = self.seat.pointer_focus() {
            if self.surfaces.root_of(focus) == surface {
                self.seat.pointer_clear_focus(&self.serials, sink);
            }
        }
        debug!("Toplevel {:?} unmapped", id);
    }

    /// Tear down a toplevel and its scene sub-tree
    pub fn destroy_toplevel(&mut self, id: ToplevelId, sink: &mut dyn ClientSink) {
        if self.toplevels.get(id).is_some_and(|t| t.mapped) {
            self.unmap_toplevel(id, sink);
        }
        let Some(toplevel) = self.toplevels.remove(id) else {
            return;
        };
        self.scene.destroy(toplevel.node);
        if let Some(surface) = self.surfaces.get_mut(toplevel.surface) {
            surface.node = None;
        }
        debug!("Toplevel {:?} destroyed", id);
    }

    /// Position the toplevel and, for a non-zero size, schedule a configure
    pub fn configure_toplevel(&mut self, id: ToplevelId, x: i32, y: i32, width: i32, height: i32) {
        let Some(toplevel) = self.toplevels.get_mut(id) else {
            return;
        };
        self.scene.set_position(toplevel.node, x, y);
        if width != 0 && height != 0 {
            toplevel.set_size(width, height);
        }
    }

    /// Window geometry, or the surface extents when none was set
    pub fn geometry_box(&self, id: ToplevelId) -> Rect {
        let Some(toplevel) = self.toplevels.get(id) else {
            return Rect::default();
        };
        if let Some(geometry) = toplevel.geometry.filter(|g| !g.is_empty()) {
            return geometry;
        }
        let (width, height) = self
            .surfaces
            .get(toplevel.surface)
            .map(|s| s.size())
            .unwrap_or((0, 0));
        Rect::new(0, 0, width, height)
    }

    /// Store the toplevel's scene position in its persisted state
    pub fn save_position(&mut self, id: ToplevelId) {
        let Some(position) = self
            .toplevels
            .get(id)
            .and_then(|t| self.scene.position(t.node))
        else {
            return;
        };
        if let Some(state) = self.toplevels.state_of_mut(id) {
            (state.x, state.y) = position;
        }
    }

    pub fn save_size(&mut self, id: ToplevelId, width: i32, height: i32) {
        if let Some(state) = self.toplevels.state_of_mut(id) {
            state.width = width;
            state.height = height;
        }
    }

    /// Raise, activate and give keyboard focus to a toplevel
    pub fn focus_toplevel(&mut self, id: ToplevelId, sink: &mut dyn ClientSink) {
        let Some(toplevel) = self.toplevels.get(id) else {
            return;
        };
        let (surface, node) = (toplevel.surface, toplevel.node);
        let previous = self.seat.keyboard_focus();
        if previous == Some(surface) {
            return;
        }

        if let Some(previous) = previous
            .and_then(|s| self.toplevels.for_surface(s))
            .and_then(|t| self.toplevels.get_mut(t))
        {
            previous.set_activated(false);
        }

        self.scene.raise_to_top(node);
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.set_activated(true);
        }
        self.toplevels.move_to_front(id);
        self.seat.keyboard_enter(surface, &self.serials, sink);
    }

    /// xdg_activation: raise the toplevel without moving focus
    pub fn activate_surface(&mut self, surface: SurfaceId) {
        let Some(node) = self
            .toplevels
            .for_surface(surface)
            .filter(|id| self.toplevels.order().contains(id))
            .and_then(|id| self.toplevels.get(id))
            .map(|t| t.node)
        else {
            return;
        };
        self.scene.raise_to_top(node);
        debug!("Activated surface {:?}", surface);
    }

    /// Record the client's maximize request and apply it
    pub fn request_maximize(&mut self, id: ToplevelId, maximized: bool) {
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.requested.maximized = maximized;
        }
        self.toggle_fill(id, false);
    }

    /// Record the client's fullscreen request and apply it
    pub fn request_fullscreen(&mut self, id: ToplevelId, fullscreen: bool) {
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.requested.fullscreen = fullscreen;
        }
        self.toggle_fill(id, true);
    }

    /// Enter or leave maximized/fullscreen following the last request
    fn toggle_fill(&mut self, id: ToplevelId, fullscreen: bool) {
        let (width, height) = self.widget_size();
        let geometry = self.geometry_box(id);
        let Some(toplevel) = self.toplevels.get_mut(id) else {
            return;
        };
        if !toplevel.initialized || !toplevel.configured {
            return;
        }

        let (value, current) = if fullscreen {
            (toplevel.requested.fullscreen, toplevel.current.fullscreen)
        } else {
            (toplevel.requested.maximized, toplevel.current.maximized)
        };
        if value == current {
            return;
        }

        if fullscreen {
            toplevel.scheduled.fullscreen = value;
        } else {
            toplevel.scheduled.maximized = value;
        }
        toplevel.configure_scheduled = true;

        if value {
            let (x, y) = self.scene.position(toplevel.node).unwrap_or((0, 0));
            let current_width = if toplevel.current.width > 0 {
                toplevel.current.width
            } else {
                geometry.width
            };
            let current_height = if toplevel.current.height > 0 {
                toplevel.current.height
            } else {
                geometry.height
            };
            toplevel.old_geometry = GeometryState {
                x,
                y,
                width: current_width,
                height: current_height,
                ..GeometryState::default()
            };
        }
        let old = toplevel.old_geometry;

        if let Some(state) = self.toplevels.state_of_mut(id) {
            if fullscreen {
                state.fullscreen = value;
            } else {
                state.maximized = value;
            }
        }

        debug!(
            "Toplevel {:?} {} -> {}",
            id,
            if fullscreen { "fullscreen" } else { "maximized" },
            value
        );

        if value {
            self.configure_toplevel(id, 0, 0, width, height);
        } else {
            self.configure_toplevel(id, old.x, old.y, old.width, old.height);
        }
    }

    /// Make maximized and fullscreen toplevels follow the widget size
    pub(crate) fn resize_to_widget(&mut self) {
        let (width, height) = self.widget_size();
        let filling: Vec<ToplevelId> = self
            .toplevels
            .iter()
            .filter(|(_, t)| t.mapped && (t.scheduled.maximized || t.scheduled.fullscreen))
            .map(|(id, _)| *id)
            .collect();
        for id in filling {
            self.configure_toplevel(id, 0, 0, width, height);
        }
    }

    /// Send every scheduled toplevel and popup configure
    pub fn flush_configures(&mut self, sink: &mut dyn ClientSink) {
        for (id, toplevel) in self.toplevels.iter_mut() {
            if !toplevel.configure_scheduled {
                continue;
            }
            let serial = self.serials.next();
            let configure = toplevel.configure_sent(serial);
            sink.send(ClientEvent::ToplevelConfigure {
                toplevel: *id,
                surface: toplevel.surface,
                serial,
                configure,
            });
        }

        for (id, popup) in self.popups.iter_mut() {
            if !popup.configure_scheduled {
                continue;
            }
            popup.configure_scheduled = false;
            let serial = self.serials.next();
            popup.pending_configures.push(serial);
            sink.send(ClientEvent::PopupConfigure {
                popup: *id,
                surface: popup.surface,
                serial,
                geometry: popup.geometry,
                reposition_token: popup.reposition_token.take(),
            });
        }
    }

    // ========================================================================
    // Popups
    // ========================================================================

    /// Give a surface the popup role under an xdg parent
    pub fn new_popup(
        &mut self,
        surface: SurfaceId,
        parent: SurfaceId,
        geometry: Rect,
    ) -> Result<PopupId, SurfaceError> {
        let parent_node = self
            .toplevels
            .for_surface(parent)
            .and_then(|t| self.toplevels.get(t))
            .map(|t| t.node)
            .or_else(|| {
                self.popups
                    .for_surface(parent)
                    .and_then(|p| self.popups.get(p))
                    .map(|p| p.node)
            })
            .ok_or(SurfaceError::UnknownSurface)?;

        self.surfaces
            .get_mut(surface)
            .ok_or(SurfaceError::UnknownSurface)?
            .set_role(SurfaceRole::XdgPopup)?;

        let node = self.scene.create_tree(parent_node);
        self.scene.set_enabled(node, false);
        let surface_node = self.scene.create_surface(node, surface);
        if let Some(s) = self.surfaces.get_mut(surface) {
            s.node = Some(surface_node);
        }

        let id = self
            .popups
            .insert(Popup::new(surface, parent, node, surface_node, geometry));
        self.place_popup(id);
        debug!("New popup {:?} for surface {:?}", id, surface);
        Ok(id)
    }

    fn popup_commit(&mut self, id: PopupId, info: CommitInfo) {
        let Some(popup) = self.popups.get_mut(id) else {
            return;
        };
        popup.apply_commit();

        if !popup.initialized {
            popup.initialized = true;
            popup.configure_scheduled = true;
        } else if !popup.mapped && popup.configured && info.has_buffer {
            popup.mapped = true;
            self.scene.set_enabled(popup.node, true);
        } else if popup.mapped && !info.has_buffer {
            popup.mapped = false;
            popup.initialized = false;
            popup.configured = false;
            self.scene.set_enabled(popup.node, false);
        }
        self.place_popup(id);
    }

    /// Move a popup's tree to its geometry relative to the parent
    fn place_popup(&mut self, id: PopupId) {
        let Some(popup) = self.popups.get(id) else {
            return;
        };
        let parent_offset = if let Some(toplevel) = self
            .toplevels
            .for_surface(popup.parent)
            .and_then(|t| self.toplevels.get(t))
        {
            toplevel.geometry.map(|g| (g.x, g.y)).unwrap_or((0, 0))
        } else {
            self.popups
                .for_surface(popup.parent)
                .and_then(|p| self.popups.get(p))
                .map(|p| p.geometry_offset())
                .unwrap_or((0, 0))
        };
        let (ox, oy) = popup.geometry_offset();
        let x = parent_offset.0 + popup.geometry.x - ox;
        let y = parent_offset.1 + popup.geometry.y - oy;
        self.scene.set_position(popup.node, x, y);
    }

    /// xdg_popup.reposition
    pub fn reposition_popup(&mut self, id: PopupId, geometry: Rect, token: u32) {
        let Some(popup) = self.popups.get_mut(id) else {
            return;
        };
        popup.geometry = geometry;
        popup.reposition_token = Some(token);
        popup.configure_scheduled = true;
        self.place_popup(id);
    }

    /// Tear down a popup and its scene sub-tree
    pub fn destroy_popup(&mut self, id: PopupId) {
        let Some(popup) = self.popups.remove(id) else {
            return;
        };
        self.scene.destroy(popup.node);
        if let Some(surface) = self.surfaces.get_mut(popup.surface) {
            surface.node = None;
        }
        debug!("Popup {:?} destroyed", id);
    }

    // ========================================================================
    // Sub-surfaces
    // ========================================================================

    /// Give a surface the sub-surface role under `parent`
    pub fn new_subsurface(&mut self, surface: SurfaceId, parent: SurfaceId) -> Result<(), SurfaceError> {
        if surface == parent || self.surfaces.root_of(parent) == surface {
            return Err(SurfaceError::UnknownSurface);
        }
        if self.surfaces.get(parent).is_none() {
            return Err(SurfaceError::UnknownSurface);
        }
        let child = self
            .surfaces
            .get_mut(surface)
            .ok_or(SurfaceError::UnknownSurface)?;
        child.set_role(SurfaceRole::Subsurface)?;
        child.parent = Some(parent);
        if let Some(parent) = self.surfaces.get_mut(parent) {
            parent.children.push(surface);
        }

        self.attach_subsurface_node(surface);
        Ok(())
    }

    /// Create the sub-surface's node once its parent has one
    fn attach_subsurface_node(&mut self, surface: SurfaceId) {
        let Some(child) = self.surfaces.get(surface) else {
            return;
        };
        if child.node.is_some() {
            return;
        }
        let position = child.subsurface_position;
        let Some(parent_node) = child
            .parent
            .and_then(|p| self.surfaces.get(p))
            .and_then(|p| p.node)
        else {
            return;
        };

        let node = self.scene.create_surface(parent_node, surface);
        self.scene.set_position(node, position.0, position.1);
        if let Some(child) = self.surfaces.get_mut(surface) {
            child.node = Some(node);
        }
    }

    /// wl_subsurface.set_position, applied on the parent's next commit
    pub fn set_subsurface_position(&mut self, surface: SurfaceId, x: i32, y: i32) {
        if let Some(child) = self.surfaces.get_mut(surface) {
            child.pending_subsurface_position = Some((x, y));
        }
    }

    /// wl_subsurface.destroy: unlink from the parent and hide
    pub fn destroy_subsurface(&mut self, surface: SurfaceId) {
        let Some(child) = self.surfaces.get_mut(surface) else {
            return;
        };
        let parent = child.parent.take();
        if let Some(node) = child.node.take() {
            self.scene.destroy(node);
        }
        if let Some(parent) = parent.and_then(|p| self.surfaces.get_mut(p)) {
            parent.children.retain(|c| *c != surface);
        }
        if parent.is_none() {
            debug!("Sub-surface {:?} had no parent", surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositorConfig;
    use crate::host::{CursorImage, Host};
    use crate::renderer::{PixelBuffer, PixelFormat};

    struct NullHost;

    impl Host for NullHost {
        fn queue_draw(&mut self) {}
        fn begin_updating(&mut self) {}
        fn end_updating(&mut self) {}
        fn grab_focus(&mut self) {}
        fn set_cursor(&mut self, _cursor: Option<&CursorImage>) {}
        fn keymap(&self) -> Option<crate::host::HostKeymap> {
            Some(crate::host::HostKeymap {
                keymap: String::new(),
                active_layout: None,
            })
        }
    }

    fn state() -> CompositorState {
        let mut state = CompositorState::new(CompositorConfig::default(), Box::new(NullHost));
        state.size_allocate(800, 600, &mut Vec::new());
        state
    }

    fn attach(state: &mut CompositorState, surface: SurfaceId, width: u32, height: u32) {
        let buffer = PixelBuffer::filled(width, height, PixelFormat::Argb8888, 0xff00_00ff);
        state.surfaces.get_mut(surface).unwrap().attach(Some(buffer));
    }

    fn last_serial(events: &[ClientEvent], id: ToplevelId) -> u32 {
        events
            .iter()
            .rev()
            .find_map(|e| match e {
                ClientEvent::ToplevelConfigure { toplevel, serial, .. } if *toplevel == id => Some(*serial),
                _ => None,
            })
            .unwrap()
    }

    /// Drive a toplevel through the initial commit and map
    fn mapped(state: &mut CompositorState, app_id: Option<&str>) -> (SurfaceId, ToplevelId, Vec<ClientEvent>) {
        let mut events = Vec::new();
        let surface = state.surfaces.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        if let Some(app_id) = app_id {
            state.set_toplevel_app_id(id, app_id);
        }
        state.commit_surface(surface, false, &mut events);
        state.flush_configures(&mut events);
        let serial = last_serial(&events, id);
        assert!(state.ack_configure(surface, serial));
        attach(state, surface, 200, 100);
        state.commit_surface(surface, false, &mut events);
        (surface, id, events)
    }

    /// Answer the latest configure with a buffer of the configured size
    fn settle(state: &mut CompositorState, surface: SurfaceId, id: ToplevelId) {
        let mut events = Vec::new();
        state.flush_configures(&mut events);
        let Some(ClientEvent::ToplevelConfigure { serial, configure, .. }) = events
            .iter()
            .rev()
            .find(|e| matches!(e, ClientEvent::ToplevelConfigure { toplevel, .. } if *toplevel == id))
            .cloned()
        else {
            return;
        };
        state.ack_configure(surface, serial);
        if configure.width > 0 && configure.height > 0 {
            attach(state, surface, configure.width as u32, configure.height as u32);
        }
        state.commit_surface(surface, false, &mut events);
    }

    #[test]
    fn test_initial_commit_schedules_client_sized_configure() {
        let mut state = state();
        let surface = state.surfaces.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        let mut events = Vec::new();
        state.commit_surface(surface, false, &mut events);
        state.flush_configures(&mut events);

        let configure = events.iter().find_map(|e| match e {
            ClientEvent::ToplevelConfigure { configure, .. } => Some(*configure),
            _ => None,
        });
        assert_eq!(configure.map(|c| (c.width, c.height)), Some((0, 0)));
        assert!(!state.toplevels.get(id).unwrap().mapped);
    }

    #[test]
    fn test_map_focuses_and_shows() {
        let mut state = state();
        let (surface, id, events) = mapped(&mut state, None);
        let toplevel = state.toplevels.get(id).unwrap();
        assert!(toplevel.mapped);
        assert!(state.scene.is_visible(toplevel.node));
        assert_eq!(state.toplevels.front(), Some(id));
        assert_eq!(state.seat.keyboard_focus(), Some(surface));
        assert!(events.iter().any(|e| matches!(
            e,
            ClientEvent::Keyboard { surface: s, event: crate::protocol::KeyboardEvent::Enter { .. } } if *s == surface
        )));
    }

    #[test]
    fn test_map_without_ack_does_not_map() {
        let mut state = state();
        let surface = state.surfaces.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        let mut events = Vec::new();
        state.commit_surface(surface, false, &mut events);
        attach(&mut state, surface, 10, 10);
        state.commit_surface(surface, false, &mut events);
        assert!(!state.toplevels.get(id).unwrap().mapped);
    }

    #[test]
    fn test_focus_transfers_activation() {
        let mut state = state();
        let (_, a, _) = mapped(&mut state, None);
        let (surface_b, b, _) = mapped(&mut state, None);

        assert_eq!(state.toplevels.order(), &[b, a]);
        assert!(!state.toplevels.get(a).unwrap().scheduled.activated);
        assert!(state.toplevels.get(b).unwrap().scheduled.activated);
        assert_eq!(state.seat.keyboard_focus(), Some(surface_b));

        let mut events = Vec::new();
        state.focus_toplevel(a, &mut events);
        assert_eq!(state.toplevels.order(), &[a, b]);
        assert!(state.toplevels.get(a).unwrap().scheduled.activated);
        assert!(!state.toplevels.get(b).unwrap().scheduled.activated);

        // Focusing again changes nothing
        events.clear();
        state.focus_toplevel(a, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn test_reopen_restores_position() {
        let mut state = state();
        let (surface, id, mut events) = mapped(&mut state, Some("Casilda:app1"));
        assert_eq!(state.scene.position(state.toplevels.get(id).unwrap().node), Some((32, 32)));

        state.configure_toplevel(id, 100, 150, 0, 0);
        state.save_position(id);
        state.destroy_surface(surface, &mut events);
        assert!(state.toplevels.is_empty());

        let (_, reopened, _) = mapped(&mut state, Some("Casilda:app1"));
        let node = state.toplevels.get(reopened).unwrap().node;
        assert_eq!(state.scene.position(node), Some((100, 150)));
    }

    #[test]
    fn test_maximize_round_trip() {
        let mut state = state();
        let (surface, id, _) = mapped(&mut state, None);
        state.configure_toplevel(id, 40, 50, 0, 0);
        settle(&mut state, surface, id);

        state.request_maximize(id, true);
        settle(&mut state, surface, id);
        let toplevel = state.toplevels.get(id).unwrap();
        assert!(toplevel.current.maximized);
        assert_eq!((toplevel.current.width, toplevel.current.height), (800, 600));
        assert_eq!(state.scene.position(toplevel.node), Some((0, 0)));

        state.request_maximize(id, false);
        settle(&mut state, surface, id);
        let toplevel = state.toplevels.get(id).unwrap();
        assert!(!toplevel.current.maximized);
        assert_eq!((toplevel.current.width, toplevel.current.height), (200, 100));
        assert_eq!(state.scene.position(toplevel.node), Some((40, 50)));
    }

    #[test]
    fn test_maximize_before_configure_is_ignored() {
        let mut state = state();
        let surface = state.surfaces.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        state.request_maximize(id, true);
        let toplevel = state.toplevels.get(id).unwrap();
        assert!(toplevel.requested.maximized);
        assert!(!toplevel.scheduled.maximized);
    }

    #[test]
    fn test_widget_resize_follows_maximized() {
        let mut state = state();
        let (surface, id, _) = mapped(&mut state, None);
        settle(&mut state, surface, id);
        state.request_maximize(id, true);
        settle(&mut state, surface, id);

        state.size_allocate(1024, 768, &mut Vec::new());
        settle(&mut state, surface, id);
        let node = state.toplevels.get(id).unwrap().node;
        assert_eq!(state.scene.bounds(node, &state.surfaces), Rect::new(0, 0, 1024, 768));
    }

    #[test]
    fn test_null_buffer_unmaps() {
        let mut state = state();
        let (surface, id, mut events) = mapped(&mut state, None);
        state.surfaces.get_mut(surface).unwrap().attach(None);
        state.commit_surface(surface, false, &mut events);

        let toplevel = state.toplevels.get(id).unwrap();
        assert!(!toplevel.mapped);
        assert!(!toplevel.initialized);
        assert!(state.toplevels.order().is_empty());
        assert_eq!(state.seat.keyboard_focus(), None);
    }

    #[test]
    fn test_activation_raises_without_focus() {
        let mut state = state();
        let (_, a, _) = mapped(&mut state, None);
        let (surface_b, _, _) = mapped(&mut state, None);
        let surface_a = state.toplevels.get(a).unwrap().surface;

        state.activate_surface(surface_a);
        let root = state.scene.get(state.scene.root()).unwrap();
        assert_eq!(root.children.last(), Some(&state.toplevels.get(a).unwrap().node));
        assert_eq!(state.seat.keyboard_focus(), Some(surface_b));
    }

    #[test]
    fn test_popup_placed_under_parent() {
        let mut state = state();
        let (parent, id, _) = mapped(&mut state, None);
        state.configure_toplevel(id, 10, 20, 0, 0);

        let surface = state.surfaces.create_surface();
        let popup = state.new_popup(surface, parent, Rect::new(5, 6, 50, 40)).unwrap();
        let mut events = Vec::new();
        state.commit_surface(surface, false, &mut events);
        state.flush_configures(&mut events);

        let serial = events
            .iter()
            .find_map(|e| match e {
                ClientEvent::PopupConfigure { popup: p, serial, geometry, .. } if *p == popup => {
                    assert_eq!(*geometry, Rect::new(5, 6, 50, 40));
                    Some(*serial)
                }
                _ => None,
            })
            .unwrap();
        assert!(state.ack_configure(surface, serial));
        attach(&mut state, surface, 50, 40);
        state.commit_surface(surface, false, &mut events);

        let node = state.popups.get(popup).unwrap().node;
        assert!(state.scene.is_visible(node));
        assert_eq!(state.scene.absolute_position(node), Some((15, 26)));

        let hit = state.scene.toplevel_at(20.0, 30.0, &state.surfaces).unwrap();
        assert_eq!(hit.surface, surface);
        assert_eq!(hit.toplevel, Some(id));
    }

    #[test]
    fn test_popup_without_xdg_parent_rejected() {
        let mut state = state();
        let parent = state.surfaces.create_surface();
        let surface = state.surfaces.create_surface();
        assert!(state.new_popup(surface, parent, Rect::default()).is_err());
    }

    #[test]
    fn test_subsurface_position_applied_on_parent_commit() {
        let mut state = state();
        let (parent, _, mut events) = mapped(&mut state, None);
        let child = state.surfaces.create_surface();
        state.new_subsurface(child, parent).unwrap();
        state.set_subsurface_position(child, 30, 40);

        let node = state.surfaces.get(child).unwrap().node.unwrap();
        assert_eq!(state.scene.position(node), Some((0, 0)));
        state.commit_surface(parent, false, &mut events);
        assert_eq!(state.scene.position(node), Some((30, 40)));

        state.destroy_subsurface(child);
        assert!(!state.scene.contains(node));
        assert!(state.surfaces.get(parent).unwrap().children.is_empty());
    }

    #[test]
    fn test_subsurface_cycle_rejected() {
        let mut state = state();
        let a = state.surfaces.create_surface();
        assert!(state.new_subsurface(a, a).is_err());
    }

    #[test]
    fn test_frame_callbacks_request_frame() {
        let mut state = state();
        let surface = state.surfaces.create_surface();
        state.commit_surface(surface, true, &mut Vec::new());
        assert!(state.backend.output().unwrap().needs_frame());
    }
}
