//! Input routing
//!
//! Turns host widget input into seat events. Pointer motion is forwarded
//! to the surface under the pointer, or drives an interactive move or
//! resize while a session is active. Client cursor surfaces end up as the
//! widget cursor.

use log::{debug, info};

use crate::compositor::{
    compute_resize, CommitInfo, CompositorState, Edges, ResizeGrab, SurfaceError, SurfaceId,
    SurfaceRole, ToplevelId,
};
use crate::input::{host_button_to_evdev, HostModifiers, KeyboardModifiers, PointerMode, KEYCODE_OFFSET};
use crate::protocol::{AxisType, ButtonState, ClientEvent, ClientSink, KeyState};

impl CompositorState {
    // ========================================================================
    // Pointer
    // ========================================================================

    /// The pointer entered the widget
    pub fn pointer_enter(&mut self, x: f64, y: f64, sink: &mut dyn ClientSink) {
        self.seat.pointer_mut().set_layout_position(x, y);
        self.process_motion(sink);
        self.seat.pointer_frame(sink);
    }

    /// The pointer moved inside the widget
    pub fn pointer_motion(&mut self, x: f64, y: f64, sink: &mut dyn ClientSink) {
        let (width, height) = self.widget_size();
        let x = x.clamp(0.0, width.max(0) as f64);
        let y = y.clamp(0.0, height.max(0) as f64);
        self.seat.pointer_mut().set_layout_position(x, y);
        self.process_motion(sink);
        self.seat.pointer_frame(sink);
    }

    /// The pointer left the widget
    pub fn pointer_leave(&mut self, sink: &mut dyn ClientSink) {
        self.seat.pointer_clear_focus(&self.serials, sink);
    }

    fn process_motion(&mut self, sink: &mut dyn ClientSink) {
        match self.session.mode {
            PointerMode::Move => self.process_move(),
            PointerMode::Resize => self.process_resize(),
            PointerMode::Forward => self.forward_motion(sink),
        }
    }

    fn forward_motion(&mut self, sink: &mut dyn ClientSink) {
        let (x, y) = self.seat.pointer().layout_position();
        let hit = self.scene.toplevel_at(x, y, &self.surfaces);

        if hit.and_then(|h| h.toplevel).is_none() {
            self.reset_cursor();
        }

        match hit {
            Some(hit) => {
                let time = self.time_msec();
                self.seat
                    .pointer_enter(hit.surface, hit.sx, hit.sy, &self.serials, sink);
                self.seat.pointer_motion(time, hit.sx, hit.sy, sink);
            }
            None => self.seat.pointer_clear_focus(&self.serials, sink),
        }
    }

    fn process_move(&mut self) {
        let Some(id) = self.session.grabbed else {
            return;
        };
        let Some(node) = self.toplevels.get(id).map(|t| t.node) else {
            return;
        };
        let (x, y) = self.seat.pointer().layout_position();
        let (grab_x, grab_y) = self.session.grab;
        self.scene
            .set_position(node, (x - grab_x) as i32, (y - grab_y) as i32);
        self.save_position(id);
    }

    fn process_resize(&mut self) {
        let Some(id) = self.session.grabbed else {
            return;
        };
        let Some(min_size) = self.toplevels.get(id).map(|t| t.min_size) else {
            return;
        };
        let grab = ResizeGrab {
            grab_x: self.session.grab.0,
            grab_y: self.session.grab.1,
            grab_box: self.session.grab_box,
            edges: self.session.edges,
        };
        let Some(new_box) = compute_resize(self.seat.pointer().layout_position(), &grab, min_size) else {
            return;
        };

        let geometry = self.geometry_box(id);
        let Some(toplevel) = self.toplevels.get_mut(id) else {
            return;
        };
        toplevel.set_size(new_box.width, new_box.height);
        self.scene.set_position(
            toplevel.node,
            new_box.x - geometry.x,
            new_box.y - geometry.y,
        );
        self.save_position(id);
        self.save_size(id, new_box.width, new_box.height);
    }

    /// Wheel scroll in notches
    pub fn scroll(&mut self, dx: f64, dy: f64, sink: &mut dyn ClientSink) {
        let time = self.time_msec();
        let step = self.config.scroll_step;

        if dx != 0.0 {
            self.seat
                .pointer_axis(time, AxisType::HorizontalScroll, dx * step, dx, sink);
            self.seat.pointer_frame(sink);
        }

        if dy != 0.0 {
            self.seat
                .pointer_axis(time, AxisType::VerticalScroll, dy * step, dy, sink);
            self.seat.pointer_frame(sink);
        }
    }

    /// Host button (1 left, 2 middle, 3 right) pressed or released
    pub fn button(&mut self, button: u32, pressed: bool, sink: &mut dyn ClientSink) {
        if pressed {
            self.host.grab_focus();
        }

        let Some(code) = host_button_to_evdev(button) else {
            info!("Unknown button {}", button);
            return;
        };
        let state = if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        };

        let time = self.time_msec();
        self.seat
            .pointer_button(time, code, state, &self.serials, sink);
        self.seat.pointer_frame(sink);

        if !pressed {
            self.end_pointer_session();
            return;
        }

        let (x, y) = self.seat.pointer().layout_position();
        if let Some(toplevel) = self
            .scene
            .toplevel_at(x, y, &self.surfaces)
            .and_then(|hit| hit.toplevel)
        {
            self.focus_toplevel(toplevel, sink);
        }
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    /// Host hardware keycode pressed or released
    pub fn key(&mut self, keycode: u32, pressed: bool, sink: &mut dyn ClientSink) {
        let Some(key) = keycode.checked_sub(KEYCODE_OFFSET) else {
            return;
        };
        let state = if pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        };
        let time = self.time_msec();
        self.seat
            .keyboard_key(time, key, state, &self.serials, sink);
    }

    /// Host modifier state changed
    pub fn modifiers(&mut self, modifiers: HostModifiers, sink: &mut dyn ClientSink) {
        self.seat
            .keyboard_modifiers(KeyboardModifiers::from(modifiers), &self.serials, sink);
    }

    // ========================================================================
    // Interactive move/resize
    // ========================================================================

    /// The toplevel's surface tree holds pointer focus
    fn has_pointer_focus(&self, id: ToplevelId) -> bool {
        let Some(toplevel) = self.toplevels.get(id) else {
            return false;
        };
        self.seat
            .pointer_focus()
            .is_some_and(|focus| self.surfaces.root_of(focus) == toplevel.surface)
    }

    /// xdg_toplevel.move
    pub fn request_move(&mut self, id: ToplevelId) {
        if !self.has_pointer_focus(id) {
            debug!("Ignoring move of {:?} without pointer focus", id);
            return;
        }
        let Some(toplevel) = self.toplevels.get(id) else {
            return;
        };
        if toplevel.fills_widget() {
            return;
        }
        let Some((nx, ny)) = self.scene.position(toplevel.node) else {
            return;
        };

        let (x, y) = self.seat.pointer().layout_position();
        self.end_pointer_session();
        self.session.begin_move(id, (x - nx as f64, y - ny as f64));
        debug!("Moving {:?}", id);
    }

    /// xdg_toplevel.resize
    pub fn request_resize(&mut self, id: ToplevelId, edges: Edges) {
        if !self.has_pointer_focus(id) {
            debug!("Ignoring resize of {:?} without pointer focus", id);
            return;
        }
        let Some(toplevel) = self.toplevels.get(id) else {
            return;
        };
        if toplevel.fills_widget() {
            return;
        }
        let Some((nx, ny)) = self.scene.position(toplevel.node) else {
            return;
        };

        let geometry = self.geometry_box(id);
        let border_x = nx
            + geometry.x
            + if edges.contains(Edges::RIGHT) {
                geometry.width
            } else {
                0
            };
        let border_y = ny
            + geometry.y
            + if edges.contains(Edges::BOTTOM) {
                geometry.height
            } else {
                0
            };

        let (x, y) = self.seat.pointer().layout_position();
        self.end_pointer_session();
        self.session.begin_resize(
            id,
            (x - border_x as f64, y - border_y as f64),
            geometry.translated(nx, ny),
            edges,
        );
        if let Some(toplevel) = self.toplevels.get_mut(id) {
            toplevel.set_resizing(true);
        }
        debug!("Resizing {:?} edges {:?}", id, edges);
    }

    /// Drop any move or resize grab, telling a resized toplevel it is done
    pub(crate) fn end_pointer_session(&mut self) {
        if self.session.mode == PointerMode::Resize {
            if let Some(toplevel) = self.session.grabbed.and_then(|id| self.toplevels.get_mut(id)) {
                toplevel.set_resizing(false);
            }
        }
        self.session.reset();
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    /// wl_pointer.set_cursor from the client holding pointer focus
    pub fn request_cursor(
        &mut self,
        surface: SurfaceId,
        hotspot: (i32, i32),
        sink: &mut dyn ClientSink,
    ) -> Result<(), SurfaceError> {
        self.surfaces
            .get_mut(surface)
            .ok_or(SurfaceError::UnknownSurface)?
            .set_role(SurfaceRole::Cursor)?;

        self.cursor.set_pending(surface, hotspot);
        sink.send(ClientEvent::SurfaceEnter { surface });
        debug!("Cursor surface {:?} hotspot {:?}", surface, hotspot);
        Ok(())
    }

    /// The pending cursor surface committed
    pub(crate) fn cursor_commit(&mut self, id: SurfaceId, info: CommitInfo) {
        let Some(buffer) = self.surfaces.get(id).and_then(|s| s.buffer.as_ref()) else {
            return;
        };
        self.cursor.apply_offset(info.dx, info.dy);

        match self.cursor.build_image(buffer) {
            Some(image) => {
                self.host.set_cursor(Some(image));
                self.cursor.clear_pending();
            }
            None => {
                debug!("Cursor buffer is not ARGB8888");
                self.reset_cursor();
            }
        }
    }

    /// Go back to the widget's default cursor
    pub fn reset_cursor(&mut self) {
        if self.cursor.image().is_none() && self.cursor.pending().is_none() {
            return;
        }
        self.host.set_cursor(None);
        self.cursor.reset();
    }
}
