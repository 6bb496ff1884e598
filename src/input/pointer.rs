//! Pointer handling
//!
//! Tracks pointer focus and buttons, plus the interaction session deciding
//! whether motion is forwarded to clients or drives an interactive move or
//! resize.

use log::debug;

use crate::compositor::{Edges, Rect, SurfaceId, ToplevelId};

/// Linux input event codes for the buttons the host can forward
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Map a host button ordinal (1 left, 2 middle, 3 right) to an evdev code
pub fn host_button_to_evdev(button: u32) -> Option<u32> {
    match button {
        1 => Some(BTN_LEFT),
        2 => Some(BTN_MIDDLE),
        3 => Some(BTN_RIGHT),
        _ => None,
    }
}

/// What pointer motion currently does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointerMode {
    /// Motion is forwarded to the surface under the pointer
    #[default]
    Forward,
    /// Motion moves the grabbed toplevel
    Move,
    /// Motion resizes the grabbed toplevel
    Resize,
}

/// Interactive move/resize session
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSession {
    pub mode: PointerMode,
    pub grabbed: Option<ToplevelId>,
    /// Pointer offset from the grabbed position or border
    pub grab: (f64, f64),
    /// Window geometry box in layout coordinates at grab time
    pub grab_box: Rect,
    pub edges: Edges,
}

impl PointerSession {
    /// Back to forwarding with no grab
    pub fn reset(&mut self) {
        if self.mode != PointerMode::Forward {
            debug!("Pointer mode {:?} -> Forward", self.mode);
        }
        *self = PointerSession::default();
    }

    /// Start moving a toplevel
    pub fn begin_move(&mut self, toplevel: ToplevelId, grab: (f64, f64)) {
        *self = PointerSession {
            mode: PointerMode::Move,
            grabbed: Some(toplevel),
            grab,
            ..PointerSession::default()
        };
    }

    /// Start resizing a toplevel
    pub fn begin_resize(&mut self, toplevel: ToplevelId, grab: (f64, f64), grab_box: Rect, edges: Edges) {
        *self = PointerSession {
            mode: PointerMode::Resize,
            grabbed: Some(toplevel),
            grab,
            grab_box,
            edges,
        };
    }

    /// Check whether `toplevel` is the current grab target
    pub fn is_grabbing(&self, toplevel: ToplevelId) -> bool {
        self.grabbed == Some(toplevel)
    }
}

/// Pointer state
#[derive(Debug, Default)]
pub struct Pointer {
    /// Currently focused surface
    focus: Option<SurfaceId>,
    /// Position in focused surface coordinates
    position: (f64, f64),
    /// Position in widget coordinates
    layout_position: (f64, f64),
    /// Currently pressed buttons
    pressed_buttons: Vec<u32>,
}

impl Pointer {
    /// Create a new pointer
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pointer focus, returning the previous one
    pub fn set_focus(&mut self, surface: Option<SurfaceId>, x: f64, y: f64) -> Option<SurfaceId> {
        self.position = (x, y);
        std::mem::replace(&mut self.focus, surface)
    }

    /// Get the currently focused surface
    pub fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    /// Update surface-local position
    pub fn motion(&mut self, x: f64, y: f64) {
        self.position = (x, y);
    }

    /// Get surface-local position
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Record the widget-space position
    pub fn set_layout_position(&mut self, x: f64, y: f64) {
        self.layout_position = (x, y);
    }

    /// Widget-space position
    pub fn layout_position(&self) -> (f64, f64) {
        self.layout_position
    }

    /// Handle a button press
    pub fn button_press(&mut self, button: u32) -> bool {
        if !self.pressed_buttons.contains(&button) {
            self.pressed_buttons.push(button);
            debug!("Button pressed: {}", button);
            true
        } else {
            false
        }
    }

    /// Handle a button release
    pub fn button_release(&mut self, button: u32) -> bool {
        if let Some(idx) = self.pressed_buttons.iter().position(|&b| b == button) {
            self.pressed_buttons.remove(idx);
            debug!("Button released: {}", button);
            true
        } else {
            false
        }
    }

    /// Get currently pressed buttons
    pub fn pressed_buttons(&self) -> &[u32] {
        &self.pressed_buttons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_mapping() {
        assert_eq!(host_button_to_evdev(1), Some(0x110));
        assert_eq!(host_button_to_evdev(2), Some(0x112));
        assert_eq!(host_button_to_evdev(3), Some(0x111));
        assert_eq!(host_button_to_evdev(4), None);
        assert_eq!(host_button_to_evdev(0), None);
    }

    #[test]
    fn test_button_press_release() {
        let mut pointer = Pointer::new();
        assert!(pointer.button_press(BTN_LEFT));
        assert!(!pointer.button_press(BTN_LEFT));
        assert!(pointer.button_release(BTN_LEFT));
        assert!(pointer.pressed_buttons().is_empty());
    }

    #[test]
    fn test_focus_change() {
        let mut pointer = Pointer::new();
        assert_eq!(pointer.set_focus(Some(SurfaceId(1)), 100.0, 50.0), None);
        assert_eq!(pointer.position(), (100.0, 50.0));
        assert_eq!(
            pointer.set_focus(Some(SurfaceId(2)), 0.0, 0.0),
            Some(SurfaceId(1))
        );
    }

    #[test]
    fn test_session_reset_from_any_mode() {
        let mut session = PointerSession::default();
        session.begin_move(ToplevelId(1), (5.0, 5.0));
        assert_eq!(session.mode, PointerMode::Move);
        assert!(session.is_grabbing(ToplevelId(1)));
        session.reset();
        assert_eq!(session, PointerSession::default());

        session.begin_resize(ToplevelId(2), (0.0, 0.0), Rect::new(0, 0, 10, 10), Edges::RIGHT);
        assert_eq!(session.mode, PointerMode::Resize);
        session.reset();
        assert_eq!(session.mode, PointerMode::Forward);
        assert_eq!(session.grabbed, None);
    }
}
