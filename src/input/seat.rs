//! Input seat coordination
//!
//! The seat owns pointer and keyboard focus and emits the enter/leave
//! events that go with focus changes. Enter and leave are only sent when the
//! focused surface actually changes.

use log::debug;

use super::{Keyboard, KeyboardModifiers, Pointer};
use crate::compositor::{SerialCounter, SurfaceId};
use crate::protocol::seat::SeatCapabilities;
use crate::protocol::{
    AxisType, ButtonState, ClientEvent, ClientSink, KeyState, KeyboardEvent, PointerEvent,
};

/// Input seat that coordinates keyboard and pointer
#[derive(Debug)]
pub struct Seat {
    /// Seat name
    name: String,
    /// Keyboard device
    keyboard: Keyboard,
    /// Pointer device
    pointer: Pointer,
}

impl Seat {
    /// Create "seat0" with a keyboard advertising `keymap`
    pub fn new(keymap: String) -> Self {
        Self {
            name: "seat0".to_string(),
            keyboard: Keyboard::new(keymap),
            pointer: Pointer::new(),
        }
    }

    /// Get the seat name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pointer and keyboard, no touch
    pub fn capabilities(&self) -> SeatCapabilities {
        SeatCapabilities {
            pointer: true,
            keyboard: true,
            touch: false,
        }
    }

    /// Get keyboard reference
    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// Get mutable keyboard reference
    pub fn keyboard_mut(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    /// Get pointer reference
    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// Get mutable pointer reference
    pub fn pointer_mut(&mut self) -> &mut Pointer {
        &mut self.pointer
    }

    /// Get the keyboard-focused surface
    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard.focus()
    }

    /// Get the pointer-focused surface
    pub fn pointer_focus(&self) -> Option<SurfaceId> {
        self.pointer.focus()
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    /// Give pointer focus to `surface` at surface-local (sx, sy)
    pub fn pointer_enter(
        &mut self,
        surface: SurfaceId,
        sx: f64,
        sy: f64,
        serials: &SerialCounter,
        sink: &mut dyn ClientSink,
    ) {
        if self.pointer.focus() == Some(surface) {
            return;
        }
        if let Some(old) = self.pointer.set_focus(Some(surface), sx, sy) {
            sink.send(ClientEvent::Pointer {
                surface: old,
                event: PointerEvent::Leave {
                    serial: serials.next(),
                },
            });
        }
        debug!("Pointer focus -> {:?}", surface);
        sink.send(ClientEvent::Pointer {
            surface,
            event: PointerEvent::Enter {
                serial: serials.next(),
                x: sx,
                y: sy,
            },
        });
    }

    /// Drop pointer focus
    pub fn pointer_clear_focus(&mut self, serials: &SerialCounter, sink: &mut dyn ClientSink) {
        if let Some(old) = self.pointer.set_focus(None, 0.0, 0.0) {
            debug!("Pointer focus cleared");
            sink.send(ClientEvent::Pointer {
                surface: old,
                event: PointerEvent::Leave {
                    serial: serials.next(),
                },
            });
        }
    }

    /// Motion within the focused surface
    pub fn pointer_motion(&mut self, time: u32, sx: f64, sy: f64, sink: &mut dyn ClientSink) {
        self.pointer.motion(sx, sy);
        if let Some(surface) = self.pointer.focus() {
            sink.send(ClientEvent::Pointer {
                surface,
                event: PointerEvent::Motion { time, x: sx, y: sy },
            });
        }
    }

    /// Button press or release on the focused surface
    pub fn pointer_button(
        &mut self,
        time: u32,
        button: u32,
        state: ButtonState,
        serials: &SerialCounter,
        sink: &mut dyn ClientSink,
    ) {
        let changed = match state {
            ButtonState::Pressed => self.pointer.button_press(button),
            ButtonState::Released => self.pointer.button_release(button),
        };
        if !changed {
            return;
        }
        if let Some(surface) = self.pointer.focus() {
            sink.send(ClientEvent::Pointer {
                surface,
                event: PointerEvent::Button {
                    serial: serials.next(),
                    time,
                    button,
                    state,
                },
            });
        }
    }

    /// Wheel scroll on the focused surface.
    ///
    /// `value` is the motion in surface units, `notches` the raw wheel delta
    /// it was scaled from.
    pub fn pointer_axis(
        &mut self,
        time: u32,
        axis: AxisType,
        value: f64,
        notches: f64,
        sink: &mut dyn ClientSink,
    ) {
        if let Some(surface) = self.pointer.focus() {
            sink.send(ClientEvent::Pointer {
                surface,
                event: PointerEvent::Axis {
                    time,
                    axis,
                    value,
                    discrete: notches.round() as i32,
                    value120: (notches * 120.0).round() as i32,
                },
            });
        }
    }

    /// Close a group of pointer events
    pub fn pointer_frame(&mut self, sink: &mut dyn ClientSink) {
        if let Some(surface) = self.pointer.focus() {
            sink.send(ClientEvent::Pointer {
                surface,
                event: PointerEvent::Frame,
            });
        }
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    /// Give keyboard focus to `surface`, sending held keys and modifiers
    pub fn keyboard_enter(&mut self, surface: SurfaceId, serials: &SerialCounter, sink: &mut dyn ClientSink) {
        if self.keyboard.focus() == Some(surface) {
            return;
        }
        if let Some(old) = self.keyboard.set_focus(Some(surface)) {
            sink.send(ClientEvent::Keyboard {
                surface: old,
                event: KeyboardEvent::Leave {
                    serial: serials.next(),
                },
            });
        }
        debug!("Keyboard focus -> {:?}", surface);
        sink.send(ClientEvent::Keyboard {
            surface,
            event: KeyboardEvent::Enter {
                serial: serials.next(),
                keys: self.keyboard.pressed_keys().to_vec(),
            },
        });
        self.send_modifiers(surface, serials, sink);
    }

    /// Drop keyboard focus
    pub fn keyboard_clear_focus(&mut self, serials: &SerialCounter, sink: &mut dyn ClientSink) {
        if let Some(old) = self.keyboard.set_focus(None) {
            debug!("Keyboard focus cleared");
            sink.send(ClientEvent::Keyboard {
                surface: old,
                event: KeyboardEvent::Leave {
                    serial: serials.next(),
                },
            });
        }
    }

    /// Key press or release, `key` being an evdev code
    pub fn keyboard_key(
        &mut self,
        time: u32,
        key: u32,
        state: KeyState,
        serials: &SerialCounter,
        sink: &mut dyn ClientSink,
    ) {
        match state {
            KeyState::Pressed => self.keyboard.key_press(key),
            KeyState::Released => self.keyboard.key_release(key),
        };
        if let Some(surface) = self.keyboard.focus() {
            sink.send(ClientEvent::Keyboard {
                surface,
                event: KeyboardEvent::Key {
                    serial: serials.next(),
                    time,
                    key,
                    state,
                },
            });
        }
    }

    /// Update depressed modifiers and notify the focused client
    pub fn keyboard_modifiers(
        &mut self,
        modifiers: KeyboardModifiers,
        serials: &SerialCounter,
        sink: &mut dyn ClientSink,
    ) {
        if !self.keyboard.set_depressed(modifiers) {
            return;
        }
        if let Some(surface) = self.keyboard.focus() {
            self.send_modifiers(surface, serials, sink);
        }
    }

    fn send_modifiers(&self, surface: SurfaceId, serials: &SerialCounter, sink: &mut dyn ClientSink) {
        let mods = self.keyboard.modifiers();
        sink.send(ClientEvent::Keyboard {
            surface,
            event: KeyboardEvent::Modifiers {
                serial: serials.next(),
                depressed: mods.depressed,
                latched: mods.latched,
                locked: mods.locked,
                group: mods.group,
            },
        });
    }

    /// Forget a destroyed surface without sending leave events
    pub fn surface_destroyed(&mut self, surface: SurfaceId) {
        if self.pointer.focus() == Some(surface) {
            self.pointer.set_focus(None, 0.0, 0.0);
        }
        if self.keyboard.focus() == Some(surface) {
            self.keyboard.set_focus(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat() -> Seat {
        Seat::new(String::new())
    }

    #[test]
    fn test_seat_new() {
        let seat = seat();
        assert_eq!(seat.name(), "seat0");
        assert_eq!(seat.capabilities().to_wayland(), 3);
    }

    #[test]
    fn test_pointer_enter_is_deduplicated() {
        let mut seat = seat();
        let serials = SerialCounter::new();
        let mut events = Vec::new();

        seat.pointer_enter(SurfaceId(1), 1.0, 2.0, &serials, &mut events);
        seat.pointer_enter(SurfaceId(1), 3.0, 4.0, &serials, &mut events);
        assert_eq!(events.len(), 1);

        seat.pointer_enter(SurfaceId(2), 0.0, 0.0, &serials, &mut events);
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1],
            ClientEvent::Pointer {
                surface: SurfaceId(1),
                event: PointerEvent::Leave { .. }
            }
        ));
        assert!(matches!(
            events[2],
            ClientEvent::Pointer {
                surface: SurfaceId(2),
                event: PointerEvent::Enter { .. }
            }
        ));
    }

    #[test]
    fn test_events_without_focus_are_dropped() {
        let mut seat = seat();
        let serials = SerialCounter::new();
        let mut events = Vec::new();

        seat.pointer_motion(0, 1.0, 1.0, &mut events);
        seat.pointer_button(0, 0x110, ButtonState::Pressed, &serials, &mut events);
        seat.pointer_frame(&mut events);
        seat.keyboard_key(0, 30, KeyState::Pressed, &serials, &mut events);
        assert!(events.is_empty());
        assert_eq!(seat.keyboard().pressed_keys(), &[30]);
    }

    #[test]
    fn test_keyboard_enter_sends_keys_then_modifiers() {
        let mut seat = seat();
        let serials = SerialCounter::new();
        let mut events = Vec::new();

        seat.keyboard_key(0, 42, KeyState::Pressed, &serials, &mut events);
        seat.keyboard_modifiers(KeyboardModifiers::SHIFT, &serials, &mut events);
        seat.keyboard_enter(SurfaceId(5), &serials, &mut events);

        assert_eq!(events.len(), 2);
        match &events[0] {
            ClientEvent::Keyboard {
                event: KeyboardEvent::Enter { keys, .. },
                ..
            } => assert_eq!(keys, &vec![42]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            events[1],
            ClientEvent::Keyboard {
                event: KeyboardEvent::Modifiers { depressed: 1, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_surface_destroyed_clears_focus_silently() {
        let mut seat = seat();
        let serials = SerialCounter::new();
        let mut events = Vec::new();
        seat.pointer_enter(SurfaceId(1), 0.0, 0.0, &serials, &mut events);
        seat.keyboard_enter(SurfaceId(1), &serials, &mut events);
        events.clear();

        seat.surface_destroyed(SurfaceId(1));
        assert_eq!(seat.pointer_focus(), None);
        assert_eq!(seat.keyboard_focus(), None);
        seat.pointer_clear_focus(&serials, &mut events);
        assert!(events.is_empty());
    }
}
