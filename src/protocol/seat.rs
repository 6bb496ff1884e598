//! wl_seat event vocabulary
//!
//! Pointer and keyboard events the seat sends to the focused client. The
//! server layer turns them into wl_pointer / wl_keyboard messages on every
//! matching resource of the client owning the target surface.

/// Seat capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct SeatCapabilities {
    pub pointer: bool,
    pub keyboard: bool,
    pub touch: bool,
}

impl SeatCapabilities {
    /// Convert to Wayland capability bitmask
    pub fn to_wayland(&self) -> u32 {
        let mut caps = 0u32;
        if self.pointer {
            caps |= 1;
        }
        if self.keyboard {
            caps |= 2;
        }
        if self.touch {
            caps |= 4;
        }
        caps
    }
}

/// Keyboard events to send to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardEvent {
    /// Keyboard focus entered the surface, with the keys currently held
    Enter { serial: u32, keys: Vec<u32> },
    /// Keyboard focus left the surface
    Leave { serial: u32 },
    /// Key press or release, `key` is an evdev code
    Key {
        serial: u32,
        time: u32,
        key: u32,
        state: KeyState,
    },
    /// Modifier state changed
    Modifiers {
        serial: u32,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
}

/// Key state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released = 0,
    Pressed = 1,
}

/// Pointer events to send to clients
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    /// Pointer entered the surface at surface-local coordinates
    Enter { serial: u32, x: f64, y: f64 },
    /// Pointer left the surface
    Leave { serial: u32 },
    /// Pointer motion in surface-local coordinates
    Motion { time: u32, x: f64, y: f64 },
    /// Button press or release, `button` is an evdev code
    Button {
        serial: u32,
        time: u32,
        button: u32,
        state: ButtonState,
    },
    /// Wheel scroll; `discrete` counts whole notches, `value120` fractions of 1/120
    Axis {
        time: u32,
        axis: AxisType,
        value: f64,
        discrete: i32,
        value120: i32,
    },
    /// Frame delimiter
    Frame,
}

/// Button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released = 0,
    Pressed = 1,
}

/// Axis type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisType {
    VerticalScroll = 0,
    HorizontalScroll = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_capabilities() {
        let caps = SeatCapabilities {
            pointer: true,
            keyboard: true,
            touch: false,
        };
        assert_eq!(caps.to_wayland(), 3);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(ButtonState::Pressed as u32, 1);
        assert_eq!(KeyState::Released as u32, 0);
        assert_eq!(AxisType::HorizontalScroll as u32, 1);
    }
}
