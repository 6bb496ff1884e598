//! Input handling module
//!
//! This module provides keyboard, pointer, cursor and seat management, and
//! the router turning host toolkit input into seat events.

pub mod cursor;
pub mod keyboard;
pub mod pointer;
mod router;
pub mod seat;

pub use cursor::CursorCache;
pub use keyboard::{
    compile_keymap, keymap_file, HostModifiers, Keyboard, KeyboardModifiers, KeymapError,
    KeymapFile, KeymapNames, ModifierState, KEYCODE_OFFSET,
};
pub use pointer::{host_button_to_evdev, Pointer, PointerMode, PointerSession};
pub use seat::Seat;
