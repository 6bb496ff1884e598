//! Keyboard handling and XKB integration
//!
//! The host forwards hardware key codes and its own modifier mask; this
//! module tracks pressed keys, translates the modifier mask into xkb
//! modifier bits and owns the keymap advertised to clients.

use std::fs::File;
use std::io::Write;
use std::os::unix::io::OwnedFd;

use bitflags::bitflags;
use log::debug;
use rustix::fs::{MemfdFlags, SealFlags};
use xkbcommon::xkb;

use crate::compositor::SurfaceId;

/// Offset between host hardware key codes and evdev codes
pub const KEYCODE_OFFSET: u32 = 8;

bitflags! {
    /// Modifier mask as reported by the host toolkit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HostModifiers: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const ALT = 1 << 3;
        const SUPER = 1 << 26;
        const HYPER = 1 << 27;
        const META = 1 << 28;
    }
}

bitflags! {
    /// Depressed modifier bits sent in `wl_keyboard.modifiers`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyboardModifiers: u32 {
        const SHIFT = 1 << 0;
        const CAPS = 1 << 1;
        const CTRL = 1 << 2;
        const ALT = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const LOGO = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

impl From<HostModifiers> for KeyboardModifiers {
    fn from(host: HostModifiers) -> Self {
        const TABLE: [(HostModifiers, KeyboardModifiers); 7] = [
            (HostModifiers::SHIFT, KeyboardModifiers::SHIFT),
            (HostModifiers::LOCK, KeyboardModifiers::CAPS),
            (HostModifiers::CONTROL, KeyboardModifiers::CTRL),
            (HostModifiers::ALT, KeyboardModifiers::ALT),
            (HostModifiers::SUPER, KeyboardModifiers::LOGO),
            (HostModifiers::HYPER, KeyboardModifiers::MOD2),
            (HostModifiers::META, KeyboardModifiers::MOD3),
        ];
        TABLE
            .iter()
            .filter(|(h, _)| host.contains(*h))
            .fold(KeyboardModifiers::empty(), |acc, (_, m)| acc | *m)
    }
}

/// Keyboard modifier state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Depressed modifiers (currently held down)
    pub depressed: u32,
    /// Latched modifiers (sticky, cleared on next key)
    pub latched: u32,
    /// Locked modifiers (toggled, like caps lock)
    pub locked: u32,
    /// Keyboard group/layout
    pub group: u32,
}

/// RMLVO names used to compile the fallback keymap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeymapNames {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
}

/// Keymap errors
#[derive(Debug, thiserror::Error)]
pub enum KeymapError {
    #[error("Failed to compile keymap from {0:?}")]
    Compile(KeymapNames),
    #[error("Failed to create keymap file: {0}")]
    File(#[from] std::io::Error),
}

/// Compile a keymap with libxkbcommon and serialize it to text
pub fn compile_keymap(names: &KeymapNames) -> Result<String, KeymapError> {
    let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
    let keymap = xkb::Keymap::new_from_names(
        &context,
        &names.rules,
        &names.model,
        &names.layout,
        &names.variant,
        names.options.clone(),
        xkb::COMPILE_NO_FLAGS,
    )
    .ok_or_else(|| KeymapError::Compile(names.clone()))?;
    Ok(keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1))
}

/// A sealed memfd holding a keymap, ready for `wl_keyboard.keymap`
#[derive(Debug)]
pub struct KeymapFile {
    pub fd: OwnedFd,
    /// Size including the trailing NUL
    pub size: u32,
}

/// Write a keymap into a sealed memfd
pub fn keymap_file(keymap: &str) -> Result<KeymapFile, KeymapError> {
    let fd = rustix::fs::memfd_create(
        "casilda-keymap",
        MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING,
    )
    .map_err(std::io::Error::from)?;

    let mut file = File::from(fd);
    file.write_all(keymap.as_bytes())?;
    file.write_all(&[0])?;
    let fd = OwnedFd::from(file);

    rustix::fs::fcntl_add_seals(
        &fd,
        SealFlags::SHRINK | SealFlags::GROW | SealFlags::WRITE | SealFlags::SEAL,
    )
    .map_err(std::io::Error::from)?;

    Ok(KeymapFile {
        fd,
        size: keymap.len() as u32 + 1,
    })
}

/// Keyboard state
#[derive(Debug)]
pub struct Keyboard {
    /// Currently focused surface
    focus: Option<SurfaceId>,
    /// Currently pressed keys (evdev codes)
    pressed_keys: Vec<u32>,
    /// Modifier state
    modifiers: ModifierState,
    /// Repeat rate (characters per second)
    repeat_rate: i32,
    /// Repeat delay (milliseconds)
    repeat_delay: i32,
    /// Keymap string (XKB text format)
    keymap: String,
}

impl Keyboard {
    /// Create a keyboard advertising `keymap`
    pub fn new(keymap: String) -> Self {
        Self {
            focus: None,
            pressed_keys: Vec::new(),
            modifiers: ModifierState::default(),
            repeat_rate: 25,
            repeat_delay: 600,
            keymap,
        }
    }

    /// Set keyboard focus, returning the previous one
    pub fn set_focus(&mut self, surface: Option<SurfaceId>) -> Option<SurfaceId> {
        std::mem::replace(&mut self.focus, surface)
    }

    /// Get the currently focused surface
    pub fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    /// Handle a key press
    pub fn key_press(&mut self, keycode: u32) -> bool {
        if !self.pressed_keys.contains(&keycode) {
            self.pressed_keys.push(keycode);
            debug!("Key pressed: {}", keycode);
            true
        } else {
            false
        }
    }

    /// Handle a key release
    pub fn key_release(&mut self, keycode: u32) -> bool {
        if let Some(idx) = self.pressed_keys.iter().position(|&k| k == keycode) {
            self.pressed_keys.remove(idx);
            debug!("Key released: {}", keycode);
            true
        } else {
            false
        }
    }

    /// Replace the depressed modifiers, returning whether anything changed
    pub fn set_depressed(&mut self, depressed: KeyboardModifiers) -> bool {
        let changed = self.modifiers.depressed != depressed.bits();
        self.modifiers.depressed = depressed.bits();
        changed
    }

    /// Select the active layout group
    pub fn set_group(&mut self, group: u32) {
        self.modifiers.group = group;
    }

    /// Get current modifier state
    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    /// Get currently pressed keys
    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed_keys
    }

    /// Set repeat rate and delay
    pub fn set_repeat_info(&mut self, rate: i32, delay: i32) {
        self.repeat_rate = rate;
        self.repeat_delay = delay;
    }

    /// Get repeat info
    pub fn repeat_info(&self) -> (i32, i32) {
        (self.repeat_rate, self.repeat_delay)
    }

    /// Get the keymap
    pub fn keymap(&self) -> &str {
        &self.keymap
    }
}
