//! Compositor configuration

use std::path::PathBuf;

use crate::input::KeymapNames;

/// Identity prefix of applications whose window geometry is remembered
pub const DEFAULT_IDENTITY_PREFIX: &str = "Casilda:";

/// Settings for one embedded compositor instance
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Explicit socket path, owned by the caller.
    ///
    /// When `None` a private temporary directory holding `wayland.sock` is
    /// created and removed again on teardown.
    pub socket: Option<PathBuf>,
    /// Background color, straight alpha RGBA in `[0, 1]`
    pub background: [f32; 4],
    /// App id prefix selecting windows with persisted geometry
    pub identity_prefix: String,
    /// Where windows with a fresh persisted state are first placed
    pub default_position: (i32, i32),
    /// Axis value sent per scroll notch
    pub scroll_step: f64,
    /// Fallback keymap when the host does not provide one
    pub keymap: KeymapNames,
    /// Keyboard repeat rate (keys per second) and delay (ms)
    pub repeat: (i32, i32),
}

impl CompositorConfig {
    /// Configuration listening on an explicit socket path
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket: Some(path.into()),
            ..Self::default()
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            socket: None,
            background: [1.0, 1.0, 1.0, 1.0],
            identity_prefix: DEFAULT_IDENTITY_PREFIX.to_string(),
            default_position: (32, 32),
            scroll_step: 15.0,
            keymap: KeymapNames::default(),
            repeat: (25, 600),
        }
    }
}
