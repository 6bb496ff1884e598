//! Compositor core module
//!
//! This module contains the core compositor logic including:
//! - Global compositor state management
//! - Surface management and damage tracking
//! - Toplevel and popup management with persisted window geometry
//! - The frame bridge between output frames and host paints

pub mod frame;
pub mod geometry;
pub mod popup;
mod shell;
pub mod state;
pub mod surface;
pub mod window;

pub use frame::FrameBridge;
pub use geometry::{compute_resize, Edges, Rect, ResizeGrab};
pub use popup::{Popup, PopupId, PopupManager};
pub use state::{CompositorState, SerialCounter};
pub use surface::{CommitInfo, DamageRect, Surface, SurfaceError, SurfaceId, SurfaceManager, SurfaceRole};
pub use window::{GeometryState, RequestedState, Toplevel, ToplevelConfigure, ToplevelId, ToplevelRegistry};
