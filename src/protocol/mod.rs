//! Wayland protocol support
//!
//! The compositor core never holds wayland-server resources. It describes
//! what every client should be told as [`ClientEvent`]s pushed into a
//! [`ClientSink`]; the server layer maps surface, toplevel and popup ids back
//! to protocol objects and sends the messages.
//!
//! - wl_region bookkeeping
//! - wl_seat event vocabulary
//! - xdg_positioner placement
//! - wl_shm pools and buffers

pub mod compositor;
pub mod seat;
pub mod shell;
pub mod shm;

pub use compositor::Region;
pub use seat::{AxisType, ButtonState, KeyState, KeyboardEvent, PointerEvent};
pub use shell::XdgPositioner;
pub use shm::WlShmHandler;

use crate::compositor::{PopupId, Rect, SurfaceId, ToplevelConfigure, ToplevelId};

/// A message for the client owning a surface
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// wl_pointer event targeting `surface`
    Pointer {
        surface: SurfaceId,
        event: PointerEvent,
    },
    /// wl_keyboard event targeting `surface`
    Keyboard {
        surface: SurfaceId,
        event: KeyboardEvent,
    },
    /// xdg_toplevel.configure followed by xdg_surface.configure
    ToplevelConfigure {
        toplevel: ToplevelId,
        surface: SurfaceId,
        serial: u32,
        configure: ToplevelConfigure,
    },
    /// Optional xdg_popup.repositioned, xdg_popup.configure and
    /// xdg_surface.configure
    PopupConfigure {
        popup: PopupId,
        surface: SurfaceId,
        serial: u32,
        geometry: Rect,
        reposition_token: Option<u32>,
    },
    /// Fire and drop the surface's committed frame callbacks
    FrameDone { surface: SurfaceId, time: u32 },
    /// wl_surface.enter for the output
    SurfaceEnter { surface: SurfaceId },
    /// The output mode changed, broadcast to every bound wl_output
    OutputMode { width: i32, height: i32 },
}

/// Destination for client-bound events
pub trait ClientSink {
    fn send(&mut self, event: ClientEvent);
}

impl ClientSink for Vec<ClientEvent> {
    fn send(&mut self, event: ClientEvent) {
        self.push(event);
    }
}
