//! Protocol objects owned by connected clients
//!
//! The compositor core addresses clients through surface, toplevel and
//! popup ids. [`ClientResources`] keeps the live wayland-server resources
//! behind those ids and turns every [`ClientEvent`] into wire messages.

use std::collections::HashMap;

use log::trace;
use wayland_protocols::xdg::shell::server::{xdg_popup, xdg_surface, xdg_toplevel};
use wayland_server::protocol::{wl_buffer, wl_callback, wl_keyboard, wl_output, wl_pointer, wl_surface};
use wayland_server::Resource;

use crate::backend::virtual_output::{OUTPUT_DESCRIPTION, OUTPUT_NAME};
use crate::compositor::{PopupId, SurfaceId, ToplevelConfigure, ToplevelId};
use crate::protocol::{AxisType, ButtonState, ClientEvent, ClientSink, KeyState, KeyboardEvent, PointerEvent};

/// Live protocol objects, keyed by compositor ids
#[derive(Debug, Default)]
pub struct ClientResources {
    pub surfaces: HashMap<SurfaceId, wl_surface::WlSurface>,
    /// Buffers attached since the last commit; `None` detaches
    pub pending_buffers: HashMap<SurfaceId, Option<wl_buffer::WlBuffer>>,
    /// Frame callbacks requested since the last commit
    pub pending_frames: HashMap<SurfaceId, Vec<wl_callback::WlCallback>>,
    /// Committed frame callbacks waiting for a presented frame
    pub frames: HashMap<SurfaceId, Vec<wl_callback::WlCallback>>,
    pub xdg_surfaces: HashMap<SurfaceId, xdg_surface::XdgSurface>,
    pub toplevels: HashMap<ToplevelId, xdg_toplevel::XdgToplevel>,
    pub popups: HashMap<PopupId, xdg_popup::XdgPopup>,
    pub pointers: Vec<wl_pointer::WlPointer>,
    pub keyboards: Vec<wl_keyboard::WlKeyboard>,
    pub outputs: Vec<wl_output::WlOutput>,
}

impl ClientResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move pending frame callbacks to the committed list.
    ///
    /// Returns true when the surface waits for a frame.
    pub fn commit_frames(&mut self, surface: SurfaceId) -> bool {
        if let Some(pending) = self.pending_frames.remove(&surface) {
            self.frames.entry(surface).or_default().extend(pending);
        }
        self.frames.get(&surface).is_some_and(|f| !f.is_empty())
    }

    /// Drop everything held for a destroyed surface
    pub fn forget_surface(&mut self, surface: SurfaceId) {
        self.surfaces.remove(&surface);
        self.pending_buffers.remove(&surface);
        self.pending_frames.remove(&surface);
        self.frames.remove(&surface);
        self.xdg_surfaces.remove(&surface);
    }

    /// Drop every resource reference
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Send the current mode and identity of the output
    pub fn send_output_info(output: &wl_output::WlOutput, width: i32, height: i32) {
        output.geometry(
            0,
            0,
            0,
            0,
            wl_output::Subpixel::Unknown,
            "Casilda".to_string(),
            OUTPUT_NAME.to_string(),
            wl_output::Transform::Normal,
        );
        output.mode(wl_output::Mode::Current | wl_output::Mode::Preferred, width, height, 0);
        if output.version() >= 2 {
            output.scale(1);
        }
        if output.version() >= 4 {
            output.name(OUTPUT_NAME.to_string());
            output.description(OUTPUT_DESCRIPTION.to_string());
        }
        if output.version() >= 2 {
            output.done();
        }
    }

    fn send_pointer(&self, surface: &wl_surface::WlSurface, event: &PointerEvent) {
        let owned = self
            .pointers
            .iter()
            .filter(|p| p.is_alive() && p.id().same_client_as(&surface.id()));

        for pointer in owned {
            match *event {
                PointerEvent::Enter { serial, x, y } => pointer.enter(serial, surface, x, y),
                PointerEvent::Leave { serial } => pointer.leave(serial, surface),
                PointerEvent::Motion { time, x, y } => pointer.motion(time, x, y),
                PointerEvent::Button {
                    serial,
                    time,
                    button,
                    state,
                } => {
                    let state = match state {
                        ButtonState::Pressed => wl_pointer::ButtonState::Pressed,
                        ButtonState::Released => wl_pointer::ButtonState::Released,
                    };
                    pointer.button(serial, time, button, state);
                }
                PointerEvent::Axis {
                    time,
                    axis,
                    value,
                    discrete,
                    value120,
                } => {
                    let axis = match axis {
                        AxisType::VerticalScroll => wl_pointer::Axis::VerticalScroll,
                        AxisType::HorizontalScroll => wl_pointer::Axis::HorizontalScroll,
                    };
                    let version = pointer.version();
                    if version >= 5 {
                        pointer.axis_source(wl_pointer::AxisSource::Wheel);
                    }
                    if version >= 8 {
                        pointer.axis_value120(axis, value120);
                    } else if version >= 5 && discrete != 0 {
                        pointer.axis_discrete(axis, discrete);
                    }
                    pointer.axis(time, axis, value);
                }
                PointerEvent::Frame => {
                    if pointer.version() >= 5 {
                        pointer.frame();
                    }
                }
            }
        }
    }

    fn send_keyboard(&self, surface: &wl_surface::WlSurface, event: &KeyboardEvent) {
        let owned = self
            .keyboards
            .iter()
            .filter(|k| k.is_alive() && k.id().same_client_as(&surface.id()));

        for keyboard in owned {
            match event {
                KeyboardEvent::Enter { serial, keys } => {
                    let keys = keys.iter().flat_map(|k| k.to_ne_bytes()).collect();
                    keyboard.enter(*serial, surface, keys);
                }
                KeyboardEvent::Leave { serial } => keyboard.leave(*serial, surface),
                KeyboardEvent::Key {
                    serial,
                    time,
                    key,
                    state,
                } => {
                    let state = match state {
                        KeyState::Pressed => wl_keyboard::KeyState::Pressed,
                        KeyState::Released => wl_keyboard::KeyState::Released,
                    };
                    keyboard.key(*serial, *time, *key, state);
                }
                KeyboardEvent::Modifiers {
                    serial,
                    depressed,
                    latched,
                    locked,
                    group,
                } => keyboard.modifiers(*serial, *depressed, *latched, *locked, *group),
            }
        }
    }

    fn send_toplevel_configure(
        &self,
        toplevel: ToplevelId,
        surface: SurfaceId,
        serial: u32,
        configure: ToplevelConfigure,
    ) {
        let (Some(xdg_toplevel), Some(xdg_surface)) =
            (self.toplevels.get(&toplevel), self.xdg_surfaces.get(&surface))
        else {
            return;
        };

        let mut states = Vec::new();
        let flags = [
            (configure.maximized, xdg_toplevel::State::Maximized),
            (configure.fullscreen, xdg_toplevel::State::Fullscreen),
            (configure.resizing, xdg_toplevel::State::Resizing),
            (configure.activated, xdg_toplevel::State::Activated),
        ];
        for (set, state) in flags {
            if set {
                states.extend_from_slice(&(state as u32).to_ne_bytes());
            }
        }

        xdg_toplevel.configure(configure.width, configure.height, states);
        xdg_surface.configure(serial);
    }
}

impl ClientSink for ClientResources {
    fn send(&mut self, event: ClientEvent) {
        trace!("-> {:?}", event);
        match event {
            ClientEvent::Pointer { surface, event } => {
                if let Some(surface) = self.surfaces.get(&surface) {
                    self.send_pointer(surface, &event);
                }
            }
            ClientEvent::Keyboard { surface, event } => {
                if let Some(surface) = self.surfaces.get(&surface) {
                    self.send_keyboard(surface, &event);
                }
            }
            ClientEvent::ToplevelConfigure {
                toplevel,
                surface,
                serial,
                configure,
            } => self.send_toplevel_configure(toplevel, surface, serial, configure),
            ClientEvent::PopupConfigure {
                popup,
                surface,
                serial,
                geometry,
                reposition_token,
            } => {
                let (Some(xdg_popup), Some(xdg_surface)) =
                    (self.popups.get(&popup), self.xdg_surfaces.get(&surface))
                else {
                    return;
                };
                if let Some(token) = reposition_token.filter(|_| xdg_popup.version() >= 3) {
                    xdg_popup.repositioned(token);
                }
                xdg_popup.configure(geometry.x, geometry.y, geometry.width, geometry.height);
                xdg_surface.configure(serial);
            }
            ClientEvent::FrameDone { surface, time } => {
                for callback in self.frames.remove(&surface).unwrap_or_default() {
                    callback.done(time);
                }
            }
            ClientEvent::SurfaceEnter { surface } => {
                let Some(surface) = self.surfaces.get(&surface) else {
                    return;
                };
                for output in self
                    .outputs
                    .iter()
                    .filter(|o| o.id().same_client_as(&surface.id()))
                {
                    surface.enter(output);
                }
            }
            ClientEvent::OutputMode { width, height } => {
                for output in &self.outputs {
                    output.mode(wl_output::Mode::Current | wl_output::Mode::Preferred, width, height, 0);
                    if output.version() >= 2 {
                        output.done();
                    }
                }
            }
        }
    }
}
