//! xdg-shell and xdg-activation dispatch
//!
//! Toplevels and popups are created here and handed to the compositor
//! under their surface ids. Configures travel back through
//! [`super::ClientResources`].

use std::sync::Mutex;

use log::{debug, warn};
use wayland_protocols::xdg::activation::v1::server::{xdg_activation_token_v1, xdg_activation_v1};
use wayland_protocols::xdg::shell::server::{xdg_popup, xdg_positioner, xdg_surface, xdg_toplevel, xdg_wm_base};
use wayland_server::backend::ClientId;
use wayland_server::protocol::wl_surface;
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource, WEnum};

use crate::compositor::{Edges, PopupId, Rect, SurfaceId, ToplevelId};
use crate::protocol::shell::{Anchor, Gravity};
use crate::protocol::XdgPositioner;

use super::ServerState;

/// Raw wire value of a protocol enum argument
fn raw<T: Into<u32>>(value: WEnum<T>) -> u32 {
    match value {
        WEnum::Value(value) => value.into(),
        WEnum::Unknown(raw) => raw,
    }
}

fn surface_id(surface: &wl_surface::WlSurface) -> Option<SurfaceId> {
    surface.data::<SurfaceId>().copied()
}

// ============================================================================
// xdg_wm_base
// ============================================================================

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_wm_base::XdgWmBase,
        request: xdg_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_wm_base::Request::CreatePositioner { id } => {
                debug!("Creating xdg_positioner");
                data_init.init(id, Mutex::new(XdgPositioner::new()));
            }
            xdg_wm_base::Request::GetXdgSurface { id, surface } => {
                let Some(surface_id) = surface_id(&surface) else {
                    data_init.post_error(id, xdg_wm_base::Error::InvalidSurfaceState, "unknown surface");
                    return;
                };
                debug!("Creating xdg_surface for {:?}", surface_id);
                let xdg_surface = data_init.init(id, XdgSurfaceData { surface: surface_id });
                state.clients.xdg_surfaces.insert(surface_id, xdg_surface);
            }
            xdg_wm_base::Request::Pong { serial } => {
                debug!("Pong {}", serial);
            }
            _ => {}
        }
    }
}

// ============================================================================
// xdg_positioner
// ============================================================================

impl Dispatch<xdg_positioner::XdgPositioner, Mutex<XdgPositioner>> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &xdg_positioner::XdgPositioner,
        request: xdg_positioner::Request,
        positioner: &Mutex<XdgPositioner>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let mut positioner = positioner.lock().unwrap_or_else(|e| e.into_inner());
        match request {
            xdg_positioner::Request::SetSize { width, height } => positioner.set_size(width, height),
            xdg_positioner::Request::SetAnchorRect {
                x,
                y,
                width,
                height,
            } => positioner.set_anchor_rect(x, y, width, height),
            xdg_positioner::Request::SetAnchor { anchor } => {
                positioner.set_anchor(Anchor::from_raw(raw(anchor)));
            }
            xdg_positioner::Request::SetGravity { gravity } => {
                positioner.set_gravity(Gravity::from_raw(raw(gravity)));
            }
            xdg_positioner::Request::SetConstraintAdjustment {
                constraint_adjustment,
            } => {
                if let WEnum::Value(adjustment) = constraint_adjustment {
                    positioner.set_constraint_adjustment(adjustment.bits());
                }
            }
            xdg_positioner::Request::SetOffset { x, y } => positioner.set_offset(x, y),
            xdg_positioner::Request::SetReactive => positioner.reactive = true,
            _ => {}
        }
    }
}

// ============================================================================
// xdg_surface
// ============================================================================

/// xdg_surface user data
#[derive(Debug)]
pub struct XdgSurfaceData {
    pub surface: SurfaceId,
}

impl Dispatch<xdg_surface::XdgSurface, XdgSurfaceData> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &xdg_surface::XdgSurface,
        request: xdg_surface::Request,
        data: &XdgSurfaceData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let surface = data.surface;
        match request {
            xdg_surface::Request::GetToplevel { id } => match state.compositor.new_toplevel(surface) {
                Ok(toplevel_id) => {
                    let toplevel = data_init.init(id, toplevel_id);
                    state.clients.toplevels.insert(toplevel_id, toplevel);
                }
                Err(e) => {
                    warn!("Rejected toplevel for {:?}: {}", surface, e);
                    data_init.post_error(id, xdg_wm_base::Error::Role, e.to_string());
                }
            },
            xdg_surface::Request::GetPopup {
                id,
                parent,
                positioner,
            } => {
                let geometry = positioner
                    .data::<Mutex<XdgPositioner>>()
                    .map(|p| p.lock().unwrap_or_else(|e| e.into_inner()).calculate_geometry())
                    .unwrap_or_default();
                let Some(parent) = parent
                    .as_ref()
                    .and_then(|p| p.data::<XdgSurfaceData>())
                    .map(|p| p.surface)
                else {
                    data_init.post_error(id, xdg_wm_base::Error::InvalidPopupParent, "popup without parent");
                    return;
                };

                match state.compositor.new_popup(surface, parent, geometry) {
                    Ok(popup_id) => {
                        let popup = data_init.init(id, popup_id);
                        state.clients.popups.insert(popup_id, popup);
                    }
                    Err(e) => {
                        warn!("Rejected popup for {:?}: {}", surface, e);
                        data_init.post_error(id, xdg_wm_base::Error::InvalidPopupParent, e.to_string());
                    }
                }
            }
            xdg_surface::Request::SetWindowGeometry {
                x,
                y,
                width,
                height,
            } => {
                if width <= 0 || height <= 0 {
                    resource.post_error(xdg_surface::Error::InvalidSize, "window geometry must be positive");
                    return;
                }
                debug!(
                    "Surface {:?} window geometry ({}, {}, {}, {})",
                    surface, x, y, width, height
                );
                state
                    .compositor
                    .set_window_geometry(surface, Rect::new(x, y, width, height));
            }
            xdg_surface::Request::AckConfigure { serial } => {
                if !state.compositor.ack_configure(surface, serial) {
                    debug!("Surface {:?} acked unknown serial {}", surface, serial);
                }
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &xdg_surface::XdgSurface, data: &XdgSurfaceData) {
        state.clients.xdg_surfaces.remove(&data.surface);
    }
}

// ============================================================================
// xdg_toplevel
// ============================================================================

impl Dispatch<xdg_toplevel::XdgToplevel, ToplevelId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_toplevel::XdgToplevel,
        request: xdg_toplevel::Request,
        toplevel: &ToplevelId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let id = *toplevel;
        match request {
            xdg_toplevel::Request::SetTitle { title } => {
                debug!("Toplevel {:?} title: {}", id, title);
                state.compositor.set_toplevel_title(id, &title);
            }
            xdg_toplevel::Request::SetAppId { app_id } => {
                debug!("Toplevel {:?} app_id: {}", id, app_id);
                state.compositor.set_toplevel_app_id(id, &app_id);
            }
            xdg_toplevel::Request::SetParent { .. } => {
                debug!("Toplevel {:?} parent ignored", id);
            }
            xdg_toplevel::Request::ShowWindowMenu { .. } => {
                debug!("Toplevel {:?} window menu ignored", id);
            }
            xdg_toplevel::Request::Move { .. } => state.compositor.request_move(id),
            xdg_toplevel::Request::Resize { edges, .. } => {
                state
                    .compositor
                    .request_resize(id, Edges::from_bits_truncate(raw(edges)));
            }
            xdg_toplevel::Request::SetMaxSize { width, height } => {
                state.compositor.set_toplevel_max_size(id, width, height);
            }
            xdg_toplevel::Request::SetMinSize { width, height } => {
                state.compositor.set_toplevel_min_size(id, width, height);
            }
            xdg_toplevel::Request::SetMaximized => state.compositor.request_maximize(id, true),
            xdg_toplevel::Request::UnsetMaximized => state.compositor.request_maximize(id, false),
            xdg_toplevel::Request::SetFullscreen { .. } => state.compositor.request_fullscreen(id, true),
            xdg_toplevel::Request::UnsetFullscreen => state.compositor.request_fullscreen(id, false),
            xdg_toplevel::Request::SetMinimized => {
                debug!("Toplevel {:?} minimize ignored", id);
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &xdg_toplevel::XdgToplevel, toplevel: &ToplevelId) {
        state.compositor.destroy_toplevel(*toplevel, &mut state.clients);
        state.clients.toplevels.remove(toplevel);
    }
}

// ============================================================================
// xdg_popup
// ============================================================================

impl Dispatch<xdg_popup::XdgPopup, PopupId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_popup::XdgPopup,
        request: xdg_popup::Request,
        popup: &PopupId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_popup::Request::Grab { .. } => {
                debug!("Popup {:?} grab ignored", popup);
            }
            xdg_popup::Request::Reposition { positioner, token } => {
                let geometry = positioner
                    .data::<Mutex<XdgPositioner>>()
                    .map(|p| p.lock().unwrap_or_else(|e| e.into_inner()).calculate_geometry())
                    .unwrap_or_default();
                state.compositor.reposition_popup(*popup, geometry, token);
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &xdg_popup::XdgPopup, popup: &PopupId) {
        state.compositor.destroy_popup(*popup);
        state.clients.popups.remove(popup);
    }
}

// ============================================================================
// xdg_activation_v1
// ============================================================================

/// Activation token user data, set once the token was issued
#[derive(Debug, Default)]
pub struct ActivationTokenData {
    committed: Mutex<bool>,
}

impl Dispatch<xdg_activation_v1::XdgActivationV1, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_activation_v1::XdgActivationV1,
        request: xdg_activation_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_activation_v1::Request::GetActivationToken { id } => {
                data_init.init(id, ActivationTokenData::default());
            }
            xdg_activation_v1::Request::Activate { token, surface } => {
                if !state.activation.consume(&token) {
                    debug!("Unknown activation token {}", token);
                    return;
                }
                if let Some(surface) = surface_id(&surface) {
                    state.compositor.activate_surface(surface);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_activation_token_v1::XdgActivationTokenV1, ActivationTokenData> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &xdg_activation_token_v1::XdgActivationTokenV1,
        request: xdg_activation_token_v1::Request,
        data: &ActivationTokenData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let xdg_activation_token_v1::Request::Commit = request {
            let mut committed = data.committed.lock().unwrap_or_else(|e| e.into_inner());
            if *committed {
                resource.post_error(xdg_activation_token_v1::Error::AlreadyUsed, "token already committed");
                return;
            }
            *committed = true;
            let token = state.activation.issue();
            debug!("Issued activation token {}", token);
            resource.done(token);
        }
    }
}
