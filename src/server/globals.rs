//! Global object implementations
//!
//! Registers the globals the embedded compositor advertises and binds
//! them for clients.

use log::{debug, info};
use wayland_protocols::xdg::activation::v1::server::xdg_activation_v1;
use wayland_protocols::xdg::shell::server::xdg_wm_base;
use wayland_server::protocol::{wl_compositor, wl_output, wl_seat, wl_shm, wl_subcompositor};
use wayland_server::{Client, DataInit, DisplayHandle, GlobalDispatch, New, Resource};

use super::{ClientResources, ServerState};

/// Register every global on the display
pub fn create_globals(dh: &DisplayHandle) {
    dh.create_global::<ServerState, wl_compositor::WlCompositor, _>(5, ());
    dh.create_global::<ServerState, wl_subcompositor::WlSubcompositor, _>(1, ());
    dh.create_global::<ServerState, wl_shm::WlShm, _>(1, ());
    dh.create_global::<ServerState, wl_seat::WlSeat, _>(8, ());
    dh.create_global::<ServerState, wl_output::WlOutput, _>(4, ());
    dh.create_global::<ServerState, xdg_wm_base::XdgWmBase, _>(3, ());
    dh.create_global::<ServerState, xdg_activation_v1::XdgActivationV1, _>(1, ());

    info!(
        "Registered Wayland globals: wl_compositor, wl_subcompositor, wl_shm, wl_seat, \
         wl_output, xdg_wm_base, xdg_activation_v1"
    );
}

// ============================================================================
// wl_compositor / wl_subcompositor
// ============================================================================

impl GlobalDispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_compositor");
        data_init.init(resource, ());
    }
}

impl GlobalDispatch<wl_subcompositor::WlSubcompositor, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_subcompositor::WlSubcompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_subcompositor");
        data_init.init(resource, ());
    }
}

// ============================================================================
// wl_shm
// ============================================================================

impl GlobalDispatch<wl_shm::WlShm, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_shm");
        let shm = data_init.init(resource, ());

        for format in state.shm.formats() {
            if let Ok(format) = wl_shm::Format::try_from(format.to_wayland()) {
                shm.format(format);
            }
        }
    }
}

// ============================================================================
// wl_seat
// ============================================================================

impl GlobalDispatch<wl_seat::WlSeat, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_seat::WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_seat");
        let seat = data_init.init(resource, ());

        let caps = wl_seat::Capability::from_bits_truncate(state.compositor.seat.capabilities().to_wayland());
        seat.capabilities(caps);
        if seat.version() >= 2 {
            seat.name(state.compositor.seat.name().to_string());
        }
    }
}

// ============================================================================
// wl_output
// ============================================================================

impl GlobalDispatch<wl_output::WlOutput, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_output::WlOutput>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_output");
        let output = data_init.init(resource, ());

        let (width, height) = state.compositor.widget_size();
        ClientResources::send_output_info(&output, width, height);
        state.clients.outputs.push(output);
    }
}

// ============================================================================
// xdg_wm_base / xdg_activation_v1
// ============================================================================

impl GlobalDispatch<xdg_wm_base::XdgWmBase, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<xdg_wm_base::XdgWmBase>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound xdg_wm_base");
        data_init.init(resource, ());
    }
}

impl GlobalDispatch<xdg_activation_v1::XdgActivationV1, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<xdg_activation_v1::XdgActivationV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound xdg_activation_v1");
        data_init.init(resource, ());
    }
}
