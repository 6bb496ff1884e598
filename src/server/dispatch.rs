//! Wayland protocol dispatch implementations
//!
//! Implements the Dispatch trait for the core protocol objects: surfaces,
//! regions, sub-surfaces, shm, the seat devices and the output.

use std::os::unix::io::AsFd;
use std::sync::Mutex;

use log::{debug, warn};
use wayland_server::backend::ClientId;
use wayland_server::protocol::{
    wl_buffer, wl_callback, wl_compositor, wl_keyboard, wl_output, wl_pointer, wl_region, wl_seat,
    wl_shm, wl_shm_pool, wl_subcompositor, wl_subsurface, wl_surface,
};
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource, WEnum};

use crate::compositor::SurfaceId;
use crate::input::keymap_file;
use crate::protocol::shm::{ShmBufferId, ShmError, ShmPoolId};
use crate::protocol::Region;

use super::ServerState;

/// Lock a mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// wl_compositor
// ============================================================================

impl Dispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let surface_id = state.compositor.surfaces.create_surface();
                debug!("Created wl_surface {:?}", surface_id);
                let surface = data_init.init(id, surface_id);
                state.clients.surfaces.insert(surface_id, surface);
            }
            wl_compositor::Request::CreateRegion { id } => {
                debug!("Created wl_region");
                data_init.init(id, Mutex::new(Region::new()));
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_surface
// ============================================================================

impl Dispatch<wl_surface::WlSurface, SurfaceId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        surface_id: &SurfaceId,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let surface_id = *surface_id;
        let Some(surface) = state.compositor.surfaces.get_mut(surface_id) else {
            warn!("Surface {:?} not found", surface_id);
            return;
        };

        match request {
            wl_surface::Request::Attach { buffer, x, y } => {
                debug!("Surface {:?} attach at ({}, {})", surface_id, x, y);
                if x != 0 || y != 0 {
                    surface.offset(x, y);
                }
                state.clients.pending_buffers.insert(surface_id, buffer);
            }
            wl_surface::Request::Damage {
                x,
                y,
                width,
                height,
            }
            | wl_surface::Request::DamageBuffer {
                x,
                y,
                width,
                height,
            } => {
                debug!(
                    "Surface {:?} damage ({}, {}, {}, {})",
                    surface_id, x, y, width, height
                );
                surface.damage(x, y, width, height);
            }
            wl_surface::Request::Frame { callback } => {
                let callback = data_init.init(callback, ());
                state
                    .clients
                    .pending_frames
                    .entry(surface_id)
                    .or_default()
                    .push(callback);
            }
            wl_surface::Request::SetOpaqueRegion { .. } => {
                debug!("Surface {:?} set opaque region", surface_id);
            }
            wl_surface::Request::SetInputRegion { region } => {
                let region = region
                    .as_ref()
                    .and_then(|r| r.data::<Mutex<Region>>())
                    .map(|r| lock(r).clone());
                debug!("Surface {:?} set input region {:?}", surface_id, region);
                surface.set_input_region(region);
            }
            wl_surface::Request::Commit => {
                debug!("Surface {:?} commit", surface_id);
                commit(state, surface_id);
            }
            wl_surface::Request::SetBufferTransform { transform } => {
                debug!("Surface {:?} buffer transform {:?} ignored", surface_id, transform);
            }
            wl_surface::Request::SetBufferScale { scale } => {
                surface.set_scale(scale);
            }
            wl_surface::Request::Offset { x, y } => {
                surface.offset(x, y);
            }
            wl_surface::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &wl_surface::WlSurface, surface_id: &SurfaceId) {
        state.compositor.destroy_surface(*surface_id, &mut state.clients);
        state.clients.forget_surface(*surface_id);
    }
}

/// Apply a wl_surface.commit: copy the attached buffer, release it and hand
/// the new state to the compositor
fn commit(state: &mut ServerState, surface_id: SurfaceId) {
    if let Some(buffer) = state.clients.pending_buffers.remove(&surface_id) {
        let pixels = match buffer {
            Some(buffer) => {
                let pixels = buffer
                    .data::<ShmBufferId>()
                    .copied()
                    .map(|id| state.shm.read_pixels(id));
                buffer.release();
                match pixels {
                    Some(Ok(pixels)) => Some(Some(pixels)),
                    Some(Err(e)) => {
                        warn!("Surface {:?} buffer unreadable: {}", surface_id, e);
                        None
                    }
                    None => {
                        warn!("Surface {:?} attached a non-shm buffer", surface_id);
                        None
                    }
                }
            }
            None => Some(None),
        };
        if let (Some(pixels), Some(surface)) = (pixels, state.compositor.surfaces.get_mut(surface_id)) {
            surface.attach(pixels);
        }
    }

    let frames = state.clients.commit_frames(surface_id);
    state
        .compositor
        .commit_surface(surface_id, frames, &mut state.clients);
}

// ============================================================================
// wl_region
// ============================================================================

impl Dispatch<wl_region::WlRegion, Mutex<Region>> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_region::WlRegion,
        request: wl_region::Request,
        region: &Mutex<Region>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_region::Request::Add {
                x,
                y,
                width,
                height,
            } => lock(region).add(x, y, width, height),
            wl_region::Request::Subtract {
                x,
                y,
                width,
                height,
            } => lock(region).subtract(x, y, width, height),
            _ => {}
        }
    }
}

// ============================================================================
// wl_callback
// ============================================================================

impl Dispatch<wl_callback::WlCallback, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_callback::WlCallback,
        _request: wl_callback::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

// ============================================================================
// wl_subcompositor / wl_subsurface
// ============================================================================

impl Dispatch<wl_subcompositor::WlSubcompositor, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_subcompositor::WlSubcompositor,
        request: wl_subcompositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_subcompositor::Request::GetSubsurface { id, surface, parent } = request {
            let (Some(&surface_id), Some(&parent_id)) =
                (surface.data::<SurfaceId>(), parent.data::<SurfaceId>())
            else {
                data_init.post_error(id, wl_subcompositor::Error::BadSurface, "unknown surface");
                return;
            };

            match state.compositor.new_subsurface(surface_id, parent_id) {
                Ok(()) => {
                    debug!("Sub-surface {:?} of {:?}", surface_id, parent_id);
                    data_init.init(id, surface_id);
                }
                Err(e) => {
                    warn!("Rejected sub-surface {:?}: {}", surface_id, e);
                    data_init.post_error(id, wl_subcompositor::Error::BadSurface, e.to_string());
                }
            }
        }
    }
}

impl Dispatch<wl_subsurface::WlSubsurface, SurfaceId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_subsurface::WlSubsurface,
        request: wl_subsurface::Request,
        surface_id: &SurfaceId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_subsurface::Request::SetPosition { x, y } => {
                state.compositor.set_subsurface_position(*surface_id, x, y);
            }
            wl_subsurface::Request::PlaceAbove { .. } | wl_subsurface::Request::PlaceBelow { .. } => {
                debug!("Sub-surface {:?} restacking ignored", surface_id);
            }
            wl_subsurface::Request::SetSync | wl_subsurface::Request::SetDesync => {
                debug!("Sub-surface {:?} sync mode ignored", surface_id);
            }
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &wl_subsurface::WlSubsurface,
        surface_id: &SurfaceId,
    ) {
        state.compositor.destroy_subsurface(*surface_id);
    }
}

// ============================================================================
// wl_shm
// ============================================================================

/// Protocol error for a rejected pool or buffer
fn shm_error_code(error: &ShmError) -> wl_shm::Error {
    match error {
        ShmError::InvalidFormat => wl_shm::Error::InvalidFormat,
        ShmError::InvalidStride
        | ShmError::InvalidSize
        | ShmError::BufferTooLarge
        | ShmError::ShrinkPool => wl_shm::Error::InvalidStride,
        ShmError::PoolExceedsFile { .. }
        | ShmError::InvalidPool
        | ShmError::InvalidBuffer
        | ShmError::Map(_) => wl_shm::Error::InvalidFd,
    }
}

impl Dispatch<wl_shm::WlShm, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, fd, size } = request {
            match state.shm.create_pool(fd, size) {
                Ok(pool_id) => {
                    data_init.init(id, pool_id);
                }
                Err(e) => {
                    warn!("Rejected shm pool: {}", e);
                    data_init.post_error(id, shm_error_code(&e), e.to_string());
                }
            }
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ShmPoolId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        pool_id: &ShmPoolId,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_shm_pool::Request::CreateBuffer {
                id,
                offset,
                width,
                height,
                stride,
                format,
            } => {
                let format = match format {
                    WEnum::Value(format) => u32::from(format),
                    WEnum::Unknown(raw) => raw,
                };
                match state
                    .shm
                    .create_buffer(*pool_id, offset, width, height, stride, format)
                {
                    Ok(buffer_id) => {
                        data_init.init(id, buffer_id);
                    }
                    Err(e) => {
                        warn!("Rejected shm buffer: {}", e);
                        data_init.post_error(id, shm_error_code(&e), e.to_string());
                    }
                }
            }
            wl_shm_pool::Request::Resize { size } => {
                if let Err(e) = state.shm.resize_pool(*pool_id, size) {
                    resource.post_error(shm_error_code(&e), e.to_string());
                }
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &wl_shm_pool::WlShmPool, pool_id: &ShmPoolId) {
        state.shm.destroy_pool(*pool_id);
    }
}

impl Dispatch<wl_buffer::WlBuffer, ShmBufferId> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_buffer::WlBuffer,
        _request: wl_buffer::Request,
        _data: &ShmBufferId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &wl_buffer::WlBuffer, buffer_id: &ShmBufferId) {
        state.shm.destroy_buffer(*buffer_id);
    }
}

// ============================================================================
// wl_seat
// ============================================================================

impl Dispatch<wl_seat::WlSeat, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_seat::WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                debug!("Creating pointer");
                let pointer = data_init.init(id, ());
                state.clients.pointers.push(pointer);
            }
            wl_seat::Request::GetKeyboard { id } => {
                debug!("Creating keyboard");
                let keyboard = data_init.init(id, ());
                let seat_keyboard = state.compositor.seat.keyboard();

                match keymap_file(seat_keyboard.keymap()) {
                    Ok(file) => {
                        keyboard.keymap(wl_keyboard::KeymapFormat::XkbV1, file.fd.as_fd(), file.size)
                    }
                    Err(e) => warn!("Keymap not sent: {}", e),
                }
                if keyboard.version() >= 4 {
                    let (rate, delay) = seat_keyboard.repeat_info();
                    keyboard.repeat_info(rate, delay);
                }
                state.clients.keyboards.push(keyboard);
            }
            wl_seat::Request::GetTouch { id } => {
                data_init.post_error(id, wl_seat::Error::MissingCapability, "no touch device");
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_pointer
// ============================================================================

impl Dispatch<wl_pointer::WlPointer, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wl_pointer::WlPointer,
        request: wl_pointer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_pointer::Request::SetCursor {
            surface,
            hotspot_x,
            hotspot_y,
            ..
        } = request
        {
            let focused = state
                .compositor
                .seat
                .pointer_focus()
                .and_then(|id| state.clients.surfaces.get(&id))
                .is_some_and(|s| s.id().same_client_as(&resource.id()));
            if !focused {
                debug!("Ignoring set_cursor from a client without pointer focus");
                return;
            }

            let Some(&surface_id) = surface.as_ref().and_then(|s| s.data::<SurfaceId>()) else {
                debug!("Hidden cursor requested");
                return;
            };
            if let Err(e) =
                state
                    .compositor
                    .request_cursor(surface_id, (hotspot_x, hotspot_y), &mut state.clients)
            {
                resource.post_error(wl_pointer::Error::Role, e.to_string());
            }
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &wl_pointer::WlPointer, _data: &()) {
        state.clients.pointers.retain(|p| p != resource);
    }
}

// ============================================================================
// wl_keyboard
// ============================================================================

impl Dispatch<wl_keyboard::WlKeyboard, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_keyboard::WlKeyboard,
        request: wl_keyboard::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_keyboard::Request::Release = request {
            debug!("Keyboard release");
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &wl_keyboard::WlKeyboard, _data: &()) {
        state.clients.keyboards.retain(|k| k != resource);
    }
}

// ============================================================================
// wl_output
// ============================================================================

impl Dispatch<wl_output::WlOutput, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_output::WlOutput,
        request: wl_output::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_output::Request::Release = request {
            debug!("Output release");
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &wl_output::WlOutput, _data: &()) {
        state.clients.outputs.retain(|o| o != resource);
    }
}
