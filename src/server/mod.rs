//! Wayland server implementation
//!
//! This module sets up the Wayland display, registers globals and
//! dispatches protocol requests into the compositor. The listening socket
//! and the display are registered in a private calloop loop whose
//! descriptor is the single pollable source handed to the host.

mod activation;
mod clients;
mod dispatch;
mod globals;
mod xdg;

use std::os::unix::io::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::{Interest, Mode, PostAction};
use log::{debug, error, info, warn};
use tempfile::TempDir;
use wayland_server::backend::{ClientData, ClientId, DisconnectReason};
use wayland_server::{BindError, Display, ListeningSocket};

use crate::backend::EventLoop;
use crate::compositor::CompositorState;
use crate::config::CompositorConfig;
use crate::host::Host;
use crate::protocol::WlShmHandler;

pub use activation::ActivationTokens;
pub use clients::ClientResources;
pub use globals::create_globals;
pub use xdg::{ActivationTokenData, XdgSurfaceData};

/// Socket file name inside an owned socket directory
pub const SOCKET_NAME: &str = "wayland.sock";

/// Errors raised while bringing the server up
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to create the display: {0}")]
    Display(#[from] wayland_server::backend::InitError),

    #[error("failed to bind {path}: {source}")]
    Bind { path: PathBuf, source: BindError },

    #[error("failed to dispatch the event loop: {0}")]
    Loop(#[from] calloop::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// State passed to Wayland dispatch handlers
pub struct ServerState {
    /// Compositor state (surfaces, toplevels, scene, seat, output)
    pub compositor: CompositorState,
    /// Protocol objects behind the compositor's ids
    pub clients: ClientResources,
    /// SHM handler
    pub shm: WlShmHandler,
    /// Issued xdg_activation tokens
    pub activation: ActivationTokens,
}

impl ServerState {
    /// Create a new server state
    pub fn new(config: CompositorConfig, host: Box<dyn Host>) -> Self {
        Self {
            compositor: CompositorState::new(config, host),
            clients: ClientResources::new(),
            shm: WlShmHandler::new(),
            activation: ActivationTokens::new(),
        }
    }

    /// Work queued without descriptor activity
    pub fn dispatch_idle(&mut self) {
        self.compositor.dispatch_idle(&mut self.clients);
    }
}

/// Per-client data
#[derive(Debug, Default)]
pub struct ClientState;

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        debug!("Client {:?} connected", client_id);
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        debug!("Client {:?} disconnected: {:?}", client_id, reason);
    }
}

/// The display and the state its handlers work on, the loop data of the
/// server's event loop
pub struct ServerData {
    pub display: Display<ServerState>,
    pub state: ServerState,
}

impl ServerData {
    fn flush(&mut self) {
        if let Err(e) = self.display.flush_clients() {
            warn!("Failed to flush clients: {}", e);
        }
    }
}

/// The Wayland server of one embedded compositor
pub struct WaylandServer {
    /// Polls the listening socket and the display
    event_loop: EventLoop<ServerData>,
    data: ServerData,
    socket_path: PathBuf,
    /// Owned socket directory, removed last
    socket_dir: Option<TempDir>,
    shut_down: bool,
}

impl WaylandServer {
    /// Create the display, bind the socket and register the globals
    pub fn new(config: CompositorConfig, host: Box<dyn Host>) -> Result<Self, ServerError> {
        info!("Creating Wayland display server");

        let mut display: Display<ServerState> = Display::new()?;

        let (socket_dir, socket_path) = match &config.socket {
            Some(path) => (None, path.clone()),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("casilda-compositor-")
                    .tempdir()?;
                let path = dir.path().join(SOCKET_NAME);
                (Some(dir), path)
            }
        };

        let socket = ListeningSocket::bind_absolute(socket_path.clone()).map_err(|source| {
            ServerError::Bind {
                path: socket_path.clone(),
                source,
            }
        })?;
        info!("Wayland socket: {}", socket_path.display());

        create_globals(&display.handle());

        let event_loop = EventLoop::new()?;
        let handle = event_loop.handle();

        handle
            .insert_source(
                Generic::new(socket.as_fd().try_clone_to_owned()?, Interest::READ, Mode::Level),
                move |_, _, data: &mut ServerData| {
                    while let Some(stream) = socket.accept()? {
                        match data.display.handle().insert_client(stream, Arc::new(ClientState)) {
                            Ok(client) => debug!("New Wayland client {:?}", client.id()),
                            Err(e) => error!("Failed to insert client: {}", e),
                        }
                    }
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|e| ServerError::Loop(e.error))?;

        handle
            .insert_source(
                Generic::new(
                    display.backend().poll_fd().try_clone_to_owned()?,
                    Interest::READ,
                    Mode::Level,
                ),
                |_, _, data: &mut ServerData| {
                    data.display.dispatch_clients(&mut data.state)?;
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|e| ServerError::Loop(e.error))?;

        let state = ServerState::new(config, host);

        Ok(Self {
            event_loop,
            data: ServerData { display, state },
            socket_path,
            socket_dir,
            shut_down: false,
        })
    }

    /// Path clients connect to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether the socket directory is owned and removed on teardown
    pub fn owns_socket_dir(&self) -> bool {
        self.socket_dir.is_some()
    }

    /// Descriptor that becomes readable when there is protocol work
    pub fn poll_fd(&self) -> BorrowedFd<'_> {
        self.event_loop.as_fd()
    }

    pub fn state(&self) -> &ServerState {
        &self.data.state
    }

    pub fn state_mut(&mut self) -> &mut ServerState {
        &mut self.data.state
    }

    /// Flush client-bound messages before the host blocks
    pub fn prepare(&mut self) {
        self.data.flush();
    }

    /// Run idle work and one batch of ready protocol events
    pub fn dispatch(&mut self) -> Result<(), ServerError> {
        self.data.state.dispatch_idle();
        self.event_loop
            .dispatch(Some(Duration::ZERO), &mut self.data)?;
        self.data.state.dispatch_idle();
        self.data.flush();
        Ok(())
    }

    /// Disconnect every client, then release the compositor
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let compositor = &mut self.data.state.compositor;
        compositor.reset_cursor();
        compositor.unrealize();

        let handle = self.data.display.handle();
        let backend = handle.backend_handle();
        let mut clients: Vec<ClientId> = Vec::new();
        backend.with_all_clients(|id| clients.push(id));
        for client in clients {
            backend.kill_client(client, DisconnectReason::ConnectionClosed);
        }
        // Runs the destructors of the killed clients' objects
        if let Err(e) = self.data.display.dispatch_clients(&mut self.data.state) {
            debug!("Dispatch after disconnect failed: {}", e);
        }

        self.data.state.clients.clear();
        self.data.state.compositor.teardown();
        info!("Wayland server shut down");
    }
}

impl Drop for WaylandServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
