//! Real Wayland clients talking to an embedded compositor over its socket

mod common;

use std::os::unix::io::AsFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use wayland_client::globals::{registry_queue_init, GlobalListContents};
use wayland_client::protocol::{
    wl_buffer, wl_compositor, wl_registry, wl_shm, wl_shm_pool, wl_surface,
};
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use casilda::{CompositorConfig, EmbeddedCompositor};
use common::RecordingHost;

/// Dispatch the compositor until `done` holds
fn pump(compositor: &mut EmbeddedCompositor, mut done: impl FnMut(&EmbeddedCompositor) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(compositor) {
        assert!(Instant::now() < deadline, "timed out waiting for the client");
        compositor.dispatch();
        thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Default)]
struct Probe {
    configured: bool,
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for Probe {
    fn event(
        _state: &mut Self,
        _registry: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for Probe {
    fn event(
        _state: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for Probe {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            state.configured = true;
        }
    }
}

wayland_client::delegate_noop!(Probe: ignore wl_compositor::WlCompositor);
wayland_client::delegate_noop!(Probe: ignore wl_surface::WlSurface);
wayland_client::delegate_noop!(Probe: ignore wl_shm::WlShm);
wayland_client::delegate_noop!(Probe: ignore wl_shm_pool::WlShmPool);
wayland_client::delegate_noop!(Probe: ignore wl_buffer::WlBuffer);
wayland_client::delegate_noop!(Probe: ignore xdg_toplevel::XdgToplevel);

fn connect(path: &PathBuf) -> Connection {
    let stream = UnixStream::connect(path).unwrap();
    Connection::from_socket(stream).unwrap()
}

#[test]
fn test_explicit_socket_path_is_left_to_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casilda-test.sock");

    let compositor = EmbeddedCompositor::new(
        CompositorConfig::with_socket(&path),
        Box::new(RecordingHost::default()),
    );
    assert!(compositor.is_running());
    assert_eq!(compositor.socket_path(), Some(path.as_path()));
    assert!(path.exists());

    drop(compositor);
    assert!(dir.path().exists());
}

#[test]
fn test_client_sees_globals() {
    let mut compositor =
        EmbeddedCompositor::new(CompositorConfig::default(), Box::new(RecordingHost::default()));
    let path = compositor.socket_path().unwrap().to_path_buf();

    let client = thread::spawn(move || {
        let conn = connect(&path);
        let (globals, _queue) = registry_queue_init::<Probe>(&conn).unwrap();
        let mut interfaces: Vec<(String, u32)> = globals
            .contents()
            .clone_list()
            .into_iter()
            .map(|g| (g.interface, g.version))
            .collect();
        interfaces.sort();
        interfaces
    });

    pump(&mut compositor, |_| client.is_finished());
    let interfaces = client.join().unwrap();

    assert_eq!(
        interfaces,
        vec![
            ("wl_compositor".to_string(), 5),
            ("wl_output".to_string(), 4),
            ("wl_seat".to_string(), 8),
            ("wl_shm".to_string(), 1),
            ("wl_subcompositor".to_string(), 1),
            ("xdg_activation_v1".to_string(), 1),
            ("xdg_wm_base".to_string(), 3),
        ]
    );
}

#[test]
fn test_client_window_maps_and_goes_away_on_disconnect() {
    let mut compositor =
        EmbeddedCompositor::new(CompositorConfig::default(), Box::new(RecordingHost::default()));
    compositor.size_allocate(640, 480);
    let path = compositor.socket_path().unwrap().to_path_buf();

    let (mapped_tx, mapped_rx) = mpsc::channel();
    let (quit_tx, quit_rx) = mpsc::channel::<()>();

    let client = thread::spawn(move || {
        let conn = connect(&path);
        let (globals, mut queue) = registry_queue_init::<Probe>(&conn).unwrap();
        let qh = queue.handle();
        let compositor: wl_compositor::WlCompositor = globals.bind(&qh, 1..=5, ()).unwrap();
        let shm: wl_shm::WlShm = globals.bind(&qh, 1..=1, ()).unwrap();
        let wm_base: xdg_wm_base::XdgWmBase = globals.bind(&qh, 1..=3, ()).unwrap();

        let mut probe = Probe::default();
        let surface = compositor.create_surface(&qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, ());
        let toplevel = xdg_surface.get_toplevel(&qh, ());
        toplevel.set_app_id("Casilda:client-test".to_string());
        surface.commit();
        while !probe.configured {
            queue.blocking_dispatch(&mut probe).unwrap();
        }

        let (width, height) = (64, 48);
        let file = tempfile::tempfile().unwrap();
        file.set_len((width * height * 4) as u64).unwrap();
        let pool = shm.create_pool(file.as_fd(), width * height * 4, &qh, ());
        let buffer =
            pool.create_buffer(0, width, height, width * 4, wl_shm::Format::Argb8888, &qh, ());
        surface.attach(Some(&buffer), 0, 0);
        surface.damage_buffer(0, 0, width, height);
        surface.commit();
        queue.roundtrip(&mut probe).unwrap();

        mapped_tx.send(()).unwrap();
        quit_rx.recv().unwrap();
    });

    pump(&mut compositor, |_| mapped_rx.try_recv().is_ok());

    let state = compositor.compositor().unwrap();
    let (_, toplevel) = state.toplevels.iter().next().unwrap();
    assert!(toplevel.mapped);
    assert_eq!(toplevel.app_id.as_deref(), Some("Casilda:client-test"));
    assert_eq!(state.surfaces.get(toplevel.surface).unwrap().size(), (64, 48));
    assert_eq!(state.scene.position(toplevel.node), Some((32, 32)));

    quit_tx.send(()).unwrap();
    pump(&mut compositor, |c| {
        c.compositor().is_some_and(|state| state.toplevels.is_empty())
    });
    client.join().unwrap();
    assert_eq!(compositor.compositor().unwrap().surfaces.len(), 0);
}
