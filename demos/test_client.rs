//! Demo Wayland client for the embedded compositor
//!
//! Opens a window with a persisted-geometry app id, so closing and
//! rerunning it brings the window back where it was left. Dragging with
//! the left button moves the window.
//!
//! Run with: cargo run --example test_client [socket path]
//! Without a path `WAYLAND_DISPLAY` is used.

use std::os::unix::io::AsFd;
use std::os::unix::net::UnixStream;

use wayland_client::{
    protocol::{
        wl_buffer, wl_compositor, wl_pointer, wl_registry, wl_seat, wl_shm, wl_shm_pool, wl_surface,
    },
    Connection, Dispatch, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

const APP_ID: &str = "Casilda:demo";
const DEFAULT_SIZE: (i32, i32) = (480, 320);
const BTN_LEFT: u32 = 0x110;

fn connect() -> anyhow::Result<Connection> {
    match std::env::args_os().nth(1) {
        Some(path) => {
            let stream = UnixStream::connect(&path)?;
            Ok(Connection::from_socket(stream)?)
        }
        None => Ok(Connection::connect_to_env()?),
    }
}

fn main() -> anyhow::Result<()> {
    let conn = connect()?;
    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();
    conn.display().get_registry(&qh, ());

    let mut app = App::default();
    event_queue.roundtrip(&mut app)?;

    let (Some(compositor), Some(wm_base)) = (&app.compositor, &app.wm_base) else {
        anyhow::bail!("compositor lacks wl_compositor or xdg_wm_base");
    };
    if app.shm.is_none() {
        anyhow::bail!("compositor lacks wl_shm");
    }

    let surface = compositor.create_surface(&qh, ());
    let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, ());
    let toplevel = xdg_surface.get_toplevel(&qh, ());
    toplevel.set_title("Casilda demo".to_string());
    toplevel.set_app_id(APP_ID.to_string());
    surface.commit();

    app.surface = Some(surface);
    app.toplevel = Some(toplevel);

    while app.running {
        event_queue.blocking_dispatch(&mut app)?;
        if app.needs_redraw {
            app.redraw(&qh)?;
        }
    }
    Ok(())
}

#[derive(Default)]
struct App {
    running: bool,
    compositor: Option<wl_compositor::WlCompositor>,
    shm: Option<wl_shm::WlShm>,
    seat: Option<wl_seat::WlSeat>,
    pointer: Option<wl_pointer::WlPointer>,
    wm_base: Option<xdg_wm_base::XdgWmBase>,
    surface: Option<wl_surface::WlSurface>,
    toplevel: Option<xdg_toplevel::XdgToplevel>,
    /// Size from the last toplevel configure, zero when the client picks
    requested: (i32, i32),
    needs_redraw: bool,
    focused: bool,
}

impl App {
    /// Fill a fresh shm buffer and commit it
    fn redraw(&mut self, qh: &QueueHandle<Self>) -> anyhow::Result<()> {
        self.needs_redraw = false;
        let (Some(shm), Some(surface)) = (&self.shm, &self.surface) else {
            return Ok(());
        };

        let width = if self.requested.0 > 0 { self.requested.0 } else { DEFAULT_SIZE.0 };
        let height = if self.requested.1 > 0 { self.requested.1 } else { DEFAULT_SIZE.1 };
        let stride = width * 4;
        let size = stride * height;

        let file = tempfile::tempfile()?;
        file.set_len(size as u64)?;
        let mut mmap = unsafe { memmap2::MmapMut::map_mut(&file)? };

        // Brighter while focused; ARGB8888 is BGRA in memory
        let shade = if self.focused { 0xd0 } else { 0x80 };
        for pixel in mmap.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[shade, 0x60, 0x30, 0xff]);
        }

        let pool = shm.create_pool(file.as_fd(), size, qh, ());
        let buffer = pool.create_buffer(0, width, height, stride, wl_shm::Format::Argb8888, qh, ());
        pool.destroy();

        surface.attach(Some(&buffer), 0, 0);
        surface.damage_buffer(0, 0, width, height);
        surface.commit();
        Ok(())
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for App {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        else {
            return;
        };
        println!("Global {} v{}", interface, version);
        match interface.as_str() {
            "wl_compositor" => {
                state.compositor = Some(registry.bind(name, version.min(5), qh, ()));
            }
            "wl_shm" => state.shm = Some(registry.bind(name, 1, qh, ())),
            "wl_seat" => state.seat = Some(registry.bind(name, version.min(8), qh, ())),
            "xdg_wm_base" => {
                state.wm_base = Some(registry.bind(name, version.min(3), qh, ()));
                state.running = true;
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for App {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        {
            if capabilities.contains(wl_seat::Capability::Pointer) && state.pointer.is_none() {
                state.pointer = Some(seat.get_pointer(qh, ()));
            }
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for App {
    fn event(
        state: &mut Self,
        _pointer: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_pointer::Event::Button {
            serial,
            button: BTN_LEFT,
            state: WEnum::Value(wl_pointer::ButtonState::Pressed),
            ..
        } = event
        {
            if let (Some(toplevel), Some(seat)) = (&state.toplevel, &state.seat) {
                toplevel._move(seat, serial);
            }
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for App {
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

impl Dispatch<xdg_surface::XdgSurface, ()> for App {
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
            state.needs_redraw = true;
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for App {
    fn event(
        state: &mut Self,
        _toplevel: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure {
                width,
                height,
                states,
            } => {
                let activated = (xdg_toplevel::State::Activated as u32).to_ne_bytes();
                state.focused = states.chunks_exact(4).any(|s| s == activated);
                state.requested = (width, height);
                println!("Configure {}x{} focused={}", width, height, state.focused);
            }
            xdg_toplevel::Event::Close => state.running = false,
            _ => {}
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for App {
    fn event(
        _state: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            buffer.destroy();
        }
    }
}

wayland_client::delegate_noop!(App: ignore wl_compositor::WlCompositor);
wayland_client::delegate_noop!(App: ignore wl_surface::WlSurface);
wayland_client::delegate_noop!(App: ignore wl_shm::WlShm);
wayland_client::delegate_noop!(App: ignore wl_shm_pool::WlShmPool);
