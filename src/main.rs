//! Casilda demo host
//!
//! Runs the embedded compositor headless: a calloop timer stands in for the
//! widget frame clock and frames are painted into a counting draw context.
//! Point a client at the printed socket to try it.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::timer::{TimeoutAction, Timer};
use calloop::{Interest, Mode, PostAction};
use log::{debug, info};

use casilda::backend::EventLoop;
use casilda::host::{CursorImage, DrawContext, FrameClockSubscription, Host, HostImage};
use casilda::{CompositorConfig, EmbeddedCompositor};

/// Frame clock period
const FRAME: Duration = Duration::from_millis(16);

/// A host that only records what the compositor asks for
struct DemoHost {
    redraw: Rc<Cell<bool>>,
}

impl Host for DemoHost {
    fn queue_draw(&mut self) {
        self.redraw.set(true);
    }

    fn begin_updating(&mut self) {
        debug!("Frame clock started");
    }

    fn end_updating(&mut self) {
        debug!("Frame clock stopped");
    }

    fn grab_focus(&mut self) {
        debug!("Focus grabbed");
    }

    fn set_cursor(&mut self, cursor: Option<&CursorImage>) {
        match cursor {
            Some(cursor) => info!("Cursor {}x{} hotspot {:?}", cursor.width, cursor.height, cursor.hotspot),
            None => info!("Default cursor"),
        }
    }
}

#[derive(Default)]
struct FrameCounter(u64);

impl DrawContext for FrameCounter {
    fn draw_image(&mut self, image: &HostImage<'_>) {
        self.0 += 1;
        debug!("Frame {} ({}x{} {:?})", self.0, image.width, image.height, image.format);
    }
}

struct Demo {
    compositor: EmbeddedCompositor,
    redraw: Rc<Cell<bool>>,
    frames: FrameCounter,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => CompositorConfig::with_socket(path),
        None => CompositorConfig::default(),
    };

    let redraw = Rc::new(Cell::new(false));
    let host = DemoHost {
        redraw: redraw.clone(),
    };
    let mut compositor = EmbeddedCompositor::try_new(config, Box::new(host))?;
    compositor.size_allocate(800, 600);
    compositor.realize(FrameClockSubscription::new(|| debug!("Frame clock disconnected")));

    let socket = compositor
        .socket_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    info!("Run clients with WAYLAND_DISPLAY={}", socket);

    let poll_fd = compositor
        .poll_fd()
        .ok_or_else(|| anyhow::anyhow!("compositor is not running"))?
        .try_clone_to_owned()?;

    let mut event_loop = EventLoop::<Demo>::new()?;
    let handle = event_loop.handle();

    handle
        .insert_source(Generic::new(poll_fd, Interest::READ, Mode::Level), |_, _, demo| {
            demo.compositor.dispatch();
            Ok(PostAction::Continue)
        })
        .map_err(|e| anyhow::anyhow!("failed to watch the compositor: {}", e.error))?;

    handle
        .insert_source(Timer::from_duration(FRAME), |_, _, demo| {
            demo.compositor.frame_clock_tick();
            if demo.redraw.replace(false) {
                demo.compositor.paint(&mut demo.frames);
            }
            TimeoutAction::ToDuration(FRAME)
        })
        .map_err(|e| anyhow::anyhow!("failed to start the frame timer: {}", e.error))?;

    let mut demo = Demo {
        compositor,
        redraw,
        frames: FrameCounter::default(),
    };
    event_loop.run(&mut demo, |demo| demo.compositor.prepare())
}
