//! Shared helpers for integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use casilda::compositor::{CompositorState, SurfaceId, ToplevelId};
use casilda::config::CompositorConfig;
use casilda::host::{CursorImage, Host, HostKeymap};
use casilda::protocol::ClientEvent;
use casilda::renderer::{PixelBuffer, PixelFormat};

/// What the compositor asked of its host
#[derive(Debug, Default)]
pub struct HostLog {
    pub draws: usize,
    pub updating: bool,
    pub focus_grabs: usize,
    pub cursor: Option<CursorImage>,
}

/// A host widget recording every request
#[derive(Clone, Default)]
pub struct RecordingHost {
    pub log: Rc<RefCell<HostLog>>,
}

impl Host for RecordingHost {
    fn queue_draw(&mut self) {
        self.log.borrow_mut().draws += 1;
    }

    fn begin_updating(&mut self) {
        self.log.borrow_mut().updating = true;
    }

    fn end_updating(&mut self) {
        self.log.borrow_mut().updating = false;
    }

    fn grab_focus(&mut self) {
        self.log.borrow_mut().focus_grabs += 1;
    }

    fn set_cursor(&mut self, cursor: Option<&CursorImage>) {
        self.log.borrow_mut().cursor = cursor.cloned();
    }

    fn keymap(&self) -> Option<HostKeymap> {
        Some(HostKeymap {
            keymap: String::new(),
            active_layout: None,
        })
    }
}

/// A compositor allocated at `width` x `height`
pub fn compositor(width: i32, height: i32) -> (CompositorState, RecordingHost) {
    let host = RecordingHost::default();
    let mut state = CompositorState::new(CompositorConfig::default(), Box::new(host.clone()));
    state.size_allocate(width, height, &mut Vec::new());
    (state, host)
}

/// A client window driven by hand
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub surface: SurfaceId,
    pub toplevel: ToplevelId,
    pub size: (u32, u32),
}

fn attach(state: &mut CompositorState, surface: SurfaceId, width: u32, height: u32) {
    let buffer = PixelBuffer::filled(width, height, PixelFormat::Argb8888, 0xff33_6699);
    state.surfaces.get_mut(surface).unwrap().attach(Some(buffer));
}

fn latest_configure(events: &[ClientEvent], id: ToplevelId) -> Option<(u32, i32, i32)> {
    events.iter().rev().find_map(|e| match e {
        ClientEvent::ToplevelConfigure {
            toplevel,
            serial,
            configure,
            ..
        } if *toplevel == id => Some((*serial, configure.width, configure.height)),
        _ => None,
    })
}

/// Create a toplevel, answer the initial configure and map it
pub fn open_window(state: &mut CompositorState, app_id: Option<&str>, size: (u32, u32)) -> Window {
    let mut events = Vec::new();
    let surface = state.surfaces.create_surface();
    let toplevel = state.new_toplevel(surface).unwrap();
    if let Some(app_id) = app_id {
        state.set_toplevel_app_id(toplevel, app_id);
    }
    state.commit_surface(surface, false, &mut events);
    state.flush_configures(&mut events);

    let (serial, _, _) = latest_configure(&events, toplevel).unwrap();
    assert!(state.ack_configure(surface, serial));
    attach(state, surface, size.0, size.1);
    state.commit_surface(surface, false, &mut events);

    let window = Window {
        surface,
        toplevel,
        size,
    };
    settle(state, window);
    window
}

/// Answer the scheduled configure like a well behaved client
pub fn settle(state: &mut CompositorState, window: Window) {
    let mut events = Vec::new();
    state.flush_configures(&mut events);
    let Some((serial, width, height)) = latest_configure(&events, window.toplevel) else {
        return;
    };
    state.ack_configure(window.surface, serial);
    let (width, height) = if width > 0 && height > 0 {
        (width as u32, height as u32)
    } else {
        window.size
    };
    attach(state, window.surface, width, height);
    state.commit_surface(window.surface, false, &mut events);
}

/// Destroy the toplevel and its surface, like a client closing a window
pub fn close_window(state: &mut CompositorState, window: Window) {
    let mut events = Vec::new();
    state.destroy_toplevel(window.toplevel, &mut events);
    state.destroy_surface(window.surface, &mut events);
}

/// Window origin in the widget
pub fn position(state: &CompositorState, window: Window) -> Option<(i32, i32)> {
    let node = state.toplevels.get(window.toplevel)?.node;
    state.scene.position(node)
}
