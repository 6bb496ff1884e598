//! Casilda - an embeddable Wayland compositor
//!
//! Casilda runs a Wayland display inside a host toolkit widget. Client
//! windows are composed in software into a single frame that the widget
//! paints, and the widget's pointer and keyboard input is routed to them.
//!
//! # Architecture
//!
//! - **Server**: wayland-server display, globals and protocol dispatch
//! - **Compositor Core**: surfaces, toplevels, popups and persisted geometry
//! - **Scene**: node tree, hit-testing and frame composition
//! - **Backend**: a virtual output driven by the host frame clock
//! - **Host**: the contract the embedding toolkit implements
//!
//! # Example
//!
//! ```no_run
//! use casilda::config::CompositorConfig;
//! use casilda::host::{CursorImage, Host};
//! use casilda::widget::EmbeddedCompositor;
//!
//! struct Widget;
//!
//! impl Host for Widget {
//!     fn queue_draw(&mut self) {}
//!     fn begin_updating(&mut self) {}
//!     fn end_updating(&mut self) {}
//!     fn grab_focus(&mut self) {}
//!     fn set_cursor(&mut self, _cursor: Option<&CursorImage>) {}
//! }
//!
//! let mut compositor = EmbeddedCompositor::new(CompositorConfig::default(), Box::new(Widget));
//! compositor.size_allocate(800, 600);
//! println!("WAYLAND_DISPLAY={:?}", compositor.socket_path());
//! ```

pub mod backend;
pub mod compositor;
pub mod config;
pub mod host;
pub mod input;
pub mod protocol;
pub mod renderer;
pub mod scene;
pub mod server;
pub mod widget;

pub use config::CompositorConfig;
pub use widget::EmbeddedCompositor;
