//! Frame bridge
//!
//! Ties the virtual output's frame requests to the host paint cycle. A
//! frame event either queues a widget redraw (keeping the host frame clock
//! running while there is work) or stops the clock once a frame passes
//! with nothing to draw. The paint callback composes the scene, hands the
//! pixels to the host and reports frame completion to clients.

use log::{debug, trace, warn};

use crate::backend::{Output, OutputState};
use crate::compositor::CompositorState;
use crate::host::{DrawContext, FrameClockSubscription, HostImage};
use crate::protocol::{ClientEvent, ClientSink};
use crate::renderer::{host_format, Canvas};

/// Paint scheduling state
#[derive(Debug)]
pub struct FrameBridge {
    /// The host frame clock is delivering continuous ticks
    updating: bool,
    /// Output-sized composition target
    canvas: Canvas,
}

impl FrameBridge {
    pub fn new() -> Self {
        Self {
            updating: false,
            canvas: Canvas::new(0, 0),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// The last composed frame
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }
}

impl Default for FrameBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositorState {
    /// The output's frame event.
    ///
    /// With neither damage nor a frame request the host clock is stopped;
    /// otherwise it is kept running and a redraw is queued.
    pub fn output_frame(&mut self) {
        let needs_frame = self.backend.output().is_some_and(|o| o.needs_frame());

        if !needs_frame && !self.scene.is_damaged() {
            if self.frames.updating {
                self.frames.updating = false;
                self.host.end_updating();
                trace!("Frame clock idle");
            }
            return;
        }

        if !self.frames.updating {
            self.frames.updating = true;
            self.host.begin_updating();
            trace!("Frame clock running");
        }
        self.host.queue_draw();
    }

    /// One host frame-clock period elapsed
    pub fn frame_clock_tick(&mut self) {
        if self.backend.output().is_some_and(|o| o.is_enabled()) {
            self.output_frame();
        }
    }

    /// Compose a frame into the host drawing context.
    ///
    /// Returns false when the frame was skipped: nothing to draw, an empty
    /// output, or a pixel format the host cannot display.
    pub fn paint(&mut self, cx: &mut dyn DrawContext, sink: &mut dyn ClientSink) -> bool {
        let Some(output) = self.backend.output() else {
            return false;
        };
        if !output.needs_frame() && !self.scene.is_damaged() {
            return false;
        }
        let mode = output.mode();
        if mode.width <= 0 || mode.height <= 0 {
            return false;
        }

        let canvas = &mut self.frames.canvas;
        canvas.resize(mode.width as u32, mode.height as u32);
        self.scene.compose(canvas, &self.surfaces);

        let Some(format) = host_format(canvas.format()) else {
            warn!("No host format for {:?}, skipping frame", canvas.format());
            return false;
        };
        cx.draw_image(&HostImage {
            format,
            width: canvas.width(),
            height: canvas.height(),
            stride: canvas.stride(),
            data: canvas.data(),
        });

        if let Some(output) = self.backend.output_mut() {
            output.commit(&OutputState::default());
            output.clear_needs_frame();
        }
        self.scene.clear_damage();

        let time = self.time_msec();
        for surface in self.scene.visible_surfaces() {
            sink.send(ClientEvent::FrameDone { surface, time });
        }
        true
    }

    /// Idle work after client requests were applied: send configures and
    /// run a queued output frame
    pub fn dispatch_idle(&mut self, sink: &mut dyn ClientSink) {
        self.flush_configures(sink);
        let frame = self
            .backend
            .output_mut()
            .is_some_and(|o| o.take_scheduled_frame());
        if frame {
            self.output_frame();
        }
    }

    /// The widget got a frame clock
    pub fn realize(&mut self, subscription: FrameClockSubscription) {
        if let Some(output) = self.backend.output_mut() {
            output.attach_frame_clock(subscription);
            debug!("Frame clock connected");
        }
        self.schedule_frame();
    }

    /// The widget lost its frame clock
    pub fn unrealize(&mut self) {
        if let Some(output) = self.backend.output_mut() {
            output.detach_frame_clock();
        }
        if self.frames.updating {
            self.frames.updating = false;
            self.host.end_updating();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositorConfig;
    use crate::host::{CursorImage, Host, HostKeymap};
    use crate::renderer::{HostFormat, PixelBuffer, PixelFormat};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Calls(Rc<RefCell<Vec<&'static str>>>);

    impl Host for Calls {
        fn queue_draw(&mut self) {
            self.0.borrow_mut().push("queue_draw");
        }
        fn begin_updating(&mut self) {
            self.0.borrow_mut().push("begin");
        }
        fn end_updating(&mut self) {
            self.0.borrow_mut().push("end");
        }
        fn grab_focus(&mut self) {}
        fn set_cursor(&mut self, _cursor: Option<&CursorImage>) {}
        fn keymap(&self) -> Option<HostKeymap> {
            Some(HostKeymap {
                keymap: String::new(),
                active_layout: None,
            })
        }
    }

    #[derive(Default)]
    struct Frames(Vec<(HostFormat, u32, u32, Option<u32>)>);

    impl DrawContext for Frames {
        fn draw_image(&mut self, image: &HostImage<'_>) {
            let first = image
                .data
                .get(..4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
            self.0.push((image.format, image.width, image.height, first));
        }
    }

    fn state(calls: &Calls) -> CompositorState {
        CompositorState::new(CompositorConfig::default(), Box::new(calls.clone()))
    }

    #[test]
    fn test_frame_with_damage_starts_clock_once() {
        let calls = Calls::default();
        let mut state = state(&calls);
        state.size_allocate(4, 4, &mut Vec::new());

        state.output_frame();
        state.output_frame();
        assert_eq!(*calls.0.borrow(), vec!["begin", "queue_draw", "queue_draw"]);
        assert!(state.frames.is_updating());
    }

    #[test]
    fn test_idle_frame_stops_clock() {
        let calls = Calls::default();
        let mut state = state(&calls);
        state.size_allocate(4, 4, &mut Vec::new());
        state.output_frame();
        state.scene.clear_damage();

        state.output_frame();
        assert_eq!(calls.0.borrow().last(), Some(&"end"));
        assert!(!state.frames.is_updating());

        // Already stopped
        let before = calls.0.borrow().len();
        state.output_frame();
        assert_eq!(calls.0.borrow().len(), before);
    }

    #[test]
    fn test_paint_composes_background() {
        let calls = Calls::default();
        let mut state = state(&calls);
        state.size_allocate(4, 3, &mut Vec::new());

        let mut frames = Frames::default();
        assert!(state.paint(&mut frames, &mut Vec::new()));
        assert_eq!(frames.0, vec![(HostFormat::Argb32, 4, 3, Some(0xffff_ffff))]);
        assert!(!state.scene.is_damaged());

        // Nothing changed since
        assert!(!state.paint(&mut frames, &mut Vec::new()));
        assert_eq!(frames.0.len(), 1);
    }

    #[test]
    fn test_paint_skips_empty_output() {
        let calls = Calls::default();
        let mut state = state(&calls);
        let mut frames = Frames::default();
        assert!(!state.paint(&mut frames, &mut Vec::new()));
        assert!(frames.0.is_empty());
    }

    #[test]
    fn test_paint_sends_frame_done_to_visible_surfaces() {
        let calls = Calls::default();
        let mut state = state(&calls);
        state.size_allocate(8, 8, &mut Vec::new());

        let surface = state.surfaces.create_surface();
        state
            .surfaces
            .get_mut(surface)
            .unwrap()
            .attach(Some(PixelBuffer::filled(2, 2, PixelFormat::Argb8888, 0xff00_ff00)));
        let root = state.scene.root();
        state.scene.create_surface(root, surface);
        state.commit_surface(surface, true, &mut Vec::new());

        let mut events = Vec::new();
        assert!(state.paint(&mut Frames::default(), &mut events));
        assert!(events
            .iter()
            .any(|e| matches!(e, ClientEvent::FrameDone { surface: s, .. } if *s == surface)));
        assert!(!state.backend.output().unwrap().needs_frame());
        assert_eq!(state.frames.canvas().pixel(0, 0), Some(0xff00_ff00));
    }

    #[test]
    fn test_dispatch_idle_runs_scheduled_frame() {
        let calls = Calls::default();
        let mut state = state(&calls);
        state.size_allocate(4, 4, &mut Vec::new());
        calls.0.borrow_mut().clear();

        state.dispatch_idle(&mut Vec::new());
        assert_eq!(*calls.0.borrow(), vec!["begin", "queue_draw"]);

        calls.0.borrow_mut().clear();
        state.dispatch_idle(&mut Vec::new());
        assert!(calls.0.borrow().is_empty());
    }

    #[test]
    fn test_realize_unrealize() {
        let calls = Calls::default();
        let mut state = state(&calls);
        let disconnected = Rc::new(RefCell::new(false));
        {
            let disconnected = disconnected.clone();
            state.realize(FrameClockSubscription::new(move || *disconnected.borrow_mut() = true));
        }
        assert!(state.backend.output().unwrap().has_frame_clock());
        state.unrealize();
        assert!(*disconnected.borrow());
    }
}
