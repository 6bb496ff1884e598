//! Event loop integration
//!
//! A thin calloop wrapper for hosts that do not bring their own loop. The
//! compositor exposes a pollable descriptor; hosts register it here next to
//! their frame-clock timer and pass their own state as loop data.

use std::os::unix::io::{AsFd, BorrowedFd};
use std::time::Duration;

use calloop::{EventLoop as CalLoop, LoopHandle, LoopSignal};
use log::{debug, error};

/// Casilda event loop wrapper
pub struct EventLoop<D: 'static> {
    /// Calloop event loop
    event_loop: CalLoop<'static, D>,
    /// Loop signal for waking/stopping
    signal: LoopSignal,
}

impl<D: 'static> EventLoop<D> {
    /// Create a new event loop
    pub fn new() -> anyhow::Result<Self> {
        let event_loop = CalLoop::try_new()?;
        let signal = event_loop.get_signal();

        Ok(Self { event_loop, signal })
    }

    /// Get a handle to register event sources
    pub fn handle(&self) -> LoopHandle<'static, D> {
        self.event_loop.handle()
    }

    /// Get the loop signal for waking
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Run one iteration of the event loop
    pub fn dispatch(&mut self, timeout: Option<Duration>, data: &mut D) -> anyhow::Result<()> {
        self.event_loop.dispatch(timeout, data)?;
        Ok(())
    }

    /// Run the event loop until stopped, calling `idle` after every iteration
    pub fn run(&mut self, data: &mut D, mut idle: impl FnMut(&mut D)) -> anyhow::Result<()> {
        debug!("Starting event loop");

        self.event_loop
            .run(None, data, |data| idle(data))
            .map_err(|e| {
                error!("Event loop error: {}", e);
                e.into()
            })
    }

    /// Stop the event loop
    pub fn stop(&self) {
        self.signal.stop();
    }

    /// Wake the event loop from another thread
    pub fn wake(&self) {
        self.signal.wakeup();
    }
}

impl<D: 'static> AsFd for EventLoop<D> {
    /// Readable whenever a registered source is ready
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.event_loop.as_fd()
    }
}
