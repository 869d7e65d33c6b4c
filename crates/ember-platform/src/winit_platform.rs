// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::OsError,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{Platform, PlatformEvent, WindowDesc};
use ember_core::RenderSize;

// Upper bound on pump rounds while waiting for the OS to hand us a window.
const CREATE_ATTEMPTS: u32 = 200;
const CREATE_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

/// Folds raw winit window events into [`PlatformEvent`]s.
///
/// Minimize shows up as `Occluded(true)` on some platforms and as a 0x0
/// resize on others; both collapse into one `Minimized`, and the first
/// visible, non-empty state after that becomes `Restored`. A window whose
/// last reported size is empty stays minimized however its occlusion
/// changes.
#[derive(Debug, Default)]
pub struct EventTranslator {
    minimized: bool,
    // None until the first resize arrives.
    last_size: Option<RenderSize>,
}

impl EventTranslator {
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn translate(&mut self, event: &WindowEvent) -> Option<PlatformEvent> {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => Some(PlatformEvent::Quit),
            WindowEvent::Resized(size) => {
                let size = RenderSize::new(size.width, size.height);
                self.last_size = Some(size);
                if size.is_empty() {
                    self.minimize()
                } else if self.minimized {
                    self.restore()
                } else {
                    Some(PlatformEvent::Resized(size))
                }
            }
            WindowEvent::Occluded(true) => self.minimize(),
            WindowEvent::Occluded(false) if self.has_empty_size() => None,
            WindowEvent::Occluded(false) => self.restore(),
            _ => None,
        }
    }

    fn has_empty_size(&self) -> bool {
        self.last_size.is_some_and(|s| s.is_empty())
    }

    fn minimize(&mut self) -> Option<PlatformEvent> {
        if self.minimized {
            return None;
        }
        self.minimized = true;
        Some(PlatformEvent::Minimized)
    }

    fn restore(&mut self) -> Option<PlatformEvent> {
        if !self.minimized {
            return None;
        }
        self.minimized = false;
        Some(PlatformEvent::Restored)
    }
}

#[derive(Default)]
struct Pump {
    pending: Option<WindowAttributes>,
    created: Option<std::result::Result<Window, OsError>>,
    window_id: Option<WindowId>,
    translator: EventTranslator,
    events: Vec<PlatformEvent>,
}

impl Pump {
    fn create_pending(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(attrs) = self.pending.take() {
            let res = event_loop.create_window(attrs);
            if let Ok(w) = &res {
                self.window_id = Some(w.id());
            }
            self.created = Some(res);
        }
    }
}

impl ApplicationHandler for Pump {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        self.create_pending(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window_id != Some(window_id) {
            return;
        }
        if let Some(e) = self.translator.translate(&event) {
            debug!("{event:?} -> {e:?}");
            self.events.push(e);
        }
    }
}

/// winit-backed [`Platform`], driven through `pump_app_events` so each poll
/// returns immediately.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    pump: Pump,
}

impl WinitPlatform {
    pub fn new() -> Result<Self> {
        let event_loop = EventLoop::new().context("create event loop")?;
        Ok(Self {
            event_loop,
            pump: Pump::default(),
        })
    }
}

impl Platform for WinitPlatform {
    type Window = Window;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Window> {
        self.pump.pending = Some(
            Window::default_attributes()
                .with_title(desc.title.clone())
                .with_inner_size(PhysicalSize::new(desc.size.width, desc.size.height)),
        );

        for _ in 0..CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) = self
                .event_loop
                .pump_app_events(Some(CREATE_PUMP_TIMEOUT), &mut self.pump)
            {
                return Err(anyhow!("event loop exited ({code}) before the window was created"));
            }
            if let Some(res) = self.pump.created.take() {
                let window = res.context("create_window")?;
                info!(
                    "window \"{}\" created ({}x{})",
                    desc.title,
                    window.inner_size().width,
                    window.inner_size().height
                );
                return Ok(window);
            }
        }
        self.pump.pending = None;
        Err(anyhow!("timed out waiting for window creation"))
    }

    fn drawable_size(&self, window: &Window) -> RenderSize {
        let size = window.inner_size();
        RenderSize::new(size.width, size.height)
    }

    fn poll_events(&mut self, sink: &mut Vec<PlatformEvent>) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.pump)
        {
            debug!("event loop exit ({code})");
            self.pump.events.push(PlatformEvent::Quit);
        }
        sink.append(&mut self.pump.events);
    }

    fn destroy_window(&mut self, window: Window) {
        self.pump.window_id = None;
        drop(window);
        debug!("window destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resized(w: u32, h: u32) -> WindowEvent {
        WindowEvent::Resized(PhysicalSize::new(w, h))
    }

    #[test]
    fn close_is_quit() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&WindowEvent::CloseRequested), Some(PlatformEvent::Quit));
        assert_eq!(t.translate(&WindowEvent::Destroyed), Some(PlatformEvent::Quit));
    }

    #[test]
    fn zero_resize_minimizes_once() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&resized(0, 0)), Some(PlatformEvent::Minimized));
        assert_eq!(t.translate(&WindowEvent::Occluded(true)), None);
        assert!(t.is_minimized());
        assert_eq!(t.translate(&resized(1700, 900)), Some(PlatformEvent::Restored));
        assert_eq!(
            t.translate(&resized(1700, 900)),
            Some(PlatformEvent::Resized(RenderSize::new(1700, 900)))
        );
    }

    #[test]
    fn occlusion_round_trip() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&WindowEvent::Occluded(false)), None);
        assert_eq!(t.translate(&WindowEvent::Occluded(true)), Some(PlatformEvent::Minimized));
        assert_eq!(t.translate(&WindowEvent::Occluded(false)), Some(PlatformEvent::Restored));
        assert!(!t.is_minimized());
    }

    #[test]
    fn unoccluded_but_zero_sized_stays_minimized() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&resized(0, 0)), Some(PlatformEvent::Minimized));
        assert_eq!(t.translate(&WindowEvent::Occluded(false)), None);
        assert!(t.is_minimized());
        assert_eq!(t.translate(&WindowEvent::Occluded(true)), None);
        assert_eq!(t.translate(&WindowEvent::Occluded(false)), None);
        assert_eq!(t.translate(&resized(1280, 720)), Some(PlatformEvent::Restored));
        assert!(!t.is_minimized());
    }

    #[test]
    fn occluded_after_a_real_size_restores_on_unocclude() {
        let mut t = EventTranslator::default();
        assert_eq!(
            t.translate(&resized(800, 600)),
            Some(PlatformEvent::Resized(RenderSize::new(800, 600)))
        );
        assert_eq!(t.translate(&WindowEvent::Occluded(true)), Some(PlatformEvent::Minimized));
        assert_eq!(t.translate(&WindowEvent::Occluded(false)), Some(PlatformEvent::Restored));
    }

    #[test]
    fn unrelated_events_are_dropped() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&WindowEvent::Focused(false)), None);
        assert_eq!(t.translate(&WindowEvent::RedrawRequested), None);
    }
}
