// SPDX-License-Identifier: CEPL-1.0
//! Windowing seam: a non-blocking event pump plus window creation.
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::Duration;

use anyhow::Result;
use ember_core::RenderSize;

mod winit_platform;

pub use winit_platform::{EventTranslator, WinitPlatform};
pub use winit;

/// Lifecycle input the engine loop reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    Quit,
    Minimized,
    Restored,
    Resized(RenderSize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub size: RenderSize,
}

pub trait Platform {
    type Window;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Self::Window>;

    /// Current drawable size in physical pixels.
    fn drawable_size(&self, window: &Self::Window) -> RenderSize;

    /// Appends every pending event to `sink` and returns without waiting.
    fn poll_events(&mut self, sink: &mut Vec<PlatformEvent>);

    fn destroy_window(&mut self, window: Self::Window);

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
