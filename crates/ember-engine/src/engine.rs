// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ember_platform::{Platform, PlatformEvent, WindowDesc};
use ember_render::{FrameRing, GpuBackend, GpuDevice, PresentationChain};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{DrawHook, EngineConfig, EngineId, EngineSlot, FrameContext, NoopDraw};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Running,
    Suspended,
    ShuttingDown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("another engine ({live}) is already live")]
    AlreadyLive { live: EngineId },
    #[error("cannot {op} while {state:?}")]
    InvalidState {
        op: &'static str,
        state: EngineState,
    },
}

/// Owns the window, the GPU context, the swapchain, and the frame ring.
///
/// Fields below `frame_number` are filled by [`Engine::init`] in the order
/// they appear and emptied by [`Engine::cleanup`] in the opposite one.
pub struct Engine<'s, P, B>
where
    P: Platform,
    B: GpuBackend<P::Window>,
{
    slot: &'s EngineSlot,
    id: EngineId,
    config: EngineConfig,
    platform: P,
    backend: B,
    state: EngineState,
    initialized: bool,
    suspended: bool,
    frame_number: u64,
    window: Option<P::Window>,
    device: Option<B::Device>,
    chain: Option<PresentationChain<B::Device>>,
    ring: Option<FrameRing<B::Device>>,
    events: Vec<PlatformEvent>,
}

impl<'s, P, B> Engine<'s, P, B>
where
    P: Platform,
    B: GpuBackend<P::Window>,
{
    pub fn new(slot: &'s EngineSlot, config: EngineConfig, platform: P, backend: B) -> Self {
        Self {
            slot,
            id: EngineId::next(),
            config,
            platform,
            backend,
            state: EngineState::Uninitialized,
            initialized: false,
            suspended: false,
            frame_number: 0,
            window: None,
            device: None,
            chain: None,
            ring: None,
            events: Vec::new(),
        }
    }

    /// Claims the slot, then brings up window, context, presentation chain,
    /// and frame ring. On error whatever was built stays owned by the engine
    /// and is released by [`Engine::cleanup`].
    pub fn init(&mut self) -> Result<()> {
        if self.state != EngineState::Uninitialized {
            return Err(EngineError::InvalidState {
                op: "init",
                state: self.state,
            }
            .into());
        }
        self.slot
            .claim(self.id)
            .map_err(|live| EngineError::AlreadyLive { live })?;
        self.state = EngineState::Initializing;
        info!("{} initializing", self.id);

        let desc = WindowDesc {
            title: self.config.window_title.clone(),
            size: self.config.window_size,
        };
        let window = self
            .window
            .insert(self.platform.create_window(&desc).context("create window")?);
        let extent = self.platform.drawable_size(window);

        let device = self.device.insert(
            self.backend
                .create_context(&self.config.context_request(), window)
                .context("bootstrap GPU context")?,
        );

        let chain = PresentationChain::create(device, &self.config.chain_config(), extent)
            .context("create presentation chain")?;
        info!(
            "swapchain {} with {} images ({:?})",
            chain.extent(),
            chain.images().len(),
            chain.present_mode()
        );
        self.chain = Some(chain);

        let ring = FrameRing::create(device, device.graphics_queue_family(), self.config.frame_overlap)
            .context("create frame ring")?;
        self.ring = Some(ring);

        self.initialized = true;
        self.state = EngineState::Running;
        info!("{} running", self.id);
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        self.run_with(&mut NoopDraw)
    }

    /// Polls events and draws until a quit arrives. A quit is acted on after
    /// the iteration that received it. Nothing is drawn while minimized; the
    /// loop sleeps for the configured poll interval instead.
    pub fn run_with<H: DrawHook<B::Device>>(&mut self, hook: &mut H) -> Result<()> {
        if !self.initialized {
            return Err(EngineError::InvalidState {
                op: "run",
                state: self.state,
            }
            .into());
        }

        let mut quit = false;
        while !quit {
            self.platform.poll_events(&mut self.events);
            for event in self.events.drain(..) {
                match event {
                    PlatformEvent::Quit => {
                        debug!("quit requested");
                        quit = true;
                    }
                    PlatformEvent::Minimized => {
                        if !self.suspended {
                            info!("minimized; rendering suspended");
                        }
                        self.suspended = true;
                        self.state = EngineState::Suspended;
                    }
                    PlatformEvent::Restored => {
                        if self.suspended {
                            info!("restored; rendering resumed");
                        }
                        self.suspended = false;
                        self.state = EngineState::Running;
                    }
                    PlatformEvent::Resized(size) => {
                        debug!("resized to {size}; swapchain keeps its extent");
                    }
                }
            }

            if self.suspended {
                self.platform.sleep(self.config.suspended_poll_interval());
                continue;
            }
            self.draw(hook)?;
        }
        info!("{} left the main loop after {} frames", self.id, self.frame_number);
        Ok(())
    }

    fn draw<H: DrawHook<B::Device>>(&mut self, hook: &mut H) -> Result<()> {
        let (Some(device), Some(chain), Some(ring)) =
            (self.device.as_ref(), self.chain.as_ref(), self.ring.as_ref())
        else {
            return Err(EngineError::InvalidState {
                op: "draw",
                state: self.state,
            }
            .into());
        };
        let frame = FrameContext {
            device,
            chain,
            slot: ring.current_slot(self.frame_number),
            slot_index: ring.current_index(self.frame_number),
            frame_number: self.frame_number,
        };
        hook.draw(frame)
            .with_context(|| format!("draw frame {}", self.frame_number))?;
        self.frame_number += 1;
        Ok(())
    }

    /// Releases everything `init` created, newest first, and vacates the
    /// slot if this engine holds it. Safe to call more than once, and after a
    /// failed `init`.
    pub fn cleanup(&mut self) {
        if self.window.is_some() || self.device.is_some() {
            self.state = EngineState::ShuttingDown;
            if let Some(device) = self.device.as_ref() {
                if let Err(e) = device.wait_idle() {
                    warn!("wait_idle failed during cleanup: {e:#}");
                }
                if let Some(ring) = self.ring.take() {
                    ring.destroy(device);
                }
                if let Some(chain) = self.chain.take() {
                    chain.destroy(device);
                }
            }
            // Context before the window its surface was made from.
            drop(self.device.take());
            if let Some(window) = self.window.take() {
                self.platform.destroy_window(window);
            }
            info!("{} cleaned up", self.id);
        }

        self.initialized = false;
        self.suspended = false;
        self.state = EngineState::Uninitialized;
        if self.slot.release(self.id) {
            debug!("{} released its slot", self.id);
        }
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Frames drawn since `init`.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn window(&self) -> Option<&P::Window> {
        self.window.as_ref()
    }

    pub fn device(&self) -> Option<&B::Device> {
        self.device.as_ref()
    }

    pub fn chain(&self) -> Option<&PresentationChain<B::Device>> {
        self.chain.as_ref()
    }

    pub fn ring(&self) -> Option<&FrameRing<B::Device>> {
        self.ring.as_ref()
    }
}

impl<P, B> Drop for Engine<'_, P, B>
where
    P: Platform,
    B: GpuBackend<P::Window>,
{
    fn drop(&mut self) {
        self.cleanup();
    }
}
