// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use ember_render::{FrameSlot, GpuDevice, PresentationChain};

/// Everything a frame may record against: the device, the swapchain, and
/// the ring slot owned by this frame.
pub struct FrameContext<'a, D: GpuDevice> {
    pub device: &'a D,
    pub chain: &'a PresentationChain<D>,
    pub slot: &'a FrameSlot<D>,
    pub slot_index: usize,
    pub frame_number: u64,
}

/// Called once per drawn frame.
pub trait DrawHook<D: GpuDevice> {
    fn draw(&mut self, frame: FrameContext<'_, D>) -> Result<()>;
}

impl<D, F> DrawHook<D> for F
where
    D: GpuDevice,
    F: FnMut(FrameContext<'_, D>) -> Result<()>,
{
    fn draw(&mut self, frame: FrameContext<'_, D>) -> Result<()> {
        self(frame)
    }
}

/// Records nothing.
pub struct NoopDraw;

impl<D: GpuDevice> DrawHook<D> for NoopDraw {
    fn draw(&mut self, _frame: FrameContext<'_, D>) -> Result<()> {
        Ok(())
    }
}
