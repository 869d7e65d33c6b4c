// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral GPU plumbing: the device seam, the presentation chain,
//! the per-frame resource ring and the device selection policy.
//!
//! Handles are opaque `Copy` types supplied by the backend. Nothing in this
//! crate talks to a driver directly.
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use bitflags::bitflags;
use serde::Deserialize;

pub use ember_core::RenderSize;

pub mod chain;
pub mod error;
pub mod ring;
pub mod select;
pub mod teardown;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use chain::{ChainConfig, PresentationChain};
pub use error::{NegotiationError, Rejection, RenderError};
pub use ring::{slot_index, FrameRing, FrameSlot, FRAME_OVERLAP};
pub use select::{
    ApiVersion, ContextRequest, DeviceCandidate, DeviceFeatures, DeviceRequirements, DeviceType,
    Selected,
};
pub use teardown::TeardownStack;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    Bgra8Unorm,
    Bgra8Srgb,
    Rgba8Unorm,
    Rgba8Srgb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    SrgbNonlinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub format: ColorFormat,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    pub const BGRA8_UNORM_SRGB_NONLINEAR: Self = Self {
        format: ColorFormat::Bgra8Unorm,
        color_space: ColorSpace::SrgbNonlinear,
    };
}

impl Default for SurfaceFormat {
    fn default() -> Self {
        Self::BGRA8_UNORM_SRGB_NONLINEAR
    }
}

/// Presentation modes that never tear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// Vsync-gated queue; always supported.
    #[default]
    Fifo,
    /// Latest-image-wins; falls back to `Fifo` where unsupported.
    Mailbox,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT = 1 << 0;
        const TRANSFER_DST     = 1 << 1;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CommandPoolFlags: u32 {
        const RESET_COMMAND_BUFFER = 1 << 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainRequest {
    pub extent: RenderSize,
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub usage: ImageUsage,
}

/// What the backend actually built for a [`SwapchainRequest`].
pub struct SwapchainParts<D: GpuDevice + ?Sized> {
    pub swapchain: D::Swapchain,
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: RenderSize,
    pub images: Vec<D::Image>,
}

/// A negotiated logical device plus the surface it presents to.
///
/// Dropping the device releases the whole context (device, surface, debug
/// messenger, instance). Objects created through the `create_*` calls must
/// be destroyed through the matching `destroy_*` call first.
pub trait GpuDevice {
    type Swapchain: Copy + std::fmt::Debug;
    type Image: Copy + std::fmt::Debug;
    type ImageView: Copy + std::fmt::Debug;
    type CommandPool: Copy + std::fmt::Debug;
    type CommandBuffer: Copy + std::fmt::Debug;

    fn graphics_queue_family(&self) -> u32;

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<SwapchainParts<Self>>;
    fn destroy_swapchain(&self, swapchain: Self::Swapchain);

    fn create_image_view(&self, image: Self::Image, format: SurfaceFormat) -> Result<Self::ImageView>;
    fn destroy_image_view(&self, view: Self::ImageView);

    fn create_command_pool(&self, queue_family: u32, flags: CommandPoolFlags) -> Result<Self::CommandPool>;
    /// Frees implicitly with its pool.
    fn allocate_primary_command_buffer(&self, pool: Self::CommandPool) -> Result<Self::CommandBuffer>;
    fn destroy_command_pool(&self, pool: Self::CommandPool);

    fn wait_idle(&self) -> Result<()>;
}

/// Turns a native window into a negotiated [`GpuDevice`].
pub trait GpuBackend<W: ?Sized> {
    type Device: GpuDevice;

    fn create_context(&mut self, request: &ContextRequest, window: &W) -> Result<Self::Device>;
}
