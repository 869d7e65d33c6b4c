// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    GpuDevice, ImageUsage, PresentMode, RenderError, RenderSize, SurfaceFormat, SwapchainRequest,
};

/// Format and present-mode policy for the swapchain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            format: SurfaceFormat::BGRA8_UNORM_SRGB_NONLINEAR,
            present_mode: PresentMode::Fifo,
        }
    }
}

impl ChainConfig {
    // Renderers blit into the images as well as drawing into them.
    pub const USAGE: ImageUsage = ImageUsage::COLOR_ATTACHMENT.union(ImageUsage::TRANSFER_DST);

    fn request(&self, extent: RenderSize) -> SwapchainRequest {
        SwapchainRequest {
            extent,
            format: self.format,
            present_mode: self.present_mode,
            usage: Self::USAGE,
        }
    }
}

/// Swapchain plus one view per swapchain image.
///
/// Images belong to the swapchain and are never destroyed one by one; the
/// views belong to the chain and are destroyed before the swapchain.
pub struct PresentationChain<D: GpuDevice> {
    swapchain: D::Swapchain,
    format: SurfaceFormat,
    present_mode: PresentMode,
    extent: RenderSize,
    images: Vec<D::Image>,
    image_views: Vec<D::ImageView>,
}

impl<D: GpuDevice> PresentationChain<D> {
    pub fn create(device: &D, cfg: &ChainConfig, extent: RenderSize) -> Result<Self> {
        if extent.is_empty() {
            return Err(RenderError::EmptyExtent {
                width: extent.width,
                height: extent.height,
            }
            .into());
        }

        let parts = device
            .create_swapchain(&cfg.request(extent))
            .context("create_swapchain")?;

        let mut image_views = Vec::with_capacity(parts.images.len());
        for &image in &parts.images {
            match device.create_image_view(image, parts.format) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    for view in image_views.drain(..) {
                        device.destroy_image_view(view);
                    }
                    device.destroy_swapchain(parts.swapchain);
                    return Err(e.context("create_image_view"));
                }
            }
        }

        info!(
            "presentation chain ready ({}, {:?} / {:?}, {:?}, {} images)",
            parts.extent,
            parts.format.format,
            parts.format.color_space,
            parts.present_mode,
            parts.images.len()
        );

        Ok(Self {
            swapchain: parts.swapchain,
            format: parts.format,
            present_mode: parts.present_mode,
            extent: parts.extent,
            images: parts.images,
            image_views,
        })
    }

    /// Every view first, then the swapchain that owns the images.
    pub fn destroy(self, device: &D) {
        for view in self.image_views {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.swapchain);
        debug!("presentation chain destroyed");
    }

    /// Tears the chain down completely and builds a fresh one.
    pub fn recreate(self, device: &D, cfg: &ChainConfig, extent: RenderSize) -> Result<Self> {
        self.destroy(device);
        Self::create(device, cfg, extent)
    }

    pub fn swapchain(&self) -> D::Swapchain {
        self.swapchain
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn extent(&self) -> RenderSize {
        self.extent
    }

    pub fn images(&self) -> &[D::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[D::ImageView] {
        &self.image_views
    }
}
