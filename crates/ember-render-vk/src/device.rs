// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, bail, Context, Result};
use ash::vk;
use tracing::{info, warn};

use ember_render::{
    CommandPoolFlags, GpuDevice, PresentMode, RenderSize, SurfaceFormat, SwapchainParts,
    SwapchainRequest,
};

use crate::{surface_format, vk_color_space, vk_format, vk_image_usage, vk_pool_flags, vk_present_mode};
use crate::VkContext;

/// Requested pair if the surface offers it, else the first pair we can name.
fn pick_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    want: SurfaceFormat,
) -> Option<(vk::SurfaceFormatKHR, SurfaceFormat)> {
    let wanted = vk::SurfaceFormatKHR {
        format: vk_format(want.format),
        color_space: vk_color_space(want.color_space),
    };
    // A lone UNDEFINED entry means the surface takes anything.
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return Some((wanted, want));
    }
    if formats
        .iter()
        .any(|f| f.format == wanted.format && f.color_space == wanted.color_space)
    {
        return Some((wanted, want));
    }
    formats
        .iter()
        .copied()
        .find_map(|f| surface_format(f).map(|sf| (f, sf)))
}

/// Every Vulkan surface must support FIFO; anything else is opt-in.
fn choose_present_mode(modes: &[vk::PresentModeKHR], want: PresentMode) -> PresentMode {
    if modes.contains(&vk_present_mode(want)) {
        want
    } else {
        PresentMode::Fifo
    }
}

fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

// One more than minimum for overlap, capped by max (0 == "no max").
fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

impl GpuDevice for VkContext {
    type Swapchain = vk::SwapchainKHR;
    type Image = vk::Image;
    type ImageView = vk::ImageView;
    type CommandPool = vk::CommandPool;
    type CommandBuffer = vk::CommandBuffer;

    fn graphics_queue_family(&self) -> u32 {
        self.queue_family
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<SwapchainParts<Self>> {
        unsafe {
            let surf_i = &self.surface_loader;
            let caps = surf_i
                .get_physical_device_surface_capabilities(self.phys, self.surface)
                .context("get_physical_device_surface_capabilities")?;
            let formats = surf_i
                .get_physical_device_surface_formats(self.phys, self.surface)
                .context("get_physical_device_surface_formats")?;
            let modes = surf_i
                .get_physical_device_surface_present_modes(self.phys, self.surface)
                .context("get_physical_device_surface_present_modes")?;

            let (vk_surf_format, surf_format) = pick_surface_format(&formats, request.format)
                .ok_or_else(|| anyhow!("surface offers no 8-bit sRGB-nonlinear format"))?;
            if surf_format != request.format {
                warn!(
                    "surface lacks {:?}; using {:?}",
                    request.format, surf_format
                );
            }
            let present_mode = choose_present_mode(&modes, request.present_mode);
            if present_mode != request.present_mode {
                warn!("{:?} unsupported; falling back to {:?}", request.present_mode, present_mode);
            }
            let extent = extent_from_caps(&caps, request.extent);

            let usage = vk_image_usage(request.usage);
            if !caps.supported_usage_flags.contains(usage) {
                bail!(
                    "surface does not support swapchain usage {:?} (supported {:?})",
                    usage,
                    caps.supported_usage_flags
                );
            }

            let pre_transform = if caps
                .supported_transforms
                .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
            {
                vk::SurfaceTransformFlagsKHR::IDENTITY
            } else {
                caps.current_transform
            };

            let swap_info = vk::SwapchainCreateInfoKHR {
                s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
                surface: self.surface,
                min_image_count: image_count(&caps),
                image_format: vk_surf_format.format,
                image_color_space: vk_surf_format.color_space,
                image_extent: extent,
                image_array_layers: 1,
                image_usage: usage,
                image_sharing_mode: vk::SharingMode::EXCLUSIVE, // single graphics queue family
                pre_transform,
                composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                present_mode: vk_present_mode(present_mode),
                clipped: vk::TRUE,
                ..Default::default()
            };

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&swap_info, None)
                .context("create_swapchain")?;
            let images = match self.swapchain_loader.get_swapchain_images(swapchain) {
                Ok(images) => images,
                Err(e) => {
                    self.swapchain_loader.destroy_swapchain(swapchain, None);
                    return Err(anyhow!("get_swapchain_images: {e:?}"));
                }
            };

            info!(
                "vk swapchain: {}x{}, {:?} / {:?}, {:?}, images(min={} -> got={})",
                extent.width,
                extent.height,
                vk_surf_format.format,
                vk_surf_format.color_space,
                present_mode,
                caps.min_image_count,
                images.len()
            );

            Ok(SwapchainParts {
                swapchain,
                format: surf_format,
                present_mode,
                extent: RenderSize::new(extent.width, extent.height),
                images,
            })
        }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(&self, image: vk::Image, format: SurfaceFormat) -> Result<vk::ImageView> {
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: vk_format(format.format),
            subresource_range: sub,
            ..Default::default()
        };
        Ok(unsafe { self.device.create_image_view(&iv_info, None) }?)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_command_pool(&self, queue_family: u32, flags: CommandPoolFlags) -> Result<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_family,
            flags: vk_pool_flags(flags),
            ..Default::default()
        };
        Ok(unsafe { self.device.create_command_pool(&pool_info, None) }?)
    }

    fn allocate_primary_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let bufs = unsafe { self.device.allocate_command_buffers(&alloc_info) }?;
        bufs.into_iter()
            .next()
            .ok_or_else(|| anyhow!("allocate_command_buffers returned nothing"))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_render::{ColorFormat, ColorSpace};

    fn caps(current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn requested_format_wins_when_offered() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let (vkf, f) = pick_surface_format(&formats, SurfaceFormat::default()).unwrap();
        assert_eq!(vkf.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(f, SurfaceFormat::default());
    }

    #[test]
    fn falls_back_to_first_known_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::A2B10G10R10_UNORM_PACK32,
                color_space: vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let (_, f) = pick_surface_format(&formats, SurfaceFormat::default()).unwrap();
        assert_eq!(
            f,
            SurfaceFormat {
                format: ColorFormat::Rgba8Srgb,
                color_space: ColorSpace::SrgbNonlinear
            }
        );
    }

    #[test]
    fn undefined_surface_accepts_request() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert!(pick_surface_format(&formats, SurfaceFormat::default()).is_some());
    }

    #[test]
    fn mailbox_only_when_offered() {
        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&fifo_only, PresentMode::Mailbox), PresentMode::Fifo);
        let both = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&both, PresentMode::Mailbox), PresentMode::Mailbox);
        assert_eq!(choose_present_mode(&both, PresentMode::Fifo), PresentMode::Fifo);
    }

    #[test]
    fn fixed_surface_extent_is_authoritative() {
        let e = extent_from_caps(&caps((1700, 900)), RenderSize::new(800, 600));
        assert_eq!((e.width, e.height), (1700, 900));
    }

    #[test]
    fn free_surface_extent_clamps_request() {
        let e = extent_from_caps(&caps((u32::MAX, u32::MAX)), RenderSize::new(9000, 900));
        assert_eq!((e.width, e.height), (4096, 900));
    }

    #[test]
    fn image_count_respects_max() {
        let mut c = caps((1, 1));
        assert_eq!(image_count(&c), 3);
        c.max_image_count = 2;
        assert_eq!(image_count(&c), 2);
    }
}
