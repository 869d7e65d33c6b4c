// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use ember_render::{
    ColorFormat, ColorSpace, CommandPoolFlags, ContextRequest, DeviceType, GpuBackend, ImageUsage,
    PresentMode, SurfaceFormat,
};

mod context;
mod device;

pub use context::VkContext;

/// Negotiates a [`VkContext`] for any window that exposes raw handles.
#[derive(Default)]
pub struct VkBackend;

impl<W: HasWindowHandle + HasDisplayHandle> GpuBackend<W> for VkBackend {
    type Device = VkContext;

    fn create_context(&mut self, request: &ContextRequest, window: &W) -> Result<VkContext> {
        VkContext::negotiate(request, window, window)
    }
}

fn vk_format(f: ColorFormat) -> vk::Format {
    match f {
        ColorFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        ColorFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        ColorFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ColorFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
    }
}

fn color_format(f: vk::Format) -> Option<ColorFormat> {
    match f {
        vk::Format::B8G8R8A8_UNORM => Some(ColorFormat::Bgra8Unorm),
        vk::Format::B8G8R8A8_SRGB => Some(ColorFormat::Bgra8Srgb),
        vk::Format::R8G8B8A8_UNORM => Some(ColorFormat::Rgba8Unorm),
        vk::Format::R8G8B8A8_SRGB => Some(ColorFormat::Rgba8Srgb),
        _ => None,
    }
}

fn vk_color_space(cs: ColorSpace) -> vk::ColorSpaceKHR {
    match cs {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

fn color_space(cs: vk::ColorSpaceKHR) -> Option<ColorSpace> {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => Some(ColorSpace::SrgbNonlinear),
        _ => None,
    }
}

fn surface_format(f: vk::SurfaceFormatKHR) -> Option<SurfaceFormat> {
    Some(SurfaceFormat {
        format: color_format(f.format)?,
        color_space: color_space(f.color_space)?,
    })
}

fn vk_present_mode(m: PresentMode) -> vk::PresentModeKHR {
    match m {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
    }
}

fn vk_image_usage(u: ImageUsage) -> vk::ImageUsageFlags {
    let mut out = vk::ImageUsageFlags::empty();
    if u.contains(ImageUsage::COLOR_ATTACHMENT) {
        out |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if u.contains(ImageUsage::TRANSFER_DST) {
        out |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    out
}

fn vk_pool_flags(f: CommandPoolFlags) -> vk::CommandPoolCreateFlags {
    let mut out = vk::CommandPoolCreateFlags::empty();
    if f.contains(CommandPoolFlags::RESET_COMMAND_BUFFER) {
        out |= vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
    }
    out
}

fn device_type(t: vk::PhysicalDeviceType) -> DeviceType {
    match t {
        vk::PhysicalDeviceType::DISCRETE_GPU => DeviceType::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceType::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceType::Virtual,
        vk::PhysicalDeviceType::CPU => DeviceType::Cpu,
        _ => DeviceType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_surface_format_maps_to_bgra8_unorm_srgb() {
        let f = SurfaceFormat::default();
        assert_eq!(vk_format(f.format), vk::Format::B8G8R8A8_UNORM);
        assert_eq!(vk_color_space(f.color_space), vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn unknown_vk_formats_have_no_mapping() {
        let hdr = vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        assert_eq!(surface_format(hdr), None);
    }

    #[test]
    fn usage_and_pool_flags_translate_bit_for_bit() {
        let usage = vk_image_usage(ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST);
        assert_eq!(
            usage,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST
        );
        assert_eq!(
            vk_pool_flags(CommandPoolFlags::RESET_COMMAND_BUFFER),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
        );
    }

    #[test]
    fn device_types() {
        assert_eq!(device_type(vk::PhysicalDeviceType::DISCRETE_GPU), DeviceType::Discrete);
        assert_eq!(device_type(vk::PhysicalDeviceType::OTHER), DeviceType::Other);
    }
}
