// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};

use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, error, info, trace, warn};

use ember_render::{
    ApiVersion, ContextRequest, DeviceCandidate, DeviceFeatures, DeviceRequirements, TeardownStack,
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance, optional debug messenger, surface, physical + logical device
/// and the graphics queue, negotiated as one unit.
///
/// Every object is released through `teardown`, in reverse creation order,
/// when the context drops.
pub struct VkContext {
    // Keeps the loader alive until the teardown stack has run.
    _entry: Entry,
    pub(crate) instance: Instance,
    pub(crate) surface_loader: surface::Instance,
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) phys: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    pub(crate) swapchain_loader: swapchain::Device,
    pub(crate) queue_family: u32,
    queue: vk::Queue,
    validation: bool,
    teardown: TeardownStack,
}

impl Drop for VkContext {
    fn drop(&mut self) {
        // STRICT ORDER (LIFO): device, surface, debug messenger, instance.
        self.teardown.unwind();
        info!("vulkan context destroyed");
    }
}

impl VkContext {
    /// Builds the whole context or nothing: a failing step releases every
    /// object created before it.
    pub fn negotiate(
        request: &ContextRequest,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let entry = unsafe { Entry::load() }.context("load Vulkan loader")?;
        let mut teardown = TeardownStack::new();

        unsafe {
            // STRICT ORDER:
            // 1) instance (WSI + optional debug ext)
            // 2) debug messenger
            // 3) surface FROM THIS INSTANCE
            // 4) physical device selected AGAINST THIS SURFACE
            // 5) logical device
            let validation = request.validation && validation_available(&entry);
            if request.validation && !validation {
                warn!("validation requested but {VALIDATION_LAYER:?} is not installed; continuing without it");
            }

            let instance = create_instance(&entry, request, dh, validation)
                .context("create_instance")?;
            {
                let instance = instance.clone();
                teardown.push("instance", move || instance.destroy_instance(None));
            }

            if validation {
                let loader = debug_utils::Instance::new(&entry, &instance);
                let messenger = create_debug_messenger(&loader).context("create_debug_messenger")?;
                teardown.push("debug_messenger", move || {
                    loader.destroy_debug_utils_messenger(messenger, None)
                });
            }

            let surface_loader = surface::Instance::new(&entry, &instance);
            let surface = ash_window::create_surface(&entry, &instance, dh, wh, None)
                .context("ash_window::create_surface")?;
            {
                let loader = surface_loader.clone();
                teardown.push("surface", move || loader.destroy_surface(surface, None));
            }

            let (phys, queue_family) = select_physical_device(
                &instance,
                &surface_loader,
                surface,
                &request.requirements,
            )?;

            let device = create_device(&instance, phys, queue_family, &request.requirements.features)
                .context("create_device")?;
            {
                let device = device.clone();
                teardown.push("device", move || device.destroy_device(None));
            }

            let queue = device.get_device_queue(queue_family, 0);
            let swapchain_loader = swapchain::Device::new(&instance, &device);

            info!(
                "vulkan context ready (app={}, validation={}, queue family {})",
                request.app_name, validation, queue_family
            );

            Ok(Self {
                _entry: entry,
                instance,
                surface_loader,
                surface,
                phys,
                device,
                swapchain_loader,
                queue_family,
                queue,
                validation,
                teardown,
            })
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation
    }
}

unsafe fn validation_available(entry: &Entry) -> bool {
    let layers = entry.enumerate_instance_layer_properties().unwrap_or_default();
    let has_layer = layers
        .iter()
        .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == VALIDATION_LAYER);
    let exts = entry
        .enumerate_instance_extension_properties(None)
        .unwrap_or_default();
    let has_debug_utils = exts
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == debug_utils::NAME);
    has_layer && has_debug_utils
}

unsafe fn create_instance(
    entry: &Entry,
    request: &ContextRequest,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    let app = CString::new(request.app_name.as_str()).context("app name contains NUL")?;
    let engine = CString::new(request.engine_name.as_str()).context("engine name contains NUL")?;

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: engine.as_ptr(),
        engine_version: 0,
        api_version: request.requirements.min_api_version.to_raw(),
        ..Default::default()
    };

    let ext_slice = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?;
    let mut ext_vec = ext_slice.to_vec();
    if validation {
        ext_vec.push(debug_utils::NAME.as_ptr());
    }

    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layers.len() as u32, layers.as_ptr())
    } else {
        (0u32, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", ?types, "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", ?types, "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", ?types, "{msg}");
    } else {
        trace!(target: "vulkan", ?types, "{msg}");
    }
    vk::FALSE
}

unsafe fn create_debug_messenger(loader: &debug_utils::Instance) -> Result<vk::DebugUtilsMessengerEXT> {
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    Ok(loader.create_debug_utils_messenger(&ci, None)?)
}

/// Describes `phys` for the selection policy without deciding anything.
unsafe fn describe_physical_device(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
    requirements: &DeviceRequirements,
) -> DeviceCandidate {
    let props = instance.get_physical_device_properties(phys);
    let name = CStr::from_ptr(props.device_name.as_ptr())
        .to_string_lossy()
        .into_owned();
    let api_version = ApiVersion::from_raw(props.api_version);

    // 1.2/1.3 feature structs are only valid to query on devices that speak
    // at least the version we ask for.
    let mut features = DeviceFeatures::default();
    if api_version >= requirements.min_api_version {
        let mut f12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut f13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut f2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut f12)
            .push_next(&mut f13);
        instance.get_physical_device_features2(phys, &mut f2);
        features = DeviceFeatures {
            dynamic_rendering: f13.dynamic_rendering == vk::TRUE,
            synchronization2: f13.synchronization2 == vk::TRUE,
            buffer_device_address: f12.buffer_device_address == vk::TRUE,
            descriptor_indexing: f12.descriptor_indexing == vk::TRUE,
        };
    }

    // Presenting needs VK_KHR_swapchain on top of a queue with surface support.
    let has_swapchain = instance
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME);

    let graphics_present_family = if has_swapchain {
        instance
            .get_physical_device_queue_family_properties(phys)
            .iter()
            .enumerate()
            .find(|(i, q)| {
                q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                    && surf_i
                        .get_physical_device_surface_support(phys, *i as u32, surface)
                        .unwrap_or(false)
            })
            .map(|(i, _)| i as u32)
    } else {
        None
    };

    DeviceCandidate {
        name,
        device_type: crate::device_type(props.device_type),
        api_version,
        features,
        graphics_present_family,
    }
}

unsafe fn select_physical_device(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> Result<(vk::PhysicalDevice, u32)> {
    let physical = instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;
    let candidates: Vec<_> = physical
        .iter()
        .map(|&phys| describe_physical_device(instance, surf_i, surface, phys, requirements))
        .collect();

    let selected = requirements.select(&candidates)?;
    Ok((physical[selected.index], selected.queue_family))
}

unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
    features: &DeviceFeatures,
) -> Result<ash::Device> {
    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };
    let device_exts = [swapchain::NAME.as_ptr()];

    // Enable exactly what was required; selection already proved support.
    let mut f12 = vk::PhysicalDeviceVulkan12Features::default()
        .buffer_device_address(features.buffer_device_address)
        .descriptor_indexing(features.descriptor_indexing);
    let mut f13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(features.dynamic_rendering)
        .synchronization2(features.synchronization2);

    let dinfo = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&qinfo))
        .enabled_extension_names(&device_exts)
        .push_next(&mut f12)
        .push_next(&mut f13);

    Ok(instance.create_device(phys, &dinfo, None)?)
}
