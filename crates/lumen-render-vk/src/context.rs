// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use lumen_core::InitError;
use lumen_render::{RenderSize, SurfaceProvider};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::info;

use crate::catalog::{DeviceCapabilities, InstanceCatalog, SurfaceSupport};
use crate::debug::DebugMessenger;
use crate::negotiate::{negotiate_device, negotiate_instance};
use crate::present::{
    configure, create_image_views, destroy_image_views, swapchain_create_info,
    SurfaceConfiguration,
};
use crate::queues::{resolve, QueueAssignment};
use crate::requirements::{as_ptrs, RequirementSet};
use crate::select::{select, version_string};

const ENGINE_NAME: &CStr = c"No Engine";
const QUEUE_PRIORITY: f32 = 0.5;

#[derive(Clone, Debug)]
pub struct VkInitOptions {
    pub app_name: String,
    /// Validation layer, debug messenger and enumeration dumps.
    pub diagnostics: bool,
}

/// The chosen physical device. Platform-owned; nothing to destroy.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub score: u32,
}

// Owns entry, instance, debug messenger and surface.
struct InstanceRecord {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for InstanceRecord {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some(dbg) = self.debug.take() {
                dbg.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

// Owns the logical device; its queues go with it.
struct DeviceRecord {
    device: ash::Device,
    assignment: QueueAssignment,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Drop for DeviceRecord {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
    }
}

// Owns the swapchain and the views over its images. The images themselves
// belong to the swapchain.
struct PresentationRecord {
    device: ash::Device,
    loader: swapchain::Device,
    swapchain: vk::SwapchainKHR,
    config: SurfaceConfiguration,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
}

impl Drop for PresentationRecord {
    fn drop(&mut self) {
        unsafe {
            destroy_image_views(&self.device, &self.image_views);
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// A device context ready for rendering: instance, surface, chosen device,
/// logical device with its queues, swapchain and one view per image.
///
/// STRICT TEARDOWN ORDER (field declaration order):
/// - image views, then swapchain
/// - logical device (and its queues)
/// - surface, debug messenger, instance last
///
/// Must be dropped before the window it was built from.
pub struct VkContext {
    presentation: PresentationRecord,
    device: DeviceRecord,
    instance: InstanceRecord,
    physical: SelectedDevice,
    requirements: RequirementSet,
}

impl VkContext {
    /// Run the whole pipeline. Each stage runs only if the previous one
    /// succeeded; whatever was created before a failure is released.
    pub fn new<P: SurfaceProvider + ?Sized>(provider: &P, opts: &VkInitOptions) -> Result<Self> {
        let dh: RawDisplayHandle = provider
            .display_handle()
            .map_err(|e| InitError::PlatformInitFailure(format!("display handle: {e}")))?
            .as_raw();
        let wh: RawWindowHandle = provider
            .window_handle()
            .map_err(|e| InitError::PlatformInitFailure(format!("window handle: {e}")))?
            .as_raw();

        let requirements = RequirementSet::for_display(dh, opts.diagnostics)?;

        unsafe {
            let instance = create_instance(&requirements, &opts.app_name, dh, wh)?;
            let (physical, caps) = pick_physical_device(&instance.instance, &requirements)?;

            let present_support = SurfaceSupport::present_support(
                &instance.surface_loader,
                physical.handle,
                instance.surface,
                caps.queue_families.len(),
            )?;
            let assignment = resolve(&caps.queue_families, |i| present_support[i as usize])?;
            info!(
                "queues: graphics family {}, present family {}{}",
                assignment.graphics,
                assignment.present,
                if assignment.is_combined() {
                    " (combined)"
                } else {
                    ""
                }
            );

            let device =
                create_logical_device(&instance.instance, &physical, &caps, &requirements, assignment)?;
            let presentation =
                create_presentation(&instance, &device, &physical, provider.framebuffer_size())?;

            info!(
                "Vulkan swapchain ready ({}x{}, {:?} / {:?}, {:?}, {} images)",
                presentation.config.extent.width,
                presentation.config.extent.height,
                presentation.config.format,
                presentation.config.color_space,
                presentation.config.present_mode,
                presentation.images.len()
            );

            Ok(VkContext {
                presentation,
                device,
                instance,
                physical,
                requirements,
            })
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.instance.surface
    }

    pub fn physical_device(&self) -> &SelectedDevice {
        &self.physical
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.device
    }

    pub fn queue_assignment(&self) -> QueueAssignment {
        self.device.assignment
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.presentation.swapchain
    }

    pub fn surface_configuration(&self) -> &SurfaceConfiguration {
        &self.presentation.config
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.presentation.images
    }

    /// `image_views()[i]` views `images()[i]`.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.presentation.image_views
    }
}

unsafe fn create_instance(
    reqs: &RequirementSet,
    app_name: &str,
    dh: RawDisplayHandle,
    wh: RawWindowHandle,
) -> Result<InstanceRecord> {
    // STRICT ORDER:
    // 1) Negotiate layers/extensions (nothing created yet)
    // 2) Create VkInstance
    // 3) Debug messenger (instance-scoped)
    // 4) Create VkSurfaceKHR FROM THIS INSTANCE
    let entry = Entry::linked();
    let catalog = InstanceCatalog::query(&entry)?;
    negotiate_instance(reqs, &catalog)?;

    let app = CString::new(app_name).context("application name contains NUL")?;
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: ENGINE_NAME.as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: reqs.min_api_version(),
        ..Default::default()
    };

    let layers = as_ptrs(reqs.layers());
    let exts = as_ptrs(reqs.instance_extensions());
    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: exts.len() as u32,
        pp_enabled_extension_names: exts.as_ptr(),
        ..Default::default()
    };

    let instance = entry
        .create_instance(&create_info, None)
        .context("create_instance")?;
    let surface_loader = surface::Instance::new(&entry, &instance);

    let mut record = InstanceRecord {
        entry,
        instance,
        debug: None,
        surface_loader,
        surface: vk::SurfaceKHR::null(),
    };

    if reqs.diagnostics() {
        record.debug = Some(DebugMessenger::new(&record.entry, &record.instance)?);
    }

    record.surface = ash_window::create_surface(&record.entry, &record.instance, dh, wh, None)
        .map_err(|e| InitError::PlatformInitFailure(format!("create_surface: {e}")))?;

    Ok(record)
}

unsafe fn pick_physical_device(
    instance: &Instance,
    reqs: &RequirementSet,
) -> Result<(SelectedDevice, DeviceCapabilities)> {
    let handles = instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;
    if handles.is_empty() {
        info!("no physical devices enumerated");
    }

    let mut candidates = Vec::with_capacity(handles.len());
    for phys in handles {
        candidates.push((DeviceCapabilities::query(instance, phys)?, phys));
    }

    let best = select(&candidates, reqs)?;
    let index = candidates
        .iter()
        .position(|(_, h)| *h == best.device)
        .ok_or(InitError::NoSuitableDevice)?;
    let (caps, handle) = candidates.swap_remove(index);

    info!(
        "selected physical device: {} ({:?}, API {}, score {})",
        caps.name,
        caps.device_type,
        version_string(caps.api_version),
        best.score
    );

    Ok((
        SelectedDevice {
            handle,
            name: caps.name.clone(),
            score: best.score,
        },
        caps,
    ))
}

unsafe fn create_logical_device(
    instance: &Instance,
    physical: &SelectedDevice,
    caps: &DeviceCapabilities,
    reqs: &RequirementSet,
    assignment: QueueAssignment,
) -> Result<DeviceRecord> {
    // All required device extensions or nothing gets created.
    negotiate_device(reqs, caps)?;

    let priorities = [QUEUE_PRIORITY];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = assignment
        .unique_families()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let mut device_exts = as_ptrs(reqs.device_extensions());
    let use_eds = caps.features.extended_dynamic_state
        && caps.has_extension(ash::ext::extended_dynamic_state::NAME);
    if use_eds {
        device_exts.push(ash::ext::extended_dynamic_state::NAME.as_ptr());
    }

    // STRICT ORDER (feature pNext chain): feats2 -> feats13 [-> feats_eds]
    // Only enable what the capability record says the device has.
    let mut feats13 =
        vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(caps.features.dynamic_rendering);
    let mut feats_eds =
        vk::PhysicalDeviceExtendedDynamicStateFeaturesEXT::default().extended_dynamic_state(true);
    let mut feats2 = vk::PhysicalDeviceFeatures2::default()
        .features(vk::PhysicalDeviceFeatures::default().geometry_shader(true))
        .push_next(&mut feats13);
    if use_eds {
        feats2 = feats2.push_next(&mut feats_eds);
    }

    let dinfo = vk::DeviceCreateInfo::default()
        .push_next(&mut feats2)
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&device_exts);

    let device = instance
        .create_device(physical.handle, &dinfo, None)
        .context("create_device")?;

    let graphics_queue = device.get_device_queue(assignment.graphics, 0);
    let present_queue = device.get_device_queue(assignment.present, 0);

    Ok(DeviceRecord {
        device,
        assignment,
        graphics_queue,
        present_queue,
    })
}

unsafe fn create_presentation(
    inst: &InstanceRecord,
    dev: &DeviceRecord,
    physical: &SelectedDevice,
    window: RenderSize,
) -> Result<PresentationRecord> {
    let support = SurfaceSupport::query(&inst.surface_loader, physical.handle, inst.surface)?;
    let config = configure(
        &support.capabilities,
        &support.formats,
        &support.present_modes,
        window,
    )?;

    info!(
        "surface: format {:?} / {:?}, present_mode {:?}, extent {}x{} (window {}x{}), images(min={}, max={} → picked={})",
        config.format,
        config.color_space,
        config.present_mode,
        config.extent.width,
        config.extent.height,
        window.width,
        window.height,
        support.capabilities.min_image_count,
        support.capabilities.max_image_count,
        config.image_count
    );

    let families = dev.assignment.unique_families();
    let swap_info = swapchain_create_info(
        inst.surface,
        &config,
        support.capabilities.current_transform,
        &families,
    );

    let loader = swapchain::Device::new(&inst.instance, &dev.device);
    let swapchain = loader
        .create_swapchain(&swap_info, None)
        .context("create_swapchain")?;

    // From here on the record owns the swapchain, so a failure below still
    // destroys it.
    let mut record = PresentationRecord {
        device: dev.device.clone(),
        loader,
        swapchain,
        config,
        images: Vec::new(),
        image_views: Vec::new(),
    };

    record.images = record
        .loader
        .get_swapchain_images(swapchain)
        .context("get_swapchain_images")?;
    record.image_views = create_image_views(&record.device, &record.images, config.format)?;

    Ok(record)
}
