// SPDX-License-Identifier: CEPL-1.0
//! Read-only snapshots of what the platform and each physical device offer.
//!
//! Nothing here is cached: callers query instance-level data once, device
//! data once per enumerated device and surface data once per configuration.

use std::ffi::{c_char, CStr, CString};

use anyhow::{Context, Result};
use ash::khr::surface;
use ash::{vk, Entry, Instance};

fn c_name(raw: &[c_char]) -> CString {
    // Fixed-size name arrays from the driver are NUL-terminated.
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_owned()
}

/// Instance layers and extensions the loader reports, in loader order.
#[derive(Clone, Debug, Default)]
pub struct InstanceCatalog {
    pub layers: Vec<CString>,
    pub extensions: Vec<CString>,
}

impl InstanceCatalog {
    pub unsafe fn query(entry: &Entry) -> Result<Self> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .context("enumerate_instance_layer_properties")?;
        let extensions = entry
            .enumerate_instance_extension_properties(None)
            .context("enumerate_instance_extension_properties")?;

        Ok(InstanceCatalog {
            layers: layers.iter().map(|l| c_name(&l.layer_name)).collect(),
            extensions: extensions
                .iter()
                .map(|e| c_name(&e.extension_name))
                .collect(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    pub geometry_shader: bool,
    /// Vulkan 1.3 core; false on devices below 1.3.
    pub dynamic_rendering: bool,
    /// Only reported when the device advertises VK_EXT_extended_dynamic_state.
    pub extended_dynamic_state: bool,
}

/// Everything device selection and device creation need to know about one
/// physical device.
#[derive(Clone, Debug)]
pub struct DeviceCapabilities {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub max_image_dimension_2d: u32,
    pub features: DeviceFeatures,
    pub extensions: Vec<CString>,
    /// Intrinsic flags per family, indexed by family index. Presentation is
    /// surface-relative and lives in [`SurfaceSupport::present_support`].
    pub queue_families: Vec<vk::QueueFlags>,
}

impl DeviceCapabilities {
    pub unsafe fn query(instance: &Instance, phys: vk::PhysicalDevice) -> Result<Self> {
        let props = instance.get_physical_device_properties(phys);

        let extensions: Vec<CString> = instance
            .enumerate_device_extension_properties(phys)
            .context("enumerate_device_extension_properties")?
            .iter()
            .map(|e| c_name(&e.extension_name))
            .collect();

        let queue_families = instance
            .get_physical_device_queue_family_properties(phys)
            .iter()
            .map(|q| q.queue_flags)
            .collect();

        let has_eds = extensions
            .iter()
            .any(|e| e.as_c_str() == ash::ext::extended_dynamic_state::NAME);

        let features = if props.api_version >= vk::API_VERSION_1_1 {
            // Only chain structs the device can actually fill in.
            let mut feats13 = vk::PhysicalDeviceVulkan13Features::default();
            let mut feats_eds = vk::PhysicalDeviceExtendedDynamicStateFeaturesEXT::default();
            let mut feats2 = vk::PhysicalDeviceFeatures2::default();
            if props.api_version >= vk::API_VERSION_1_3 {
                feats2 = feats2.push_next(&mut feats13);
            }
            if has_eds {
                feats2 = feats2.push_next(&mut feats_eds);
            }
            instance.get_physical_device_features2(phys, &mut feats2);
            let geometry_shader = feats2.features.geometry_shader == vk::TRUE;

            DeviceFeatures {
                geometry_shader,
                dynamic_rendering: feats13.dynamic_rendering == vk::TRUE,
                extended_dynamic_state: feats_eds.extended_dynamic_state == vk::TRUE,
            }
        } else {
            let feats = instance.get_physical_device_features(phys);
            DeviceFeatures {
                geometry_shader: feats.geometry_shader == vk::TRUE,
                ..Default::default()
            }
        };

        Ok(DeviceCapabilities {
            name: c_name(&props.device_name).to_string_lossy().into_owned(),
            device_type: props.device_type,
            api_version: props.api_version,
            max_image_dimension_2d: props.limits.max_image_dimension2_d,
            features,
            extensions,
            queue_families,
        })
    }

    pub fn has_extension(&self, name: &CStr) -> bool {
        self.extensions.iter().any(|e| e.as_c_str() == name)
    }

    pub fn has_graphics_family(&self) -> bool {
        self.queue_families
            .iter()
            .any(|f| f.contains(vk::QueueFlags::GRAPHICS))
    }
}

/// What a surface accepts from one physical device.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub unsafe fn query(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        // capabilities: image counts, transforms, current extent (or UINT_MAX for free-size)
        let capabilities = loader
            .get_physical_device_surface_capabilities(phys, surface)
            .context("get_physical_device_surface_capabilities")?;
        let formats = loader
            .get_physical_device_surface_formats(phys, surface)
            .context("get_physical_device_surface_formats")?;
        let present_modes = loader
            .get_physical_device_surface_present_modes(phys, surface)
            .context("get_physical_device_surface_present_modes")?;

        Ok(SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Whether each queue family (by index) can present to `surface`.
    pub unsafe fn present_support(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        family_count: usize,
    ) -> Result<Vec<bool>> {
        (0..family_count as u32)
            .map(|i| {
                loader
                    .get_physical_device_surface_support(phys, i, surface)
                    .with_context(|| format!("get_physical_device_surface_support(family {i})"))
            })
            .collect()
    }
}
