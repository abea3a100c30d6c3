// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use anyhow::Result;
use ash::vk;
use lumen_core::InitError;
use raw_window_handle::RawDisplayHandle;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Lowest device API version we accept; also the instance API version we
/// request. Dynamic rendering is core from 1.3.
pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

/// The fixed set of names the application needs from the platform.
///
/// Built once at startup from the windowing layer's surface extensions and the
/// diagnostics flag, then only read.
#[derive(Clone, Debug)]
pub struct RequirementSet {
    layers: Vec<CString>,
    instance_extensions: Vec<CString>,
    device_extensions: Vec<CString>,
    min_api_version: u32,
    diagnostics: bool,
}

impl RequirementSet {
    /// `windowing_extensions` are the instance extensions the surface layer
    /// needs. With `diagnostics` on, the validation layer and debug-utils
    /// extension are added.
    pub fn new(windowing_extensions: impl IntoIterator<Item = CString>, diagnostics: bool) -> Self {
        let mut layers = Vec::new();
        let mut instance_extensions: Vec<CString> = windowing_extensions.into_iter().collect();
        if diagnostics {
            layers.push(VALIDATION_LAYER.to_owned());
            instance_extensions.push(ash::ext::debug_utils::NAME.to_owned());
        }

        RequirementSet {
            layers,
            instance_extensions,
            device_extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            min_api_version: MIN_API_VERSION,
            diagnostics,
        }
    }

    /// Requirements for presenting to a surface on `display`.
    pub fn for_display(display: RawDisplayHandle, diagnostics: bool) -> Result<Self> {
        let exts = ash_window::enumerate_required_extensions(display).map_err(|e| {
            InitError::PlatformInitFailure(format!("no Vulkan surface support for display: {e}"))
        })?;
        let names = exts.iter().map(|&p| unsafe { CStr::from_ptr(p) }.to_owned());
        Ok(Self::new(names, diagnostics))
    }

    pub fn layers(&self) -> &[CString] {
        &self.layers
    }

    pub fn instance_extensions(&self) -> &[CString] {
        &self.instance_extensions
    }

    pub fn device_extensions(&self) -> &[CString] {
        &self.device_extensions
    }

    pub fn min_api_version(&self) -> u32 {
        self.min_api_version
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }
}

/// Pointer view for `pp_enabled_*_names`; valid while `names` lives.
pub(crate) fn as_ptrs(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wsi() -> Vec<CString> {
        vec![
            c"VK_KHR_surface".to_owned(),
            c"VK_KHR_wayland_surface".to_owned(),
        ]
    }

    #[test]
    fn diagnostics_add_layer_and_debug_utils() {
        let r = RequirementSet::new(wsi(), true);
        assert_eq!(r.layers(), &[VALIDATION_LAYER.to_owned()]);
        assert_eq!(
            r.instance_extensions().last().map(|c| c.as_c_str()),
            Some(ash::ext::debug_utils::NAME)
        );
        assert_eq!(r.instance_extensions().len(), 3);
    }

    #[test]
    fn release_set_is_windowing_only() {
        let r = RequirementSet::new(wsi(), false);
        assert!(r.layers().is_empty());
        assert_eq!(r.instance_extensions(), wsi().as_slice());
        assert!(!r.diagnostics());
    }

    #[test]
    fn swapchain_is_always_a_device_requirement() {
        for diag in [false, true] {
            let r = RequirementSet::new(wsi(), diag);
            assert_eq!(r.device_extensions(), &[ash::khr::swapchain::NAME.to_owned()]);
            assert_eq!(r.min_api_version(), vk::API_VERSION_1_3);
        }
    }

    #[test]
    fn display_handle_picks_windowing_extensions() {
        use raw_window_handle::{WaylandDisplayHandle, XlibDisplayHandle};
        use std::ptr::NonNull;

        let xlib = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let r = RequirementSet::for_display(xlib, true).unwrap();
        assert_eq!(
            r.instance_extensions(),
            &[
                ash::khr::surface::NAME.to_owned(),
                ash::khr::xlib_surface::NAME.to_owned(),
                ash::ext::debug_utils::NAME.to_owned(),
            ]
        );
        assert_eq!(r.layers(), &[VALIDATION_LAYER.to_owned()]);

        let mut display = 0u8;
        let wayland = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(
            NonNull::from(&mut display).cast(),
        ));
        let r = RequirementSet::for_display(wayland, false).unwrap();
        assert_eq!(
            r.instance_extensions(),
            &[
                ash::khr::surface::NAME.to_owned(),
                ash::khr::wayland_surface::NAME.to_owned(),
            ]
        );
        assert!(r.layers().is_empty());
    }

    #[test]
    fn pointer_view_keeps_order() {
        let names = wsi();
        let ptrs = as_ptrs(&names);
        assert_eq!(ptrs.len(), 2);
        assert_eq!(unsafe { CStr::from_ptr(ptrs[1]) }, c"VK_KHR_wayland_surface");
    }
}
