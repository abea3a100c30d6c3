// SPDX-License-Identifier: CEPL-1.0
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

use anyhow::{Context, Result};
use ash::ext::debug_utils as ext_debug;
use ash::{vk, Entry, Instance};
use tracing::{error, trace, warn, Level};

/// Validation messages as log records. ERROR and WARNING are surfaced;
/// everything chattier stays at trace.
pub fn level_for(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else {
        Level::TRACE
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg: Cow<'_, str> = CStr::from_ptr((*data).p_message).to_string_lossy();

    let level = level_for(severity);
    if level == Level::ERROR {
        error!(kind = ?types, "validation layer: {msg}");
    } else if level == Level::WARN {
        warn!(kind = ?types, "validation layer: {msg}");
    } else {
        trace!(kind = ?types, "validation layer: {msg}");
    }
    vk::FALSE
}

/// Instance-scoped messenger; destroyed by its owner before the instance.
pub struct DebugMessenger {
    loader: ext_debug::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self> {
        let loader = ext_debug::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let handle = loader
            .create_debug_utils_messenger(&ci, None)
            .context("create_debug_utils_messenger")?;
        Ok(DebugMessenger { loader, handle })
    }

    pub unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.handle, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(level_for(S::ERROR), Level::ERROR);
        assert_eq!(level_for(S::WARNING), Level::WARN);
        assert_eq!(level_for(S::INFO), Level::TRACE);
        assert_eq!(level_for(S::VERBOSE), Level::TRACE);
    }

    #[test]
    fn callback_never_aborts_the_call() {
        let text = c"vkCreateDevice: something odd";
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: text.as_ptr(),
            ..Default::default()
        };
        let ret = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(ret, vk::FALSE);
        let ret = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(ret, vk::FALSE);
    }
}
