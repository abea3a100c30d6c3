// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use lumen_core::{InitError, RequirementKind};
use tracing::info;

use crate::catalog::{DeviceCapabilities, InstanceCatalog};
use crate::requirements::RequirementSet;

/// Check that every `required` name appears in `available`.
///
/// Exact, case-sensitive match. Fails on the first missing name in
/// `required` order.
pub fn negotiate(
    required: &[CString],
    available: &[CString],
    kind: RequirementKind,
) -> Result<(), InitError> {
    match required.iter().find(|r| !available.contains(*r)) {
        Some(missing) => Err(InitError::missing(missing.to_string_lossy(), kind)),
        None => Ok(()),
    }
}

pub fn dump_available(kind: RequirementKind, available: &[CString]) {
    info!("available {kind}s ({}):", available.len());
    for name in available {
        info!("  - {}", name.to_string_lossy());
    }
}

/// Layers first, then instance extensions. Runs before the instance exists,
/// so a failure leaves nothing to clean up.
pub fn negotiate_instance(
    reqs: &RequirementSet,
    catalog: &InstanceCatalog,
) -> Result<(), InitError> {
    if reqs.diagnostics() {
        dump_available(RequirementKind::Layer, &catalog.layers);
    }
    negotiate(reqs.layers(), &catalog.layers, RequirementKind::Layer)?;

    if reqs.diagnostics() {
        dump_available(RequirementKind::InstanceExtension, &catalog.extensions);
    }
    negotiate(
        reqs.instance_extensions(),
        &catalog.extensions,
        RequirementKind::InstanceExtension,
    )
}

pub fn negotiate_device(reqs: &RequirementSet, caps: &DeviceCapabilities) -> Result<(), InitError> {
    if reqs.diagnostics() {
        dump_available(RequirementKind::DeviceExtension, &caps.extensions);
    }
    negotiate(
        reqs.device_extensions(),
        &caps.extensions,
        RequirementKind::DeviceExtension,
    )
}
