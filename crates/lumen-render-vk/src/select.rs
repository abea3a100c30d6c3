// SPDX-License-Identifier: CEPL-1.0
//! Physical-device scoring and selection.
//!
//! Score = 1000 for a discrete GPU + `maxImageDimension2D`. A device missing
//! the geometry-shader feature, below [`RequirementSet::min_api_version`],
//! without a graphics-capable queue family, or missing a required device
//! extension scores 0 and is never selected.
//!
//! Ties go to the candidate seen first, so the result is stable for a fixed
//! enumeration order.

use std::cmp::Reverse;
use std::fmt;

use ash::vk;
use lumen_core::InitError;
use tracing::info;

use crate::catalog::DeviceCapabilities;
use crate::requirements::RequirementSet;

pub const DISCRETE_GPU_BONUS: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoredCandidate<H> {
    pub score: u32,
    pub device: H,
}

/// Why a device can never be chosen, whatever else it offers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disqualified {
    NoGeometryShader,
    ApiVersionTooLow { found: u32, needed: u32 },
    NoGraphicsFamily,
    MissingExtension(String),
}

impl fmt::Display for Disqualified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualified::NoGeometryShader => f.write_str("no geometry shader"),
            Disqualified::ApiVersionTooLow { found, needed } => write!(
                f,
                "API {} < required {}",
                version_string(*found),
                version_string(*needed)
            ),
            Disqualified::NoGraphicsFamily => f.write_str("no graphics queue family"),
            Disqualified::MissingExtension(name) => write!(f, "missing {name}"),
        }
    }
}

pub fn version_string(v: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(v),
        vk::api_version_minor(v),
        vk::api_version_patch(v)
    )
}

pub fn disqualification(caps: &DeviceCapabilities, reqs: &RequirementSet) -> Option<Disqualified> {
    if !caps.features.geometry_shader {
        return Some(Disqualified::NoGeometryShader);
    }
    if caps.api_version < reqs.min_api_version() {
        return Some(Disqualified::ApiVersionTooLow {
            found: caps.api_version,
            needed: reqs.min_api_version(),
        });
    }
    if !caps.has_graphics_family() {
        return Some(Disqualified::NoGraphicsFamily);
    }
    reqs.device_extensions()
        .iter()
        .find(|name| !caps.has_extension(name))
        .map(|name| Disqualified::MissingExtension(name.to_string_lossy().into_owned()))
}

pub fn score(caps: &DeviceCapabilities, reqs: &RequirementSet) -> u32 {
    if disqualification(caps, reqs).is_some() {
        return 0;
    }

    let bonus = if caps.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        DISCRETE_GPU_BONUS
    } else {
        0
    };
    bonus.saturating_add(caps.max_image_dimension_2d)
}

/// Highest non-zero score; the earliest wins a tie.
pub fn best<H: Copy>(scored: &[ScoredCandidate<H>]) -> Option<ScoredCandidate<H>> {
    scored
        .iter()
        .enumerate()
        .filter(|(_, c)| c.score > 0)
        .max_by_key(|(i, c)| (c.score, Reverse(*i)))
        .map(|(_, c)| *c)
}

/// Score every candidate, then take the best.
///
/// `NoSuitableDevice` when the list is empty or every device scores 0.
pub fn select<H: Copy>(
    candidates: &[(DeviceCapabilities, H)],
    reqs: &RequirementSet,
) -> Result<ScoredCandidate<H>, InitError> {
    let scored: Vec<ScoredCandidate<H>> = candidates
        .iter()
        .map(|(caps, device)| {
            let score = score(caps, reqs);
            if reqs.diagnostics() {
                match disqualification(caps, reqs) {
                    Some(why) => info!(
                        "physical device: {} ({:?})  score: 0 ({why})",
                        caps.name, caps.device_type
                    ),
                    None => info!(
                        "physical device: {} ({:?})  score: {score}",
                        caps.name, caps.device_type
                    ),
                }
            }
            ScoredCandidate {
                score,
                device: *device,
            }
        })
        .collect();

    best(&scored).ok_or(InitError::NoSuitableDevice)
}
