// SPDX-License-Identifier: CEPL-1.0
//! Vulkan device negotiation and presentation setup on `ash`.
//!
//! Stage order: instance negotiation → device selection → queue resolution →
//! logical device → surface configuration → image views. [`VkContext::new`]
//! runs them all; the stage functions are public so each can be exercised on
//! its own with fabricated capability data.

pub mod catalog;
pub mod debug;
pub mod negotiate;
pub mod present;
pub mod queues;
pub mod requirements;
pub mod select;

mod context;

pub use catalog::{DeviceCapabilities, DeviceFeatures, InstanceCatalog, SurfaceSupport};
pub use context::{SelectedDevice, VkContext, VkInitOptions};
pub use present::{ImageViewFactory, SurfaceConfiguration};
pub use queues::QueueAssignment;
pub use requirements::{RequirementSet, MIN_API_VERSION, VALIDATION_LAYER};
pub use select::ScoredCandidate;
