// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use thiserror::Error;

/// Which class of named capability a requirement belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Layer,
    InstanceExtension,
    DeviceExtension,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequirementKind::Layer => "layer",
            RequirementKind::InstanceExtension => "instance extension",
            RequirementKind::DeviceExtension => "device extension",
        })
    }
}

/// Every way bringing up the device context can fail.
///
/// All variants are terminal for the initialization attempt. Platform call
/// failures that do not fit a class here travel as `anyhow` context instead;
/// these values pass through that layer untouched and can be recovered with
/// `anyhow::Error::downcast_ref::<InitError>()`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InitError {
    /// The windowing layer could not start, create a window or a surface.
    #[error("platform initialization failed: {0}")]
    PlatformInitFailure(String),

    /// The platform (or the chosen device) lacks a capability by name.
    #[error("required {kind} not supported: {name}")]
    MissingRequirement { name: String, kind: RequirementKind },

    /// Enumeration worked but no device survived scoring.
    #[error("no suitable physical device available")]
    NoSuitableDevice,

    #[error("no queue family supports graphics")]
    NoGraphicsQueue,

    #[error("no queue family can present to the surface")]
    NoPresentationQueue,

    /// The platform reported surface capabilities its own contract forbids.
    #[error("inconsistent surface capabilities: {0}")]
    SwapchainConfigurationFailure(String),
}

impl InitError {
    pub fn missing(name: impl Into<String>, kind: RequirementKind) -> Self {
        InitError::MissingRequirement {
            name: name.into(),
            kind,
        }
    }
}
