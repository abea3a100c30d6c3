// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod error;

pub use error::{InitError, RequirementKind};

/// Diagnostics (validation layer, debug messenger, enumeration dumps) are on
/// in debug builds and off in release builds unless overridden at startup.
pub const DIAGNOSTICS_DEFAULT: bool = cfg!(debug_assertions);

pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
