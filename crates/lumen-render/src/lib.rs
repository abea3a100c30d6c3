// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// The windowing collaborator a graphics backend needs.
///
/// Raw handles come from the `raw-window-handle` supertraits; the backend
/// builds its native surface from them.
pub trait SurfaceProvider: HasWindowHandle + HasDisplayHandle {
    /// Current framebuffer size of the native drawable.
    fn framebuffer_size(&self) -> RenderSize;

    /// False once the user (or the OS) asked the surface to close.
    fn should_run(&self) -> bool;

    /// Dispatch pending window events; may block until at least one arrives.
    fn pump_events(&mut self) -> Result<()>;
}
