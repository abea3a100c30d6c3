// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

use anyhow::Result;
use lumen_core::InitError;
use lumen_render::{RenderSize, SurfaceProvider};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, WindowHandle,
};
use tracing::{debug, info};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

// Some backends deliver `resumed` only after a few round trips.
const WINDOW_CREATE_TIMEOUT: Duration = Duration::from_secs(5);
const CREATE_PUMP_SLICE: Duration = Duration::from_millis(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        WindowSettings {
            title: "Graphics App".to_owned(),
            width: 1000,
            height: 1000,
        }
    }
}

struct WindowState {
    settings: WindowSettings,
    window: Option<Window>,
    window_id: Option<WindowId>,
    create_error: Option<String>,
    running: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() {
            return;
        }

        // Not resizable: swapchain recreation is not handled.
        let attrs = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(PhysicalSize::new(self.settings.width, self.settings.height))
            .with_resizable(false);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.window_id = Some(window.id());
                self.window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(e.to_string());
                self.running = false;
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.running = false;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
            }
            _ => {}
        }
    }
}

/// A single native window plus the event loop that drives it.
///
/// Field order matters: the window is dropped before its event loop.
pub struct PlatformWindow {
    window: Window,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    /// Open the window, pumping the event loop until the platform hands us one.
    ///
    /// Every failure here is `InitError::PlatformInitFailure`.
    pub fn new(settings: WindowSettings) -> Result<Self> {
        let mut event_loop = EventLoop::new()
            .map_err(|e| InitError::PlatformInitFailure(format!("event loop: {e}")))?;

        let mut state = WindowState {
            settings,
            window: None,
            window_id: None,
            create_error: None,
            running: true,
        };

        let deadline = Instant::now() + WINDOW_CREATE_TIMEOUT;
        let window = loop {
            let status = event_loop.pump_app_events(Some(CREATE_PUMP_SLICE), &mut state);

            if let Some(window) = state.window.take() {
                break window;
            }
            if let Some(e) = state.create_error.take() {
                return Err(InitError::PlatformInitFailure(format!("create window: {e}")).into());
            }
            if let PumpStatus::Exit(code) = status {
                return Err(InitError::PlatformInitFailure(format!(
                    "event loop exited ({code}) before a window was created"
                ))
                .into());
            }
            if Instant::now() >= deadline {
                return Err(InitError::PlatformInitFailure(
                    "platform never resumed; no window created".to_owned(),
                )
                .into());
            }
        };

        let size = window.inner_size();
        info!(
            "window \"{}\" {}x{} on {}",
            state.settings.title,
            size.width,
            size.height,
            window
                .display_handle()
                .map(|dh| backend_name(dh.as_raw()))
                .unwrap_or("unknown")
        );

        Ok(PlatformWindow {
            window,
            state,
            event_loop,
        })
    }
}

impl SurfaceProvider for PlatformWindow {
    fn framebuffer_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize {
            width: size.width,
            height: size.height,
        }
    }

    fn should_run(&self) -> bool {
        self.state.running
    }

    fn pump_events(&mut self) -> Result<()> {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(None, &mut self.state) {
            debug!("event loop exited with {code}");
            self.state.running = false;
        }
        Ok(())
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

/// Windowing system name, for the startup log.
pub fn backend_name(display: RawDisplayHandle) -> &'static str {
    match display {
        RawDisplayHandle::Wayland(_) => "wayland",
        RawDisplayHandle::Xlib(_) | RawDisplayHandle::Xcb(_) => "x11",
        RawDisplayHandle::Windows(_) => "win32",
        RawDisplayHandle::AppKit(_) => "appkit",
        RawDisplayHandle::UiKit(_) => "uikit",
        RawDisplayHandle::Android(_) => "android",
        _ => "other",
    }
}
