// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use lumen_core::{init_tracing, DIAGNOSTICS_DEFAULT};
use lumen_platform::{PlatformWindow, WindowSettings};
use lumen_render::SurfaceProvider;
use lumen_render_vk::{VkContext, VkInitOptions};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML); missing file means defaults
    #[arg(long, default_value = "lumen.toml")]
    config: PathBuf,

    /// Validation layer, debug messenger and enumeration dumps: true | false
    /// (default: on in debug builds)
    #[arg(long)]
    diagnostics: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
struct WindowCfg {
    title: String,
    width: u32,
    height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let s = WindowSettings::default();
        WindowCfg {
            title: s.title,
            width: s.width,
            height: s.height,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
struct DiagnosticsCfg {
    #[serde(default)]
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
struct AppCfg {
    #[serde(default)]
    window: WindowCfg,
    #[serde(default)]
    diagnostics: DiagnosticsCfg,
}

impl AppCfg {
    /// CLI flag > config file > build default.
    fn diagnostics(&self, cli: Option<bool>) -> bool {
        cli.or(self.diagnostics.enabled)
            .unwrap_or(DIAGNOSTICS_DEFAULT)
    }

    fn window_settings(&self) -> WindowSettings {
        WindowSettings {
            title: self.window.title.clone(),
            width: self.window.width.max(1),
            height: self.window.height.max(1),
        }
    }
}

/// Config plus an optional complaint to log once tracing is up.
fn load_cfg(path: &Path) -> (AppCfg, Option<String>) {
    match std::fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s, path),
        Err(_) => (AppCfg::default(), None),
    }
}

fn parse_cfg(text: &str, path: &Path) -> (AppCfg, Option<String>) {
    match toml::from_str::<AppCfg>(text) {
        Ok(cfg) => (cfg, None),
        Err(e) => (
            AppCfg::default(),
            Some(format!("ignoring {}: {e}", path.display())),
        ),
    }
}

fn run(cfg: &AppCfg, diagnostics: bool) -> Result<()> {
    // Window first: the context must be dropped before it.
    let mut window = PlatformWindow::new(cfg.window_settings())?;

    let opts = VkInitOptions {
        app_name: cfg.window.title.clone(),
        diagnostics,
    };
    let ctx = VkContext::new(&window, &opts)?;
    info!(
        "device context ready on {} ({} swapchain images)",
        ctx.physical_device().name,
        ctx.image_views().len()
    );

    while window.should_run() {
        window.pump_events()?;
    }

    info!("shutting down");
    drop(ctx);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let (cfg, cfg_warning) = load_cfg(&args.config);
    let diagnostics = cfg.diagnostics(args.diagnostics);

    init_tracing(diagnostics);
    if let Some(w) = cfg_warning {
        warn!("{w}");
    }
    info!("diagnostics = {diagnostics}");

    match run(&cfg, diagnostics) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
