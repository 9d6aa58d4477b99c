use std::path::PathBuf;

mod backend_bridge;
mod controller;
mod ui;

use anyhow::anyhow;
use clap::Parser;
use client_core::load_settings;
use crossbeam_channel::bounded;
use eframe::egui;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::ui::DesktopGuiApp;

#[derive(Parser, Debug)]
#[command(name = "desktop_gui", about = "BioAuth FHE desktop client")]
struct Args {
    /// TOML settings file (defaults to ./bioauth.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    backend_bridge::runtime::launch(settings, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("BioAuth FHE")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([820.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "BioAuth FHE",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(DesktopGuiApp::new(cmd_tx, ui_rx)))
        }),
    )
    .map_err(|err| anyhow!("desktop gui exited with error: {err}"))
}
