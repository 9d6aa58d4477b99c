//! UI layer: app shell, tabs, and modal windows.

pub mod app;

pub use app::DesktopGuiApp;
