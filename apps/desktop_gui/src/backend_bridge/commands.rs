//! Backend commands queued from UI to backend worker.

use client_core::{Action, EnrollForm};
use shared::domain::RecordId;

pub enum BackendCommand {
    Refresh,
    Enroll(EnrollForm),
    ToggleReveal(RecordId),
    ConnectWallet,
    DisconnectWallet,
    /// View-only change applied straight to the state store.
    View(Action),
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Refresh => "refresh",
            BackendCommand::Enroll(_) => "enroll",
            BackendCommand::ToggleReveal(_) => "toggle_reveal",
            BackendCommand::ConnectWallet => "connect_wallet",
            BackendCommand::DisconnectWallet => "disconnect_wallet",
            BackendCommand::View(action) => action.name(),
        }
    }
}
