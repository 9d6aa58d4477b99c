//! Command orchestration helpers from UI actions to backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();

    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "UI command queue is full; please retry".to_string();
            tracing::warn!(command = cmd_name, "ui->backend command queue is full");
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = "Backend worker stopped; restart the app".to_string();
            tracing::error!(command = cmd_name, "ui->backend command queue disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn full_queue_reports_status() {
        let (cmd_tx, _cmd_rx) = bounded::<BackendCommand>(1);
        let mut status = String::new();
        dispatch_backend_command(&cmd_tx, BackendCommand::Refresh, &mut status);
        assert!(status.is_empty());

        dispatch_backend_command(&cmd_tx, BackendCommand::Refresh, &mut status);
        assert_eq!(status, "UI command queue is full; please retry");
    }

    #[test]
    fn disconnected_worker_reports_status() {
        let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(1);
        drop(cmd_rx);
        let mut status = String::new();
        dispatch_backend_command(&cmd_tx, BackendCommand::ConnectWallet, &mut status);
        assert!(status.contains("Backend worker stopped"));
    }
}
