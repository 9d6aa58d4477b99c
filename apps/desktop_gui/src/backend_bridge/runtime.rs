//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use anyhow::Result;
use client_core::{
    BioAuthClient, LocalContractGateway, LocalWallet, Settings, ViewState, WalletProvider,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::backend_bridge::{commands::BackendCommand, prompt::PromptApprover};
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

struct Backend {
    client: BioAuthClient,
    wallet: Arc<LocalWallet>,
    ui_tx: Sender<UiEvent>,
}

impl Backend {
    async fn open(settings: &Settings, ui_tx: Sender<UiEvent>) -> Result<Self> {
        let approver = Arc::new(PromptApprover::new(ui_tx.clone()));
        let wallet = Arc::new(LocalWallet::load_or_create(
            &settings.wallet_key_path,
            settings.chain_id,
            approver,
        )?);
        if settings.auto_connect_wallet {
            wallet.connect();
        }

        let gateway = LocalContractGateway::open(
            &settings.ledger_url,
            &settings.contract_address,
            wallet.clone() as Arc<dyn WalletProvider>,
        )
        .await?;
        tracing::info!(
            ledger = %settings.ledger_url,
            contract = %settings.contract_address,
            wallet = %wallet.address(),
            "backend opened contract ledger"
        );

        Ok(Self {
            client: BioAuthClient::new(Arc::new(gateway), wallet.clone() as Arc<dyn WalletProvider>),
            wallet,
            ui_tx,
        })
    }

    async fn handle(&self, cmd: BackendCommand) {
        let outcome = match cmd {
            BackendCommand::Refresh => self
                .client
                .load_data()
                .await
                .map(|_| ())
                .map_err(|err| UiError::from_workflow(UiErrorContext::Refresh, &err)),
            BackendCommand::Enroll(form) => self
                .client
                .enroll_biometric(form)
                .await
                .map(|_| ())
                .map_err(|err| UiError::from_workflow(UiErrorContext::Enroll, &err)),
            BackendCommand::ToggleReveal(record_id) => self
                .client
                .toggle_reveal(&record_id)
                .await
                .map(|_| ())
                .map_err(|err| UiError::from_workflow(UiErrorContext::Decrypt, &err)),
            BackendCommand::ConnectWallet => {
                self.wallet.connect();
                self.client.refresh_account().await;
                self.send(UiEvent::Info(format!(
                    "Wallet connected: {}",
                    self.wallet.address()
                )));
                Ok(())
            }
            BackendCommand::DisconnectWallet => {
                self.wallet.disconnect();
                self.client.refresh_account().await;
                self.send(UiEvent::Info("Wallet disconnected".to_string()));
                Ok(())
            }
            BackendCommand::View(action) => {
                self.client.dispatch(action).await;
                Ok(())
            }
        };

        if let Err(err) = outcome {
            self.send(UiEvent::Error(err));
        }
    }

    fn send(&self, event: UiEvent) {
        if let Err(TrySendError::Full(_)) = self.ui_tx.try_send(event) {
            tracing::warn!("backend->ui event queue is full; dropping event");
        }
    }
}

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let backend = match Backend::open(&settings, ui_tx.clone()).await {
                Ok(backend) => Arc::new(backend),
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                        UiErrorContext::BackendStartup,
                        format!("backend worker startup failure: {err:#}"),
                    )));
                    tracing::error!("failed to open backend: {err:#}");
                    return;
                }
            };

            tokio::spawn(forward_snapshots(backend.client.subscribe(), ui_tx.clone()));
            backend.send(UiEvent::StateChanged(Box::new(
                backend.client.snapshot().await,
            )));

            {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { backend.client.initialize().await });
            }
            backend.send(UiEvent::Info("Backend worker ready".to_string()));

            while let Ok(cmd) = cmd_rx.recv() {
                tracing::debug!(command = cmd.name(), "backend received command");
                // View edits apply in arrival order; workflows may wait on prompts.
                if let BackendCommand::View(action) = cmd {
                    backend.client.dispatch(action).await;
                    continue;
                }
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { backend.handle(cmd).await });
            }
            tracing::info!("ui command queue closed; backend worker exiting");
        });
    });
}

async fn forward_snapshots(mut changes: broadcast::Receiver<ViewState>, ui_tx: Sender<UiEvent>) {
    loop {
        match changes.recv().await {
            Ok(state) => {
                if let Err(TrySendError::Disconnected(_)) =
                    ui_tx.try_send(UiEvent::StateChanged(Box::new(state)))
                {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "view snapshots lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
