//! Wallet consent routed to a modal in the UI.

use async_trait::async_trait;
use client_core::{SignatureApprover, SignaturePurpose};
use crossbeam_channel::Sender;

use crate::controller::events::{SignatureRequest, UiEvent};

pub struct PromptApprover {
    ui_tx: Sender<UiEvent>,
}

impl PromptApprover {
    pub fn new(ui_tx: Sender<UiEvent>) -> Self {
        Self { ui_tx }
    }
}

#[async_trait]
impl SignatureApprover for PromptApprover {
    async fn approve(&self, purpose: SignaturePurpose, message: &str) -> bool {
        let (request, answer) = SignatureRequest::new(purpose, message.to_string());
        if self
            .ui_tx
            .try_send(UiEvent::SignatureRequested(request))
            .is_err()
        {
            tracing::warn!(purpose = purpose.describe(), "could not show signature prompt");
            return false;
        }
        answer.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[tokio::test]
    async fn answers_come_from_the_ui() {
        let (ui_tx, ui_rx) = bounded::<UiEvent>(4);
        let approver = PromptApprover::new(ui_tx);

        let ui = std::thread::spawn(move || {
            let mut answers = vec![true, false];
            while let Ok(event) = ui_rx.recv() {
                if let UiEvent::SignatureRequested(request) = event {
                    request.answer(answers.remove(0));
                    if answers.is_empty() {
                        break;
                    }
                }
            }
        });

        assert!(approver.approve(SignaturePurpose::Transaction, "setData").await);
        assert!(
            !approver
                .approve(SignaturePurpose::AccessRequest, "publickey:0x")
                .await
        );
        ui.join().expect("ui thread");
    }

    #[tokio::test]
    async fn closed_ui_rejects() {
        let (ui_tx, ui_rx) = bounded::<UiEvent>(1);
        drop(ui_rx);
        let approver = PromptApprover::new(ui_tx);
        assert!(!approver.approve(SignaturePurpose::Transaction, "setData").await);
    }
}
