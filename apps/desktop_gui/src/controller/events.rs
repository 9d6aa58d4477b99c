//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{SignaturePurpose, ViewState, WorkflowError};
use shared::error::ErrorCode;
use tokio::sync::oneshot;

pub enum UiEvent {
    Info(String),
    StateChanged(Box<ViewState>),
    SignatureRequested(SignatureRequest),
    Error(UiError),
}

/// A pending wallet prompt. Dropping it without answering counts as a rejection.
pub struct SignatureRequest {
    pub purpose: SignaturePurpose,
    pub message: String,
    respond: oneshot::Sender<bool>,
}

impl SignatureRequest {
    pub fn new(purpose: SignaturePurpose, message: String) -> (Self, oneshot::Receiver<bool>) {
        let (respond, answer) = oneshot::channel();
        (
            Self {
                purpose,
                message,
                respond,
            },
            answer,
        )
    }

    pub fn title(&self) -> &'static str {
        match self.purpose {
            SignaturePurpose::AccessRequest => "Signature request",
            SignaturePurpose::Transaction => "Confirm transaction",
        }
    }

    pub fn answer(self, approved: bool) {
        if self.respond.send(approved).is_err() {
            tracing::debug!("signature prompt answered after the request was abandoned");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Wallet,
    Rejected,
    Contract,
    Busy,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Enroll,
    Decrypt,
    Refresh,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_workflow(context: UiErrorContext, err: &WorkflowError) -> Self {
        let category = match err.code() {
            ErrorCode::WalletNotConnected => UiErrorCategory::Wallet,
            ErrorCode::UserRejected => UiErrorCategory::Rejected,
            ErrorCode::ContractCall => UiErrorCategory::Contract,
            ErrorCode::Busy => UiErrorCategory::Busy,
            ErrorCode::Internal => UiErrorCategory::Unknown,
        };
        Self {
            category,
            context,
            message: err.to_string(),
        }
    }

    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("user rejected") {
            UiErrorCategory::Rejected
        } else if lower.contains("wallet") {
            UiErrorCategory::Wallet
        } else if lower.contains("contract")
            || lower.contains("ledger")
            || lower.contains("database")
        {
            UiErrorCategory::Contract
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Errors the status banner already reports.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self.category,
            UiErrorCategory::Rejected | UiErrorCategory::Busy | UiErrorCategory::Wallet
        ) && self.context != UiErrorContext::BackendStartup
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Wallet => "Wallet",
        UiErrorCategory::Rejected => "Rejected",
        UiErrorCategory::Contract => "Contract",
        UiErrorCategory::Busy => "Busy",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
