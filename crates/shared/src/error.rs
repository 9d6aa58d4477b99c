use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-facing failure classes shown in the status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    WalletNotConnected,
    UserRejected,
    ContractCall,
    Busy,
    Internal,
}

/// Raised by wallets when the user declines a signature or transaction prompt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("user rejected {action}")]
pub struct RejectedByUser {
    pub action: String,
}

impl RejectedByUser {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

/// True when `err` (or anything in its chain) is a wallet rejection.
///
/// Providers that only surface strings are matched on the conventional
/// "user rejected" wording.
pub fn is_user_rejection(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<RejectedByUser>().is_some())
        || err
            .to_string()
            .to_ascii_lowercase()
            .contains("user rejected")
}
