use shared::error::{is_user_rejection, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("wallet is not connected")]
    WalletNotConnected,
    #[error("user rejected {0}")]
    UserRejected(String),
    #[error("failed to get contract with signer")]
    SignerUnavailable,
    #[error("{0} already in progress")]
    Busy(&'static str),
    #[error("unknown biometric record {0}")]
    UnknownRecord(String),
    #[error("failed to encode biometrics collection: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Contract(anyhow::Error),
}

impl WorkflowError {
    /// Wraps a gateway or wallet failure, keeping user rejections distinct.
    pub fn from_gateway(action: &str, err: anyhow::Error) -> Self {
        if is_user_rejection(&err) {
            Self::UserRejected(action.to_string())
        } else {
            Self::Contract(err)
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            WorkflowError::WalletNotConnected => ErrorCode::WalletNotConnected,
            WorkflowError::UserRejected(_) => ErrorCode::UserRejected,
            WorkflowError::SignerUnavailable | WorkflowError::Contract(_) => {
                ErrorCode::ContractCall
            }
            WorkflowError::Busy(_) => ErrorCode::Busy,
            WorkflowError::UnknownRecord(_) | WorkflowError::Encode(_) => ErrorCode::Internal,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WorkflowError::UserRejected(_))
    }
}
