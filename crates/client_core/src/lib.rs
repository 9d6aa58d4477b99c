//! Client logic for encrypted biometric enrollment and score reveal.
//!
//! Front ends drive a [`BioAuthClient`] and render the [`ViewState`]
//! snapshots it broadcasts.

pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod local;
pub mod state;
pub mod view;
pub mod wallet;
mod workflow;

pub use config::{load_settings, Settings};
pub use error::WorkflowError;
pub use gateway::{ContractGateway, ContractHandle, MissingContractGateway};
pub use local::LocalContractGateway;
pub use state::{Action, EnrollForm, RevealPhase, StateStore, Tab, ViewState};
pub use wallet::{
    AutoApprove, DisconnectedWallet, LocalWallet, RejectAll, SignatureApprover, SignaturePurpose,
    WalletProvider,
};
pub use workflow::{generate_public_key, next_record_id, BioAuthClient};

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
