//! Access to the contract that stores the enrollment collection.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ContractHandle: Send + Sync {
    async fn address(&self) -> Result<String>;
    async fn is_available(&self) -> Result<bool>;
    async fn get_data(&self, key: &str) -> Result<Vec<u8>>;
    async fn set_data(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Hands out contract handles. `None` means no contract is configured, or,
/// for [`ContractGateway::with_signer`], that no signer is available.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn read_only(&self) -> Result<Option<Arc<dyn ContractHandle>>>;
    async fn with_signer(&self) -> Result<Option<Arc<dyn ContractHandle>>>;
}

pub struct MissingContractGateway;

#[async_trait]
impl ContractGateway for MissingContractGateway {
    async fn read_only(&self) -> Result<Option<Arc<dyn ContractHandle>>> {
        Ok(None)
    }

    async fn with_signer(&self) -> Result<Option<Arc<dyn ContractHandle>>> {
        Ok(None)
    }
}
