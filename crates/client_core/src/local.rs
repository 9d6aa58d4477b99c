//! Contract gateway backed by the local sqlite ledger.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::Storage;
use tracing::debug;

use crate::{
    gateway::{ContractGateway, ContractHandle},
    wallet::{SignaturePurpose, WalletProvider},
};

pub struct LocalContract {
    storage: Storage,
    address: String,
}

impl LocalContract {
    pub fn new(storage: Storage, address: impl Into<String>) -> Self {
        Self {
            storage,
            address: address.into(),
        }
    }
}

#[async_trait]
impl ContractHandle for LocalContract {
    async fn address(&self) -> Result<String> {
        Ok(self.address.clone())
    }

    async fn is_available(&self) -> Result<bool> {
        self.storage.is_available(&self.address).await
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>> {
        self.storage.get_data(&self.address, key).await
    }

    async fn set_data(&self, _key: &str, _value: &[u8]) -> Result<()> {
        anyhow::bail!("contract handle is read-only; connect a signer to write")
    }
}

/// Write-capable handle: every `set_data` is a transaction the wallet must sign.
pub struct SignerContract {
    contract: Arc<LocalContract>,
    wallet: Arc<dyn WalletProvider>,
    sender: String,
}

impl SignerContract {
    fn transaction_summary(&self, key: &str, value: &[u8]) -> String {
        format!(
            "to:{}\nfrom:{}\nmethod:setData\nkey:{key}\nbytes:{}",
            self.contract.address,
            self.sender,
            value.len()
        )
    }
}

#[async_trait]
impl ContractHandle for SignerContract {
    async fn address(&self) -> Result<String> {
        self.contract.address().await
    }

    async fn is_available(&self) -> Result<bool> {
        self.contract.is_available().await
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>> {
        self.contract.get_data(key).await
    }

    async fn set_data(&self, key: &str, value: &[u8]) -> Result<()> {
        let summary = self.transaction_summary(key, value);
        let signature = self
            .wallet
            .sign_message(SignaturePurpose::Transaction, &summary)
            .await
            .context("transaction signature failed")?;
        debug!(
            sender = %self.sender,
            key,
            signature_len = signature.len(),
            "transaction signed"
        );
        self.contract
            .storage
            .set_data(&self.contract.address, key, value)
            .await
    }
}

pub struct LocalContractGateway {
    contract: Arc<LocalContract>,
    wallet: Arc<dyn WalletProvider>,
}

impl LocalContractGateway {
    pub fn new(contract: LocalContract, wallet: Arc<dyn WalletProvider>) -> Self {
        Self {
            contract: Arc::new(contract),
            wallet,
        }
    }

    pub async fn open(
        ledger_url: &str,
        contract_address: &str,
        wallet: Arc<dyn WalletProvider>,
    ) -> Result<Self> {
        let storage = Storage::new(ledger_url).await?;
        storage.health_check().await?;
        Ok(Self::new(LocalContract::new(storage, contract_address), wallet))
    }

    pub fn contract(&self) -> &LocalContract {
        &self.contract
    }
}

#[async_trait]
impl ContractGateway for LocalContractGateway {
    async fn read_only(&self) -> Result<Option<Arc<dyn ContractHandle>>> {
        Ok(Some(self.contract.clone() as Arc<dyn ContractHandle>))
    }

    async fn with_signer(&self) -> Result<Option<Arc<dyn ContractHandle>>> {
        let Some(sender) = self.wallet.account() else {
            return Ok(None);
        };
        Ok(Some(Arc::new(SignerContract {
            contract: Arc::clone(&self.contract),
            wallet: Arc::clone(&self.wallet),
            sender,
        })))
    }
}
