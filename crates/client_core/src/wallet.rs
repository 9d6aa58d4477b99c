//! Wallet connection state and signing consent.

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use shared::error::RejectedByUser;
use tracing::{debug, info};
use zeroize::Zeroize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePurpose {
    /// Consent to reveal a template for the current session.
    AccessRequest,
    /// Authorization of a contract write.
    Transaction,
}

impl SignaturePurpose {
    pub fn describe(self) -> &'static str {
        match self {
            SignaturePurpose::AccessRequest => "signature request",
            SignaturePurpose::Transaction => "transaction",
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connected account address, or `None` while disconnected.
    fn account(&self) -> Option<String>;
    async fn chain_id(&self) -> Result<u64>;
    /// Fails with [`RejectedByUser`] when consent is refused.
    async fn sign_message(&self, purpose: SignaturePurpose, message: &str) -> Result<Vec<u8>>;
}

pub struct DisconnectedWallet;

#[async_trait]
impl WalletProvider for DisconnectedWallet {
    fn account(&self) -> Option<String> {
        None
    }

    async fn chain_id(&self) -> Result<u64> {
        Err(anyhow!("wallet provider is unavailable"))
    }

    async fn sign_message(&self, _purpose: SignaturePurpose, _message: &str) -> Result<Vec<u8>> {
        Err(anyhow!("wallet is not connected"))
    }
}

/// Decides whether the user consents to a signature.
#[async_trait]
pub trait SignatureApprover: Send + Sync {
    async fn approve(&self, purpose: SignaturePurpose, message: &str) -> bool;
}

pub struct AutoApprove;

#[async_trait]
impl SignatureApprover for AutoApprove {
    async fn approve(&self, _purpose: SignaturePurpose, _message: &str) -> bool {
        true
    }
}

pub struct RejectAll;

#[async_trait]
impl SignatureApprover for RejectAll {
    async fn approve(&self, _purpose: SignaturePurpose, _message: &str) -> bool {
        false
    }
}

/// Software wallet holding an ed25519 key on disk.
pub struct LocalWallet {
    signing_key: SigningKey,
    address: String,
    chain_id: u64,
    connected: AtomicBool,
    approver: Arc<dyn SignatureApprover>,
}

impl LocalWallet {
    pub fn new(signing_key: SigningKey, chain_id: u64, approver: Arc<dyn SignatureApprover>) -> Self {
        let address = derive_address(&signing_key.verifying_key());
        Self {
            signing_key,
            address,
            chain_id,
            connected: AtomicBool::new(false),
            approver,
        }
    }

    pub fn generate(chain_id: u64, approver: Arc<dyn SignatureApprover>) -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let wallet = Self::new(SigningKey::from_bytes(&seed), chain_id, approver);
        seed.zeroize();
        wallet
    }

    /// Loads the hex-encoded key seed at `path`, creating one if the file is missing.
    pub fn load_or_create(
        path: &Path,
        chain_id: u64,
        approver: Arc<dyn SignatureApprover>,
    ) -> Result<Self> {
        if path.exists() {
            let mut raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read wallet key '{}'", path.display()))?;
            let decoded = hex::decode(raw.trim());
            raw.zeroize();
            let mut bytes = decoded
                .with_context(|| format!("wallet key '{}' is not valid hex", path.display()))?;
            if bytes.len() != 32 {
                let len = bytes.len();
                bytes.zeroize();
                bail!(
                    "wallet key '{}' must hold 32 bytes, found {len}",
                    path.display()
                );
            }
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            bytes.zeroize();
            let wallet = Self::new(SigningKey::from_bytes(&seed), chain_id, approver);
            seed.zeroize();
            debug!(address = %wallet.address, "loaded wallet key");
            return Ok(wallet);
        }

        let wallet = Self::generate(chain_id, approver);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create wallet directory '{}'",
                    parent.display()
                )
            })?;
        }
        let mut encoded = hex::encode(wallet.signing_key.to_bytes());
        let written = fs::write(path, &encoded);
        encoded.zeroize();
        written.with_context(|| format!("failed to write wallet key '{}'", path.display()))?;
        restrict_permissions(path)?;
        info!(address = %wallet.address, path = %path.display(), "created wallet key");
        Ok(wallet)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn verify(&self, message: &str, signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.verifying_key()
            .verify(message.as_bytes(), &signature)
            .is_ok()
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    fn account(&self) -> Option<String> {
        self.is_connected().then(|| self.address.clone())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn sign_message(&self, purpose: SignaturePurpose, message: &str) -> Result<Vec<u8>> {
        if !self.is_connected() {
            bail!("wallet is not connected");
        }
        if !self.approver.approve(purpose, message).await {
            return Err(RejectedByUser::new(purpose.describe()).into());
        }
        let signature = self.signing_key.sign(message.as_bytes());
        Ok(signature.to_bytes().to_vec())
    }
}

/// `0x` followed by the last 20 bytes of SHA-256 over the public key.
pub fn derive_address(verifying_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(verifying_key.as_bytes());
    format!("0x{}", hex::encode(&digest[12..]))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on '{}'", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
