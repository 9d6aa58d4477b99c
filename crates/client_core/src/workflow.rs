//! Enrollment and decryption workflows.
//!
//! Each operation awaits its external calls in sequence and reports progress
//! to the [`StateStore`] through actions. Nothing is retried.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use rand::RngCore;
use shared::{
    domain::{BiometricRecord, RecordId},
    protocol::{
        AccessRequest, StoredCollection, BIOMETRICS_KEY, DEFAULT_ACCESS_DURATION_DAYS,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    codec,
    error::WorkflowError,
    gateway::ContractGateway,
    state::{
        Action, BannerStatus, EnrollForm, StateStore, ViewState, ERROR_BANNER_TTL,
        SUCCESS_BANNER_TTL,
    },
    wallet::{SignaturePurpose, WalletProvider},
};

const PUBLIC_KEY_BYTES: usize = 1000;

pub struct BioAuthClient {
    gateway: Arc<dyn ContractGateway>,
    wallet: Arc<dyn WalletProvider>,
    store: Arc<StateStore>,
}

impl BioAuthClient {
    pub fn new(gateway: Arc<dyn ContractGateway>, wallet: Arc<dyn WalletProvider>) -> Self {
        Self {
            gateway,
            wallet,
            store: Arc::new(StateStore::default()),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewState> {
        self.store.subscribe()
    }

    pub async fn snapshot(&self) -> ViewState {
        self.store.snapshot().await
    }

    pub async fn dispatch(&self, action: Action) -> ViewState {
        self.store.dispatch(action).await
    }

    /// Loads the collection and prepares the access-request parameters.
    pub async fn initialize(&self) {
        self.refresh_account().await;
        if let Err(err) = self.load_data().await {
            warn!("initial load failed: {err}");
        }
        let access = self.build_access_request().await;
        info!(
            contract = %access.contract_address,
            chain_id = access.chain_id,
            "session parameters initialized"
        );
        self.store.dispatch(Action::SessionInitialized(access)).await;
    }

    /// Mirrors the wallet connection into view state.
    pub async fn refresh_account(&self) -> Option<String> {
        let account = self.wallet.account();
        self.store
            .dispatch(Action::AccountChanged(account.clone()))
            .await;
        account
    }

    /// Replaces the record list with the contract's collection.
    ///
    /// Returns the number of records loaded, or `None` when no contract is
    /// configured (the list is then left untouched).
    pub async fn load_data(&self) -> Result<Option<usize>, WorkflowError> {
        let generation = self
            .store
            .dispatch(Action::LoadStarted)
            .await
            .load_generation();

        let result = match self.fetch_records().await {
            Ok(Some(collection)) => {
                let count = collection.records.len();
                info!(
                    count,
                    foreign = collection.foreign.len(),
                    generation,
                    "loaded biometrics collection"
                );
                self.store
                    .dispatch(Action::LoadSucceeded {
                        generation,
                        collection,
                    })
                    .await;
                Ok(Some(count))
            }
            Ok(None) => {
                debug!("no contract configured; skipping load");
                Ok(None)
            }
            Err(err) => {
                error!("error loading data: {err:#}");
                self.show_banner(BannerStatus::Error, "Failed to load data", ERROR_BANNER_TTL)
                    .await;
                Err(WorkflowError::Contract(err))
            }
        };

        self.store.dispatch(Action::LoadFinished).await;
        result
    }

    async fn fetch_records(&self) -> anyhow::Result<Option<StoredCollection>> {
        let Some(contract) = self.gateway.read_only().await? else {
            return Ok(None);
        };

        if !contract
            .is_available()
            .await
            .context("availability check failed")?
        {
            warn!("contract reports it is not available");
            self.show_banner(
                BannerStatus::Error,
                "Contract is not available",
                SUCCESS_BANNER_TTL,
            )
            .await;
        }

        let bytes = contract
            .get_data(BIOMETRICS_KEY)
            .await
            .context("failed to read biometrics collection")?;
        Ok(Some(StoredCollection::decode(&bytes)))
    }

    /// Appends a record built from `form` and persists the whole collection.
    ///
    /// The visible list changes only after the contract write succeeds.
    pub async fn enroll_biometric(&self, form: EnrollForm) -> Result<BiometricRecord, WorkflowError> {
        let Some(owner) = self.require_account().await else {
            return Err(WorkflowError::WalletNotConnected);
        };

        if self
            .store
            .try_dispatch(|state| !state.enrolling, Action::EnrollStarted)
            .await
            .is_none()
        {
            return Err(WorkflowError::Busy("enrollment"));
        }

        self.store
            .dispatch(Action::BannerShown {
                status: BannerStatus::Pending,
                message: "Enrolling biometric with Zama FHE...".to_string(),
            })
            .await;

        let result = self.submit_enrollment(&form, owner).await;
        match &result {
            Ok(record) => {
                info!(id = %record.id, kind = %record.kind, "biometric enrolled");
                let banner = self
                    .store
                    .dispatch(Action::BannerShown {
                        status: BannerStatus::Success,
                        message: "Biometric enrolled successfully!".to_string(),
                    })
                    .await
                    .banner
                    .map(|banner| banner.id);

                if let Err(err) = self.load_data().await {
                    warn!("resync after enrollment failed: {err}");
                }

                let mut follow_up = Vec::with_capacity(2);
                if let Some(id) = banner {
                    follow_up.push(Action::BannerDismissed(id));
                }
                follow_up.push(Action::EnrollCompleted);
                self.schedule(SUCCESS_BANNER_TTL, follow_up);
            }
            Err(err) => {
                let message = if err.is_user_rejection() {
                    "Transaction rejected by user".to_string()
                } else {
                    format!("Submission failed: {err}")
                };
                warn!("enrollment failed: {err}");
                self.show_banner(BannerStatus::Error, message, ERROR_BANNER_TTL)
                    .await;
            }
        }

        self.store.dispatch(Action::EnrollFinished).await;
        result
    }

    async fn submit_enrollment(
        &self,
        form: &EnrollForm,
        owner: String,
    ) -> Result<BiometricRecord, WorkflowError> {
        let contract = self
            .gateway
            .with_signer()
            .await
            .map_err(|err| WorkflowError::from_gateway("transaction", err))?
            .ok_or(WorkflowError::SignerUnavailable)?;

        let mut candidate = self.store.snapshot().await.stored_collection();
        let now = Utc::now();
        let record = BiometricRecord {
            id: next_record_id(&candidate.records, now.timestamp_millis()),
            kind: form.kind,
            encrypted_template: codec::encode(form.parsed_score()),
            timestamp: now.timestamp(),
            owner,
        };

        candidate.push(record.clone());
        let payload = candidate.encode()?;

        if let Err(err) = contract.set_data(BIOMETRICS_KEY, &payload).await {
            debug!(
                records = candidate.records.len(),
                "discarding uncommitted biometrics collection"
            );
            return Err(WorkflowError::from_gateway("transaction", err));
        }

        self.store.dispatch(Action::EnrollCommitted(candidate)).await;
        Ok(record)
    }

    /// Asks the wallet to sign the access request, then decodes `encrypted`.
    pub async fn decrypt_with_signature(&self, encrypted: &str) -> Result<f64, WorkflowError> {
        if self.require_account().await.is_none() {
            return Err(WorkflowError::WalletNotConnected);
        }
        self.request_access_signature().await?;
        decrypt_template(encrypted.to_string()).await
    }

    /// Decrypts the record's score, or hides it when already revealed.
    ///
    /// Returns the revealed score, or `None` when the score was hidden.
    pub async fn toggle_reveal(&self, record_id: &RecordId) -> Result<Option<f64>, WorkflowError> {
        let snapshot = self.store.snapshot().await;
        let Some(record) = snapshot
            .records
            .iter()
            .find(|record| &record.id == record_id)
            .cloned()
        else {
            return Err(WorkflowError::UnknownRecord(record_id.to_string()));
        };

        if snapshot.selected.as_ref() != Some(record_id) {
            self.store
                .dispatch(Action::RecordSelected(record_id.clone()))
                .await;
        } else if snapshot.revealed_score().is_some() {
            self.store
                .dispatch(Action::ScoreHidden(record_id.clone()))
                .await;
            return Ok(None);
        }

        if self.require_account().await.is_none() {
            return Err(WorkflowError::WalletNotConnected);
        }

        let requested = self
            .store
            .try_dispatch(
                |state| state.selected.as_ref() == Some(record_id) && !state.is_decrypting(),
                Action::DecryptRequested(record_id.clone()),
            )
            .await;
        if requested.is_none() {
            return Err(WorkflowError::Busy("decryption"));
        }

        if let Err(err) = self.request_access_signature().await {
            warn!(id = %record_id, "decryption aborted: {err}");
            self.store
                .dispatch(Action::DecryptFailed(record_id.clone()))
                .await;
            return Err(err);
        }
        self.store
            .dispatch(Action::SignatureGranted(record_id.clone()))
            .await;

        match decrypt_template(record.encrypted_template).await {
            Ok(score) => {
                self.store
                    .dispatch(Action::DecryptSucceeded {
                        record_id: record_id.clone(),
                        score,
                    })
                    .await;
                Ok(Some(score))
            }
            Err(err) => {
                self.store
                    .dispatch(Action::DecryptFailed(record_id.clone()))
                    .await;
                Err(err)
            }
        }
    }

    async fn request_access_signature(&self) -> Result<(), WorkflowError> {
        let message = self.store.snapshot().await.access.signing_message();
        let signature = self
            .wallet
            .sign_message(SignaturePurpose::AccessRequest, &message)
            .await
            .map_err(|err| WorkflowError::from_gateway("signature request", err))?;
        // Consent is the only requirement; the signature itself is not checked.
        debug!(signature_len = signature.len(), "access request signed");
        Ok(())
    }

    async fn require_account(&self) -> Option<String> {
        let account = self.wallet.account();
        if account.is_none() {
            self.store.dispatch(Action::AccountChanged(None)).await;
            self.show_banner(
                BannerStatus::Error,
                "Please connect wallet first",
                ERROR_BANNER_TTL,
            )
            .await;
        }
        account
    }

    async fn build_access_request(&self) -> AccessRequest {
        let contract_address = match self.gateway.read_only().await {
            Ok(Some(contract)) => contract.address().await.unwrap_or_else(|err| {
                warn!("failed to read contract address: {err:#}");
                String::new()
            }),
            Ok(None) => String::new(),
            Err(err) => {
                warn!("failed to open contract: {err:#}");
                String::new()
            }
        };

        let chain_id = self.wallet.chain_id().await.unwrap_or_else(|err| {
            warn!("failed to query chain id: {err:#}");
            0
        });

        AccessRequest {
            public_key: generate_public_key(),
            contract_address,
            chain_id,
            start_timestamp: Utc::now().timestamp(),
            duration_days: DEFAULT_ACCESS_DURATION_DAYS,
        }
    }

    async fn show_banner(&self, status: BannerStatus, message: impl Into<String>, ttl: Duration) {
        let snapshot = self
            .store
            .dispatch(Action::BannerShown {
                status,
                message: message.into(),
            })
            .await;
        if let Some(banner) = snapshot.banner {
            self.schedule(ttl, vec![Action::BannerDismissed(banner.id)]);
        }
    }

    fn schedule(&self, delay: Duration, actions: Vec<Action>) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for action in actions {
                store.dispatch(action).await;
            }
        });
    }
}

async fn decrypt_template(template: String) -> Result<f64, WorkflowError> {
    tokio::task::spawn_blocking(move || codec::decode(&template))
        .await
        .map_err(|err| WorkflowError::Contract(anyhow::Error::new(err)))
}

/// `bio-<millis>`, bumped past any id already present in `records`.
pub fn next_record_id(records: &[BiometricRecord], millis: i64) -> RecordId {
    let mut candidate = millis;
    loop {
        let id = RecordId::from_millis(candidate);
        if records.iter().all(|record| record.id != id) {
            return id;
        }
        candidate += 1;
    }
}

pub fn generate_public_key() -> String {
    let mut bytes = [0u8; PUBLIC_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}
