use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{BiometricKind, BiometricRecord, RecordId},
    error::RejectedByUser,
    protocol::{encode_collection, BIOMETRICS_KEY},
};

use super::*;

const OWNER: &str = "0xABC0000000000000000000000000000000000001";
const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

#[derive(Clone, Copy, PartialEq)]
enum WriteOutcome {
    Accept,
    Fail,
    Reject,
}

struct MemoryContract {
    data: Mutex<Vec<u8>>,
    available: AtomicBool,
    fail_reads: AtomicBool,
    write_outcome: Mutex<WriteOutcome>,
    writes: AtomicUsize,
}

impl MemoryContract {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            write_outcome: Mutex::new(WriteOutcome::Accept),
            writes: AtomicUsize::new(0),
        })
    }

    fn seed(&self, bytes: &[u8]) {
        *self.data.lock().expect("data lock") = bytes.to_vec();
    }

    fn set_write_outcome(&self, outcome: WriteOutcome) {
        *self.write_outcome.lock().expect("outcome lock") = outcome;
    }
}

#[async_trait]
impl ContractHandle for MemoryContract {
    async fn address(&self) -> Result<String> {
        Ok(CONTRACT.to_string())
    }

    async fn is_available(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn get_data(&self, _key: &str) -> Result<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("rpc unreachable"));
        }
        Ok(self.data.lock().expect("data lock").clone())
    }

    async fn set_data(&self, key: &str, value: &[u8]) -> Result<()> {
        assert_eq!(key, BIOMETRICS_KEY);
        let outcome = *self.write_outcome.lock().expect("outcome lock");
        match outcome {
            WriteOutcome::Accept => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                *self.data.lock().expect("data lock") = value.to_vec();
                Ok(())
            }
            WriteOutcome::Fail => Err(anyhow!("out of gas")),
            WriteOutcome::Reject => Err(RejectedByUser::new("transaction").into()),
        }
    }
}

struct TestGateway {
    contract: Arc<MemoryContract>,
    signer_calls: AtomicUsize,
}

#[async_trait]
impl ContractGateway for TestGateway {
    async fn read_only(&self) -> Result<Option<Arc<dyn ContractHandle>>> {
        Ok(Some(self.contract.clone() as Arc<dyn ContractHandle>))
    }

    async fn with_signer(&self) -> Result<Option<Arc<dyn ContractHandle>>> {
        self.signer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.contract.clone() as Arc<dyn ContractHandle>))
    }
}

struct TestWallet {
    account: Option<String>,
    approve: bool,
    signatures: AtomicUsize,
}

#[async_trait]
impl WalletProvider for TestWallet {
    fn account(&self) -> Option<String> {
        self.account.clone()
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(31337)
    }

    async fn sign_message(&self, purpose: SignaturePurpose, _message: &str) -> Result<Vec<u8>> {
        self.signatures.fetch_add(1, Ordering::SeqCst);
        if !self.approve {
            return Err(RejectedByUser::new(purpose.describe()).into());
        }
        Ok(vec![7; 64])
    }
}

struct Harness {
    client: BioAuthClient,
    contract: Arc<MemoryContract>,
    gateway: Arc<TestGateway>,
    wallet: Arc<TestWallet>,
}

fn harness(account: Option<&str>, approve: bool) -> Harness {
    let contract = MemoryContract::new();
    let gateway = Arc::new(TestGateway {
        contract: Arc::clone(&contract),
        signer_calls: AtomicUsize::new(0),
    });
    let wallet = Arc::new(TestWallet {
        account: account.map(str::to_string),
        approve,
        signatures: AtomicUsize::new(0),
    });
    let client = BioAuthClient::new(
        gateway.clone() as Arc<dyn ContractGateway>,
        wallet.clone() as Arc<dyn WalletProvider>,
    );
    Harness {
        client,
        contract,
        gateway,
        wallet,
    }
}

fn stored_record(id: &str, score: f64) -> BiometricRecord {
    BiometricRecord {
        id: RecordId::from(id),
        kind: BiometricKind::Fingerprint,
        encrypted_template: codec::encode(score),
        timestamp: 1_700_000_000,
        owner: OWNER.to_string(),
    }
}

fn banner_message(state: &ViewState) -> Option<&str> {
    state.banner.as_ref().map(|banner| banner.message.as_str())
}

#[tokio::test]
async fn load_replaces_records_from_contract() {
    let h = harness(Some(OWNER), true);
    let payload =
        encode_collection(&[stored_record("bio-1", 70.0), stored_record("bio-2", 80.0)])
            .expect("encode");
    h.contract.seed(&payload);

    let loaded = h.client.load_data().await.expect("load");
    assert_eq!(loaded, Some(2));

    let state = h.client.snapshot().await;
    assert_eq!(state.records.len(), 2);
    assert!(!state.loading);
    assert!(!state.refreshing);
}

#[tokio::test]
async fn malformed_payload_loads_as_empty_list() {
    let h = harness(Some(OWNER), true);
    h.contract.seed(b"not json at all");

    assert_eq!(h.client.load_data().await.expect("load"), Some(0));
    assert!(h.client.snapshot().await.records.is_empty());
}

#[tokio::test]
async fn unavailable_contract_warns_but_still_reads() {
    let h = harness(Some(OWNER), true);
    h.contract.available.store(false, Ordering::SeqCst);
    h.contract
        .seed(&encode_collection(&[stored_record("bio-1", 70.0)]).expect("encode"));

    assert_eq!(h.client.load_data().await.expect("load"), Some(1));
    let state = h.client.snapshot().await;
    assert_eq!(banner_message(&state), Some("Contract is not available"));
    assert_eq!(state.records.len(), 1);
}

#[tokio::test]
async fn missing_contract_leaves_list_untouched() {
    let client = BioAuthClient::new(
        Arc::new(MissingContractGateway),
        Arc::new(DisconnectedWallet),
    );
    assert_eq!(client.load_data().await.expect("load"), None);
    let state = client.snapshot().await;
    assert!(state.records.is_empty());
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn load_failure_banner_clears_after_three_seconds() {
    let h = harness(Some(OWNER), true);
    h.contract.fail_reads.store(true, Ordering::SeqCst);

    let err = h.client.load_data().await.expect_err("load fails");
    assert!(err.to_string().contains("failed to read biometrics collection"));

    let state = h.client.snapshot().await;
    assert_eq!(banner_message(&state), Some("Failed to load data"));
    assert!(!state.refreshing);

    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert!(h.client.snapshot().await.banner.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    tokio::task::yield_now().await;
    assert!(h.client.snapshot().await.banner.is_none());
}

#[tokio::test]
async fn enroll_without_wallet_never_requests_signer() {
    let h = harness(None, true);

    let err = h
        .client
        .enroll_biometric(EnrollForm::default())
        .await
        .expect_err("not connected");
    assert!(matches!(err, WorkflowError::WalletNotConnected));
    assert_eq!(h.gateway.signer_calls.load(Ordering::SeqCst), 0);

    let state = h.client.snapshot().await;
    assert_eq!(banner_message(&state), Some("Please connect wallet first"));
    assert!(!state.enrolling);
}

#[tokio::test]
async fn enroll_appends_record_owned_by_account() {
    let h = harness(Some(OWNER), true);
    h.contract
        .seed(&encode_collection(&[stored_record("bio-1", 70.0)]).expect("encode"));
    h.client.load_data().await.expect("load");

    let record = h
        .client
        .enroll_biometric(EnrollForm::new(BiometricKind::Facial, "82"))
        .await
        .expect("enroll");

    assert_eq!(record.owner, OWNER);
    assert_eq!(record.kind, BiometricKind::Facial);
    assert!(record.id.as_str().starts_with("bio-"));
    assert_eq!(codec::decode(&record.encrypted_template), 82.0);

    let state = h.client.snapshot().await;
    assert_eq!(state.records.len(), 2);
    assert_eq!(state.records[1], record);
    assert!(!state.enrolling);
    assert_eq!(
        banner_message(&state),
        Some("Biometric enrolled successfully!")
    );
    assert_eq!(h.contract.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn enroll_preserves_entries_this_client_cannot_read() {
    let h = harness(Some(OWNER), true);
    h.contract.seed(
        br#"[{"id":"bio-1","type":"fingerprint","encryptedTemplate":"FHE-NzA=","timestamp":1700000000,"owner":"0xaa"},{"id":"bio-2","type":"Facial","encryptedTemplate":"FHE-ODI=","timestamp":1700000001,"owner":"0xbb"}]"#,
    );
    assert_eq!(h.client.load_data().await.expect("load"), Some(1));

    let record = h
        .client
        .enroll_biometric(EnrollForm::default())
        .await
        .expect("enroll");

    let bytes = h.contract.data.lock().expect("data lock").clone();
    let stored: Vec<serde_json::Value> = serde_json::from_slice(&bytes).expect("array");
    let ids: Vec<&str> = stored
        .iter()
        .map(|entry| entry["id"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(ids, ["bio-1", "bio-2", record.id.as_str()]);
    assert_eq!(stored[1]["type"], "Facial");

    let state = h.client.snapshot().await;
    assert_eq!(state.records.len(), 2);
    assert_eq!(state.foreign_entries.len(), 1);
}

#[tokio::test]
async fn overlapping_loads_settle_on_the_latest_collection() {
    let h = harness(Some(OWNER), true);
    h.contract
        .seed(&encode_collection(&[stored_record("bio-1", 70.0)]).expect("encode"));

    let (first, second) = tokio::join!(h.client.load_data(), h.client.load_data());
    assert_eq!(first.expect("first load"), Some(1));
    assert_eq!(second.expect("second load"), Some(1));

    let state = h.client.snapshot().await;
    assert!(!state.refreshing);
    assert_eq!(state.records.len(), 1);
}

#[tokio::test]
async fn enrolled_facial_score_decrypts_back() {
    let h = harness(Some(OWNER), true);
    let record = h
        .client
        .enroll_biometric(EnrollForm::new(BiometricKind::Facial, "82"))
        .await
        .expect("enroll");

    let revealed = h.client.toggle_reveal(&record.id).await.expect("reveal");
    assert_eq!(revealed, Some(82.0));
    assert_eq!(
        h.client.snapshot().await.reveal,
        RevealPhase::Revealed { score: 82.0 }
    );
}

#[tokio::test]
async fn failed_write_keeps_list_unchanged() {
    let h = harness(Some(OWNER), true);
    h.contract
        .seed(&encode_collection(&[stored_record("bio-1", 70.0)]).expect("encode"));
    h.client.load_data().await.expect("load");
    h.contract.set_write_outcome(WriteOutcome::Fail);

    let err = h
        .client
        .enroll_biometric(EnrollForm::default())
        .await
        .expect_err("write fails");
    assert!(!err.is_user_rejection());

    let state = h.client.snapshot().await;
    assert_eq!(state.records.len(), 1);
    assert_eq!(banner_message(&state), Some("Submission failed: out of gas"));
    assert!(!state.enrolling);
}

#[tokio::test]
async fn rejected_transaction_is_reported_as_rejection() {
    let h = harness(Some(OWNER), true);
    h.contract.set_write_outcome(WriteOutcome::Reject);

    let err = h
        .client
        .enroll_biometric(EnrollForm::default())
        .await
        .expect_err("rejected");
    assert!(err.is_user_rejection());

    let state = h.client.snapshot().await;
    assert!(state.records.is_empty());
    assert_eq!(banner_message(&state), Some("Transaction rejected by user"));
}

#[tokio::test]
async fn concurrent_enrollment_is_refused() {
    let h = harness(Some(OWNER), true);
    h.client.dispatch(Action::EnrollStarted).await;

    let err = h
        .client
        .enroll_biometric(EnrollForm::default())
        .await
        .expect_err("busy");
    assert!(matches!(err, WorkflowError::Busy("enrollment")));
    assert_eq!(h.gateway.signer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn enroll_success_closes_modal_after_banner() {
    let h = harness(Some(OWNER), true);
    h.client.dispatch(Action::EnrollModalOpened).await;
    h.client
        .dispatch(Action::EnrollFormEdited(EnrollForm::new(
            BiometricKind::Facial,
            "90",
        )))
        .await;

    h.client
        .enroll_biometric(EnrollForm::new(BiometricKind::Facial, "90"))
        .await
        .expect("enroll");
    assert!(h.client.snapshot().await.enroll_modal_open);

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    tokio::task::yield_now().await;

    let state = h.client.snapshot().await;
    assert!(!state.enroll_modal_open);
    assert_eq!(state.enroll_form, EnrollForm::default());
    assert!(state.banner.is_none());
}

#[tokio::test]
async fn reveal_hide_reveal_yields_same_score() {
    let h = harness(Some(OWNER), true);
    h.contract
        .seed(&encode_collection(&[stored_record("bio-1", 64.5)]).expect("encode"));
    h.client.load_data().await.expect("load");
    let id = RecordId::from("bio-1");

    assert_eq!(h.client.toggle_reveal(&id).await.expect("reveal"), Some(64.5));
    assert_eq!(h.client.toggle_reveal(&id).await.expect("hide"), None);
    assert_eq!(h.client.snapshot().await.reveal, RevealPhase::Idle);
    assert_eq!(h.client.toggle_reveal(&id).await.expect("reveal"), Some(64.5));
    assert_eq!(h.wallet.signatures.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_signature_returns_to_idle() {
    let h = harness(Some(OWNER), false);
    h.contract
        .seed(&encode_collection(&[stored_record("bio-1", 64.5)]).expect("encode"));
    h.client.load_data().await.expect("load");
    let id = RecordId::from("bio-1");

    let err = h.client.toggle_reveal(&id).await.expect_err("rejected");
    assert!(err.is_user_rejection());

    let state = h.client.snapshot().await;
    assert_eq!(state.selected, Some(id));
    assert_eq!(state.reveal, RevealPhase::Idle);
}

#[tokio::test]
async fn reveal_of_unknown_record_fails() {
    let h = harness(Some(OWNER), true);
    let err = h
        .client
        .toggle_reveal(&RecordId::from("bio-404"))
        .await
        .expect_err("unknown");
    assert!(matches!(err, WorkflowError::UnknownRecord(_)));
}

#[tokio::test]
async fn decrypt_with_signature_decodes_after_consent() {
    let h = harness(Some(OWNER), true);
    let score = h
        .client
        .decrypt_with_signature(&codec::encode(42.0))
        .await
        .expect("decrypt");
    assert_eq!(score, 42.0);
    assert_eq!(h.wallet.signatures.load(Ordering::SeqCst), 1);

    let disconnected = harness(None, true);
    let err = disconnected
        .client
        .decrypt_with_signature(&codec::encode(42.0))
        .await
        .expect_err("not connected");
    assert!(matches!(err, WorkflowError::WalletNotConnected));
    assert_eq!(disconnected.wallet.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initialize_prepares_access_request() {
    let h = harness(Some(OWNER), true);
    h.client.initialize().await;

    let state = h.client.snapshot().await;
    assert_eq!(state.account.as_deref(), Some(OWNER));
    assert_eq!(state.access.contract_address, CONTRACT);
    assert_eq!(state.access.chain_id, 31337);
    assert_eq!(state.access.duration_days, 30);
    assert!(state.access.start_timestamp > 0);
    assert!(state.access.public_key.starts_with("0x"));
    assert_eq!(state.access.public_key.len(), 2 + 2_000);
    assert!(!state.loading);
}

#[test]
fn record_ids_skip_collisions() {
    let existing = vec![
        stored_record("bio-1000", 1.0),
        stored_record("bio-1001", 1.0),
    ];
    assert_eq!(next_record_id(&existing, 1000).as_str(), "bio-1002");
    assert_eq!(next_record_id(&existing, 5).as_str(), "bio-5");
}
