//! View state and its reducer.
//!
//! All session state lives in one serializable [`ViewState`]. It changes only
//! through [`reduce`], so every transition can be exercised without a UI.
//! [`StateStore`] serializes dispatches and broadcasts snapshots.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{BiometricKind, BiometricRecord, RecordId},
    protocol::{AccessRequest, ForeignEntry, StoredCollection},
};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::{codec, view};

pub const SUCCESS_BANNER_TTL: Duration = Duration::from_secs(2);
pub const ERROR_BANNER_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Dashboard,
    Templates,
    Faq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id: u64,
    pub status: BannerStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollForm {
    pub kind: BiometricKind,
    pub score: String,
}

impl Default for EnrollForm {
    fn default() -> Self {
        Self {
            kind: BiometricKind::Fingerprint,
            score: "75".to_string(),
        }
    }
}

impl EnrollForm {
    pub fn new(kind: BiometricKind, score: impl Into<String>) -> Self {
        Self {
            kind,
            score: score.into(),
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.score.trim().is_empty()
    }

    /// Score as entered, or `0` when it does not parse.
    pub fn parsed_score(&self) -> f64 {
        let score = codec::parse_float(&self.score);
        if score.is_nan() {
            0.0
        } else {
            score
        }
    }
}

/// Decryption progress for the selected record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RevealPhase {
    #[default]
    Idle,
    AwaitingSignature,
    Decrypting,
    Revealed {
        score: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub loading: bool,
    pub records: Vec<BiometricRecord>,
    pub refreshing: bool,
    pub enrolling: bool,
    pub enroll_modal_open: bool,
    pub enroll_form: EnrollForm,
    pub selected: Option<RecordId>,
    pub reveal: RevealPhase,
    pub banner: Option<Banner>,
    pub active_tab: Tab,
    pub search_term: String,
    pub account: Option<String>,
    pub access: AccessRequest,
    /// Collection entries this client cannot read; written back unchanged.
    #[serde(default)]
    pub foreign_entries: Vec<ForeignEntry>,
    #[serde(default)]
    next_banner_id: u64,
    #[serde(default)]
    load_generation: u64,
    #[serde(default)]
    applied_generation: u64,
    #[serde(default)]
    loads_in_flight: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            loading: true,
            records: Vec::new(),
            refreshing: false,
            enrolling: false,
            enroll_modal_open: false,
            enroll_form: EnrollForm::default(),
            selected: None,
            reveal: RevealPhase::Idle,
            banner: None,
            active_tab: Tab::Dashboard,
            search_term: String::new(),
            account: None,
            access: AccessRequest::default(),
            foreign_entries: Vec::new(),
            next_banner_id: 1,
            load_generation: 0,
            applied_generation: 0,
            loads_in_flight: 0,
        }
    }
}

impl ViewState {
    pub fn filtered_records(&self) -> Vec<&BiometricRecord> {
        view::filter_records(&self.records, &self.search_term)
    }

    pub fn selected_record(&self) -> Option<&BiometricRecord> {
        let selected = self.selected.as_ref()?;
        self.records.iter().find(|record| &record.id == selected)
    }

    pub fn is_decrypting(&self) -> bool {
        matches!(
            self.reveal,
            RevealPhase::AwaitingSignature | RevealPhase::Decrypting
        )
    }

    pub fn revealed_score(&self) -> Option<f64> {
        match self.reveal {
            RevealPhase::Revealed { score } => Some(score),
            _ => None,
        }
    }

    /// Generation assigned to the most recently started load.
    pub fn load_generation(&self) -> u64 {
        self.load_generation
    }

    /// The collection as it would be written back to the contract.
    pub fn stored_collection(&self) -> StoredCollection {
        StoredCollection {
            records: self.records.clone(),
            foreign: self.foreign_entries.clone(),
        }
    }

    fn apply_collection(&mut self, collection: StoredCollection) {
        self.records = collection.records;
        self.foreign_entries = collection.foreign;
        if self.selected.is_some() && self.selected_record().is_none() {
            self.selected = None;
            self.reveal = RevealPhase::Idle;
        }
    }

    fn is_selected(&self, record_id: &RecordId) -> bool {
        self.selected.as_ref() == Some(record_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SessionInitialized(AccessRequest),
    AccountChanged(Option<String>),
    TabSelected(Tab),
    SearchChanged(String),
    EnrollModalOpened,
    EnrollModalClosed,
    EnrollFormEdited(EnrollForm),
    LoadStarted,
    LoadSucceeded {
        generation: u64,
        collection: StoredCollection,
    },
    LoadFinished,
    EnrollStarted,
    EnrollCommitted(StoredCollection),
    EnrollFinished,
    EnrollCompleted,
    RecordSelected(RecordId),
    DetailClosed,
    DecryptRequested(RecordId),
    SignatureGranted(RecordId),
    DecryptSucceeded { record_id: RecordId, score: f64 },
    DecryptFailed(RecordId),
    ScoreHidden(RecordId),
    BannerShown { status: BannerStatus, message: String },
    BannerDismissed(u64),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SessionInitialized(_) => "session_initialized",
            Action::AccountChanged(_) => "account_changed",
            Action::TabSelected(_) => "tab_selected",
            Action::SearchChanged(_) => "search_changed",
            Action::EnrollModalOpened => "enroll_modal_opened",
            Action::EnrollModalClosed => "enroll_modal_closed",
            Action::EnrollFormEdited(_) => "enroll_form_edited",
            Action::LoadStarted => "load_started",
            Action::LoadSucceeded { .. } => "load_succeeded",
            Action::LoadFinished => "load_finished",
            Action::EnrollStarted => "enroll_started",
            Action::EnrollCommitted(_) => "enroll_committed",
            Action::EnrollFinished => "enroll_finished",
            Action::EnrollCompleted => "enroll_completed",
            Action::RecordSelected(_) => "record_selected",
            Action::DetailClosed => "detail_closed",
            Action::DecryptRequested(_) => "decrypt_requested",
            Action::SignatureGranted(_) => "signature_granted",
            Action::DecryptSucceeded { .. } => "decrypt_succeeded",
            Action::DecryptFailed(_) => "decrypt_failed",
            Action::ScoreHidden(_) => "score_hidden",
            Action::BannerShown { .. } => "banner_shown",
            Action::BannerDismissed(_) => "banner_dismissed",
        }
    }
}

pub fn reduce(state: &mut ViewState, action: Action) {
    match action {
        Action::SessionInitialized(access) => state.access = access,
        Action::AccountChanged(account) => state.account = account,
        Action::TabSelected(tab) => state.active_tab = tab,
        Action::SearchChanged(term) => state.search_term = term,
        Action::EnrollModalOpened => state.enroll_modal_open = true,
        Action::EnrollModalClosed => state.enroll_modal_open = false,
        Action::EnrollFormEdited(form) => state.enroll_form = form,
        Action::LoadStarted => {
            state.load_generation += 1;
            state.loads_in_flight += 1;
            state.refreshing = true;
        }
        // Results older than the last applied load or commit are stale.
        Action::LoadSucceeded {
            generation,
            collection,
        } => {
            if generation > state.applied_generation {
                state.applied_generation = generation;
                state.apply_collection(collection);
            } else {
                debug!(generation, "ignoring stale load result");
            }
        }
        Action::EnrollCommitted(collection) => {
            state.applied_generation = state.load_generation;
            state.apply_collection(collection);
        }
        Action::LoadFinished => {
            state.loads_in_flight = state.loads_in_flight.saturating_sub(1);
            state.refreshing = state.loads_in_flight > 0;
            state.loading = false;
        }
        Action::EnrollStarted => state.enrolling = true,
        Action::EnrollFinished => state.enrolling = false,
        Action::EnrollCompleted => {
            state.enroll_modal_open = false;
            state.enroll_form = EnrollForm::default();
        }
        Action::RecordSelected(record_id) => {
            if state.records.iter().any(|record| record.id == record_id) {
                state.selected = Some(record_id);
                state.reveal = RevealPhase::Idle;
            }
        }
        Action::DetailClosed => {
            state.selected = None;
            state.reveal = RevealPhase::Idle;
        }
        Action::DecryptRequested(record_id) => {
            if state.is_selected(&record_id) && !state.is_decrypting() {
                state.reveal = RevealPhase::AwaitingSignature;
            }
        }
        Action::SignatureGranted(record_id) => {
            if state.is_selected(&record_id) && state.reveal == RevealPhase::AwaitingSignature {
                state.reveal = RevealPhase::Decrypting;
            }
        }
        Action::DecryptSucceeded { record_id, score } => {
            if state.is_selected(&record_id) && state.reveal == RevealPhase::Decrypting {
                state.reveal = RevealPhase::Revealed { score };
            }
        }
        Action::DecryptFailed(record_id) => {
            if state.is_selected(&record_id) {
                state.reveal = RevealPhase::Idle;
            }
        }
        Action::ScoreHidden(record_id) => {
            if state.is_selected(&record_id) && state.revealed_score().is_some() {
                state.reveal = RevealPhase::Idle;
            }
        }
        Action::BannerShown { status, message } => {
            let id = state.next_banner_id;
            state.next_banner_id += 1;
            state.banner = Some(Banner {
                id,
                status,
                message,
            });
        }
        Action::BannerDismissed(id) => {
            if state.banner.as_ref().is_some_and(|banner| banner.id == id) {
                state.banner = None;
            }
        }
    }
}

pub struct StateStore {
    state: Mutex<ViewState>,
    changes: broadcast::Sender<ViewState>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::with_state(ViewState::default())
    }
}

impl StateStore {
    pub fn with_state(state: ViewState) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(state),
            changes,
        }
    }

    /// Applies `action` and returns the resulting snapshot.
    pub async fn dispatch(&self, action: Action) -> ViewState {
        let mut state = self.state.lock().await;
        debug!(action = action.name(), "dispatching view action");
        reduce(&mut state, action);
        let snapshot = state.clone();
        let _ = self.changes.send(snapshot.clone());
        snapshot
    }

    /// Applies `action` only when `guard` accepts the current state.
    pub async fn try_dispatch(
        &self,
        guard: impl FnOnce(&ViewState) -> bool,
        action: Action,
    ) -> Option<ViewState> {
        let mut state = self.state.lock().await;
        if !guard(&state) {
            debug!(action = action.name(), "view action refused by guard");
            return None;
        }
        reduce(&mut state, action);
        let snapshot = state.clone();
        let _ = self.changes.send(snapshot.clone());
        Some(snapshot)
    }

    pub async fn snapshot(&self) -> ViewState {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewState> {
        self.changes.subscribe()
    }
}
