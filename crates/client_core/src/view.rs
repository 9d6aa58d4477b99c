//! Values derived from view state for display.

use shared::domain::{BiometricKind, BiometricRecord};

use crate::state::RevealPhase;

pub fn filter_records<'a>(records: &'a [BiometricRecord], term: &str) -> Vec<&'a BiometricRecord> {
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|record| {
            record.kind.as_str().to_lowercase().contains(&needle)
                || record.id.as_str().to_lowercase().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub fingerprint: usize,
    pub facial: usize,
}

impl DashboardStats {
    pub fn from_records(records: &[BiometricRecord]) -> Self {
        let count = |kind: BiometricKind| records.iter().filter(|record| record.kind == kind).count();
        Self {
            total: records.len(),
            fingerprint: count(BiometricKind::Fingerprint),
            facial: count(BiometricKind::Facial),
        }
    }

    /// Headline growth figure: a fifth of all enrollments, rounded down.
    pub fn monthly_trend(&self) -> usize {
        self.total / 5
    }

    pub fn fingerprint_share(&self) -> Option<usize> {
        share(self.fingerprint, self.total)
    }

    pub fn facial_share(&self) -> Option<usize> {
        share(self.facial, self.total)
    }
}

fn share(part: usize, total: usize) -> Option<usize> {
    (total > 0).then(|| part * 100 / total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchGrade {
    Excellent,
    Good,
    Partial,
    Low,
}

impl MatchGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            MatchGrade::Excellent
        } else if score >= 75.0 {
            MatchGrade::Good
        } else if score >= 50.0 {
            MatchGrade::Partial
        } else {
            MatchGrade::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchGrade::Excellent => "Excellent match",
            MatchGrade::Good => "Good match",
            MatchGrade::Partial => "Partial match",
            MatchGrade::Low => "Low match",
        }
    }
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// `0x1234...abcd` style rendering of a 42-character address.
pub fn abbreviate_owner(owner: &str) -> String {
    let tail = owner.char_indices().nth(38).map_or("", |(index, _)| &owner[index..]);
    format!("{}...{tail}", truncate_chars(owner, 6))
}

pub fn short_id(record: &BiometricRecord) -> &str {
    truncate_chars(record.id.as_str(), 8)
}

pub fn template_preview(record: &BiometricRecord, max: usize) -> String {
    format!("{}...", truncate_chars(&record.encrypted_template, max))
}

pub fn enrolled_date(record: &BiometricRecord) -> String {
    record
        .enrolled_at()
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn format_score(score: f64) -> String {
    if score.is_nan() {
        "NaN".to_string()
    } else {
        score.to_string()
    }
}

pub fn decrypt_button_label(reveal: RevealPhase) -> &'static str {
    match reveal {
        RevealPhase::AwaitingSignature | RevealPhase::Decrypting => "Decrypting...",
        RevealPhase::Revealed { .. } => "Hide Score",
        RevealPhase::Idle => "Decrypt Score",
    }
}

pub fn refresh_button_label(refreshing: bool) -> &'static str {
    if refreshing {
        "Refreshing..."
    } else {
        "Refresh"
    }
}

pub fn enroll_button_label(enrolling: bool) -> &'static str {
    if enrolling {
        "Enrolling with FHE..."
    } else {
        "Enroll Biometric"
    }
}

pub struct FaqItem {
    pub question: &'static str,
    pub answer: &'static str,
}

pub const FAQ_ITEMS: &[FaqItem] = &[
    FaqItem {
        question: "What is BioAuth FHE?",
        answer: "A privacy-preserving biometric authentication system using Fully Homomorphic Encryption (FHE) to protect your biometric data.",
    },
    FaqItem {
        question: "How does FHE protect my data?",
        answer: "FHE allows matching on encrypted data without decryption. Your biometric template remains encrypted at all times.",
    },
    FaqItem {
        question: "What biometrics are supported?",
        answer: "Currently fingerprint and facial recognition templates are supported with more modalities coming soon.",
    },
    FaqItem {
        question: "Who can see my decrypted data?",
        answer: "No one. The system never decrypts your biometric data, even during authentication.",
    },
    FaqItem {
        question: "What blockchains are supported?",
        answer: "Ethereum and EVM-compatible chains with plans to expand to other ecosystems.",
    },
];

pub struct ProcessStep {
    pub title: &'static str,
    pub detail: &'static str,
}

pub const PROCESS_STEPS: &[ProcessStep] = &[
    ProcessStep {
        title: "Biometric Capture",
        detail: "User provides fingerprint or facial scan",
    },
    ProcessStep {
        title: "FHE Encryption",
        detail: "Template encrypted with Zama FHE",
    },
    ProcessStep {
        title: "Secure Matching",
        detail: "Encrypted comparison on blockchain",
    },
    ProcessStep {
        title: "Private Auth",
        detail: "Result returned without revealing data",
    },
];
