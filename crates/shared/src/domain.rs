use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub const PREFIX: &'static str = "bio-";

    pub fn from_millis(millis: i64) -> Self {
        Self(format!("{}{millis}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    #[default]
    Fingerprint,
    Facial,
}

impl BiometricKind {
    pub const ALL: [BiometricKind; 2] = [BiometricKind::Fingerprint, BiometricKind::Facial];

    pub fn as_str(self) -> &'static str {
        match self {
            BiometricKind::Fingerprint => "fingerprint",
            BiometricKind::Facial => "facial",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BiometricKind::Fingerprint => "Fingerprint",
            BiometricKind::Facial => "Facial Recognition",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fingerprint" => Some(BiometricKind::Fingerprint),
            "facial" | "face" => Some(BiometricKind::Facial),
            _ => None,
        }
    }
}

impl fmt::Display for BiometricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enrollment as stored in the contract's `biometrics` collection.
///
/// Field names follow the on-chain JSON layout (`type`, `encryptedTemplate`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: BiometricKind,
    #[serde(rename = "encryptedTemplate")]
    pub encrypted_template: String,
    pub timestamp: i64,
    pub owner: String,
}

impl BiometricRecord {
    pub fn enrolled_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}
