use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::BiometricRecord;

/// Contract storage key holding the whole enrollment collection.
pub const BIOMETRICS_KEY: &str = "biometrics";

pub const DEFAULT_ACCESS_DURATION_DAYS: u32 = 30;

/// Serializes the complete collection as the UTF-8 JSON array written to the contract.
pub fn encode_collection(records: &[BiometricRecord]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(records)
}

/// An array entry this client cannot read, kept at its original position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignEntry {
    pub index: usize,
    pub value: Value,
}

/// The contract's collection as last read: typed records plus the entries
/// that did not parse, so a full rewrite does not erase other clients' data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCollection {
    pub records: Vec<BiometricRecord>,
    #[serde(default)]
    pub foreign: Vec<ForeignEntry>,
}

impl From<Vec<BiometricRecord>> for StoredCollection {
    fn from(records: Vec<BiometricRecord>) -> Self {
        Self {
            records,
            foreign: Vec::new(),
        }
    }
}

impl StoredCollection {
    /// Empty, non-UTF-8 or non-array payloads decode to an empty collection.
    /// Array entries that are not valid records are set aside one by one.
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }

        let Ok(text) = std::str::from_utf8(bytes) else {
            warn!(len = bytes.len(), "biometrics payload is not valid utf-8");
            return Self::default();
        };
        if text.trim().is_empty() {
            return Self::default();
        }

        let entries = match serde_json::from_str::<Vec<Value>>(text) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("biometrics payload is not a json array: {err}");
                return Self::default();
            }
        };

        let mut collection = Self::default();
        for (index, value) in entries.into_iter().enumerate() {
            match BiometricRecord::deserialize(&value) {
                Ok(record) => collection.records.push(record),
                Err(err) => {
                    warn!(index, "skipping malformed biometric record: {err}");
                    collection.foreign.push(ForeignEntry { index, value });
                }
            }
        }
        collection
    }

    /// Serializes records and foreign entries back into one array. Foreign
    /// entries return to their original index, or the end if the array is shorter.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let mut entries = self
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        for entry in &self.foreign {
            let at = entry.index.min(entries.len());
            entries.insert(at, entry.value.clone());
        }
        serde_json::to_vec(&entries)
    }

    pub fn push(&mut self, record: BiometricRecord) {
        self.records.push(record);
    }
}

/// Session parameters covered by the signature that unlocks template decryption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub public_key: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl AccessRequest {
    pub fn signing_message(&self) -> String {
        format!(
            "publickey:{}\ncontractAddresses:{}\ncontractsChainId:{}\nstartTimestamp:{}\ndurationDays:{}",
            self.public_key,
            self.contract_address,
            self.chain_id,
            self.start_timestamp,
            self.duration_days
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BiometricKind, RecordId};

    fn record(id: &str, kind: BiometricKind) -> BiometricRecord {
        BiometricRecord {
            id: RecordId::from(id),
            kind,
            encrypted_template: "FHE-ODI=".to_string(),
            timestamp: 1_700_000_000,
            owner: "0x1234567890abcdef1234567890abcdef12345678".to_string(),
        }
    }

    #[test]
    fn collection_uses_contract_field_names() {
        let bytes = encode_collection(&[record("bio-1", BiometricKind::Facial)]).expect("encode");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains(r#""type":"facial""#));
        assert!(text.contains(r#""encryptedTemplate":"FHE-ODI=""#));
        assert!(text.contains(r#""id":"bio-1""#));
    }

    #[test]
    fn empty_and_blank_payloads_decode_to_empty_list() {
        assert_eq!(StoredCollection::decode(b""), StoredCollection::default());
        assert_eq!(StoredCollection::decode(b"   \n"), StoredCollection::default());
    }

    #[test]
    fn invalid_payloads_decode_to_empty_list() {
        assert_eq!(StoredCollection::decode(b"{not json"), StoredCollection::default());
        assert_eq!(
            StoredCollection::decode(br#"{"id":"bio-1"}"#),
            StoredCollection::default()
        );
        assert_eq!(
            StoredCollection::decode(&[0xff, 0xfe, 0x00]),
            StoredCollection::default()
        );
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let payload = br#"[
            {"id":"bio-1","type":"fingerprint","encryptedTemplate":"FHE-NzU=","timestamp":1,"owner":"0xaa"},
            {"id":"bio-2","type":"iris","encryptedTemplate":"FHE-NzU=","timestamp":2,"owner":"0xbb"},
            42
        ]"#;
        let collection = StoredCollection::decode(payload);
        assert_eq!(collection.records.len(), 1);
        assert_eq!(collection.records[0].id.as_str(), "bio-1");
        let skipped: Vec<usize> = collection.foreign.iter().map(|entry| entry.index).collect();
        assert_eq!(skipped, [1, 2]);
    }

    #[test]
    fn rewrite_keeps_unreadable_entries_in_place() {
        let payload = br#"[{"id":"bio-1","type":"fingerprint","encryptedTemplate":"FHE-NzU=","timestamp":1,"owner":"0xaa"},{"id":"bio-2","type":"Facial","encryptedTemplate":"FHE-ODI=","timestamp":"2024-01-01","owner":"0xbb"},{"id":"bio-3","type":"facial","encryptedTemplate":"FHE-ODI=","timestamp":3,"owner":"0xcc"}]"#;
        let mut collection = StoredCollection::decode(payload);
        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.foreign.len(), 1);
        assert_eq!(collection.foreign[0].index, 1);

        collection.push(record("bio-4", BiometricKind::Fingerprint));
        let written: Vec<Value> =
            serde_json::from_slice(&collection.encode().expect("encode")).expect("array");
        let ids: Vec<&str> = written
            .iter()
            .map(|entry| entry["id"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(ids, ["bio-1", "bio-2", "bio-3", "bio-4"]);
        assert_eq!(written[1]["type"], "Facial");
        assert_eq!(written[1]["timestamp"], "2024-01-01");
    }

    #[test]
    fn foreign_entries_past_the_end_are_appended() {
        let collection = StoredCollection {
            records: Vec::new(),
            foreign: vec![ForeignEntry {
                index: 5,
                value: Value::from(42),
            }],
        };
        assert_eq!(collection.encode().expect("encode"), b"[42]");
    }

    #[test]
    fn signing_message_lists_session_parameters_in_order() {
        let request = AccessRequest {
            public_key: "0xabc".to_string(),
            contract_address: "0xcontract".to_string(),
            chain_id: 31337,
            start_timestamp: 1_700_000_000,
            duration_days: DEFAULT_ACCESS_DURATION_DAYS,
        };
        assert_eq!(
            request.signing_message(),
            "publickey:0xabc\ncontractAddresses:0xcontract\ncontractsChainId:31337\nstartTimestamp:1700000000\ndurationDays:30"
        );
    }
}
