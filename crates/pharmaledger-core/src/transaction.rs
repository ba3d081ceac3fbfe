use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{now_millis, sha256, Hash, Result};

/// Kind of compliance event a transaction records.
///
/// The set is open: producers may tag events with any string, and the ledger
/// only uses the tag for the type histogram in the chain summary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    SensorReading,
    Deviation,
    CorrectiveAction,
    Audit,
    AccessEvent,
    Maintenance,
    Other(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::SensorReading => "sensor-reading",
            TransactionType::Deviation => "deviation",
            TransactionType::CorrectiveAction => "corrective-action",
            TransactionType::Audit => "audit",
            TransactionType::AccessEvent => "access-event",
            TransactionType::Maintenance => "maintenance",
            TransactionType::Other(s) => s,
        }
    }
}

impl From<String> for TransactionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "sensor-reading" => TransactionType::SensorReading,
            "deviation" => TransactionType::Deviation,
            "corrective-action" => TransactionType::CorrectiveAction,
            "audit" => TransactionType::Audit,
            "access-event" => TransactionType::AccessEvent,
            "maintenance" => TransactionType::Maintenance,
            _ => TransactionType::Other(s),
        }
    }
}

impl From<&str> for TransactionType {
    fn from(s: &str) -> Self {
        TransactionType::from(s.to_string())
    }
}

impl From<TransactionType> for String {
    fn from(t: TransactionType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable compliance event.
///
/// `payload` is opaque to the ledger; it only has to be serializable so the
/// transaction can be hashed into a Merkle leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

impl Transaction {
    /// Producer-facing constructor: assigns a fresh UUID and the current time.
    pub fn new(tx_type: impl Into<TransactionType>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx_type: tx_type.into(),
            timestamp: now_millis(),
            payload,
        }
    }

    /// Builds a transaction with caller-chosen id and timestamp (replay, fixtures).
    pub fn with_id(
        id: impl Into<String>,
        tx_type: impl Into<TransactionType>,
        timestamp: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            tx_type: tx_type.into(),
            timestamp,
            payload,
        }
    }

    /// Canonical bytes hashed into the Merkle leaf.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn leaf_hash(&self) -> Result<Hash> {
        Ok(sha256(&self.canonical_bytes()?))
    }
}
