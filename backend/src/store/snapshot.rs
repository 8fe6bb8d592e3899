//! Snapshot - Save/Load store contents
//!
//! Serializes every loan and payment (deleted rows included) plus the id
//! counters, sealed with a SHA-256 checksum over a canonical JSON encoding.
//!
//! # Critical Invariants
//!
//! - **Integrity**: a snapshot whose rows do not hash to its checksum is rejected
//! - **Id Continuity**: a restored store never reissues an id

use super::memory::InMemoryStore;
use crate::models::loan::Loan;
use crate::models::payment::Payment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// Complete store contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,

    pub taken_at: DateTime<Utc>,

    pub next_loan_id: u64,

    pub next_payment_id: u64,

    pub loans: Vec<Loan>,

    pub payments: Vec<Payment>,

    /// SHA256 of the canonical rows and counters
    pub checksum: String,
}

/// The part of a snapshot covered by the checksum
#[derive(Serialize)]
struct ChecksumBody<'a> {
    next_loan_id: u64,
    next_payment_id: u64,
    loans: &'a [Loan],
    payments: &'a [Payment],
}

impl StoreSnapshot {
    /// Capture the current contents of a store
    pub fn capture(store: &InMemoryStore, taken_at: DateTime<Utc>) -> Result<Self, SnapshotError> {
        let loans: Vec<Loan> = store.all_loans().cloned().collect();
        let payments: Vec<Payment> = store.all_payments().cloned().collect();
        let checksum = compute_checksum(&ChecksumBody {
            next_loan_id: store.next_loan_id(),
            next_payment_id: store.next_payment_id(),
            loans: &loans,
            payments: &payments,
        })?;

        Ok(Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            next_loan_id: store.next_loan_id(),
            next_payment_id: store.next_payment_id(),
            loans,
            payments,
            checksum,
        })
    }

    /// Verify version and checksum
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }

        let actual = compute_checksum(&ChecksumBody {
            next_loan_id: self.next_loan_id,
            next_payment_id: self.next_payment_id,
            loans: &self.loans,
            payments: &self.payments,
        })?;

        if actual != self.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify and rebuild the store
    pub fn restore(self) -> Result<InMemoryStore, SnapshotError> {
        self.verify()?;
        Ok(InMemoryStore::from_parts(
            self.loans,
            self.payments,
            self.next_loan_id,
            self.next_payment_id,
        ))
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a snapshot file. The checksum is checked by [`restore`](Self::restore).
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Compute deterministic SHA256 hash of a serializable value
///
/// Object keys are sorted recursively before hashing so the result does not
/// depend on field or map ordering.
pub fn compute_checksum<T: Serialize>(value: &T) -> Result<String, SnapshotError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let canonical = canonicalize(serde_json::to_value(value)?);
    let json = serde_json::to_string(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
