//! Registry of report executions, identified by an execution id and the
//! SHA-256 of what they produced, so a third party can later verify a
//! published artifact.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::Result;

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub exec_id: String,
    pub hash_sha256: String,
    pub kind: String,
    pub source: Option<String>,
    pub period: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ok: bool,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering an execution. `ok` defaults to `true`;
/// failed executions are registered with `ok: false` and a `message`.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub exec_id: String,
    pub hash_sha256: String,
    pub kind: String,
    pub source: Option<String>,
    pub period: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ok: bool,
    pub message: Option<String>,
}

impl Default for NewExecution {
    fn default() -> Self {
        Self {
            exec_id: String::new(),
            hash_sha256: String::new(),
            kind: String::new(),
            source: None,
            period: None,
            version: None,
            author: None,
            metadata: None,
            ok: true,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    Invalid,
    NotFound,
    HashMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub ok: bool,
    pub exec_id: Option<String>,
    pub hash: Option<String>,
    pub status: VerificationStatus,
    pub kind: Option<String>,
    pub source: Option<String>,
    pub period: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Verification {
    fn bare(exec_id: Option<&str>, hash: Option<&str>, status: VerificationStatus, message: &str) -> Self {
        Self {
            ok: false,
            exec_id: exec_id.map(str::to_string),
            hash: hash.map(str::to_string),
            status,
            kind: None,
            source: None,
            period: None,
            version: None,
            author: None,
            message: Some(message.to_string()),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactRegistry {
    records: BTreeMap<String, ExecutionRecord>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a registry file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, exec_id: &str) -> Option<&ExecutionRecord> {
        self.records.get(exec_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or overwrite the record for `exec_id`. Overwriting keeps the
    /// original `created_at`.
    pub fn register(&mut self, new: NewExecution) -> &ExecutionRecord {
        let created_at = self
            .records
            .get(&new.exec_id)
            .map_or_else(Utc::now, |r| r.created_at);
        info!(exec_id = %new.exec_id, kind = %new.kind, ok = new.ok, "execution registered");
        let record = ExecutionRecord {
            exec_id: new.exec_id.clone(),
            hash_sha256: new.hash_sha256,
            kind: new.kind,
            source: new.source,
            period: new.period,
            version: new.version,
            author: new.author,
            metadata: new.metadata,
            ok: new.ok,
            message: new.message,
            created_at,
        };
        self.records.insert(new.exec_id.clone(), record);
        &self.records[&new.exec_id]
    }

    pub fn verify(&self, exec_id: Option<&str>, hash: Option<&str>) -> Verification {
        let (Some(id), Some(h)) = (exec_id, hash) else {
            return Verification::bare(exec_id, hash, VerificationStatus::Invalid, "exec_id and hash are required");
        };
        let Some(record) = self.records.get(id) else {
            return Verification::bare(exec_id, hash, VerificationStatus::NotFound, "execution not found");
        };
        let ok = record.hash_sha256 == h;
        Verification {
            ok,
            exec_id: Some(id.to_string()),
            hash: Some(h.to_string()),
            status: if ok {
                VerificationStatus::Valid
            } else {
                VerificationStatus::HashMismatch
            },
            kind: Some(record.kind.clone()),
            source: record.source.clone(),
            period: record.period.clone(),
            version: record.version.clone(),
            author: record.author.clone(),
            message: record.message.clone(),
            created_at: Some(record.created_at),
        }
    }
}
