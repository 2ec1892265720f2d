//! Ingestion of RDQA payloads into the indicator relations.
//!
//! A payload is a JSON object with a `reference` and a `calculated` list:
//!
//! ```json
//! {
//!   "reference":  [{"indicator": "cov_aps", "key": "mun=1", "period": "2024-12", "value": 90.0}],
//!   "calculated": [{"indicator": "cov_aps", "key": "mun=1", "value": 87.0}]
//! }
//! ```
//!
//! Items without a period take the period the payload was submitted for.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifact::{sha256_hex, ArtifactRegistry, NewExecution};
use crate::error::{Error, Result};
use crate::store::MemoryStore;
use crate::types::IndicatorValue;

pub const INGEST_KIND: &str = "rdqa_ingest";

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default, alias = "referencia")]
    reference: Vec<PayloadItem>,
    #[serde(default, alias = "calculado")]
    calculated: Vec<PayloadItem>,
}

#[derive(Debug, Deserialize)]
struct PayloadItem {
    #[serde(alias = "indicador")]
    indicator: Option<String>,
    #[serde(alias = "chave")]
    key: Option<String>,
    #[serde(alias = "periodo")]
    period: Option<String>,
    #[serde(default, alias = "valor")]
    value: Option<PayloadNumber>,
}

/// Spreadsheet exports carry numbers either as JSON numbers or as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PayloadNumber {
    Number(f64),
    Text(String),
    Other(Value),
}

impl PayloadNumber {
    fn to_f64(&self) -> Option<f64> {
        match self {
            PayloadNumber::Number(v) => Some(*v),
            PayloadNumber::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            PayloadNumber::Other(_) => None,
        }
    }
}

impl PayloadItem {
    fn into_value(self, period_ref: &str) -> Option<IndicatorValue> {
        Some(IndicatorValue {
            indicator: self.indicator?,
            key: self.key?,
            period: self.period.unwrap_or_else(|| period_ref.to_string()),
            value: self.value?.to_f64()?,
        })
    }
}

/// Where a payload came from and how to record it.
#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
    pub source: &'a str,
    pub period_ref: &'a str,
    pub register_artifact: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub exec_id: String,
    pub hash: String,
    pub reference_items: usize,
    pub calculated_items: usize,
    pub skipped: usize,
}

/// Single-line JSON with `", "` and `": "` separators, the layout Python's
/// `json.dumps` produces by default.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// SHA-256 of the payload serialized like `json.dumps(payload,
/// sort_keys=True, ensure_ascii=False)`.
///
/// Floats outside ryu's plain-decimal range are written as `1e17` where
/// Python writes `1e+17`, so those payloads hash differently from it.
pub fn payload_hash(payload: &Value) -> Result<String> {
    // serde_json's default map is ordered, so re-serializing sorts keys.
    let mut canonical = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut canonical, SpacedFormatter);
    payload.serialize(&mut ser)?;
    Ok(sha256_hex(&canonical))
}

pub fn ingest_payload(
    store: &mut MemoryStore,
    registry: &mut ArtifactRegistry,
    payload: &Value,
    request: &IngestRequest<'_>,
) -> Result<IngestSummary> {
    if !payload.is_object() {
        return Err(Error::InvalidInput("payload must be a JSON object".to_string()));
    }
    let parsed = Payload::deserialize(payload)?;
    let reference_items = parsed.reference.len();
    let calculated_items = parsed.calculated.len();
    let mut skipped = 0usize;

    for item in parsed.reference {
        match item.into_value(request.period_ref) {
            Some(v) => store.upsert_reference(v),
            None => skipped += 1,
        }
    }
    for item in parsed.calculated {
        match item.into_value(request.period_ref) {
            Some(v) => store.upsert_calculated(v),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped payload items without indicator, key or value");
    }

    let exec_id = Uuid::new_v4().to_string();
    let hash = payload_hash(payload)?;
    if request.register_artifact {
        registry.register(NewExecution {
            exec_id: exec_id.clone(),
            hash_sha256: hash.clone(),
            kind: INGEST_KIND.to_string(),
            source: Some(request.source.to_string()),
            period: Some(request.period_ref.to_string()),
            metadata: Some(json!({
                "reference": reference_items,
                "calculated": calculated_items,
            })),
            ..Default::default()
        });
    }
    info!(
        %exec_id,
        source = request.source,
        period_ref = request.period_ref,
        reference_items,
        calculated_items,
        "payload ingested"
    );

    Ok(IngestSummary {
        exec_id,
        hash,
        reference_items,
        calculated_items,
        skipped,
    })
}

pub fn ingest_file(
    path: &Path,
    store: &mut MemoryStore,
    registry: &mut ArtifactRegistry,
    request: &IngestRequest<'_>,
) -> Result<IngestSummary> {
    let text = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&text)?;
    ingest_payload(store, registry, &payload, request)
}
