//! Integration tests for the consistency reports
//!
//! Tests cover:
//! - MAPE, drill-down, coverage and diff over a CSV-backed store
//! - Ingestion of an RDQA payload followed by reporting
//! - Degraded coverage when a relation cannot be read
//! - Byte-identical output across repeated runs

use std::path::Path;

use rdqa_report::artifact::{ArtifactRegistry, VerificationStatus};
use rdqa_report::ingest::{ingest_file, IngestRequest};
use rdqa_report::store::{CsvStore, StoreBackend, CALCULATED_FILE, REFERENCE_FILE};
use rdqa_report::{compare, compute_mape, coverage, drill_down, list_indicators, ErrorPolicy, Trend};
use serde_json::{json, Value};

/// Test helper: write both relation files into `dir`
fn write_relations(dir: &Path, reference: &str, calculated: &str) {
    std::fs::write(dir.join(REFERENCE_FILE), reference).unwrap();
    std::fs::write(dir.join(CALCULATED_FILE), calculated).unwrap();
}

/// Test helper: a data directory with two periods of `cov_aps`
fn seeded_store() -> (tempfile::TempDir, CsvStore) {
    let dir = tempfile::tempdir().unwrap();
    write_relations(
        dir.path(),
        "indicator,key,period,value\n\
         cov_aps,mun=1,2025-01,100\n\
         cov_aps,mun=2,2025-01,50\n\
         cov_aps,mun=3,2025-01,80\n\
         vac,mun=1,2025-01,0\n",
        "indicator,key,period,value\n\
         cov_aps,mun=1,2025-01,110\n\
         cov_aps,mun=2,2025-01,40\n\
         vac,mun=1,2025-01,3\n\
         cov_aps,mun=1,2024-12,105\n\
         cov_aps,mun=2,2024-12,45\n",
    );
    let store = CsvStore::new(dir.path());
    (dir, store)
}

// =============================================================================

#[test]
fn consistency_summary_over_csv_store() {
    let (_dir, store) = seeded_store();
    let rows = list_indicators(&store, Some("2025-01"), &ErrorPolicy::default()).unwrap();
    assert_eq!(rows.len(), 2);

    let cov = &rows[0];
    assert_eq!(cov.indicator, "cov_aps");
    assert_eq!(cov.pairs, 2);
    assert!((cov.mape.unwrap() - 15.0).abs() < 1e-9);

    // zero reference is excluded, leaving no pairs
    let vac = &rows[1];
    assert_eq!(vac.indicator, "vac");
    assert_eq!(vac.pairs, 0);
    assert_eq!(vac.mape, None);
}

#[test]
fn drill_down_serializes_with_nulls() {
    let (_dir, store) = seeded_store();
    let rows = drill_down(&store, "cov_aps", Some("2025-01"), &ErrorPolicy::default()).unwrap();
    let body: Value = serde_json::to_value(&rows).unwrap();

    assert_eq!(body[0]["key"], "mun=2");
    assert_eq!(body[0]["ref"], 50.0);
    assert_eq!(body[0]["calc"], 40.0);
    assert_eq!(body[1]["key"], "mun=1");
    assert_eq!(body[2]["key"], "mun=3");
    assert_eq!(body[2]["calc"], Value::Null);
    assert_eq!(body[2]["abs_error"], Value::Null);
    assert_eq!(body[2]["pct_error"], Value::Null);
}

#[test]
fn coverage_report_shape() {
    let (_dir, store) = seeded_store();
    let report = coverage(&store, Some("2025-01")).strict().unwrap();
    let body = serde_json::to_value(&report).unwrap();
    assert_eq!(body["total"], 4);
    assert_eq!(body["generated"], 3);
    assert_eq!(body["percent"], 75.0);
    assert_eq!(
        body["missing"],
        json!([{"group": "cov_aps:mun=3", "period": "2025-01", "reason": "no data"}])
    );
}

#[test]
fn coverage_degrades_when_relation_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be cannot be read as CSV.
    std::fs::create_dir(dir.path().join(REFERENCE_FILE)).unwrap();
    let store = CsvStore::new(dir.path());

    let result = coverage(&store, None);
    assert!(result.is_degraded());
    let report = result.into_value();
    assert_eq!(report.total, 0);
    assert_eq!(report.percent, 0.0);

    assert!(compute_mape(&store, "cov_aps", None, &ErrorPolicy::default()).is_err());
}

#[test]
fn diff_between_periods() {
    let (_dir, store) = seeded_store();
    let rows = compare(&store, &["cov_aps".to_string()], "2025-01", "2024-12").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, "mun=1");
    assert_eq!(rows[0].delta, Some(5.0));
    assert_eq!(rows[0].trend, Trend::Improves);
    assert_eq!(rows[1].delta, Some(-5.0));
    assert_eq!(rows[1].trend, Trend::Worsens);

    let body = serde_json::to_value(&rows).unwrap();
    assert_eq!(body[0]["trend"], "improves");
    assert_eq!(body[1]["trend"], "worsens");
}

#[test]
fn repeated_reports_are_byte_identical() {
    let (_dir, store) = seeded_store();
    let policy = ErrorPolicy::default();
    let render = || {
        let parts = vec![
            serde_json::to_string(&list_indicators(&store, None, &policy).unwrap()).unwrap(),
            serde_json::to_string(&drill_down(&store, "cov_aps", None, &policy).unwrap()).unwrap(),
            serde_json::to_string(coverage(&store, None).value()).unwrap(),
            serde_json::to_string(&compare(&store, &["cov_aps".to_string()], "2025-01", "2024-12").unwrap())
                .unwrap(),
        ];
        parts.join("\n")
    };
    assert_eq!(render(), render());
}

#[test]
fn ingest_then_report_then_verify() {
    let dir = tempfile::tempdir().unwrap();
    let payload_path = dir.path().join("payload.json");
    std::fs::write(
        &payload_path,
        json!({
            "reference": [
                {"indicator": "cov_aps", "key": "mun=1", "value": 90.0},
                {"indicator": "cov_aps", "key": "mun=2", "value": 60.0}
            ],
            "calculated": [
                {"indicator": "cov_aps", "key": "mun=1", "value": 99.0}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let csv_store = CsvStore::new(dir.path());
    let mut store = csv_store.to_memory().unwrap();
    let mut registry = ArtifactRegistry::new();
    let request = IngestRequest {
        source: "spreadsheet_q4",
        period_ref: "2024-12",
        register_artifact: true,
    };
    let summary = ingest_file(&payload_path, &mut store, &mut registry, &request).unwrap();
    csv_store.persist(&store).unwrap();
    let registry_path = dir.path().join("artifacts.json");
    registry.save(&registry_path).unwrap();

    let mape = compute_mape(&csv_store, "cov_aps", Some("2024-12"), &ErrorPolicy::default()).unwrap();
    assert_eq!(mape.pairs, 1);
    assert!((mape.mape.unwrap() - 10.0).abs() < 1e-9);

    let report = coverage(&csv_store, Some("2024-12")).into_value();
    assert_eq!((report.total, report.generated), (2, 1));

    let registry = ArtifactRegistry::load(&registry_path).unwrap();
    let verification = registry.verify(Some(summary.exec_id.as_str()), Some(summary.hash.as_str()));
    assert_eq!(verification.status, VerificationStatus::Valid);
    assert_eq!(verification.period.as_deref(), Some("2024-12"));
}

#[test]
fn memory_backend_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = rdqa_report::store::open_store(StoreBackend::Memory, dir.path());
    let report = coverage(&*store, None);
    assert!(!report.is_degraded());
    assert_eq!(report.value().total, 0);
}
