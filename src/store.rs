//! Indicator store: the reference and calculated relations the reports read.
//!
//! The backing engine is picked once at startup through [`open_store`];
//! the reports only ever see `&dyn IndicatorStore`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::loader::load_values;
use crate::output::write_csv;
use crate::types::IndicatorValue;

pub const REFERENCE_FILE: &str = "reference.csv";
pub const CALCULATED_FILE: &str = "calculated.csv";

/// Equality filter on indicator and period. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorFilter {
    pub indicator: Option<String>,
    pub period: Option<String>,
}

impl IndicatorFilter {
    pub fn new(indicator: Option<&str>, period: Option<&str>) -> Self {
        Self {
            indicator: indicator.map(str::to_string),
            period: period.map(str::to_string),
        }
    }

    pub fn period(period: Option<&str>) -> Self {
        Self::new(None, period)
    }

    pub fn matches(&self, row: &IndicatorValue) -> bool {
        self.indicator.as_deref().map_or(true, |i| row.indicator == i)
            && self.period.as_deref().map_or(true, |p| row.period == p)
    }
}

/// Read access to both relations. Rows are returned in storage order.
pub trait IndicatorStore {
    fn query_reference(&self, filter: &IndicatorFilter) -> std::result::Result<Vec<IndicatorValue>, StoreError>;
    fn query_calculated(&self, filter: &IndicatorFilter) -> std::result::Result<Vec<IndicatorValue>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// In-process relations, empty at startup
    Memory,
    /// `reference.csv` / `calculated.csv` under the data directory
    Csv,
}

pub fn open_store(backend: StoreBackend, data_dir: &Path) -> Box<dyn IndicatorStore> {
    match backend {
        StoreBackend::Memory => Box::new(MemoryStore::new()),
        StoreBackend::Csv => Box::new(CsvStore::new(data_dir)),
    }
}

type Triple = (String, String, String);

/// One relation in storage order, indexed by `(indicator, key, period)`.
///
/// Replaced rows leave a hole that is dropped on the next compaction, so an
/// upsert is constant time and a new row always lands at the end.
#[derive(Debug, Clone, Default)]
struct Relation {
    slots: Vec<Option<IndicatorValue>>,
    index: HashMap<Triple, usize>,
}

impl Relation {
    fn from_rows(rows: Vec<IndicatorValue>) -> Self {
        let mut relation = Self {
            slots: Vec::with_capacity(rows.len()),
            index: HashMap::with_capacity(rows.len()),
        };
        for row in rows {
            relation.upsert(row);
        }
        relation
    }

    fn upsert(&mut self, row: IndicatorValue) {
        let triple = (row.indicator.clone(), row.key.clone(), row.period.clone());
        if let Some(old) = self.index.insert(triple, self.slots.len()) {
            self.slots[old] = None;
        }
        self.slots.push(Some(row));
        if self.slots.len() > 2 * self.index.len() + 16 {
            self.compact();
        }
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (pos, row) in self.slots.iter().flatten().enumerate() {
            let triple = (row.indicator.clone(), row.key.clone(), row.period.clone());
            self.index.insert(triple, pos);
        }
    }

    fn rows(&self) -> impl Iterator<Item = &IndicatorValue> {
        self.slots.iter().flatten()
    }

    fn select(&self, filter: &IndicatorFilter) -> Vec<IndicatorValue> {
        self.rows().filter(|r| filter.matches(r)).cloned().collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    reference: Relation,
    calculated: Relation,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(reference: Vec<IndicatorValue>, calculated: Vec<IndicatorValue>) -> Self {
        Self {
            reference: Relation::from_rows(reference),
            calculated: Relation::from_rows(calculated),
        }
    }

    /// Insert a reference value, replacing any row with the same
    /// `(indicator, key, period)`. The new row moves to the end.
    pub fn upsert_reference(&mut self, row: IndicatorValue) {
        self.reference.upsert(row);
    }

    pub fn upsert_calculated(&mut self, row: IndicatorValue) {
        self.calculated.upsert(row);
    }

    pub fn reference_rows(&self) -> Vec<IndicatorValue> {
        self.reference.rows().cloned().collect()
    }

    pub fn calculated_rows(&self) -> Vec<IndicatorValue> {
        self.calculated.rows().cloned().collect()
    }
}

impl IndicatorStore for MemoryStore {
    fn query_reference(&self, filter: &IndicatorFilter) -> std::result::Result<Vec<IndicatorValue>, StoreError> {
        Ok(self.reference.select(filter))
    }

    fn query_calculated(&self, filter: &IndicatorFilter) -> std::result::Result<Vec<IndicatorValue>, StoreError> {
        Ok(self.calculated.select(filter))
    }
}

/// CSV-file backed store. Files are re-read on every query so a report
/// always sees the latest ingested data.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn query(
        &self,
        file: &str,
        relation: &'static str,
        filter: &IndicatorFilter,
    ) -> std::result::Result<Vec<IndicatorValue>, StoreError> {
        let (rows, report) = load_values(&self.dir.join(file), relation)?;
        if report.parse_errors > 0 {
            debug!(relation, skipped = report.parse_errors, "skipped unparseable rows");
        }
        // Later rows win over earlier ones with the same triple.
        Ok(Relation::from_rows(rows).select(filter))
    }

    /// Load both relations into memory, e.g. before an ingestion.
    pub fn to_memory(&self) -> std::result::Result<MemoryStore, StoreError> {
        let all = IndicatorFilter::default();
        Ok(MemoryStore::from_rows(
            self.query_reference(&all)?,
            self.query_calculated(&all)?,
        ))
    }

    /// Overwrite both files with the contents of `store`.
    pub fn persist(&self, store: &MemoryStore) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        write_csv(&self.dir.join(REFERENCE_FILE), &store.reference_rows())?;
        write_csv(&self.dir.join(CALCULATED_FILE), &store.calculated_rows())?;
        Ok(())
    }
}

impl IndicatorStore for CsvStore {
    fn query_reference(&self, filter: &IndicatorFilter) -> std::result::Result<Vec<IndicatorValue>, StoreError> {
        self.query(REFERENCE_FILE, "reference", filter)
    }

    fn query_calculated(&self, filter: &IndicatorFilter) -> std::result::Result<Vec<IndicatorValue>, StoreError> {
        self.query(CALCULATED_FILE, "calculated", filter)
    }
}
