//! Consistency and coverage reports for public-health indicators.
//!
//! Compares a reference dataset against a calculated one: MAPE per
//! indicator, per-key drill-down, coverage of reference values, and
//! period-over-period differences. Data comes from an [`store::IndicatorStore`].

pub mod artifact;
pub mod config;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod output;
pub mod reports;
pub mod store;
pub mod types;
pub mod util;

pub use error::{Error, Result, StoreError};
pub use reports::{compare, compute_mape, coverage, drill_down, list_indicators, Degradable, ErrorPolicy};
pub use store::{IndicatorFilter, IndicatorStore, MemoryStore};
pub use types::{CoverageReport, DiffRow, DrillDownRow, IndicatorMape, IndicatorValue, MissingItem, Trend};
