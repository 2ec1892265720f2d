use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::util::format_opt;

/// One row of a `reference.csv` / `calculated.csv` file before cleaning.
#[derive(Debug, Deserialize)]
pub struct RawIndicatorRow {
    pub indicator: Option<String>,
    pub key: Option<String>,
    pub period: Option<String>,
    pub value: Option<String>,
}

/// A single figure of an indicator for one scope key and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub indicator: String,
    pub key: String,
    pub period: String,
    pub value: f64,
}

impl IndicatorValue {
    pub fn new(indicator: &str, key: &str, period: &str, value: f64) -> Self {
        Self {
            indicator: indicator.to_string(),
            key: key.to_string(),
            period: period.to_string(),
            value,
        }
    }
}

/// MAPE summary of one indicator. `period == None` means all periods.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct IndicatorMape {
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[tabled(rename = "Period", display_with = "display_period")]
    pub period: Option<String>,
    #[tabled(rename = "MAPE", display_with = "display_number")]
    pub mape: Option<f64>,
    #[tabled(rename = "Pairs")]
    pub pairs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DrillDownRow {
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "ref")]
    #[tabled(rename = "Ref")]
    pub reference: f64,
    #[serde(rename = "calc")]
    #[tabled(rename = "Calc", display_with = "display_number")]
    pub calculated: Option<f64>,
    #[tabled(rename = "AbsError", display_with = "display_number")]
    pub abs_error: Option<f64>,
    #[tabled(rename = "PctError", display_with = "display_number")]
    pub pct_error: Option<f64>,
}

/// A reference triple with no calculated counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MissingItem {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Period")]
    pub period: String,
    #[tabled(rename = "Reason")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub percent: f64,
    pub total: usize,
    pub generated: usize,
    pub missing: Vec<MissingItem>,
}

impl CoverageReport {
    pub fn empty() -> Self {
        Self {
            percent: 0.0,
            total: 0,
            generated: 0,
            missing: Vec::new(),
        }
    }
}

/// Direction of change between two periods. One-sided comparisons are `Equal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improves,
    Worsens,
    Equal,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Improves => "improves",
            Trend::Worsens => "worsens",
            Trend::Equal => "equal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DiffRow {
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Current")]
    pub period_current: String,
    #[tabled(rename = "Previous")]
    pub period_previous: String,
    #[tabled(rename = "ValueCurrent", display_with = "display_number")]
    pub value_current: Option<f64>,
    #[tabled(rename = "ValuePrevious", display_with = "display_number")]
    pub value_previous: Option<f64>,
    #[tabled(rename = "Delta", display_with = "display_number")]
    pub delta: Option<f64>,
    #[tabled(rename = "Trend")]
    pub trend: Trend,
}

fn display_number(v: &Option<f64>) -> String {
    format_opt(*v, 2)
}

fn display_period(p: &Option<String>) -> String {
    p.clone().unwrap_or_else(|| "(all)".to_string())
}
