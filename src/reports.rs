//! Consistency reports comparing the reference relation against the
//! calculated one.
//!
//! Every keyed map here is ordered, so accumulation order and output order
//! are identical across runs over the same store contents.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::store::{IndicatorFilter, IndicatorStore};
use crate::types::{
    CoverageReport, DiffRow, DrillDownRow, IndicatorMape, IndicatorValue, MissingItem, Trend,
};
use crate::util::{mean, pct_error};

pub const MISSING_REASON: &str = "no data";

/// Which pairs take part in error metrics.
///
/// The default excludes pairs whose reference value is exactly zero and
/// nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorPolicy {
    /// Values with `|v| <= zero_tolerance` count as zero.
    pub zero_tolerance: f64,
    /// Also exclude pairs whose calculated value is zero.
    pub skip_zero_calculated: bool,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            zero_tolerance: 0.0,
            skip_zero_calculated: false,
        }
    }
}

impl ErrorPolicy {
    fn is_zero(&self, v: f64) -> bool {
        v.abs() <= self.zero_tolerance
    }

    /// Whether a matched pair has a computable error.
    pub fn admits(&self, reference: f64, calc: f64) -> bool {
        !self.is_zero(reference) && !(self.skip_zero_calculated && self.is_zero(calc))
    }
}

/// A report that was either computed from the store or replaced by an
/// empty value because the store could not be read.
#[derive(Debug)]
pub enum Degradable<T> {
    Complete(T),
    Degraded { value: T, cause: StoreError },
}

impl<T> Degradable<T> {
    pub fn value(&self) -> &T {
        match self {
            Degradable::Complete(v) => v,
            Degradable::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Degradable::Complete(v) => v,
            Degradable::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Degradable::Degraded { .. })
    }

    /// Turn a degraded report back into the error that caused it.
    pub fn strict(self) -> Result<T> {
        match self {
            Degradable::Complete(v) => Ok(v),
            Degradable::Degraded { cause, .. } => Err(cause.into()),
        }
    }
}

fn by_key_period(rows: &[IndicatorValue]) -> BTreeMap<(&str, &str), f64> {
    rows.iter()
        .map(|r| ((r.key.as_str(), r.period.as_str()), r.value))
        .collect()
}

/// Mean absolute percentage error of one indicator, optionally restricted
/// to one period.
pub fn compute_mape(
    store: &dyn IndicatorStore,
    indicator: &str,
    period: Option<&str>,
    policy: &ErrorPolicy,
) -> Result<IndicatorMape> {
    let filter = IndicatorFilter::new(Some(indicator), period);
    let ref_rows = store.query_reference(&filter)?;
    let calc_rows = store.query_calculated(&filter)?;
    debug!(indicator, ?period, reference = ref_rows.len(), calculated = calc_rows.len(), "fetched rows for MAPE");

    let ref_map = by_key_period(&ref_rows);
    let calc_map = by_key_period(&calc_rows);

    let errors: Vec<f64> = ref_map
        .iter()
        .filter_map(|(key, &ref_val)| {
            let &calc = calc_map.get(key)?;
            policy.admits(ref_val, calc).then(|| pct_error(ref_val, calc))
        })
        .collect();

    Ok(IndicatorMape {
        indicator: indicator.to_string(),
        period: period.map(str::to_string),
        mape: mean(&errors),
        pairs: errors.len(),
    })
}

/// MAPE for every indicator present in the reference relation, in
/// lexicographic indicator order.
pub fn list_indicators(
    store: &dyn IndicatorStore,
    period: Option<&str>,
    policy: &ErrorPolicy,
) -> Result<Vec<IndicatorMape>> {
    let indicators: BTreeSet<String> = store
        .query_reference(&IndicatorFilter::period(period))?
        .into_iter()
        .map(|r| r.indicator)
        .collect();

    let out = indicators
        .iter()
        .map(|ind| compute_mape(store, ind, period, policy))
        .collect::<Result<Vec<_>>>()?;
    info!(indicators = out.len(), ?period, "consistency summary computed");
    Ok(out)
}

/// Every reference row of an indicator joined with its calculated
/// counterpart, worst percentage error first.
pub fn drill_down(
    store: &dyn IndicatorStore,
    indicator: &str,
    period: Option<&str>,
    policy: &ErrorPolicy,
) -> Result<Vec<DrillDownRow>> {
    let filter = IndicatorFilter::new(Some(indicator), period);
    let ref_rows = store.query_reference(&filter)?;
    let calc_rows = store.query_calculated(&filter)?;
    let calc_map = by_key_period(&calc_rows);

    let mut out: Vec<DrillDownRow> = ref_rows
        .iter()
        .map(|r| {
            let calc = calc_map.get(&(r.key.as_str(), r.period.as_str())).copied();
            let (abs_error, pct) = match calc {
                Some(c) if policy.admits(r.value, c) => {
                    (Some((c - r.value).abs()), Some(pct_error(r.value, c)))
                }
                _ => (None, None),
            };
            DrillDownRow {
                indicator: r.indicator.clone(),
                key: r.key.clone(),
                period: r.period.clone(),
                reference: r.value,
                calculated: calc,
                abs_error,
                pct_error: pct,
            }
        })
        .collect();

    // Stable sort: rows without an error rank as -1 and keep fetch order on ties.
    let rank = |row: &DrillDownRow| row.pct_error.unwrap_or(-1.0);
    out.sort_by(|a, b| rank(b).partial_cmp(&rank(a)).unwrap_or(Ordering::Equal));
    debug!(indicator, ?period, rows = out.len(), "drill-down computed");
    Ok(out)
}

/// Share of reference triples that have a calculated counterpart.
///
/// A store failure yields an empty report marked as degraded instead of an
/// error.
pub fn coverage(store: &dyn IndicatorStore, period: Option<&str>) -> Degradable<CoverageReport> {
    let filter = IndicatorFilter::period(period);
    let fetched = store
        .query_reference(&filter)
        .and_then(|r| Ok((r, store.query_calculated(&filter)?)));
    let (ref_rows, calc_rows) = match fetched {
        Ok(rows) => rows,
        Err(cause) => {
            warn!(?period, error = %cause, "coverage degraded to empty result");
            return Degradable::Degraded {
                value: CoverageReport::empty(),
                cause,
            };
        }
    };

    let triple = |r: &IndicatorValue| (r.indicator.clone(), r.key.clone(), r.period.clone());
    let ref_keys: BTreeSet<_> = ref_rows.iter().map(triple).collect();
    let calc_keys: BTreeSet<_> = calc_rows.iter().map(triple).collect();

    let total = ref_keys.len();
    let generated = ref_keys.intersection(&calc_keys).count();
    let missing: Vec<MissingItem> = ref_keys
        .difference(&calc_keys)
        .map(|(indicator, key, per)| MissingItem {
            group: format!("{}:{}", indicator, key),
            period: per.clone(),
            reason: MISSING_REASON.to_string(),
        })
        .collect();
    let percent = if total > 0 {
        generated as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    info!(?period, total, generated, "coverage computed");

    Degradable::Complete(CoverageReport {
        percent,
        total,
        generated,
        missing,
    })
}

fn classify(current: Option<f64>, previous: Option<f64>) -> Trend {
    match (current, previous) {
        (Some(c), Some(p)) if c > p => Trend::Improves,
        (Some(c), Some(p)) if c < p => Trend::Worsens,
        // TODO: a one-sided comparison reports `equal`; callers rely on it,
        // a distinct "no data" trend needs their agreement first.
        _ => Trend::Equal,
    }
}

/// Period-over-period change of calculated values, per indicator in input
/// order and per key in lexicographic order over the union of both periods.
pub fn compare(
    store: &dyn IndicatorStore,
    indicators: &[String],
    period_current: &str,
    period_previous: &str,
) -> Result<Vec<DiffRow>> {
    let mut out = Vec::new();
    for indicator in indicators {
        let fetch = |period: &str| -> Result<BTreeMap<String, f64>> {
            let rows = store.query_calculated(&IndicatorFilter::new(Some(indicator), Some(period)))?;
            Ok(rows.into_iter().map(|r| (r.key, r.value)).collect())
        };
        let curr_map = fetch(period_current)?;
        let prev_map = fetch(period_previous)?;

        let keys: BTreeSet<&String> = curr_map.keys().chain(prev_map.keys()).collect();
        for key in keys {
            let value_current = curr_map.get(key).copied();
            let value_previous = prev_map.get(key).copied();
            let delta = match (value_current, value_previous) {
                (Some(c), Some(p)) => Some(c - p),
                _ => None,
            };
            out.push(DiffRow {
                indicator: indicator.clone(),
                key: key.clone(),
                period_current: period_current.to_string(),
                period_previous: period_previous.to_string(),
                value_current,
                value_previous,
                delta,
                trend: classify(value_current, value_previous),
            });
        }
    }
    info!(rows = out.len(), period_current, period_previous, "period diff computed");
    Ok(out)
}
