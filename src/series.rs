//! Lookups over a loaded series
//!
//! Duplicate `(period, metric_kind)` records resolve to the last occurrence in
//! storage order. Results are always sorted by period, never by storage order.

use std::collections::BTreeMap;

use crate::models::{CachedSeries, MetricKind};
use crate::period::{FiscalPeriod, Quarter, YearMonth};

/// Exact lookup. `None` means no record, not zero.
pub fn value_at(
    series: &CachedSeries,
    metric_kind: &MetricKind,
    period: impl Into<FiscalPeriod>,
) -> Option<f64> {
    let period = period.into();
    series
        .records()
        .iter()
        .rev()
        .find(|r| r.period == period && &r.metric_kind == metric_kind)
        .map(|r| r.value)
}

pub fn monthly_value(series: &CachedSeries, month: YearMonth) -> Option<f64> {
    value_at(series, &MetricKind::Revenue, month)
}

pub fn quarterly_value(
    series: &CachedSeries,
    metric_kind: &MetricKind,
    quarter: Quarter,
) -> Option<f64> {
    value_at(series, metric_kind, quarter)
}

/// All values of a metric, one per period, ascending by period
pub fn metric_values(series: &CachedSeries, metric_kind: &MetricKind) -> BTreeMap<FiscalPeriod, f64> {
    let mut values = BTreeMap::new();
    for record in series.records() {
        if &record.metric_kind == metric_kind {
            values.insert(record.period, record.value);
        }
    }
    values
}

/// Values of a metric within one calendar year, ascending by period
pub fn values_for_year(
    series: &CachedSeries,
    metric_kind: &MetricKind,
    year: i32,
) -> Vec<(FiscalPeriod, f64)> {
    metric_values(series, metric_kind)
        .into_iter()
        .filter(|(period, _)| period.year() == year)
        .collect()
}

/// Distinct periods that have data for a metric, ascending
pub fn periods(series: &CachedSeries, metric_kind: &MetricKind) -> Vec<FiscalPeriod> {
    metric_values(series, metric_kind).into_keys().collect()
}
