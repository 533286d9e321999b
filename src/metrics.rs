//! Comparative metrics derived from a loaded series
//!
//! Every ratio shares one guard: both operands must be present and the
//! denominator non-zero, otherwise the result is `None`. Percentages are
//! rounded to two decimals when computed. Zero is an ordinary value except as
//! a denominator.

use std::collections::BTreeMap;

use crate::models::{CachedSeries, MetricKind};
use crate::period::{FiscalPeriod, Quarter, YearMonth};
use crate::series::{metric_values, monthly_value, quarterly_value, values_for_year};
use crate::utils::round2;

/// `(current - previous) / previous * 100`
pub fn pct_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let (current, previous) = (current?, previous?);
    if previous == 0.0 {
        return None;
    }
    finite(round2((current - previous) / previous * 100.0))
}

/// `numerator / denominator * 100`
pub fn ratio_pct(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (numerator, denominator) = (numerator?, denominator?);
    if denominator == 0.0 {
        return None;
    }
    finite(round2(numerator / denominator * 100.0))
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Month-over-month revenue change
pub fn mom(series: &CachedSeries, month: YearMonth) -> Option<f64> {
    pct_change(
        monthly_value(series, month),
        monthly_value(series, month.step_back(1)),
    )
}

/// Revenue change against the same month a year earlier
pub fn yoy_month(series: &CachedSeries, month: YearMonth) -> Option<f64> {
    pct_change(
        monthly_value(series, month),
        monthly_value(series, month.prior_year()),
    )
}

/// Change against the same quarter a year earlier
pub fn yoy_quarter(series: &CachedSeries, metric_kind: &MetricKind, quarter: Quarter) -> Option<f64> {
    pct_change(
        quarterly_value(series, metric_kind, quarter),
        quarterly_value(series, metric_kind, quarter.prior_year()),
    )
}

/// Quarter-over-quarter change
pub fn qoq(series: &CachedSeries, metric_kind: &MetricKind, quarter: Quarter) -> Option<f64> {
    pct_change(
        quarterly_value(series, metric_kind, quarter),
        quarterly_value(series, metric_kind, quarter.step_back(1)),
    )
}

/// `numerator / Revenue * 100` for one quarter
pub fn margin_at(series: &CachedSeries, numerator: &MetricKind, quarter: Quarter) -> Option<f64> {
    ratio_pct(
        quarterly_value(series, numerator, quarter),
        quarterly_value(series, &MetricKind::Revenue, quarter),
    )
}

/// Margin for every quarter where both the numerator and Revenue exist.
///
/// Quarters present in only one of the two are dropped, as are quarters with
/// zero revenue.
pub fn margin(series: &CachedSeries, numerator: &MetricKind) -> BTreeMap<Quarter, f64> {
    let revenue = metric_values(series, &MetricKind::Revenue);
    metric_values(series, numerator)
        .into_iter()
        .filter_map(|(period, value)| {
            let quarter = match period {
                FiscalPeriod::Quarter(q) => q,
                FiscalPeriod::Month(_) => return None,
            };
            let ratio = ratio_pct(Some(value), revenue.get(&period).copied())?;
            Some((quarter, ratio))
        })
        .collect()
}

/// Sum of a metric over one calendar year; `None` when the year has no data
pub fn ytd_sum(series: &CachedSeries, metric_kind: &MetricKind, year: i32) -> Option<f64> {
    let values = values_for_year(series, metric_kind, year);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|(_, v)| v).sum())
}

/// Sum of a metric over the whole prior year
pub fn prior_year_total(series: &CachedSeries, metric_kind: &MetricKind, year: i32) -> Option<f64> {
    ytd_sum(series, metric_kind, year - 1)
}

/// Number of distinct periods with data in `year`
pub fn ytd_period_count(series: &CachedSeries, metric_kind: &MetricKind, year: i32) -> usize {
    values_for_year(series, metric_kind, year).len()
}

/// Year-to-date change against the same number of leading periods last year.
///
/// With `k` periods of data this year, the current sum is compared with the
/// sum of the first `k` periods (by period order) of the prior year.
pub fn ytd_yoy(series: &CachedSeries, metric_kind: &MetricKind, year: i32) -> Option<f64> {
    let current = values_for_year(series, metric_kind, year);
    if current.is_empty() {
        return None;
    }
    let prior: Vec<f64> = values_for_year(series, metric_kind, year - 1)
        .into_iter()
        .take(current.len())
        .map(|(_, v)| v)
        .collect();
    if prior.is_empty() {
        return None;
    }

    let current_sum: f64 = current.iter().map(|(_, v)| v).sum();
    let prior_sum: f64 = prior.iter().sum();
    pct_change(Some(current_sum), Some(prior_sum))
}

/// Margin of year-to-date sums, e.g. YTD GrossProfit / YTD Revenue
pub fn ytd_margin(series: &CachedSeries, numerator: &MetricKind, year: i32) -> Option<f64> {
    ratio_pct(
        ytd_sum(series, numerator, year),
        ytd_sum(series, &MetricKind::Revenue, year),
    )
}

/// Margin of full prior-year totals
pub fn prior_year_margin(series: &CachedSeries, numerator: &MetricKind, year: i32) -> Option<f64> {
    ratio_pct(
        prior_year_total(series, numerator, year),
        prior_year_total(series, &MetricKind::Revenue, year),
    )
}
