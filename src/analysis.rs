//! Single-instrument analysis tables
//!
//! A monthly revenue grid comparing several years side by side, and an income
//! statement summary over the latest four completed quarters.

use chrono::{Datelike, NaiveDate};

use crate::metrics;
use crate::models::{CachedSeries, MetricKind};
use crate::period::{recent_completed_quarters, Quarter, YearMonth};
use crate::report::{DerivedMetric, ReportRow, ReportTable, Unit};
use crate::series::{monthly_value, quarterly_value};
use crate::utils::{per_share, to_millions};

pub const MONTH_COLUMN: &str = "月份";
pub const ITEM_COLUMN: &str = "項目";
pub const PRIOR_YEAR_COLUMN: &str = "去年總共";

/// Widest revenue grid, in calendar years
pub const MAX_YEARS: u32 = 50;

/// Both analysis tables for one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct StockAnalysis {
    pub monthly_revenue: Option<ReportTable>,
    pub income_statement: Option<ReportTable>,
}

impl StockAnalysis {
    pub fn build(
        instrument_id: &str,
        name: &str,
        revenue: Option<&CachedSeries>,
        statement: Option<&CachedSeries>,
        now: NaiveDate,
        years: u32,
    ) -> Self {
        let prefix = table_prefix(instrument_id, name);
        Self {
            monthly_revenue: revenue.map(|series| {
                let mut table = monthly_revenue_by_year(series, now, years);
                table.name = format!("{}_月營收", prefix);
                table
            }),
            income_statement: statement.map(|series| {
                let mut table = income_statement_summary(series, now);
                table.name = format!("{}_綜合損益表", prefix);
                table
            }),
        }
    }

    pub fn tables(&self) -> Vec<&ReportTable> {
        self.monthly_revenue
            .iter()
            .chain(self.income_statement.iter())
            .collect()
    }
}

fn table_prefix(instrument_id: &str, name: &str) -> String {
    let name = if name.is_empty() { "未知" } else { name };
    format!("{}_{}_分析", instrument_id, name)
}

/// Revenue per calendar month (rows 12 down to 1) for the current year and
/// `years - 1` years before it, in millions. `years` is clamped to
/// `1..=MAX_YEARS`.
///
/// `MoM(%)` and `YoY(%)` always describe the current year's month. MoM for
/// January compares against December of the prior year.
pub fn monthly_revenue_by_year(series: &CachedSeries, now: NaiveDate, years: u32) -> ReportTable {
    let current_year = now.year();
    let span = i32::try_from(years.clamp(1, MAX_YEARS)).unwrap_or(1);
    let year_columns: Vec<i32> = (0..span).map(|n| current_year - n).collect();

    let mut columns = vec![MONTH_COLUMN.to_string()];
    columns.extend(year_columns.iter().map(|y| format!("{}年", y)));
    columns.push("MoM(%)".to_string());
    columns.push("YoY(%)".to_string());

    let mut table = ReportTable::new("月營收", columns);
    for month in (1..=12).rev() {
        let mut metrics: Vec<DerivedMetric> = year_columns
            .iter()
            .map(|&year| {
                let value = YearMonth::new(year, month)
                    .ok()
                    .and_then(|ym| to_millions(monthly_value(series, ym)));
                DerivedMetric::new(format!("{}年", year), Unit::Millions, value)
            })
            .collect();

        let current = YearMonth::new(current_year, month).ok();
        metrics.push(DerivedMetric::new(
            "MoM(%)",
            Unit::Percent,
            current.and_then(|ym| metrics::mom(series, ym)),
        ));
        metrics.push(DerivedMetric::new(
            "YoY(%)",
            Unit::Percent,
            current.and_then(|ym| metrics::yoy_month(series, ym)),
        ));

        table.push(ReportRow {
            key: vec![format!("{}月", month)],
            metrics,
        });
    }
    table
}

/// Column label of the year-to-date column, carrying the quarter count
pub fn ytd_column_label(quarters_reported: usize) -> String {
    if quarters_reported > 0 {
        format!("今年累計({}季)", quarters_reported)
    } else {
        "今年累計".to_string()
    }
}

/// Income statement over the latest four completed quarters (newest first),
/// this year to date, and the whole prior year.
pub fn income_statement_summary(series: &CachedSeries, now: NaiveDate) -> ReportTable {
    let year = now.year();
    let quarters = recent_completed_quarters(now, 4);
    let ytd_label = ytd_column_label(metrics::ytd_period_count(series, &MetricKind::Revenue, year));

    let mut labels: Vec<String> = quarters.iter().map(Quarter::label).collect();
    labels.push(ytd_label);
    labels.push(PRIOR_YEAR_COLUMN.to_string());

    let mut columns = vec![ITEM_COLUMN.to_string()];
    columns.extend(labels.iter().cloned());
    let mut table = ReportTable::new("綜合損益表", columns);

    let row = |item: &str, unit: Unit, values: Vec<Option<f64>>| ReportRow {
        key: vec![item.to_string()],
        metrics: labels
            .iter()
            .zip(values)
            .map(|(label, value)| DerivedMetric::new(label.clone(), unit, value))
            .collect(),
    };

    let revenue = MetricKind::Revenue;

    let mut revenue_values: Vec<Option<f64>> = quarters
        .iter()
        .map(|&q| to_millions(quarterly_value(series, &revenue, q)))
        .collect();
    revenue_values.push(to_millions(metrics::ytd_sum(series, &revenue, year)));
    revenue_values.push(to_millions(metrics::prior_year_total(series, &revenue, year)));
    table.push(row("營業收入", Unit::Millions, revenue_values));

    // The oldest quarter has nothing inside the window to compare against
    let oldest = quarters.len().saturating_sub(1);
    let mut growth: Vec<Option<f64>> = quarters
        .iter()
        .enumerate()
        .map(|(i, &q)| {
            if i == oldest {
                None
            } else {
                metrics::qoq(series, &revenue, q)
            }
        })
        .collect();
    growth.push(metrics::ytd_yoy(series, &revenue, year));
    growth.push(None);
    table.push(row("QoQ/YoY", Unit::Percent, growth));

    let margin_rows = [
        ("毛利率(%)", MetricKind::GrossProfit),
        ("營益率(%)", MetricKind::OperatingIncome),
        ("稅前淨利率(%)", MetricKind::PreTaxIncome),
        ("淨利率(%)", MetricKind::IncomeAfterTaxes),
    ];
    for (item, numerator) in margin_rows {
        let mut values: Vec<Option<f64>> = quarters
            .iter()
            .map(|&q| metrics::margin_at(series, &numerator, q))
            .collect();
        values.push(metrics::ytd_margin(series, &numerator, year));
        values.push(metrics::prior_year_margin(series, &numerator, year));
        table.push(row(item, Unit::Percent, values));
    }

    let eps = MetricKind::Eps;
    let mut eps_values: Vec<Option<f64>> = quarters
        .iter()
        .map(|&q| per_share(quarterly_value(series, &eps, q)))
        .collect();
    eps_values.push(per_share(metrics::ytd_sum(series, &eps, year)));
    eps_values.push(per_share(metrics::prior_year_total(series, &eps, year)));
    table.push(row("EPS(元)", Unit::PerShare, eps_values));

    table
}
