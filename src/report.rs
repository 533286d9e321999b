//! Report tables and sinks
//!
//! Column labels are derived from the reference date so they always name the
//! periods the values belong to.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::metrics;
use crate::models::{CachedSeries, MetricKind};
use crate::period::{recent_completed_months, recent_completed_quarters, two_digit_year};
use crate::series::{monthly_value, quarterly_value};
use crate::utils::{per_share, to_millions};

pub const REVENUE_SHEET: &str = "月營收";
pub const INCOME_STATEMENT_SHEET: &str = "綜合損益表";
pub const EPS_SHEET: &str = "EPS";

pub const ID_COLUMN: &str = "代號";
pub const NAME_COLUMN: &str = "名稱";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Millions,
    Percent,
    PerShare,
}

/// A computed value with the label of the column it belongs in
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetric {
    pub label: String,
    pub unit: Unit,
    pub value: Option<f64>,
}

impl DerivedMetric {
    pub fn new(label: impl Into<String>, unit: Unit, value: Option<f64>) -> Self {
        Self {
            label: label.into(),
            unit,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Identity cells, e.g. instrument id and name
    pub key: Vec<String>,
    pub metrics: Vec<DerivedMetric>,
}

impl ReportRow {
    pub fn cells(&self) -> Vec<String> {
        let mut cells = self.key.clone();
        cells.extend(self.metrics.iter().map(|m| format_value(m.value)));
        cells
    }

    pub fn metric(&self, label: &str) -> Option<&DerivedMetric> {
        self.metrics.iter().find(|m| m.label == label)
    }

    /// Value of the metric labelled `label`; `None` when absent or unknown
    pub fn value(&self, label: &str) -> Option<f64> {
        self.metric(label).and_then(|m| m.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ============================================================================
// Batch sheets
// ============================================================================

/// Labels of the three latest completed months, newest first
fn month_labels(now: NaiveDate) -> Vec<String> {
    recent_completed_months(now, 3)
        .iter()
        .map(|m| format!("{}月營收(M)", m.month()))
        .collect()
}

fn ytd_revenue_label(now: NaiveDate) -> String {
    format!("{}年累積營收(M)", two_digit_year(now.year()))
}

fn with_identity(metric_labels: Vec<String>) -> Vec<String> {
    let mut columns = vec![ID_COLUMN.to_string(), NAME_COLUMN.to_string()];
    columns.extend(metric_labels);
    columns
}

pub fn revenue_columns(now: NaiveDate) -> Vec<String> {
    let mut labels = month_labels(now);
    labels.push("MoM(%)".to_string());
    labels.push("YoY(%)".to_string());
    labels.push(ytd_revenue_label(now));
    labels.push("累積營收YoY(%)".to_string());
    with_identity(labels)
}

pub fn income_statement_columns(now: NaiveDate) -> Vec<String> {
    let quarters = recent_completed_quarters(now, 2);
    let mut labels: Vec<String> = quarters
        .iter()
        .map(|q| format!("{}季營收(M)", q.label()))
        .collect();
    labels.extend(quarters.iter().map(|q| format!("{}毛利率(%)", q.label())));
    labels.push(ytd_revenue_label(now));
    with_identity(labels)
}

pub fn eps_columns(now: NaiveDate) -> Vec<String> {
    let mut labels: Vec<String> = recent_completed_quarters(now, 3)
        .iter()
        .map(|q| format!("{}EPS", q.label()))
        .collect();
    labels.push(format!("{}年累積EPS", two_digit_year(now.year())));
    with_identity(labels)
}

fn identity(instrument_id: &str, name: &str) -> Vec<String> {
    vec![instrument_id.to_string(), name.to_string()]
}

/// Row of the monthly revenue sheet. A missing series leaves every metric absent.
pub fn revenue_row(
    instrument_id: &str,
    name: &str,
    series: Option<&CachedSeries>,
    now: NaiveDate,
) -> ReportRow {
    let year = now.year();
    let months = recent_completed_months(now, 3);
    let labels = revenue_columns(now);
    let labels = &labels[2..];

    let mut values: Vec<Option<f64>> = months
        .iter()
        .map(|&m| series.and_then(|s| to_millions(monthly_value(s, m))))
        .collect();
    values.push(series.and_then(|s| metrics::mom(s, months[0])));
    values.push(series.and_then(|s| metrics::yoy_month(s, months[0])));
    values.push(series.and_then(|s| to_millions(metrics::ytd_sum(s, &MetricKind::Revenue, year))));
    values.push(series.and_then(|s| metrics::ytd_yoy(s, &MetricKind::Revenue, year)));

    let units = [
        Unit::Millions,
        Unit::Millions,
        Unit::Millions,
        Unit::Percent,
        Unit::Percent,
        Unit::Millions,
        Unit::Percent,
    ];
    zip_row(identity(instrument_id, name), labels, &units, values)
}

/// Row of the income-statement sheet
pub fn income_statement_row(
    instrument_id: &str,
    name: &str,
    series: Option<&CachedSeries>,
    now: NaiveDate,
) -> ReportRow {
    let year = now.year();
    let quarters = recent_completed_quarters(now, 2);
    let labels = income_statement_columns(now);
    let labels = &labels[2..];

    let mut values: Vec<Option<f64>> = quarters
        .iter()
        .map(|&q| series.and_then(|s| to_millions(quarterly_value(s, &MetricKind::Revenue, q))))
        .collect();
    values.extend(
        quarters
            .iter()
            .map(|&q| series.and_then(|s| metrics::margin_at(s, &MetricKind::GrossProfit, q))),
    );
    values.push(series.and_then(|s| to_millions(metrics::ytd_sum(s, &MetricKind::Revenue, year))));

    let units = [
        Unit::Millions,
        Unit::Millions,
        Unit::Percent,
        Unit::Percent,
        Unit::Millions,
    ];
    zip_row(identity(instrument_id, name), labels, &units, values)
}

/// Row of the EPS sheet
pub fn eps_row(
    instrument_id: &str,
    name: &str,
    series: Option<&CachedSeries>,
    now: NaiveDate,
) -> ReportRow {
    let labels = eps_columns(now);
    let labels = &labels[2..];

    let mut values: Vec<Option<f64>> = recent_completed_quarters(now, 3)
        .iter()
        .map(|&q| series.and_then(|s| per_share(quarterly_value(s, &MetricKind::Eps, q))))
        .collect();
    values.push(series.and_then(|s| per_share(metrics::ytd_sum(s, &MetricKind::Eps, now.year()))));

    zip_row(
        identity(instrument_id, name),
        labels,
        &[Unit::PerShare; 4],
        values,
    )
}

fn zip_row(key: Vec<String>, labels: &[String], units: &[Unit], values: Vec<Option<f64>>) -> ReportRow {
    let metrics = labels
        .iter()
        .zip(units)
        .zip(values)
        .map(|((label, unit), value)| DerivedMetric::new(label.clone(), *unit, value))
        .collect();
    ReportRow { key, metrics }
}

/// The three sheets of one batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub revenue: ReportTable,
    pub income_statement: ReportTable,
    pub eps: ReportTable,
}

impl BatchReport {
    pub fn new(now: NaiveDate) -> Self {
        Self {
            revenue: ReportTable::new(REVENUE_SHEET, revenue_columns(now)),
            income_statement: ReportTable::new(INCOME_STATEMENT_SHEET, income_statement_columns(now)),
            eps: ReportTable::new(EPS_SHEET, eps_columns(now)),
        }
    }

    /// Append one instrument to every sheet
    pub fn push_instrument(
        &mut self,
        instrument_id: &str,
        name: &str,
        revenue: Option<&CachedSeries>,
        statement: Option<&CachedSeries>,
        now: NaiveDate,
    ) {
        self.revenue
            .push(revenue_row(instrument_id, name, revenue, now));
        self.income_statement
            .push(income_statement_row(instrument_id, name, statement, now));
        self.eps.push(eps_row(instrument_id, name, statement, now));
    }

    pub fn tables(&self) -> [&ReportTable; 3] {
        [&self.revenue, &self.income_statement, &self.eps]
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for finished report tables
pub trait ReportSink {
    fn write_table(&self, table: &ReportTable) -> Result<()>;
}

/// Writes each table to `<output_dir>/<table name>.csv`
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    output_dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, table: &ReportTable) -> PathBuf {
        self.output_dir.join(format!("{}.csv", table.name))
    }
}

impl ReportSink for CsvReportSink {
    fn write_table(&self, table: &ReportTable) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let path = self.path_for(table);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        writer.write_record(&table.columns)?;
        for row in &table.rows {
            writer.write_record(row.cells())?;
        }
        writer.flush()?;

        info!("📄 Wrote {} rows to {}", table.rows.len(), path.display());
        Ok(())
    }
}
