//! Metric derivation behaviour on realistic series

use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::test_data::{
    month, quarter, revenue_record, series, statement_record, two_quarter_statement,
};
use stock_metrics::metrics;
use stock_metrics::models::{MetricKind, SeriesKind};
use stock_metrics::period::FiscalPeriod;
use stock_metrics::series::{periods, value_at, values_for_year};

#[test]
fn test_two_quarter_scenario() {
    let statement = series(SeriesKind::FinancialStatement, two_quarter_statement());

    assert_eq!(
        metrics::margin_at(&statement, &MetricKind::GrossProfit, quarter(2025, 6)),
        Some(30.0)
    );
    assert_eq!(
        metrics::margin_at(&statement, &MetricKind::GrossProfit, quarter(2025, 3)),
        Some(30.0)
    );
    assert_eq!(
        metrics::qoq(&statement, &MetricKind::Revenue, quarter(2025, 6)),
        Some(20.0)
    );
    assert_eq!(
        metrics::qoq(&statement, &MetricKind::Revenue, quarter(2025, 3)),
        None
    );
}

#[test]
fn test_results_do_not_depend_on_storage_order() {
    let mut records = two_quarter_statement();
    let forward = series(SeriesKind::FinancialStatement, records.clone());
    records.reverse();
    let backward = series(SeriesKind::FinancialStatement, records);

    for s in [&forward, &backward] {
        assert_eq!(metrics::ytd_sum(s, &MetricKind::Revenue, 2025), Some(2200.0));
        assert_eq!(
            metrics::margin(s, &MetricKind::GrossProfit)
                .into_iter()
                .collect::<Vec<_>>(),
            vec![(quarter(2025, 3), 30.0), (quarter(2025, 6), 30.0)]
        );
        assert_eq!(
            periods(s, &MetricKind::Revenue),
            vec![FiscalPeriod::from(quarter(2025, 3)), FiscalPeriod::from(quarter(2025, 6))]
        );
    }
}

#[test]
fn test_zero_is_a_value_but_not_a_denominator() {
    let revenue = series(
        SeriesKind::MonthlyRevenue,
        vec![
            revenue_record(2025, 1, 0.0),
            revenue_record(2025, 2, 500.0),
            revenue_record(2024, 2, 0.0),
        ],
    );

    assert_eq!(value_at(&revenue, &MetricKind::Revenue, month(2025, 1)), Some(0.0));
    assert_eq!(metrics::mom(&revenue, month(2025, 2)), None);
    assert_eq!(metrics::yoy_month(&revenue, month(2025, 2)), None);
    assert_eq!(metrics::mom(&revenue, month(2025, 1)), None);
    assert_eq!(metrics::ytd_sum(&revenue, &MetricKind::Revenue, 2025), Some(500.0));
}

#[test]
fn test_negative_values_flow_through() {
    let statement = series(
        SeriesKind::FinancialStatement,
        vec![
            statement_record(2025, 3, MetricKind::Revenue, 1000.0),
            statement_record(2025, 3, MetricKind::IncomeAfterTaxes, -125.0),
            statement_record(2024, 3, MetricKind::Revenue, 800.0),
        ],
    );
    assert_eq!(
        metrics::margin_at(&statement, &MetricKind::IncomeAfterTaxes, quarter(2025, 3)),
        Some(-12.5)
    );
    assert_eq!(
        metrics::yoy_quarter(&statement, &MetricKind::Revenue, quarter(2025, 3)),
        Some(25.0)
    );
}

#[test]
fn test_ytd_yoy_month_count_variant() {
    let revenue = series(
        SeriesKind::MonthlyRevenue,
        vec![
            revenue_record(2025, 3, 300.0),
            revenue_record(2025, 1, 100.0),
            revenue_record(2025, 2, 200.0),
            revenue_record(2024, 1, 100.0),
            revenue_record(2024, 2, 100.0),
            revenue_record(2024, 3, 100.0),
            revenue_record(2024, 4, 9999.0),
        ],
    );

    assert_eq!(values_for_year(&revenue, &MetricKind::Revenue, 2025).len(), 3);
    assert_eq!(metrics::ytd_yoy(&revenue, &MetricKind::Revenue, 2025), Some(100.0));
    assert_eq!(metrics::ytd_yoy(&revenue, &MetricKind::Revenue, 2026), None);
}

#[test]
fn test_eps_ytd_keeps_per_share_precision() {
    let statement = series(
        SeriesKind::FinancialStatement,
        vec![
            statement_record(2025, 3, MetricKind::Eps, 13.94),
            statement_record(2025, 6, MetricKind::Eps, 15.36),
        ],
    );
    let ytd = metrics::ytd_sum(&statement, &MetricKind::Eps, 2025).map(stock_metrics::utils::round2);
    assert_eq!(ytd, Some(29.3));
}
