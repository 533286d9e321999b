//! Cache store against the on-disk JSON medium

use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use test_log::test;

use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::test_data::{date, month, revenue_record, series, two_quarter_statement};
use stock_metrics::cache::CacheStore;
use stock_metrics::models::{MetricKind, SeriesKind, SeriesRecord};

#[test]
fn test_monthly_freshness_across_month_boundaries() {
    init_test_logging();
    log_test_step("Monthly series with October 2025 as its latest month");

    let dir = TempDir::new().unwrap();
    let store = CacheStore::with_data_dir(dir.path());
    let october = series(
        SeriesKind::MonthlyRevenue,
        vec![revenue_record(2025, 9, 1.0), revenue_record(2025, 10, 2.0)],
    );
    store.save("2330", &october).unwrap();

    for day in [1, 15, 30] {
        assert!(
            store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 11, day)),
            "should be fresh on 2025-11-{}",
            day
        );
    }
    for day in [1, 31] {
        assert!(
            !store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 12, day)),
            "should be stale on 2025-12-{}",
            day
        );
    }
    // September is the latest completed month on 2025-10-20 and is stored
    assert!(store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 10, 20)));
}

#[test]
fn test_monthly_series_without_latest_completed_month_is_stale() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::with_data_dir(dir.path());
    store
        .save(
            "2330",
            &series(SeriesKind::MonthlyRevenue, vec![revenue_record(2025, 10, 2.0)]),
        )
        .unwrap();

    assert!(!store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 10, 20)));
    assert!(store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 11, 3)));
}

#[test]
fn test_statement_freshness_from_quarter_records() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::with_data_dir(dir.path());
    store
        .save("2330", &series(SeriesKind::FinancialStatement, two_quarter_statement()))
        .unwrap();

    assert!(store.is_fresh("2330", SeriesKind::FinancialStatement, date(2025, 9, 15)));
    assert!(store.is_fresh("2330", SeriesKind::FinancialStatement, date(2025, 7, 1)));
    assert!(!store.is_fresh("2330", SeriesKind::FinancialStatement, date(2025, 10, 1)));
    // The revenue kind has nothing stored for this instrument
    assert!(!store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 9, 15)));
}

#[test]
fn test_saved_values_round_trip_exactly() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::with_data_dir(dir.path());
    let awkward = [0.1 + 0.2, 1e-12, 123_456_789_012.345, -0.0, f64::MAX];
    let records: Vec<SeriesRecord> = awkward
        .iter()
        .enumerate()
        .map(|(i, &v)| SeriesRecord::new(month(2025, i as u32 + 1), MetricKind::Revenue, v))
        .collect();
    let original = series(SeriesKind::MonthlyRevenue, records);

    store.save("2330", &original).unwrap();
    let loaded = store.load("2330", SeriesKind::MonthlyRevenue).unwrap();

    log_test_data("Loaded records", &loaded.records());
    for (a, b) in original.records().iter().zip(loaded.records()) {
        assert_eq!(a.value.to_bits(), b.value.to_bits());
    }
}

#[test]
fn test_truncated_file_is_a_miss_and_is_overwritten() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::with_data_dir(dir.path());

    let good = series(SeriesKind::MonthlyRevenue, vec![revenue_record(2025, 10, 2.0)]);
    store.save("2330", &good).unwrap();

    let path = dir.path().join("monthly_revenue").join("2330.json");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(store.load("2330", SeriesKind::MonthlyRevenue).is_none());
    assert!(!store.is_fresh("2330", SeriesKind::MonthlyRevenue, date(2025, 11, 1)));

    store.save("2330", &good).unwrap();
    assert_eq!(store.load("2330", SeriesKind::MonthlyRevenue), Some(good));
}
