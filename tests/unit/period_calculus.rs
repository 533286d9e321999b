//! Period calculus tests over whole calendar ranges

use chrono::{Datelike, NaiveDate};
use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::test_data::{date, month, quarter};
use stock_metrics::period::{
    latest_completed_month, latest_completed_quarter, quarter_end_date, quarter_label,
    recent_completed_quarters, step_back_month, step_back_quarter, FiscalPeriod, Quarter,
};

fn every_day_of(year: i32) -> impl Iterator<Item = NaiveDate> {
    let start = date(year, 1, 1);
    start.iter_days().take_while(move |d| d.year() == year)
}

#[test]
fn test_latest_completed_month_is_the_previous_calendar_month() {
    for now in every_day_of(2024) {
        let latest = latest_completed_month(now);
        let first_of_month = date(now.year(), now.month(), 1);
        let previous = first_of_month.pred_opt().unwrap();
        assert_eq!(
            (latest.year(), latest.month()),
            (previous.year(), previous.month()),
            "now = {}",
            now
        );
    }
}

#[test]
fn test_latest_completed_quarter_is_the_latest_strictly_earlier_quarter_end() {
    for now in every_day_of(2025) {
        let latest = latest_completed_quarter(now);
        assert!(
            (latest.year(), latest.end_month()) < (now.year(), now.month()),
            "quarter {} is not before {}",
            latest,
            now
        );
        let next = latest.step_forward(1);
        assert!(
            (next.year(), next.end_month()) >= (now.year(), now.month()),
            "quarter {} is not the latest completed one for {}",
            latest,
            now
        );
    }
}

#[test]
fn test_step_back_is_total_across_boundaries() {
    assert_eq!(step_back_month(month(2025, 1), 1), month(2024, 12));
    assert_eq!(step_back_month(month(2025, 1), 25), month(2022, 12));
    assert_eq!(step_back_quarter(quarter(2025, 3), 1), quarter(2024, 12));
    assert_eq!(step_back_quarter(quarter(2025, 3), 9), quarter(2022, 12));

    for n in 0..100 {
        let ym = month(2025, 7);
        assert_eq!(ym.step_back(n).step_forward(n), ym);
        let q = quarter(2025, 9);
        assert_eq!(q.step_back(n).step_forward(n), q);
    }
}

#[test]
fn test_quarter_end_dates_parse_back_to_the_same_quarter() {
    for year in [2023, 2024, 2025] {
        for end_month in [3, 6, 9, 12] {
            let q = quarter(year, end_month);
            let end = quarter_end_date(q);
            assert!(NaiveDate::parse_from_str(&end, "%Y-%m-%d").is_ok(), "{}", end);
            assert_eq!(Quarter::from_end_date(&end).unwrap(), q);
        }
    }
}

#[test]
fn test_labels_and_recent_quarters() {
    assert_eq!(quarter_label(quarter(2025, 3)), "25Q1");
    assert_eq!(quarter_label(quarter(2024, 12)), "24Q4");

    let labels: Vec<String> = recent_completed_quarters(date(2025, 2, 1), 3)
        .iter()
        .map(|q| q.label())
        .collect();
    assert_eq!(labels, vec!["24Q4", "24Q3", "24Q2"]);
}

#[test]
fn test_periods_order_chronologically() {
    let mut periods: Vec<FiscalPeriod> = vec![
        month(2025, 2).into(),
        month(2024, 12).into(),
        month(2025, 1).into(),
    ];
    periods.sort();
    assert_eq!(
        periods,
        vec![
            FiscalPeriod::from(month(2024, 12)),
            FiscalPeriod::from(month(2025, 1)),
            FiscalPeriod::from(month(2025, 2)),
        ]
    );
}

#[test]
fn test_invalid_periods_are_rejected_on_deserialize() {
    let bad_month = r#"{"granularity":"month","year":2025,"month":13}"#;
    assert!(serde_json::from_str::<FiscalPeriod>(bad_month).is_err());

    let bad_quarter = r#"{"granularity":"quarter","year":2025,"end_month":7}"#;
    assert!(serde_json::from_str::<FiscalPeriod>(bad_quarter).is_err());
}
