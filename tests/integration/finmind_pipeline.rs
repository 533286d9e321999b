//! FinMind client, collector and CSV sink wired together against a mock server

use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use test_log::test;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::{init_test_logging, log_test_step};
use crate::common::test_data::date;
use stock_metrics::api::FinMindClient;
use stock_metrics::cache::CacheStore;
use stock_metrics::data_collector::{CollectOptions, DataCollector};
use stock_metrics::models::{Config, SeriesKind};
use stock_metrics::report::{CsvReportSink, ReportSink};

async fn mount_dataset(server: &MockServer, dataset: &str, data: serde_json::Value) {
    Mock::given(method("GET"))
        .and(query_param("dataset", dataset))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "msg": "success",
            "status": 200,
            "data": data
        })))
        .mount(server)
        .await;
}

async fn finmind_server() -> MockServer {
    let server = MockServer::start().await;

    mount_dataset(
        &server,
        "TaiwanStockInfo",
        json!([{"industry_category": "半導體業", "stock_id": "2330", "stock_name": "台積電", "type": "twse"}]),
    )
    .await;

    mount_dataset(
        &server,
        "TaiwanStockMonthRevenue",
        json!([
            {"date": "2024-11-01", "stock_id": "2330", "revenue": 240000000000i64, "revenue_month": 10, "revenue_year": 2024},
            {"date": "2025-09-01", "stock_id": "2330", "revenue": 200000000000i64, "revenue_month": 8, "revenue_year": 2025},
            {"date": "2025-10-01", "stock_id": "2330", "revenue": 250000000000i64, "revenue_month": 9, "revenue_year": 2025},
            {"date": "2025-11-01", "stock_id": "2330", "revenue": 300000000000i64, "revenue_month": 10, "revenue_year": 2025}
        ]),
    )
    .await;

    mount_dataset(
        &server,
        "TaiwanStockFinancialStatements",
        json!([
            {"date": "2025-03-31", "stock_id": "2330", "type": "EPS", "value": 13.0, "origin_name": "基本每股盈餘（元）"},
            {"date": "2025-06-30", "stock_id": "2330", "type": "Revenue", "value": 800000000000.0, "origin_name": "營業收入合計"},
            {"date": "2025-06-30", "stock_id": "2330", "type": "GrossProfit", "value": 400000000000.0, "origin_name": "營業毛利（毛損）"},
            {"date": "2025-06-30", "stock_id": "2330", "type": "EPS", "value": 15.0, "origin_name": "基本每股盈餘（元）"},
            {"date": "2025-09-30", "stock_id": "2330", "type": "Revenue", "value": 900000000000.0, "origin_name": "營業收入合計"},
            {"date": "2025-09-30", "stock_id": "2330", "type": "GrossProfit", "value": 540000000000.0, "origin_name": "營業毛利（毛損）"},
            {"date": "2025-09-30", "stock_id": "2330", "type": "EPS", "value": 17.5, "origin_name": "基本每股盈餘（元）"}
        ]),
    )
    .await;

    server
}

#[test(tokio::test)]
async fn test_batch_writes_all_three_sheets() {
    init_test_logging();
    log_test_step("Running a one-instrument batch against a mocked FinMind");

    let server = finmind_server().await;
    let data_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    let config = Config {
        data_dir: data_dir.path().to_path_buf(),
        finmind_api_url: format!("{}/api/v4/data", server.uri()),
        rate_limit_per_minute: 600,
        ..Config::default()
    };

    let collector = DataCollector::new(
        Arc::new(FinMindClient::new(&config).unwrap()),
        CacheStore::with_data_dir(&config.data_dir),
        CollectOptions::from_config(&config, true),
    );

    let now = date(2025, 11, 12);
    let (report, summary) = collector.run_batch(&["2330".to_string()], now).await;
    assert_eq!(summary.fetched, 2);

    let sink = CsvReportSink::new(output_dir.path());
    for table in report.tables() {
        sink.write_table(table).unwrap();
    }

    let read = |name: &str| fs::read_to_string(output_dir.path().join(format!("{}.csv", name))).unwrap();

    assert_eq!(
        read("月營收"),
        "代號,名稱,10月營收(M),9月營收(M),8月營收(M),MoM(%),YoY(%),25年累積營收(M),累積營收YoY(%)\n\
         2330,台積電,300000,250000,200000,20,25,750000,212.5\n"
    );
    assert_eq!(
        read("綜合損益表"),
        "代號,名稱,25Q3季營收(M),25Q2季營收(M),25Q3毛利率(%),25Q2毛利率(%),25年累積營收(M)\n\
         2330,台積電,900000,800000,60,50,1700000\n"
    );
    assert_eq!(
        read("EPS"),
        "代號,名稱,25Q3EPS,25Q2EPS,25Q1EPS,25年累積EPS\n\
         2330,台積電,17.5,15,13,45.5\n"
    );

    // Both series and the name map landed in the cache
    let store = CacheStore::with_data_dir(data_dir.path());
    assert!(store.is_fresh("2330", SeriesKind::MonthlyRevenue, now));
    assert!(store.is_fresh("2330", SeriesKind::FinancialStatement, now));
    assert_eq!(
        store
            .load_instrument_names()
            .and_then(|names| names.get("2330").cloned()),
        Some("台積電".to_string())
    );
}

#[test(tokio::test)]
async fn test_provider_outage_still_produces_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "msg": "Requests reach the upper limit.",
            "status": 402
        })))
        .mount(&server)
        .await;

    let data_dir = TempDir::new().unwrap();
    let config = Config {
        data_dir: data_dir.path().to_path_buf(),
        finmind_api_url: format!("{}/api/v4/data", server.uri()),
        rate_limit_per_minute: 600,
        ..Config::default()
    };
    let collector = DataCollector::new(
        Arc::new(FinMindClient::new(&config).unwrap()),
        CacheStore::with_data_dir(&config.data_dir),
        CollectOptions::from_config(&config, true),
    );

    let (report, summary) = collector
        .run_batch(&["2330".to_string(), "2303".to_string()], date(2025, 11, 12))
        .await;

    assert_eq!(summary.failures, 4);
    assert_eq!(report.eps.rows.len(), 2);
    assert!(report
        .eps
        .rows
        .iter()
        .all(|row| row.metrics.iter().all(|m| m.value.is_none())));
}
