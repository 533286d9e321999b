pub mod analysis;
pub mod api;
pub mod cache;
pub mod data_collector;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod period;
pub mod report;
pub mod series;
pub mod utils;
