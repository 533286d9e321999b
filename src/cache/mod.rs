//! Local cache of fetched series
//!
//! The store decides freshness by recomputing the latest completed period from
//! `now`; nothing about freshness is persisted. Storage goes through a
//! [`CacheMedium`] so the JSON-on-disk layout can be swapped out in tests.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{CachedSeries, SeriesKind};
use crate::period::{latest_completed_month, latest_completed_quarter, FiscalPeriod};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Address of one cached payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Series {
        instrument_id: String,
        kind: SeriesKind,
    },
    InstrumentNames,
}

impl CacheKey {
    pub fn series(instrument_id: &str, kind: SeriesKind) -> Self {
        CacheKey::Series {
            instrument_id: instrument_id.to_string(),
            kind,
        }
    }
}

/// Byte-level storage for cache payloads
pub trait CacheMedium: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`
    fn read(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>>;

    /// Replace whatever is stored under `key`
    fn write(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()>;
}

/// One JSON file per key under a data directory
///
/// Layout: `<data_dir>/<kind>/<instrument_id>.json` for series and
/// `<data_dir>/stock_info.json` for the instrument name map.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    data_dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, key: &CacheKey) -> io::Result<PathBuf> {
        match key {
            CacheKey::Series {
                instrument_id,
                kind,
            } => {
                validate_file_stem(instrument_id)?;
                Ok(self
                    .data_dir
                    .join(kind.as_str())
                    .join(format!("{}.json", instrument_id)))
            }
            CacheKey::InstrumentNames => Ok(self.data_dir.join("stock_info.json")),
        }
    }
}

fn validate_file_stem(instrument_id: &str) -> io::Result<()> {
    let bad = instrument_id.is_empty()
        || instrument_id.starts_with('.')
        || instrument_id.contains(['/', '\\']);
    if bad {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("instrument id {:?} cannot be used as a file name", instrument_id),
        ));
    }
    Ok(())
}

impl CacheMedium for JsonFileCache {
    fn read(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Readers only ever see the old file or the complete new one
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            fs::remove_file(&tmp_path).ok();
            return Err(e);
        }
        Ok(())
    }
}

/// Series cache keyed by `(instrument_id, series_kind)`
#[derive(Clone)]
pub struct CacheStore {
    medium: Arc<dyn CacheMedium>,
}

impl CacheStore {
    pub fn new(medium: Arc<dyn CacheMedium>) -> Self {
        Self { medium }
    }

    /// Store backed by JSON files under `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(JsonFileCache::new(data_dir)))
    }

    /// Load a cached series. Missing, unreadable or invalid payloads are all a miss.
    pub fn load(&self, instrument_id: &str, kind: SeriesKind) -> Option<CachedSeries> {
        let key = CacheKey::series(instrument_id, kind);
        let bytes = match self.medium.read(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No cached {} for {}", kind, instrument_id);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cached {} for {}: {}", kind, instrument_id, e);
                return None;
            }
        };

        match serde_json::from_slice::<CachedSeries>(&bytes) {
            Ok(series) if series.kind() == kind => Some(series),
            Ok(series) => {
                warn!(
                    "Cached {} for {} holds a {} series, ignoring it",
                    kind,
                    instrument_id,
                    series.kind()
                );
                None
            }
            Err(e) => {
                warn!("Corrupt cached {} for {}: {}", kind, instrument_id, e);
                None
            }
        }
    }

    /// Replace the stored series for `instrument_id` wholesale
    pub fn save(&self, instrument_id: &str, series: &CachedSeries) -> Result<(), CacheError> {
        let key = CacheKey::series(instrument_id, series.kind());
        let bytes = serde_json::to_vec(series)?;
        self.medium.write(&key, &bytes)?;
        debug!(
            "Saved {} {} records for {}",
            series.len(),
            series.kind(),
            instrument_id
        );
        Ok(())
    }

    /// Whether the cached series already holds the latest completed period
    pub fn is_fresh(&self, instrument_id: &str, kind: SeriesKind, now: NaiveDate) -> bool {
        match self.load(instrument_id, kind) {
            Some(series) => series_is_fresh(&series, now),
            None => false,
        }
    }

    pub fn load_instrument_names(&self) -> Option<HashMap<String, String>> {
        let bytes = match self.medium.read(&CacheKey::InstrumentNames) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cached instrument names: {}", e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(names) => Some(names),
            Err(e) => {
                warn!("Corrupt instrument name cache: {}", e);
                None
            }
        }
    }

    pub fn save_instrument_names(&self, names: &HashMap<String, String>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(names)?;
        self.medium.write(&CacheKey::InstrumentNames, &bytes)?;
        Ok(())
    }
}

/// Freshness of an already loaded series relative to `now`
pub fn series_is_fresh(series: &CachedSeries, now: NaiveDate) -> bool {
    let target: FiscalPeriod = match series.kind() {
        SeriesKind::MonthlyRevenue => latest_completed_month(now).into(),
        SeriesKind::FinancialStatement => latest_completed_quarter(now).into(),
    };
    series.records().iter().any(|r| r.period == target)
}
