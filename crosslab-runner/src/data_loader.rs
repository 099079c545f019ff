//! Bar loading for the runner.
//!
//! Two sources:
//! 1. CSV file with a timestamp column and a price column
//! 2. Seeded synthetic random walk over business days (tagged as synthetic)
//!
//! CSV header detection is case-insensitive. The price column is chosen
//! in priority order `price`, `adj_close` / `adj close`, `close`.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use crosslab_core::domain::{Bar, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{DataConfig, DataSource, ShockConfig};

const TIMESTAMP_COLUMNS: [&str; 3] = ["timestamp", "date", "datetime"];
const PRICE_COLUMNS: [&str; 4] = ["price", "adj_close", "adj close", "close"];
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const SYNTHETIC_START_PRICE: f64 = 100.0;
const SYNTHETIC_ANNUAL_DRIFT: f64 = 0.08;
const SYNTHETIC_ANNUAL_VOL: f64 = 0.15;
const TRADING_DAYS: f64 = 252.0;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no {expected} column in CSV header")]
    MissingColumn { expected: &'static str },

    #[error("row {row}: cannot parse timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: invalid price '{value}'")]
    BadPrice { row: usize, value: String },

    #[error("duplicate timestamp {0}")]
    DuplicateTimestamp(Timestamp),

    #[error("no bars in the requested range")]
    EmptySeries,

    #[error("start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("shock {start}..{end}: daily return {daily_return} would wipe out the price")]
    InvalidShock {
        start: NaiveDate,
        end: NaiveDate,
        daily_return: f64,
    },

    #[error("csv source needs a path")]
    MissingPath,
}

/// Bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    /// BLAKE3 over every timestamp and price, for fingerprinting results.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

/// Load bars as described by the `[data]` config table.
pub fn load_bars(config: &DataConfig) -> Result<LoadedData, LoadError> {
    let (bars, has_synthetic) = match config.source {
        DataSource::Csv => {
            let path = config.path.as_deref().ok_or(LoadError::MissingPath)?;
            let bars = load_csv(path, config.start_date, config.end_date)?;
            (bars, false)
        }
        DataSource::Synthetic => {
            let (start, end) = config.synthetic_range();
            warn!(%start, %end, seed = config.seed, "using synthetic data; results are tagged");
            (generate_synthetic(start, end, config.seed, &config.shocks)?, true)
        }
    };
    info!(bars = bars.len(), synthetic = has_synthetic, "loaded price series");

    let dataset_hash = compute_dataset_hash(&bars);
    Ok(LoadedData {
        bars,
        dataset_hash,
        has_synthetic,
    })
}

/// Read a CSV file and keep bars whose date lies in `[start, end]`.
/// A missing bound leaves that side unfiltered.
pub fn load_csv(
    path: &Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<Bar>, LoadError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(LoadError::InvalidDateRange { start: s, end: e });
        }
    }
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let bars: Vec<Bar> = read_csv(file)?
        .into_iter()
        .filter(|b| start.map_or(true, |s| b.date() >= s) && end.map_or(true, |e| b.date() <= e))
        .collect();
    if bars.is_empty() {
        return Err(LoadError::EmptySeries);
    }
    Ok(bars)
}

/// Parse bars from any CSV reader. Rows come back sorted by timestamp.
///
/// Rows with an empty price are skipped. An unlabeled first column (as
/// written by dataframe exports) is taken as the timestamp.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    let ts_col = find_column(&headers, &TIMESTAMP_COLUMNS)
        .or_else(|| headers.first().filter(|h| h.is_empty()).map(|_| 0))
        .ok_or(LoadError::MissingColumn {
            expected: "timestamp",
        })?;
    let price_col =
        find_column(&headers, &PRICE_COLUMNS).ok_or(LoadError::MissingColumn { expected: "price" })?;

    let mut bars = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let row = i + 2;
        let raw_ts = record.get(ts_col).unwrap_or_default();
        let raw_price = record.get(price_col).unwrap_or_default();

        if raw_price.is_empty() {
            warn!(row, "skipping row with empty price");
            continue;
        }
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        let price: f64 = raw_price
            .parse()
            .ok()
            .filter(|p: &f64| p.is_finite() && *p > 0.0)
            .ok_or_else(|| LoadError::BadPrice {
                row,
                value: raw_price.to_string(),
            })?;
        bars.push(Bar::new(timestamp, price));
    }

    bars.sort_by_key(|b| b.timestamp);
    if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
        return Err(LoadError::DuplicateTimestamp(pair[0].timestamp));
    }
    Ok(bars)
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}

fn parse_timestamp(s: &str) -> Option<Timestamp> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Deterministic BLAKE3 hash over the series.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.price.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Seeded random walk over business days in `[start, end]`.
///
/// Daily returns are normal with an 8% annual drift and 15% annual
/// volatility. Each shock adds its `daily_return` on the dates it covers.
/// Prices compound from 100.0, starting with the first bar.
pub fn generate_synthetic(
    start: NaiveDate,
    end: NaiveDate,
    seed: u64,
    shocks: &[ShockConfig],
) -> Result<Vec<Bar>, LoadError> {
    if start > end {
        return Err(LoadError::InvalidDateRange { start, end });
    }
    if let Some(s) = shocks.iter().find(|s| s.daily_return <= -1.0) {
        return Err(LoadError::InvalidShock {
            start: s.start,
            end: s.end,
            daily_return: s.daily_return,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mean = SYNTHETIC_ANNUAL_DRIFT / TRADING_DAYS;
    let std = SYNTHETIC_ANNUAL_VOL / TRADING_DAYS.sqrt();

    let mut bars = Vec::new();
    let mut price = SYNTHETIC_START_PRICE;
    for date in start.iter_days().take_while(|d| *d <= end) {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let shock: f64 = shocks
            .iter()
            .filter(|s| s.start <= date && date <= s.end)
            .map(|s| s.daily_return)
            .sum();
        let daily_return = (mean + std * standard_normal(&mut rng) + shock).max(-0.99);
        price *= 1.0 + daily_return;
        bars.push(Bar::daily(date, price));
    }

    if bars.is_empty() {
        return Err(LoadError::EmptySeries);
    }
    Ok(bars)
}

/// Box-Muller transform.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
