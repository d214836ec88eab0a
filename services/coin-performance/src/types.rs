use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized coin metadata built from an upstream market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinRecord {
    pub id: String,              // "bitcoin", "ethereum"
    pub name: String,
    pub symbol: String,          // lowercase as delivered upstream
    pub current_price: Decimal,
    pub market_cap: Option<Decimal>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub image: Option<String>,
}

impl CoinRecord {
    /// Ticker as shown on chart labels ("BTC")
    pub fn label(&self) -> String {
        self.symbol.to_uppercase()
    }
}

/// Raw price observation from a historical series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp_ms: i64, price: f64) -> Self {
        Self {
            timestamp_ms,
            price,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// Percentage change of one observation relative to the series baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub timestamp_ms: i64,
    pub price: f64,
    pub percent: f64,
}

/// Percentage-change series for a single coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSeries {
    pub coin_id: String,
    pub points: Vec<PerformancePoint>,
    /// Change from the first to the last point, in percent
    pub total_performance: f64,
}

impl PerformanceSeries {
    pub fn baseline(&self) -> Option<&PerformancePoint> {
        self.points.first()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A series after ranking: 1 = best total performance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSeries {
    pub rank: usize,
    pub color: &'static str,
    #[serde(flatten)]
    pub series: PerformanceSeries,
}

/// Per-coin failure captured inside a batch operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryFailure {
    pub coin_id: String,
    pub kind: &'static str,
    pub error: String,
}

impl HistoryFailure {
    pub fn new(coin_id: impl Into<String>, err: &MarketDataError) -> Self {
        Self {
            coin_id: coin_id.into(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// Result of a batch history fetch: successes by coin id plus per-id failures
#[derive(Debug, Clone, Default)]
pub struct HistoryBatch {
    pub series: HashMap<String, Vec<PricePoint>>,
    pub failures: Vec<HistoryFailure>,
}

impl HistoryBatch {
    pub fn get(&self, coin_id: &str) -> Option<&[PricePoint]> {
        self.series.get(coin_id).map(Vec::as_slice)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Free-text search result (advisory only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub large: Option<String>,
    pub market_cap_rank: Option<u32>,
}

/// Error types for the market data pipeline
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit {
        source_name: String,
        retry_after: Option<u64>,
    },

    #[error("Unexpected response shape: {0}")]
    DataShape(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Empty price series for {0}")]
    EmptySeries(String),

    #[error("Baseline price is zero for {0}")]
    DivisionByZero(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

impl MarketDataError {
    /// Stable short label, used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            MarketDataError::Upstream(_) => "upstream",
            MarketDataError::RateLimit { .. } => "rate_limit",
            MarketDataError::DataShape(_) => "data_shape",
            MarketDataError::NotFound(_) => "not_found",
            MarketDataError::EmptySeries(_) => "empty_series",
            MarketDataError::DivisionByZero(_) => "division_by_zero",
            MarketDataError::InvalidSelection(_) => "invalid_selection",
        }
    }
}

/// Result type for market data operations
pub type Result<T> = std::result::Result<T, MarketDataError>;

/// Market data provider consumed by the chart pipeline
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Top `limit` non-stablecoins by market-cap rank
    async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<CoinRecord>>;

    /// Top `limit` non-stablecoins within an upstream category tag
    async fn fetch_coins_by_category(&self, category: &str, limit: usize)
        -> Result<Vec<CoinRecord>>;

    /// Explicitly chosen coins, in request order, without stablecoin filtering
    async fn fetch_coins_by_ids(&self, ids: &[String]) -> Result<Vec<CoinRecord>>;

    /// Daily price history over the trailing `days`
    async fn fetch_history(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>>;

    /// Sequential history fetch; per-id failures are collected, never raised
    async fn fetch_history_batch(&self, coin_ids: &[String], days: u32) -> HistoryBatch;

    /// Advisory lookup, empty on any failure
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit>;

    /// Source name
    fn name(&self) -> &str;
}
