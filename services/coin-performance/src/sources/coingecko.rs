use crate::cache::ResponseCache;
use crate::settings::Settings;
use crate::stablecoins::StablecoinFilter;
use crate::throttle::ThrottleGate;
use crate::types::*;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Largest page the markets endpoint serves
const MAX_PER_PAGE: usize = 250;

/// Upper bound on explicitly chosen coins
pub const MAX_CUSTOM_COINS: usize = 20;

/// Fallback wait after a 429 without Retry-After, and its cap
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_RETRY_AFTER_SECS: u64 = 120;

/// Market Data Gateway backed by the CoinGecko REST API.
///
/// Every outbound request passes through one [`ThrottleGate`]; successful
/// payloads are kept in a [`ResponseCache`] and served without touching the
/// network or the gate while fresh.
pub struct CoinGeckoGateway {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    vs_currency: String,
    throttle: ThrottleGate,
    cache: Mutex<ResponseCache>,
    filter: StablecoinFilter,
    batch_pause: Duration,
    rate_limit_retries: u32,
}

impl CoinGeckoGateway {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.http_timeout())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| MarketDataError::Upstream(format!("HTTP client: {}", e)))?;

        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            MarketDataError::Upstream(format!("Invalid base URL {}: {}", settings.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MarketDataError::Upstream(format!(
                "Invalid base URL {}",
                settings.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            vs_currency: settings.vs_currency.clone(),
            throttle: ThrottleGate::new(settings.request_delay()),
            cache: Mutex::new(ResponseCache::new(
                settings.cache_ttl(),
                settings.cache_capacity,
            )),
            filter: StablecoinFilter::default(),
            batch_pause: settings.batch_pause(),
            rate_limit_retries: settings.rate_limit_retries,
        })
    }

    /// Replace the stablecoin classifier
    pub fn with_filter(mut self, filter: StablecoinFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn throttle(&self) -> &ThrottleGate {
        &self.throttle
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        tracing::info!("API cache cleared");
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn cache_keys(&self) -> Vec<String> {
        self.cache.lock().await.keys()
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    /// Build request with optional API key
    fn build_request(&self, url: Url) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);

        if let Some(key) = &self.api_key {
            req = req.header("x-cg-pro-api-key", key);
        }

        req
    }

    /// Cached, throttled GET returning the raw JSON payload.
    ///
    /// Failures are never cached. Each attempt (including 429 retries) claims
    /// a throttle slot, so failed calls still count against the rate limit.
    async fn request_json(&self, url: Url, cache_key: &str) -> Result<Value> {
        if let Some(cached) = self.cache.lock().await.get(cache_key, Instant::now()) {
            tracing::debug!(cache_key, "Using cached data");
            return Ok(cached);
        }

        let mut attempt = 0;
        loop {
            self.throttle.acquire().await;
            tracing::debug!(%url, "Fetching");

            let response = match self.build_request(url.clone()).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(%url, "CoinGecko request failed: {}", e);
                    return Err(MarketDataError::Upstream(e.to_string()));
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());

                if attempt < self.rate_limit_retries {
                    attempt += 1;
                    let wait_secs = retry_after
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                        .min(MAX_RETRY_AFTER_SECS);
                    tracing::warn!(
                        "CoinGecko rate limited, waiting {} seconds before retry",
                        wait_secs
                    );
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }

                return Err(MarketDataError::RateLimit {
                    source_name: "coingecko".to_string(),
                    retry_after,
                });
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                tracing::warn!(%url, %status, "CoinGecko API error");
                return Err(MarketDataError::Upstream(format!(
                    "CoinGecko API error ({}): {}",
                    status, text
                )));
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| MarketDataError::DataShape(format!("Invalid JSON body: {}", e)))?;

            self.cache
                .lock()
                .await
                .insert(cache_key, payload.clone(), Instant::now());

            return Ok(payload);
        }
    }

    fn markets_query(&self, per_page: usize) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.vs_currency.clone()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", per_page.clamp(1, MAX_PER_PAGE).to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "1h,24h,7d".to_string()),
        ]
    }

    /// Top `limit` coins by market cap, stablecoins removed.
    ///
    /// Asks upstream for twice as many rows so the filter does not under-fill.
    pub async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<CoinRecord>> {
        let cache_key = format!("top-coins-{}", limit);
        let url = self.endpoint(
            &["coins", "markets"],
            &self.markets_query(limit.saturating_mul(2)),
        );

        let payload = self.request_json(url, &cache_key).await?;
        let coins = decode_markets(payload)?;

        Ok(self.rank_filtered(coins, limit))
    }

    /// Top `limit` coins of an upstream category, stablecoins removed
    pub async fn fetch_coins_by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<CoinRecord>> {
        let cache_key = format!("category-{}-{}", category, limit);
        let mut query = self.markets_query(limit.saturating_mul(2));
        query.push(("category", category.to_string()));
        let url = self.endpoint(&["coins", "markets"], &query);

        let payload = self.request_json(url, &cache_key).await?;
        let coins = decode_markets(payload)?;

        if coins.is_empty() {
            return Err(MarketDataError::NotFound(format!(
                "No coins found for category: {}",
                category
            )));
        }

        Ok(self.rank_filtered(coins, limit))
    }

    fn rank_filtered(&self, mut coins: Vec<CoinRecord>, limit: usize) -> Vec<CoinRecord> {
        coins.sort_by_key(|c| c.market_cap_rank.unwrap_or(u32::MAX));
        let mut kept = self.filter.retain_volatile(coins);
        kept.truncate(limit);
        kept
    }

    /// Explicitly chosen coins in request order. No stablecoin filtering.
    pub async fn fetch_coins_by_ids(&self, ids: &[String]) -> Result<Vec<CoinRecord>> {
        let ids = unique_ids(ids, MAX_CUSTOM_COINS);
        if ids.is_empty() {
            return Err(MarketDataError::InvalidSelection(
                "No coin ids given".to_string(),
            ));
        }

        let joined = ids.join(",");
        let cache_key = format!("coins-{}", joined);
        let mut query = self.markets_query(ids.len());
        query.push(("ids", joined));
        let url = self.endpoint(&["coins", "markets"], &query);

        let payload = self.request_json(url, &cache_key).await?;
        let mut by_id: HashMap<String, CoinRecord> = decode_markets(payload)?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut coins = Vec::with_capacity(ids.len());
        for id in &ids {
            match by_id.remove(id) {
                Some(coin) => coins.push(coin),
                None => tracing::warn!(coin_id = %id, "Unknown coin id dropped from selection"),
            }
        }

        if coins.is_empty() {
            return Err(MarketDataError::NotFound(format!(
                "No market data for coins: {}",
                ids.join(", ")
            )));
        }

        Ok(coins)
    }

    /// Daily prices over the trailing `days`
    pub async fn fetch_history(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>> {
        let cache_key = format!("history-{}-{}", coin_id, days);
        let url = self.endpoint(
            &["coins", coin_id, "market_chart"],
            &[
                ("vs_currency", self.vs_currency.clone()),
                ("days", days.to_string()),
                ("interval", "daily".to_string()),
            ],
        );

        let payload = self.request_json(url, &cache_key).await?;
        decode_history(coin_id, payload)
    }

    /// Histories for several coins, one after another.
    ///
    /// A short pause separates requests on top of the throttle. Failures are
    /// recorded per id and never abort the batch.
    pub async fn fetch_history_batch(&self, coin_ids: &[String], days: u32) -> HistoryBatch {
        let ids = unique_ids(coin_ids, usize::MAX);
        tracing::info!(
            "Fetching historical data for {} coins over {} days",
            ids.len(),
            days
        );

        let mut batch = HistoryBatch::default();
        for (index, coin_id) in ids.iter().enumerate() {
            match self.fetch_history(coin_id, days).await {
                Ok(points) => {
                    batch.series.insert(coin_id.clone(), points);
                }
                Err(e) => {
                    tracing::warn!(coin_id = %coin_id, "Failed to fetch history: {}", e);
                    batch.failures.push(HistoryFailure::new(coin_id.as_str(), &e));
                }
            }

            if index + 1 < ids.len() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        if !batch.failures.is_empty() {
            tracing::warn!(
                "Failed to fetch data for {} of {} coins",
                batch.failures.len(),
                ids.len()
            );
        }

        batch
    }

    /// Free-text coin lookup. Advisory: any failure yields an empty list.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let cache_key = format!("search-{}-{}", query, limit);
        let url = self.endpoint(&["search"], &[("query", query.to_string())]);

        let payload = match self.request_json(url, &cache_key).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Search for {:?} failed: {}", query, e);
                return Vec::new();
            }
        };

        match serde_json::from_value::<SearchResponse>(payload) {
            Ok(response) => response
                .coins
                .into_iter()
                .take(limit)
                .map(SearchHit::from)
                .collect(),
            Err(e) => {
                tracing::warn!("Search for {:?} returned unexpected shape: {}", query, e);
                Vec::new()
            }
        }
    }
}

/// Collapse duplicates (first occurrence wins) and drop blanks
fn unique_ids(ids: &[String], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .take(max)
        .map(str::to_string)
        .collect()
}

// Response types for the CoinGecko API

#[derive(Debug, Deserialize)]
struct MarketCoin {
    id: String,
    symbol: String,
    name: String,
    current_price: f64,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default, alias = "price_change_percentage_7d_in_currency")]
    price_change_percentage_7d: Option<f64>,
    #[serde(default)]
    image: Option<String>,
}

impl TryFrom<MarketCoin> for CoinRecord {
    type Error = MarketDataError;

    fn try_from(coin: MarketCoin) -> Result<Self> {
        if !coin.current_price.is_finite() || coin.current_price < 0.0 {
            return Err(MarketDataError::DataShape(format!(
                "Invalid price for {}: {}",
                coin.id, coin.current_price
            )));
        }

        let market_cap = match coin.market_cap {
            Some(cap) if cap.is_finite() && cap >= 0.0 => Some(
                Decimal::try_from(cap).map_err(|e| MarketDataError::DataShape(e.to_string()))?,
            ),
            Some(cap) => {
                return Err(MarketDataError::DataShape(format!(
                    "Invalid market cap for {}: {}",
                    coin.id, cap
                )))
            }
            None => None,
        };

        // JSON numbers arrive as f64; the intermediate is unavoidable
        let current_price = Decimal::try_from(coin.current_price)
            .map_err(|e| MarketDataError::DataShape(e.to_string()))?;

        Ok(CoinRecord {
            id: coin.id,
            name: coin.name,
            symbol: coin.symbol,
            current_price,
            market_cap,
            market_cap_rank: coin.market_cap_rank.filter(|rank| *rank > 0),
            price_change_percentage_24h: coin.price_change_percentage_24h,
            price_change_percentage_7d: coin.price_change_percentage_7d,
            image: coin.image,
        })
    }
}

fn decode_markets(payload: Value) -> Result<Vec<CoinRecord>> {
    if !payload.is_array() {
        return Err(MarketDataError::DataShape(
            "Expected a list of market coins".to_string(),
        ));
    }

    let coins: Vec<MarketCoin> = serde_json::from_value(payload)
        .map_err(|e| MarketDataError::DataShape(format!("Market listing: {}", e)))?;

    coins.into_iter().map(CoinRecord::try_from).collect()
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Option<Vec<(f64, f64)>>,
}

fn decode_history(coin_id: &str, payload: Value) -> Result<Vec<PricePoint>> {
    let chart: MarketChartResponse = serde_json::from_value(payload).map_err(|e| {
        MarketDataError::DataShape(format!("Price history for {}: {}", coin_id, e))
    })?;

    let prices = chart.prices.ok_or_else(|| {
        MarketDataError::NotFound(format!("No price data found for {}", coin_id))
    })?;

    let mut points: Vec<PricePoint> = Vec::with_capacity(prices.len());
    for (timestamp, price) in prices {
        if !timestamp.is_finite() || !price.is_finite() || price < 0.0 {
            return Err(MarketDataError::DataShape(format!(
                "Invalid price point for {}: [{}, {}]",
                coin_id, timestamp, price
            )));
        }

        let timestamp_ms = timestamp as i64;
        if let Some(last) = points.last() {
            if timestamp_ms <= last.timestamp_ms {
                tracing::debug!(coin_id, timestamp_ms, "Dropping out-of-order price point");
                continue;
            }
        }
        points.push(PricePoint::new(timestamp_ms, price));
    }

    Ok(points)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
}

impl From<SearchCoin> for SearchHit {
    fn from(coin: SearchCoin) -> Self {
        SearchHit {
            id: coin.id,
            symbol: coin.symbol,
            name: coin.name,
            large: coin.large,
            market_cap_rank: coin.market_cap_rank,
        }
    }
}

#[async_trait::async_trait]
impl MarketDataSource for CoinGeckoGateway {
    async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<CoinRecord>> {
        CoinGeckoGateway::fetch_top_coins(self, limit).await
    }

    async fn fetch_coins_by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<CoinRecord>> {
        CoinGeckoGateway::fetch_coins_by_category(self, category, limit).await
    }

    async fn fetch_coins_by_ids(&self, ids: &[String]) -> Result<Vec<CoinRecord>> {
        CoinGeckoGateway::fetch_coins_by_ids(self, ids).await
    }

    async fn fetch_history(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>> {
        CoinGeckoGateway::fetch_history(self, coin_id, days).await
    }

    async fn fetch_history_batch(&self, coin_ids: &[String], days: u32) -> HistoryBatch {
        CoinGeckoGateway::fetch_history_batch(self, coin_ids, days).await
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        CoinGeckoGateway::search(self, query, limit).await
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
