//! Runtime settings
//!
//! Defaults match the free CoinGecko tier (50 requests/minute). Every field can
//! be overridden with a `COIN_PERF_` environment variable, e.g.
//! `COIN_PERF_REQUEST_DELAY_MS=2000`.

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const ENV_PREFIX: &str = "COIN_PERF";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub vs_currency: String,
    /// Minimum spacing between upstream requests
    pub request_delay_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    /// Pause between per-coin requests inside a history batch
    pub batch_pause_ms: u64,
    /// Extra attempts after an upstream 429
    pub rate_limit_retries: u32,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            vs_currency: "usd".to_string(),
            request_delay_ms: 1200,
            cache_ttl_secs: 300,
            cache_capacity: 1000,
            batch_pause_ms: 100,
            rate_limit_retries: 1,
            http_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load defaults, then `.env`, then `COIN_PERF_*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Settings::default();
        let settings = config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("vs_currency", defaults.vs_currency)?
            .set_default("request_delay_ms", defaults.request_delay_ms as i64)?
            .set_default("cache_ttl_secs", defaults.cache_ttl_secs as i64)?
            .set_default("cache_capacity", defaults.cache_capacity as i64)?
            .set_default("batch_pause_ms", defaults.batch_pause_ms as i64)?
            .set_default("rate_limit_retries", defaults.rate_limit_retries as i64)?
            .set_default("http_timeout_secs", defaults.http_timeout_secs as i64)?
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;

        Ok(settings)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Settings pointed at another base URL (mock servers, pro endpoint)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_free_tier() {
        let settings = Settings::default();
        assert_eq!(settings.request_delay(), Duration::from_millis(1200));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(300));
        assert_eq!(settings.batch_pause(), Duration::from_millis(100));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_with_base_url() {
        let settings = Settings::default().with_base_url("http://127.0.0.1:9999");
        assert_eq!(settings.base_url, "http://127.0.0.1:9999");
    }
}
