//! Stablecoin classification
//!
//! Heuristic and over-inclusive: a coin is treated as a
//! stablecoin when any one signal fires. Every signal is configurable.

use crate::types::CoinRecord;
use std::collections::HashSet;
use tracing::debug;

/// Identifiers of well-known fiat-pegged assets
pub static KNOWN_STABLECOINS: phf::Set<&'static str> = phf::phf_set! {
    "tether",
    "usd-coin",
    "binance-usd",
    "dai",
    "frax",
    "true-usd",
    "trueusd",
    "pax-dollar",
    "paxos-standard",
    "gemini-dollar",
    "terrausd",
    "magic-internet-money",
    "neutrino",
    "fei-usd",
    "liquity-usd",
    "usdd",
    "first-digital-usd",
    "paypal-usd",
    "stasis-eurs",
    "tether-eurt",
};

/// Name/symbol fragments that mark a pegged asset
pub const STABLECOIN_KEYWORDS: &[&str] = &["usd", "usdt", "usdc", "dai", "busd", "stable", "peg"];

/// 24h moves smaller than this (in percent) look pegged
pub const DEFAULT_FLAT_THRESHOLD_PCT: f64 = 0.1;

/// Which signal classified a coin as a stablecoin
#[derive(Debug, Clone, PartialEq)]
pub enum StablecoinSignal {
    KnownId,
    FlatPrice(f64),
    Keyword(String),
}

/// Pluggable stablecoin predicate
#[derive(Debug, Clone)]
pub struct StablecoinFilter {
    known_ids: HashSet<String>,
    keywords: Vec<String>,
    flat_threshold_pct: f64,
}

impl Default for StablecoinFilter {
    fn default() -> Self {
        Self {
            known_ids: KNOWN_STABLECOINS.iter().map(|id| id.to_string()).collect(),
            keywords: STABLECOIN_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            flat_threshold_pct: DEFAULT_FLAT_THRESHOLD_PCT,
        }
    }
}

impl StablecoinFilter {
    pub fn new(
        known_ids: impl IntoIterator<Item = String>,
        keywords: impl IntoIterator<Item = String>,
        flat_threshold_pct: f64,
    ) -> Self {
        Self {
            known_ids: known_ids.into_iter().collect(),
            keywords: keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            flat_threshold_pct,
        }
    }

    pub fn with_known_id(mut self, id: impl Into<String>) -> Self {
        self.known_ids.insert(id.into());
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = String>) -> Self {
        self.keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        self
    }

    pub fn with_flat_threshold(mut self, threshold_pct: f64) -> Self {
        self.flat_threshold_pct = threshold_pct;
        self
    }

    /// First matching signal, if any.
    ///
    /// A missing 24h change counts as 0%, so unpriced listings are excluded too.
    pub fn classify(&self, coin: &CoinRecord) -> Option<StablecoinSignal> {
        if self.known_ids.contains(&coin.id) {
            return Some(StablecoinSignal::KnownId);
        }

        let change = coin.price_change_percentage_24h.unwrap_or(0.0).abs();
        if change < self.flat_threshold_pct {
            return Some(StablecoinSignal::FlatPrice(change));
        }

        let name = coin.name.to_lowercase();
        let symbol = coin.symbol.to_lowercase();
        self.keywords
            .iter()
            .find(|k| name.contains(k.as_str()) || symbol.contains(k.as_str()))
            .map(|k| StablecoinSignal::Keyword(k.clone()))
    }

    pub fn is_stablecoin(&self, coin: &CoinRecord) -> bool {
        self.classify(coin).is_some()
    }

    /// Drop stablecoins, preserving the order of the rest
    pub fn retain_volatile(&self, coins: Vec<CoinRecord>) -> Vec<CoinRecord> {
        coins
            .into_iter()
            .filter(|coin| match self.classify(coin) {
                Some(signal) => {
                    debug!(coin_id = %coin.id, ?signal, "Excluding stablecoin");
                    false
                }
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn coin(id: &str, name: &str, symbol: &str, change_24h: Option<f64>) -> CoinRecord {
        CoinRecord {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            current_price: Decimal::ONE,
            market_cap: None,
            market_cap_rank: None,
            price_change_percentage_24h: change_24h,
            price_change_percentage_7d: None,
            image: None,
        }
    }

    #[test]
    fn test_usd_coin_excluded_without_id_match() {
        let filter = StablecoinFilter::new(Vec::new(), Vec::new(), 0.1)
            .with_keywords(vec!["usd".to_string()]);
        let usdc = coin("some-unlisted-id", "USD Coin", "usdc", Some(0.01));

        assert!(filter.is_stablecoin(&usdc));
        // Default filter catches it as well
        assert!(StablecoinFilter::default().is_stablecoin(&usdc));
    }

    #[test]
    fn test_known_id_wins_first() {
        let filter = StablecoinFilter::default();
        let tether = coin("tether", "Tether", "usdt", Some(0.02));
        assert_eq!(filter.classify(&tether), Some(StablecoinSignal::KnownId));
    }

    #[test]
    fn test_flat_price_signal() {
        let filter = StablecoinFilter::default();
        let flat = coin("quietcoin", "Quiet", "qt", Some(-0.05));
        assert_eq!(filter.classify(&flat), Some(StablecoinSignal::FlatPrice(0.05)));

        let missing = coin("unpriced", "Unpriced", "unp", None);
        assert!(filter.is_stablecoin(&missing));
    }

    #[test]
    fn test_keyword_signal_on_symbol() {
        let filter = StablecoinFilter::default();
        let pegged = coin("ethena", "Ethena Dollar", "usde", Some(0.4));
        assert_eq!(
            filter.classify(&pegged),
            Some(StablecoinSignal::Keyword("usd".to_string()))
        );
    }

    #[test]
    fn test_volatile_coin_kept() {
        let filter = StablecoinFilter::default();
        let btc = coin("bitcoin", "Bitcoin", "btc", Some(2.5));
        assert!(!filter.is_stablecoin(&btc));
    }

    #[test]
    fn test_threshold_is_tunable() {
        let filter = StablecoinFilter::default().with_flat_threshold(0.0);
        let flat = coin("quietcoin", "Quiet", "qt", Some(0.05));
        assert!(!filter.is_stablecoin(&flat));
    }

    #[test]
    fn test_retain_volatile_preserves_order() {
        let filter = StablecoinFilter::default();
        let coins = vec![
            coin("bitcoin", "Bitcoin", "btc", Some(1.2)),
            coin("tether", "Tether", "usdt", Some(0.0)),
            coin("ethereum", "Ethereum", "eth", Some(-3.4)),
            coin("solana", "Solana", "sol", Some(5.0)),
        ];

        let kept: Vec<String> = filter
            .retain_volatile(coins)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(kept, vec!["bitcoin", "ethereum", "solana"]);
    }
}
