//! Chart selection parameters and their shareable query-string form.
//!
//! Decoding is tolerant: anything missing or unparsable falls back to the
//! defaults (`market-cap`, 30 days, 10 coins, `layer-1`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::form_urlencoded;

/// Chart windows offered to users, in days
pub const SUPPORTED_WINDOWS: [u32; 4] = [30, 90, 180, 365];

/// Upper bound on coins per chart
pub const MAX_CHART_COINS: usize = 50;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_COIN_COUNT: usize = 10;
pub const DEFAULT_CATEGORY: &str = "layer-1";

/// How the coin set of a chart is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMethod {
    #[default]
    MarketCap,
    Category,
    Custom,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::MarketCap => "market-cap",
            SelectionMethod::Category => "category",
            SelectionMethod::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "market-cap" => Some(SelectionMethod::MarketCap),
            "category" => Some(SelectionMethod::Category),
            "custom" => Some(SelectionMethod::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to (re)build one chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSelection {
    pub method: SelectionMethod,
    pub days: u32,
    pub coin_count: usize,
    pub category: String,
    pub custom_ids: Vec<String>,
}

impl Default for ChartSelection {
    fn default() -> Self {
        Self {
            method: SelectionMethod::default(),
            days: DEFAULT_WINDOW_DAYS,
            coin_count: DEFAULT_COIN_COUNT,
            category: DEFAULT_CATEGORY.to_string(),
            custom_ids: Vec::new(),
        }
    }
}

impl ChartSelection {
    pub fn market_cap(coin_count: usize, days: u32) -> Self {
        Self {
            coin_count,
            days,
            ..Self::default()
        }
    }

    pub fn category(category: impl Into<String>, coin_count: usize, days: u32) -> Self {
        Self {
            method: SelectionMethod::Category,
            category: category.into(),
            coin_count,
            days,
            ..Self::default()
        }
    }

    pub fn custom(ids: impl IntoIterator<Item = String>, days: u32) -> Self {
        let custom_ids = dedupe(ids);
        Self {
            method: SelectionMethod::Custom,
            coin_count: custom_ids.len().clamp(1, MAX_CHART_COINS),
            custom_ids,
            days,
            ..Self::default()
        }
    }

    /// Flat key/value form: `method`, `period`, `coins`, `category`, `custom`
    pub fn to_query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("method", self.method.as_str())
            .append_pair("period", &self.days.to_string())
            .append_pair("coins", &self.coin_count.to_string())
            .append_pair("category", &self.category);

        if self.method == SelectionMethod::Custom && !self.custom_ids.is_empty() {
            query.append_pair("custom", &self.custom_ids.join(","));
        }

        query.finish()
    }

    /// Decode a shared query string. Never fails; bad values become defaults.
    pub fn from_query_string(query: &str) -> Self {
        let mut selection = Self::default();
        let query = query.trim().trim_start_matches('?');

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "method" => {
                    if let Some(method) = SelectionMethod::parse(&value) {
                        selection.method = method;
                    }
                }
                "period" => {
                    if let Ok(days) = value.trim().parse::<u32>() {
                        if SUPPORTED_WINDOWS.contains(&days) {
                            selection.days = days;
                        }
                    }
                }
                "coins" => {
                    if let Ok(count) = value.trim().parse::<usize>() {
                        selection.coin_count = count.clamp(1, MAX_CHART_COINS);
                    }
                }
                "category" => {
                    let category = value.trim();
                    if !category.is_empty() {
                        selection.category = resolve_category_alias(category).to_string();
                    }
                }
                "custom" => {
                    selection.custom_ids = dedupe(value.split(',').map(str::to_string));
                }
                _ => {}
            }
        }

        selection
    }
}

fn dedupe(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Display metadata for an upstream category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub static CATEGORIES: phf::Map<&'static str, CategoryInfo> = phf::phf_map! {
    "layer-1" => CategoryInfo { name: "L1s", description: "Layer 1 Blockchains" },
    "layer-2" => CategoryInfo { name: "L2s", description: "Layer 2 Solutions" },
    "artificial-intelligence" => CategoryInfo {
        name: "AI",
        description: "Artificial Intelligence",
    },
    "meme-token" => CategoryInfo { name: "Memes", description: "Meme Tokens" },
    "gaming" => CategoryInfo { name: "Gaming", description: "Gaming Tokens" },
    "real-world-assets" => CategoryInfo { name: "RWA", description: "Real World Assets" },
    "decentralized-finance-defi" => CategoryInfo {
        name: "DeFi",
        description: "Decentralized Finance",
    },
    "infrastructure" => CategoryInfo { name: "Infra", description: "Infrastructure" },
    "centralized-exchange-token-cex" => CategoryInfo {
        name: "Exchange",
        description: "Exchange Tokens",
    },
};

/// Short UI aliases for upstream category tags
static CATEGORY_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "l1s" => "layer-1",
    "l2s" => "layer-2",
    "ai" => "artificial-intelligence",
    "memes" => "meme-token",
    "gaming" => "gaming",
    "rwa" => "real-world-assets",
    "defi" => "decentralized-finance-defi",
    "infrastructure" => "infrastructure",
    "exchange" => "centralized-exchange-token-cex",
};

/// Map a UI alias to its upstream tag; unknown tags pass through unchanged
pub fn resolve_category_alias(category: &str) -> &str {
    CATEGORY_ALIASES.get(category).copied().unwrap_or(category)
}

pub fn category_info(category: &str) -> Option<&'static CategoryInfo> {
    CATEGORIES.get(resolve_category_alias(category))
}
