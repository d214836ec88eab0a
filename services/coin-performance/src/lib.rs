pub mod types;
pub mod settings;
pub mod cache;
pub mod throttle;
pub mod stablecoins;
pub mod sources {
    pub mod coingecko;
}
pub mod normalizers;
pub mod aggregators;
pub mod selection;
pub mod format;

pub use types::*;
pub use settings::Settings;
pub use sources::coingecko::CoinGeckoGateway;
pub use selection::{ChartSelection, SelectionMethod};
pub use aggregators::{AxisBounds, LegendEntry, LegendSort, PerformanceStats};

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// One chart line: ranked series plus its display label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    /// Ticker ("BTC"), falls back to the coin id
    pub label: String,
    pub name: String,
    #[serde(flatten)]
    pub ranked: RankedSeries,
}

/// Everything a renderer needs for one refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub generation: u64,
    pub selection: ChartSelection,
    pub series: Vec<ChartSeries>,
    pub bounds: AxisBounds,
    pub stats: PerformanceStats,
    pub legend: Vec<LegendEntry>,
    pub failures: Vec<HistoryFailure>,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Stored as the latest payload
    Applied(Arc<ChartPayload>),
    /// A newer refresh was requested while this one was in flight
    Superseded { generation: u64, latest: u64 },
}

impl RefreshOutcome {
    pub fn payload(&self) -> Option<&Arc<ChartPayload>> {
        match self {
            RefreshOutcome::Applied(payload) => Some(payload),
            RefreshOutcome::Superseded { .. } => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied(_))
    }
}

/// Coin selection -> history -> performance -> ranked chart payload
pub struct ChartPipeline {
    source: Arc<dyn MarketDataSource>,
    generation: AtomicU64,
    latest: RwLock<Option<Arc<ChartPayload>>>,
}

impl ChartPipeline {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            generation: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Arc<dyn MarketDataSource> {
        &self.source
    }

    /// Most recently applied payload
    pub async fn latest(&self) -> Option<Arc<ChartPayload>> {
        self.latest.read().await.clone()
    }

    /// Highest generation handed out so far
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Build a chart for `selection`.
    ///
    /// Errors only when the coin set itself cannot be resolved; per-coin
    /// history or computation failures land in `ChartPayload::failures`.
    /// A refresh that finishes after a newer one was started is discarded.
    pub async fn refresh(&self, selection: ChartSelection) -> Result<RefreshOutcome> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Refresh #{} ({} via {}, {} days)",
            ticket,
            selection.coin_count,
            selection.method,
            selection.days
        );

        let payload = self.build_payload(ticket, selection).await?;

        let mut latest = self.latest.write().await;
        let newest = self.generation.load(Ordering::SeqCst);
        if newest != ticket {
            info!("Refresh #{} superseded by #{}, discarding", ticket, newest);
            return Ok(RefreshOutcome::Superseded {
                generation: ticket,
                latest: newest,
            });
        }

        let payload = Arc::new(payload);
        *latest = Some(Arc::clone(&payload));
        Ok(RefreshOutcome::Applied(payload))
    }

    async fn build_payload(
        &self,
        generation: u64,
        selection: ChartSelection,
    ) -> Result<ChartPayload> {
        if selection.days == 0 {
            return Err(MarketDataError::InvalidSelection(
                "Window must be at least one day".to_string(),
            ));
        }

        let coins = self.resolve_coins(&selection).await?;
        let ids: Vec<String> = coins.iter().map(|c| c.id.clone()).collect();

        let batch = self.source.fetch_history_batch(&ids, selection.days).await;
        let mut failures = batch.failures.clone();

        let mut performances = Vec::with_capacity(coins.len());
        for coin in &coins {
            let Some(prices) = batch.get(&coin.id) else {
                continue;
            };

            let computed = normalizers::compute_performance(&coin.id, prices)
                .map(|s| s.resampled(selection.days))
                .and_then(|s| normalizers::validate_series(&s).map(|_| s));

            match computed {
                Ok(series) => performances.push(series),
                Err(e) => {
                    warn!("Skipping {}: {}", coin.id, e);
                    failures.push(HistoryFailure::new(&coin.id, &e));
                }
            }
        }

        let ranked = aggregators::rank_and_color(performances);
        let combined = aggregators::combine(&ranked);

        let mut series = Vec::with_capacity(ranked.len());
        let mut legend = Vec::with_capacity(ranked.len());
        for r in ranked {
            let coin = coins.iter().find(|c| c.id == r.series.coin_id);
            let (label, name) = match coin {
                Some(c) => (c.label(), c.name.clone()),
                None => (r.series.coin_id.to_uppercase(), r.series.coin_id.clone()),
            };

            if let Some(c) = coin {
                legend.push(LegendEntry {
                    coin: c.clone(),
                    rank: r.rank,
                    color: r.color,
                    total_performance: r.series.total_performance,
                });
            }

            series.push(ChartSeries {
                label,
                name,
                ranked: r,
            });
        }

        if !failures.is_empty() {
            warn!(
                "Refresh #{}: {} of {} coins without a series",
                generation,
                failures.len(),
                coins.len()
            );
        }

        Ok(ChartPayload {
            generation,
            selection,
            series,
            bounds: combined.bounds,
            stats: combined.stats,
            legend,
            failures,
        })
    }

    async fn resolve_coins(&self, selection: &ChartSelection) -> Result<Vec<CoinRecord>> {
        if selection.coin_count == 0 {
            return Err(MarketDataError::InvalidSelection(
                "Coin count must be positive".to_string(),
            ));
        }

        match selection.method {
            SelectionMethod::MarketCap => self.source.fetch_top_coins(selection.coin_count).await,
            SelectionMethod::Category => {
                let category =
                    crate::selection::resolve_category_alias(selection.category.trim());
                if category.is_empty() {
                    return Err(MarketDataError::InvalidSelection(
                        "Category is empty".to_string(),
                    ));
                }
                self.source
                    .fetch_coins_by_category(category, selection.coin_count)
                    .await
            }
            SelectionMethod::Custom => {
                if selection.custom_ids.is_empty() {
                    return Err(MarketDataError::InvalidSelection(
                        "No coins chosen".to_string(),
                    ));
                }
                let ids: Vec<String> = selection
                    .custom_ids
                    .iter()
                    .take(selection.coin_count)
                    .cloned()
                    .collect();
                self.source.fetch_coins_by_ids(&ids).await
            }
        }
    }
}
