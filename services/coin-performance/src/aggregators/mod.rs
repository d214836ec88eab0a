// Ranking, colouring and summary statistics across a batch of series
use crate::types::*;
use serde::Serialize;
use std::cmp::Ordering;

/// Best-to-worst palette for up to five series (green = best, red = worst)
pub const PERFORMANCE_COLORS: [&str; 5] = ["#27ae60", "#3498db", "#f39c12", "#e67e22", "#e74c3c"];

/// Best-to-worst palette for larger batches
pub const EXTENDED_COLORS: [&str; 10] = [
    "#27ae60", "#2ecc71", "#3498db", "#5dade2", "#f39c12", "#f7dc6f", "#e67e22", "#ec7063",
    "#e74c3c", "#cd6155",
];

/// Colour for a 1-based rank. Ranks past the palette reuse its last colour.
pub fn color_for_rank(rank: usize, total: usize) -> &'static str {
    let palette: &[&'static str] = if total <= PERFORMANCE_COLORS.len() {
        &PERFORMANCE_COLORS
    } else {
        &EXTENDED_COLORS
    };

    palette
        .get(rank.saturating_sub(1))
        .or_else(|| palette.last())
        .copied()
        .unwrap_or("#ffffff")
}

/// Order by descending total performance and assign rank + colour.
///
/// The sort is stable: ties keep their input order.
pub fn rank_and_color(mut series: Vec<PerformanceSeries>) -> Vec<RankedSeries> {
    series.sort_by(|a, b| b.total_performance.total_cmp(&a.total_performance));

    let total = series.len();
    series
        .into_iter()
        .enumerate()
        .map(|(index, s)| RankedSeries {
            rank: index + 1,
            color: color_for_rank(index + 1, total),
            series: s,
        })
        .collect()
}

/// Y-axis range shared by every series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performer {
    pub coin_id: String,
    pub performance: f64,
}

/// Batch-level statistics over total performance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub best_performer: Option<Performer>,
    pub worst_performer: Option<Performer>,
    pub average_performance: f64,
    /// Population standard deviation of total performance
    pub volatility: f64,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self {
            best_performer: None,
            worst_performer: None,
            average_performance: 0.0,
            volatility: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedChart {
    pub bounds: AxisBounds,
    pub stats: PerformanceStats,
}

/// Share of the larger absolute bound added on both sides of the axis
const AXIS_PADDING: f64 = 0.1;

/// Union axis bounds (padded) and summary statistics for a batch
pub fn combine(series: &[RankedSeries]) -> CombinedChart {
    CombinedChart {
        bounds: axis_bounds(series),
        stats: performance_stats(series),
    }
}

fn axis_bounds(series: &[RankedSeries]) -> AxisBounds {
    // Every series starts at 0%, so zero is always inside the range
    let (mut min, mut max) = (0.0_f64, 0.0_f64);
    for point in series.iter().flat_map(|s| s.series.points.iter()) {
        min = min.min(point.percent);
        max = max.max(point.percent);
    }

    let padding = max.abs().max(min.abs()) * AXIS_PADDING;
    AxisBounds {
        min: min - padding,
        max: max + padding,
    }
}

fn performance_stats(series: &[RankedSeries]) -> PerformanceStats {
    if series.is_empty() {
        return PerformanceStats::default();
    }

    let mut best = &series[0].series;
    let mut worst = &series[0].series;
    for s in series.iter().map(|r| &r.series) {
        if s.total_performance > best.total_performance {
            best = s;
        }
        if s.total_performance < worst.total_performance {
            worst = s;
        }
    }

    let n = series.len() as f64;
    let mean = series.iter().map(|r| r.series.total_performance).sum::<f64>() / n;
    let variance = series
        .iter()
        .map(|r| (r.series.total_performance - mean).powi(2))
        .sum::<f64>()
        / n;

    PerformanceStats {
        best_performer: Some(Performer {
            coin_id: best.coin_id.clone(),
            performance: best.total_performance,
        }),
        worst_performer: Some(Performer {
            coin_id: worst.coin_id.clone(),
            performance: worst.total_performance,
        }),
        average_performance: mean,
        volatility: variance.sqrt(),
    }
}

/// Legend row: coin, colour and total performance, parallel to the series list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub coin: CoinRecord,
    pub rank: usize,
    pub color: &'static str,
    pub total_performance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegendSort {
    #[default]
    Performance,
    MarketCap,
    Price,
    Name,
}

/// Reorder legend rows. Stable, so equal keys keep their current order.
pub fn sort_legend(entries: &mut [LegendEntry], by: LegendSort) {
    match by {
        LegendSort::Performance => {
            entries.sort_by(|a, b| b.total_performance.total_cmp(&a.total_performance))
        }
        LegendSort::MarketCap => entries.sort_by(|a, b| {
            b.coin
                .market_cap
                .unwrap_or_default()
                .cmp(&a.coin.market_cap.unwrap_or_default())
        }),
        LegendSort::Price => {
            entries.sort_by(|a, b| b.coin.current_price.cmp(&a.coin.current_price))
        }
        LegendSort::Name => entries.sort_by(|a, b| {
            let by_lower = a.coin.name.to_lowercase().cmp(&b.coin.name.to_lowercase());
            if by_lower == Ordering::Equal {
                a.coin.name.cmp(&b.coin.name)
            } else {
                by_lower
            }
        }),
    }
}
