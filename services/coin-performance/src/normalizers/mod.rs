// Turns raw price histories into bounded percentage-change series
use crate::types::*;

/// Point budget for a chart window, in points per series
pub fn target_points(window_days: u32) -> usize {
    match window_days {
        30 => 200,
        90 => 250,
        180 => 300,
        365 => 365,
        _ => 200,
    }
}

/// Percentage change of every point relative to the first (baseline) price.
///
/// The baseline point is always 0.0 and the total performance equals the last
/// point's percent. A zero baseline is reported instead of producing NaN/inf.
pub fn compute_performance(coin_id: &str, prices: &[PricePoint]) -> Result<PerformanceSeries> {
    let baseline = prices
        .first()
        .ok_or_else(|| MarketDataError::EmptySeries(coin_id.to_string()))?
        .price;

    if baseline == 0.0 || !baseline.is_finite() {
        return Err(MarketDataError::DivisionByZero(coin_id.to_string()));
    }

    let points: Vec<PerformancePoint> = prices
        .iter()
        .map(|p| PerformancePoint {
            timestamp_ms: p.timestamp_ms,
            price: p.price,
            percent: percent_change(p.price, baseline),
        })
        .collect();

    let total_performance = points.last().map(|p| p.percent).unwrap_or(0.0);

    Ok(PerformanceSeries {
        coin_id: coin_id.to_string(),
        points,
        total_performance,
    })
}

fn percent_change(current: f64, baseline: f64) -> f64 {
    (current - baseline) / baseline * 100.0
}

/// Deterministic stride downsample to at most `target_points(window_days)`.
///
/// First and last points are always kept; the last one is the untouched
/// original, so the end-of-window value never drifts. No interpolation.
pub fn resample<T: Clone>(points: &[T], window_days: u32) -> Vec<T> {
    resample_to(points, target_points(window_days))
}

/// Stride downsample to an explicit point budget (minimum 2)
pub fn resample_to<T: Clone>(points: &[T], target: usize) -> Vec<T> {
    let target = target.max(2);
    let len = points.len();
    if len <= target {
        return points.to_vec();
    }

    // ceil((len - 1) / (target - 1)) keeps the stride points plus the tail under budget
    let stride = (len - 1 + target - 2) / (target - 1);
    let mut sampled: Vec<T> = points.iter().step_by(stride).cloned().collect();

    if (len - 1) % stride != 0 {
        sampled.push(points[len - 1].clone());
    }

    sampled
}

impl PerformanceSeries {
    /// Downsample in place for the given chart window
    pub fn resampled(mut self, window_days: u32) -> Self {
        self.points = resample(&self.points, window_days);
        self
    }
}

/// A series is chart-ready when it is labelled, non-empty and fully finite
pub fn validate_series(series: &PerformanceSeries) -> Result<()> {
    if series.coin_id.trim().is_empty() {
        return Err(MarketDataError::DataShape(
            "Series has no coin id".to_string(),
        ));
    }

    if series.points.is_empty() {
        return Err(MarketDataError::EmptySeries(series.coin_id.clone()));
    }

    if let Some(bad) = series.points.iter().find(|p| !p.percent.is_finite()) {
        return Err(MarketDataError::DataShape(format!(
            "Non-finite percent for {} at {}",
            series.coin_id, bad.timestamp_ms
        )));
    }

    Ok(())
}
