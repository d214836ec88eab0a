use coin_performance::aggregators::sort_legend;
use coin_performance::format::{
    format_compact, format_currency, format_date, format_percent, format_time_period,
    performance_color,
};
use coin_performance::selection::category_info;
use coin_performance::{
    ChartPipeline, ChartSelection, CoinGeckoGateway, LegendSort, RefreshOutcome, SelectionMethod,
    Settings,
};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let settings = Settings::load()?;
    info!("Using market data from {}", settings.base_url);

    let gateway = Arc::new(CoinGeckoGateway::new(&settings)?);
    let pipeline = ChartPipeline::new(gateway);

    // Optional shareable query string, e.g. "method=category&category=ai&period=90"
    let selection = std::env::args()
        .nth(1)
        .map(|query| ChartSelection::from_query_string(&query))
        .unwrap_or_default();

    let scope = match selection.method {
        SelectionMethod::Category => category_info(&selection.category)
            .map(|info| info.description.to_string())
            .unwrap_or_else(|| selection.category.clone()),
        SelectionMethod::MarketCap => "Top by market cap".to_string(),
        SelectionMethod::Custom => "Custom selection".to_string(),
    };
    info!(
        "Charting {} coins ({}) over {}",
        selection.coin_count,
        scope,
        format_time_period(selection.days)
    );

    let payload = match pipeline.refresh(selection).await? {
        RefreshOutcome::Applied(payload) => payload,
        RefreshOutcome::Superseded { generation, latest } => {
            anyhow::bail!("Refresh #{} superseded by #{}", generation, latest)
        }
    };

    let window = payload.series.first().and_then(|s| {
        let first = s.ranked.series.points.first()?;
        let last = s.ranked.series.points.last()?;
        Some((format_date(first.timestamp_ms)?, format_date(last.timestamp_ms)?))
    });
    if let Some((from, to)) = window {
        info!("Window {} - {}", from, to);
    }

    let mut legend = payload.legend.clone();
    sort_legend(&mut legend, LegendSort::MarketCap);
    for entry in &legend {
        let cap = entry
            .coin
            .market_cap
            .and_then(|cap| cap.to_f64())
            .map(|cap| format_compact(cap, 2))
            .unwrap_or_else(|| "-".to_string());

        info!(
            "#{} {:<8} {:>9} {:>14} cap {:>9} {}",
            entry.rank,
            entry.coin.label(),
            format_percent(entry.total_performance, 2),
            format_currency(entry.coin.current_price),
            cap,
            performance_color(entry.total_performance)
        );
    }

    for failure in &payload.failures {
        warn!("No series for {} ({})", failure.coin_id, failure.error);
    }

    println!("{}", serde_json::to_string_pretty(payload.as_ref())?);

    Ok(())
}
