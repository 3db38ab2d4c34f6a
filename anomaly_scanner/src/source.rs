use connectors_common::errors::ConnectorError;
use connectors_common::types::PricePoint;
use log::info;
use reqwest::Client;
use std::time::Duration;

use crate::config::{AppConfig, SourceKind};

/// One request against the configured source. No retry: a failure is returned as-is.
pub async fn fetch_history(cfg: &AppConfig) -> Result<Vec<PricePoint>, ConnectorError> {
    let client = Client::builder().build().map_err(|e| ConnectorError::Network(e.to_string()))?;
    let timeout = Duration::from_secs(cfg.source.timeout_secs);
    let req = &cfg.request;
    let base_url = cfg.source.base_url.as_deref();
    let points = match cfg.source.kind {
        SourceKind::Yahoo => {
            let base = base_url.unwrap_or(connector_yahoo::YAHOO_CHART_URL);
            connector_yahoo::fetch_chart_from(&client, base, req, timeout).await?
        }
        SourceKind::Coingecko => {
            let base = base_url.unwrap_or(connector_coingecko::COINGECKO_API_URL);
            connector_coingecko::fetch_market_chart_from(
                &client,
                base,
                &cfg.source.coingecko_id,
                &cfg.source.vs_currency,
                req.period.days(),
                timeout,
            )
            .await?
        }
    };
    info!(
        "{}: {} bars for {} ({} / {})",
        cfg.source.kind,
        points.len(),
        req.symbol,
        req.interval,
        req.period
    );
    Ok(points)
}
