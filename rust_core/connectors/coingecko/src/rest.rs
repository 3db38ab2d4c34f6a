use connectors_common::errors::ConnectorError;
use connectors_common::types::PricePoint;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use log::{debug, info, warn};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Bar length in minutes that `market_chart` returns for a look-back of `days`.
/// The API picks it: 5-minutely for one day, hourly up to 90 days, daily beyond.
pub fn served_interval_minutes(days: u32) -> u32 {
    match days {
        0..=1 => 5,
        2..=90 => 60,
        _ => 1440,
    }
}

/// CoinGecko coin id for the base asset of a ticker such as `BTC-USD`, when it is a known one.
pub fn coin_id_for_symbol(symbol: &str) -> Option<&'static str> {
    let base = symbol.split('-').next().unwrap_or(symbol).trim().to_ascii_uppercase();
    let id = match base.as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "SOL" => "solana",
        "XRP" => "ripple",
        "ADA" => "cardano",
        "DOGE" => "dogecoin",
        "LTC" => "litecoin",
        "DOT" => "polkadot",
        "BNB" => "binancecoin",
        _ => return None,
    };
    Some(id)
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub async fn fetch_market_chart(
    client: &Client,
    coin_id: &str,
    vs_currency: &str,
    days: u32,
    timeout: Duration,
) -> Result<Vec<PricePoint>, ConnectorError> {
    fetch_market_chart_from(client, COINGECKO_API_URL, coin_id, vs_currency, days, timeout).await
}

pub async fn fetch_market_chart_from(
    client: &Client,
    base_url: &str,
    coin_id: &str,
    vs_currency: &str,
    days: u32,
    timeout: Duration,
) -> Result<Vec<PricePoint>, ConnectorError> {
    let url = format!(
        "{}/coins/{}/market_chart?vs_currency={}&days={}",
        base_url, coin_id, vs_currency, days
    );
    info!("coingecko: GET {}", url);
    let resp = client
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ConnectorError::Network(e.to_string()))?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| ConnectorError::Network(e.to_string()))?;
    debug!("coingecko: status {} body {} bytes", status, text.len());
    if !status.is_success() {
        let description =
            serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
        return Err(ConnectorError::Api { code: status.as_u16().to_string(), description });
    }
    parse_market_chart(&text, coin_id)
}

/// Parse `{"prices": [[ms, price], ...]}`. Granularity is chosen by the API from `days`.
pub fn parse_market_chart(body: &str, coin_id: &str) -> Result<Vec<PricePoint>, ConnectorError> {
    let chart: MarketChart = serde_json::from_str(body)?;
    let mut out: Vec<PricePoint> = Vec::with_capacity(chart.prices.len());
    for (ms, price) in chart.prices {
        let pt = PricePoint::from_millis(ms as i64, price)
            .ok_or_else(|| ConnectorError::Parse(format!("timestamp out of range: {}", ms)))?;
        if let Some(last) = out.last() {
            if pt.ts <= last.ts {
                warn!("coingecko: dropping out-of-order sample at {} for {}", pt.ts, coin_id);
                continue;
            }
        }
        out.push(pt);
    }
    if out.is_empty() {
        return Err(ConnectorError::NoData(coin_id.to_string()));
    }
    Ok(out)
}
