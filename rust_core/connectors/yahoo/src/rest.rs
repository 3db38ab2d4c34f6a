use connectors_common::errors::ConnectorError;
use connectors_common::types::{HistoryRequest, PricePoint};
use chrono::DateTime;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub async fn fetch_chart(
    client: &Client,
    req: &HistoryRequest,
    timeout: Duration,
) -> Result<Vec<PricePoint>, ConnectorError> {
    fetch_chart_from(client, YAHOO_CHART_URL, req, timeout).await
}

/// Same as [`fetch_chart`] against an explicit chart endpoint.
pub async fn fetch_chart_from(
    client: &Client,
    base_url: &str,
    req: &HistoryRequest,
    timeout: Duration,
) -> Result<Vec<PricePoint>, ConnectorError> {
    let url = format!(
        "{}/{}?range={}&interval={}",
        base_url, req.symbol, req.period, req.interval
    );
    info!("yahoo: GET {}", url);
    let resp = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ConnectorError::Network(e.to_string()))?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| ConnectorError::Network(e.to_string()))?;
    debug!("yahoo: status {} body {} bytes", status, text.len());
    parse_chart_response(status, &text, &req.symbol)
}

/// Chart errors usually arrive as a non-2xx status with a JSON error object, which
/// [`parse_chart`] surfaces. A non-2xx status whose body is not chart JSON (a rate-limit
/// page, a proxy error) is reported with the HTTP status instead.
pub fn parse_chart_response(
    status: StatusCode,
    body: &str,
    symbol: &str,
) -> Result<Vec<PricePoint>, ConnectorError> {
    match parse_chart(body, symbol) {
        Err(ConnectorError::Parse(_)) if !status.is_success() => Err(ConnectorError::Api {
            code: status.as_u16().to_string(),
            description: status.canonical_reason().unwrap_or("unexpected status").to_string(),
        }),
        other => other,
    }
}

/// Turn a chart API body into price points. Bars without a close are skipped.
pub fn parse_chart(body: &str, symbol: &str) -> Result<Vec<PricePoint>, ConnectorError> {
    let resp: ChartResponse = serde_json::from_str(body)?;
    if let Some(err) = resp.chart.error {
        return Err(ConnectorError::Api { code: err.code, description: err.description });
    }
    let result = resp
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| ConnectorError::NoData(symbol.to_string()))?;
    let closes = result.indicators.quote.into_iter().next().map(|q| q.close).unwrap_or_default();

    let mut out: Vec<PricePoint> = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let close = match closes.get(i).copied().flatten() {
            Some(c) => c,
            None => continue,
        };
        let ts = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| ConnectorError::Parse(format!("timestamp out of range: {}", ts)))?;
        if let Some(last) = out.last() {
            if ts <= last.ts {
                warn!("yahoo: dropping out-of-order bar at {} for {}", ts, symbol);
                continue;
            }
        }
        out.push(PricePoint::new(ts, close));
    }
    if out.is_empty() {
        return Err(ConnectorError::NoData(symbol.to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"chart":{"result":[{"meta":{"symbol":"BTC-USD","currency":"USD"},
        "timestamp":[1700000000,1700000300,1700000600,1700000900],
        "indicators":{"quote":[{"open":[1,2,3,4],
        "close":[37000.5,null,37010.0,36990.25]}]}}],"error":null}}"#;

    #[test]
    fn parses_closes_and_skips_nulls() {
        let pts = parse_chart(BODY, "BTC-USD").unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[0].ts.timestamp(), 1_700_000_000);
        assert_eq!(pts[1].ts.timestamp(), 1_700_000_600);
        assert_eq!(pts[2].close, 36990.25);
    }

    #[test]
    fn api_error_is_surfaced() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found",
            "description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart(body, "NOPE-USD") {
            Err(ConnectorError::Api { code, .. }) => assert_eq!(code, "Not Found"),
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn all_null_closes_is_no_data() {
        let body = r#"{"chart":{"result":[{"timestamp":[1,2],
            "indicators":{"quote":[{"close":[null,null]}]}}],"error":null}}"#;
        assert!(matches!(parse_chart(body, "BTC-USD"), Err(ConnectorError::NoData(_))));
    }

    #[test]
    fn repeated_timestamp_is_dropped() {
        let body = r#"{"chart":{"result":[{"timestamp":[10,20,20,30],
            "indicators":{"quote":[{"close":[1.0,2.0,2.5,3.0]}]}}],"error":null}}"#;
        let pts = parse_chart(body, "BTC-USD").unwrap();
        let closes: Vec<f64> = pts.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(parse_chart("<html>", "BTC-USD"), Err(ConnectorError::Parse(_))));
    }

    #[test]
    fn non_json_error_status_keeps_http_code() {
        let status = StatusCode::TOO_MANY_REQUESTS;
        match parse_chart_response(status, "Too Many Requests", "BTC-USD") {
            Err(ConnectorError::Api { code, description }) => {
                assert_eq!(code, "429");
                assert_eq!(description, "Too Many Requests");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn json_error_body_wins_over_status() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"gone"}}}"#;
        match parse_chart_response(StatusCode::NOT_FOUND, body, "NOPE-USD") {
            Err(ConnectorError::Api { code, .. }) => assert_eq!(code, "Not Found"),
            other => panic!("expected api error, got {:?}", other),
        }
        // a 200 with garbage is still a parse failure
        let ok_garbage = parse_chart_response(StatusCode::OK, "<html>", "BTC-USD");
        assert!(matches!(ok_garbage, Err(ConnectorError::Parse(_))));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = Client::new();
        let req = HistoryRequest::default();
        let res =
            fetch_chart_from(&client, "http://127.0.0.1:9", &req, Duration::from_secs(2)).await;
        assert!(matches!(res, Err(ConnectorError::Network(_))));
    }
}
