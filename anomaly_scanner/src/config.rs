use anyhow::{bail, Context, Result};
use connectors_common::types::HistoryRequest;
use log::{info, warn};
use report::OutputMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zscore_anomaly::{DetectorParams, InsufficientDataPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Coingecko,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Yahoo => "yahoo",
            SourceKind::Coingecko => "coingecko",
        })
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yahoo" => Ok(SourceKind::Yahoo),
            "coingecko" => Ok(SourceKind::Coingecko),
            other => Err(format!("unknown source '{}', expected yahoo or coingecko", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub timeout_secs: u64,
    /// CoinGecko coin id for the symbol, e.g. "bitcoin".
    pub coingecko_id: String,
    pub vs_currency: String,
    /// Override for the source's API root, e.g. a local mirror.
    pub base_url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            kind: SourceKind::Yahoo,
            timeout_secs: 10,
            coingecko_id: "bitcoin".to_string(),
            vs_currency: "usd".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    pub width: usize,
    pub height: usize,
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub on_insufficient_data: InsufficientDataPolicy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            mode: OutputMode::Chart,
            width: 96,
            height: 20,
            csv: None,
            json: None,
            on_insufficient_data: InsufficientDataPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub request: HistoryRequest,
    pub detector: DetectorParams,
    pub output: OutputConfig,
}

/// Read the config file if one is given (defaults otherwise) and apply env overrides.
///
/// | Env Var             | Config Field         |
/// |---------------------|----------------------|
/// | `ANOMALY_SOURCE`    | `source.kind`        |
/// | `ANOMALY_SYMBOL`    | `request.symbol`     |
/// | `ANOMALY_WINDOW`    | `detector.window`    |
/// | `ANOMALY_THRESHOLD` | `detector.threshold` |
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut cfg = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read config file: {}", p.display()))?;
            let cfg: AppConfig =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", p.display()))?;
            info!("loaded config from {}", p.display());
            cfg
        }
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok())?;
    Ok(cfg)
}

pub fn apply_env_overrides(
    cfg: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("ANOMALY_SOURCE") {
        cfg.source.kind =
            v.parse::<SourceKind>().map_err(anyhow::Error::msg).context("ANOMALY_SOURCE")?;
    }
    if let Some(v) = lookup("ANOMALY_SYMBOL") {
        cfg.request.symbol = v;
    }
    if let Some(v) = lookup("ANOMALY_WINDOW") {
        cfg.detector.window =
            v.parse::<usize>().with_context(|| format!("ANOMALY_WINDOW: invalid value '{}'", v))?;
    }
    if let Some(v) = lookup("ANOMALY_THRESHOLD") {
        cfg.detector.threshold = v
            .parse::<f64>()
            .with_context(|| format!("ANOMALY_THRESHOLD: invalid value '{}'", v))?;
    }
    Ok(())
}

pub fn validate(cfg: &AppConfig) -> Result<()> {
    cfg.detector.validate()?;
    if cfg.request.symbol.trim().is_empty() {
        bail!("request.symbol must not be empty");
    }
    if cfg.source.timeout_secs == 0 {
        bail!("source.timeout_secs must be positive");
    }
    if cfg.source.kind == SourceKind::Coingecko {
        validate_coingecko(cfg)?;
    }
    if cfg.output.width < 10 || cfg.output.height < 2 {
        bail!(
            "output chart must be at least 10 wide and 2 high, got {}x{}",
            cfg.output.width,
            cfg.output.height
        );
    }
    Ok(())
}

/// CoinGecko is addressed by coin id and picks the bar size itself, so the request's
/// symbol and interval must agree with what it will actually serve.
fn validate_coingecko(cfg: &AppConfig) -> Result<()> {
    let id = cfg.source.coingecko_id.trim();
    if id.is_empty() {
        bail!("source.coingecko_id is required for the coingecko source");
    }
    let symbol = &cfg.request.symbol;
    match connector_coingecko::coin_id_for_symbol(symbol) {
        Some(expected) if !expected.eq_ignore_ascii_case(id) => bail!(
            "symbol {} is coin '{}' on coingecko, but source.coingecko_id is '{}'",
            symbol,
            expected,
            id
        ),
        Some(_) => {}
        None => warn!("cannot map {} to a coingecko coin; fetching '{}' as configured", symbol, id),
    }
    if let Some((_, quote)) = symbol.split_once('-') {
        if !quote.eq_ignore_ascii_case(&cfg.source.vs_currency) {
            bail!(
                "symbol {} is quoted in {}, but source.vs_currency is '{}'",
                symbol,
                quote,
                cfg.source.vs_currency
            );
        }
    }
    let days = cfg.request.period.days();
    let served = connector_coingecko::served_interval_minutes(days);
    if cfg.request.interval.minutes() != served {
        bail!(
            "coingecko serves {}-minute bars for a {} period, but interval {} was requested",
            served,
            cfg.request.period,
            cfg.request.interval
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors_common::types::{Interval, Period};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_original_run() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.request.symbol, "BTC-USD");
        assert_eq!(cfg.request.interval, Interval::Minute5);
        assert_eq!(cfg.request.period, Period::Day1);
        assert_eq!(cfg.detector, DetectorParams { window: 10, threshold: 2.0 });
        assert_eq!(cfg.source.kind, SourceKind::Yahoo);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{"detector": {"threshold": 2.5}, "request": {"period": "5d"},
                "output": {"mode": "annotated", "on_insufficient_data": "empty"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.detector.window, 10);
        assert_eq!(cfg.detector.threshold, 2.5);
        assert_eq!(cfg.request.period, Period::Day5);
        assert_eq!(cfg.request.symbol, "BTC-USD");
        assert_eq!(cfg.output.mode, OutputMode::Annotated);
        assert_eq!(cfg.output.on_insufficient_data, InsufficientDataPolicy::Empty);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AppConfig::default();
        let vars = env(&[
            ("ANOMALY_SOURCE", "coingecko"),
            ("ANOMALY_WINDOW", "20"),
            ("ANOMALY_THRESHOLD", "3"),
        ]);
        apply_env_overrides(&mut cfg, vars).unwrap();
        assert_eq!(cfg.source.kind, SourceKind::Coingecko);
        assert_eq!(cfg.detector.window, 20);
        assert_eq!(cfg.detector.threshold, 3.0);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut cfg = AppConfig::default();
        assert!(apply_env_overrides(&mut cfg, env(&[("ANOMALY_WINDOW", "ten")])).is_err());
        assert!(apply_env_overrides(&mut cfg, env(&[("ANOMALY_SOURCE", "bloomberg")])).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.detector.threshold = 0.0;
        assert!(validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.request.symbol = " ".to_string();
        assert!(validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.output.width = 3;
        assert!(validate(&cfg).is_err());
    }

    fn coingecko_cfg(symbol: &str, interval: Interval, period: Period) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.source.kind = SourceKind::Coingecko;
        cfg.request = HistoryRequest { symbol: symbol.to_string(), interval, period };
        cfg
    }

    #[test]
    fn coingecko_accepts_what_it_serves() {
        assert!(validate(&coingecko_cfg("BTC-USD", Interval::Minute5, Period::Day1)).is_ok());
        assert!(validate(&coingecko_cfg("BTC-USD", Interval::Hour1, Period::Day5)).is_ok());
        assert!(validate(&coingecko_cfg("BTC-USD", Interval::Minute60, Period::Month3)).is_ok());
    }

    #[test]
    fn coingecko_rejects_interval_it_will_not_serve() {
        let err = validate(&coingecko_cfg("BTC-USD", Interval::Minute1, Period::Day1)).unwrap_err();
        assert!(err.to_string().contains("5-minute"));
        assert!(validate(&coingecko_cfg("BTC-USD", Interval::Minute5, Period::Day5)).is_err());
    }

    #[test]
    fn coingecko_rejects_symbol_other_than_coin_id() {
        let err = validate(&coingecko_cfg("ETH-USD", Interval::Minute5, Period::Day1)).unwrap_err();
        assert!(err.to_string().contains("ethereum"));

        let mut cfg = coingecko_cfg("ETH-USD", Interval::Minute5, Period::Day1);
        cfg.source.coingecko_id = "ethereum".to_string();
        assert!(validate(&cfg).is_ok());

        let cfg = coingecko_cfg("BTC-EUR", Interval::Minute5, Period::Day1);
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn yahoo_ignores_coingecko_settings() {
        let mut cfg = AppConfig::default();
        cfg.request.symbol = "ETH-USD".to_string();
        cfg.request.interval = Interval::Minute1;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/anomaly.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
