pub mod rest;

pub use rest::{
    coin_id_for_symbol, fetch_market_chart, fetch_market_chart_from, parse_market_chart,
    served_interval_minutes, COINGECKO_API_URL,
};
