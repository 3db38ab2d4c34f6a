pub mod rest;

pub use rest::{fetch_chart, fetch_chart_from, parse_chart, parse_chart_response, YAHOO_CHART_URL};
