use crate::config::Settings;
use crate::ingest::provider::{with_retries, PriceDataProvider, Retryable};
use crate::ingest::types::{PriceBar, PriceHistory};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const CHART_PATH: &str = "/v8/finance/chart";

// The chart endpoint answers 429 to clients without a browser-like agent.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.price_provider_timeout_secs))
            .build()
            .context("failed to build price provider http client")?;

        Ok(Self {
            http,
            base_url: settings.price_provider_base_url.clone(),
            retries: settings.price_provider_retries,
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            CHART_PATH,
            ticker
        )
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    async fn fetch_once(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory> {
        let params = [
            ("period1", unix_midnight(start).to_string()),
            ("period2", unix_midnight(end).to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
            ("events", "div,split".to_string()),
        ];

        let res = match self
            .http
            .get(self.url(ticker))
            .headers(Self::headers())
            .query(&params)
            .send()
            .await
        {
            Ok(r) => r,
            Err(err) => {
                return Err(Retryable(
                    anyhow::Error::new(err).context("price provider request failed"),
                )
                .into())
            }
        };

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read price provider response")?;

        read_response(ticker, status, &text, end)
    }
}

fn read_response(ticker: &str, status: StatusCode, text: &str, end: NaiveDate) -> Result<PriceHistory> {
    if !status.is_success() {
        // 404 carries a chart.error body naming the unknown symbol.
        if status == StatusCode::NOT_FOUND {
            if let Ok(body) = serde_json::from_str::<ChartResponse>(text) {
                return parse_chart(ticker, body, end);
            }
        }
        return Err(status_error(status, text));
    }

    let body = serde_json::from_str::<ChartResponse>(text)
        .with_context(|| format!("price provider response is not a chart payload: {text}"))?;
    parse_chart(ticker, body, end)
}

/// 429 and 5xx are worth another attempt; any other status is final.
fn status_error(status: StatusCode, text: &str) -> anyhow::Error {
    let err = anyhow::anyhow!("price provider HTTP {status}: {text}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Retryable(err).into()
    } else {
        err
    }
}

#[async_trait::async_trait]
impl PriceDataProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_daily_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory> {
        anyhow::ensure!(start < end, "empty date range: {start}..{end}");

        let history = with_retries(ticker, self.retries, move || self.fetch_once(ticker, start, end))
            .await
            .with_context(|| format!("fetching {ticker} {start}..{end}"))?;

        tracing::info!(
            %ticker,
            %start,
            %end,
            bars = history.len(),
            "fetched daily prices"
        );
        Ok(history)
    }
}

fn unix_midnight(d: NaiveDate) -> i64 {
    d.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    #[serde(default)]
    adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn parse_chart(ticker: &str, body: ChartResponse, end: NaiveDate) -> Result<PriceHistory> {
    if let Some(err) = body.chart.error {
        anyhow::bail!(
            "price provider error for {ticker}: {} ({})",
            err.description,
            err.code
        );
    }

    let result = body
        .chart
        .result
        .and_then(|mut r| (!r.is_empty()).then(|| r.swap_remove(0)))
        .with_context(|| format!("price provider returned no chart for {ticker}"))?;

    let quote = result
        .indicators
        .quote
        .first()
        .context("chart payload has no quote columns")?;
    let adjclose = result.indicators.adjclose.first().map(|c| &c.adjclose);

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(date) = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0).map(|dt| dt.date_naive())
        else {
            continue;
        };
        if date >= end {
            continue;
        }

        let column = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            column(&quote.open),
            column(&quote.high),
            column(&quote.low),
            column(&quote.close),
        ) else {
            continue;
        };
        let Some(volume) = quote.volume.get(i).copied().flatten() else {
            continue;
        };

        // Report split/dividend adjusted prices.
        let ratio = match adjclose.and_then(column) {
            Some(adj) if close != 0.0 => adj / close,
            _ => 1.0,
        };

        bars.push(PriceBar {
            date,
            open: open * ratio,
            high: high * ratio,
            low: low * ratio,
            close: close * ratio,
            volume,
        });
    }

    let history = PriceHistory::new(ticker, bars);
    anyhow::ensure!(
        !history.is_empty(),
        "price provider returned no usable bars for {ticker}"
    );
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value, end: NaiveDate) -> Result<PriceHistory> {
        let body: ChartResponse = serde_json::from_value(v).unwrap();
        parse_chart("AAPL", body, end)
    }

    fn far_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[test]
    fn parses_bars_in_exchange_time_and_adjusts() {
        // 2024-01-02 14:30 UTC and 2024-01-03 14:30 UTC, New York offset.
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": -18000, "currency": "USD"},
                    "timestamp": [1704205800, 1704292200],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, 110.0],
                            "high": [105.0, 112.0],
                            "low": [99.0, 108.0],
                            "close": [104.0, 110.0],
                            "volume": [1000, 2000]
                        }],
                        "adjclose": [{"adjclose": [52.0, 55.0]}]
                    }
                }],
                "error": null
            }
        });

        let h = parse(v, far_end()).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(h.bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!((h.bars[0].close - 52.0).abs() < 1e-9);
        assert!((h.bars[0].open - 50.0).abs() < 1e-9);
        assert_eq!(h.bars[1].volume, 2000);
    }

    #[test]
    fn drops_incomplete_rows_and_rows_past_end() {
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 0},
                    "timestamp": [1704153600, 1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "open": [1.0, null, 3.0],
                            "high": [1.0, 2.0, 3.0],
                            "low": [1.0, 2.0, 3.0],
                            "close": [1.0, 2.0, 3.0],
                            "volume": [1, 2, 3]
                        }]
                    }
                }]
            }
        });

        // Third bar is 2024-01-04, which is the exclusive end.
        let h = parse(v, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h.bars[0].close, 1.0);
    }

    #[test]
    fn surfaces_provider_error() {
        let v = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        });
        let err = parse(v, far_end()).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn empty_history_is_an_error() {
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 0},
                    "indicators": {"quote": [{}]}
                }]
            }
        });
        assert!(parse(v, far_end()).is_err());
    }

    fn is_retryable(err: &anyhow::Error) -> bool {
        err.downcast_ref::<Retryable>().is_some()
    }

    #[test]
    fn throttling_and_server_errors_are_retried() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = status_error(status, "busy");
            assert!(is_retryable(&err), "{status}");
            assert!(err.to_string().contains(status.as_str()));
        }
    }

    #[test]
    fn other_client_errors_are_final() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = status_error(status, "nope");
            assert!(!is_retryable(&err), "{status}");
            assert!(err.to_string().contains("nope"));
        }

        // A 404 without a chart body is just a final HTTP error.
        let err = read_response("AAPL", StatusCode::NOT_FOUND, "<html>gone</html>", far_end()).unwrap_err();
        assert!(!is_retryable(&err));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn not_found_chart_error_names_the_symbol_problem() {
        let body = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        })
        .to_string();
        let err = read_response("ZZZZ", StatusCode::NOT_FOUND, &body, far_end()).unwrap_err();
        assert!(!is_retryable(&err));
        assert!(err.to_string().contains("ZZZZ"));
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn success_with_garbage_body_is_an_error() {
        let err = read_response("AAPL", StatusCode::OK, "not json", far_end()).unwrap_err();
        assert!(!is_retryable(&err));
        assert!(err.to_string().contains("not a chart payload"));
    }

    #[test]
    fn builds_chart_url() {
        let settings = Settings {
            sentry_dsn: None,
            price_provider_base_url: "http://localhost:9000/".to_string(),
            price_provider_timeout_secs: 1,
            price_provider_retries: 1,
            history_start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            fetch_cache_ttl_secs: 1,
            fetch_cache_capacity: 1,
            port: 0,
        };
        let p = YahooChartProvider::from_settings(&settings).unwrap();
        assert_eq!(p.url("GOOG"), "http://localhost:9000/v8/finance/chart/GOOG");
        assert_eq!(
            unix_midnight(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()),
            1420070400
        );
    }
}
