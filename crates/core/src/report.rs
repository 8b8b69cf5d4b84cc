use crate::domain::company::Company;
use crate::domain::input::{ForecastHorizon, ForecastRequest};
use crate::forecast::{make_future_dates, AdditiveModel, Forecast, ForecastRow, ModelConfig, TrainingFrame};
use crate::ingest::provider::PriceDataProvider;
use crate::ingest::types::{PriceBar, PriceHistory};
use crate::time::window::HistoryWindow;
use anyhow::Context;
use std::fmt;
use std::sync::Arc;

/// Rows shown in the raw and forecast tables.
pub const TAIL_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Forecast,
}

/// Which step of the pipeline failed, so callers can pick a status code.
#[derive(Debug)]
pub struct PipelineError {
    pub stage: Stage,
    pub ticker: String,
    pub source: anyhow::Error,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            Stage::Fetch => "loading data",
            Stage::Forecast => "forecasting",
        };
        write!(f, "{stage} failed for {}: {:#}", self.ticker, self.source)
    }
}

impl std::error::Error for PipelineError {}

#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub company: Company,
    pub horizon: ForecastHorizon,
    pub window: HistoryWindow,
    pub history: Arc<PriceHistory>,
    pub training: TrainingFrame,
    pub forecast: Forecast,
}

impl ForecastReport {
    pub fn raw_tail(&self) -> &[PriceBar] {
        self.history.tail(TAIL_ROWS)
    }

    pub fn forecast_tail(&self) -> &[ForecastRow] {
        self.forecast.tail(TAIL_ROWS)
    }
}

/// Fits the model and predicts `horizon` days past the history.
/// CPU bound; callers on the async runtime should go through [`forecast_history`].
pub fn fit_and_predict(training: &TrainingFrame, horizon: ForecastHorizon) -> anyhow::Result<Forecast> {
    let model = AdditiveModel::fit(training, ModelConfig::default())?;
    let future = make_future_dates(&training.ds, horizon.days());
    Ok(model.predict(&future))
}

pub async fn forecast_history(
    training: TrainingFrame,
    horizon: ForecastHorizon,
) -> anyhow::Result<(TrainingFrame, Forecast)> {
    tokio::task::spawn_blocking(move || {
        let forecast = fit_and_predict(&training, horizon)?;
        Ok::<_, anyhow::Error>((training, forecast))
    })
    .await
    .context("join forecast task failed")?
}

/// fetch -> derive training frame -> fit -> predict.
pub async fn build_report(
    provider: &dyn PriceDataProvider,
    request: ForecastRequest,
    window: HistoryWindow,
) -> anyhow::Result<ForecastReport> {
    let ticker = request.company.ticker;

    let history = provider
        .fetch_daily_prices(ticker, window.start, window.end)
        .await
        .map_err(|source| PipelineError {
            stage: Stage::Fetch,
            ticker: ticker.to_string(),
            source,
        })?;

    report_from_history(request, window, Arc::new(history)).await
}

/// Same as [`build_report`] for a history that is already at hand (cached).
pub async fn report_from_history(
    request: ForecastRequest,
    window: HistoryWindow,
    history: Arc<PriceHistory>,
) -> anyhow::Result<ForecastReport> {
    let ticker = request.company.ticker;
    let training = TrainingFrame::from_history(&history);

    let (training, forecast) = forecast_history(training, request.horizon)
        .await
        .map_err(|source| PipelineError {
            stage: Stage::Forecast,
            ticker: ticker.to_string(),
            source,
        })?;

    tracing::info!(
        %ticker,
        history_rows = history.len(),
        horizon_days = request.horizon.days(),
        forecast_rows = forecast.rows.len(),
        "forecast ready"
    );

    Ok(ForecastReport {
        company: request.company,
        horizon: request.horizon,
        window,
        history,
        training,
        forecast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::input::validate_request;
    use crate::time::window::history_window;
    use anyhow::Result;
    use chrono::{Datelike, Duration, NaiveDate, Weekday};

    struct TradingDays;

    #[async_trait::async_trait]
    impl PriceDataProvider for TradingDays {
        fn provider_name(&self) -> &'static str {
            "trading_days"
        }

        async fn fetch_daily_prices(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceHistory> {
            let mut bars = Vec::new();
            let mut d = start;
            let mut i = 0.0;
            while d < end {
                if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
                    let close = 100.0 + i * 0.1;
                    bars.push(PriceBar {
                        date: d,
                        open: close - 0.5,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                        volume: 1_000,
                    });
                    i += 1.0;
                }
                d += Duration::days(1);
            }
            Ok(PriceHistory::new(ticker, bars))
        }
    }

    struct Down;

    #[async_trait::async_trait]
    impl PriceDataProvider for Down {
        fn provider_name(&self) -> &'static str {
            "down"
        }

        async fn fetch_daily_prices(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<PriceHistory> {
            anyhow::bail!("connection refused")
        }
    }

    fn window() -> HistoryWindow {
        history_window(
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn builds_report_with_horizon_rows() {
        let request = validate_request("Netflix", Some("2")).unwrap().unwrap();
        let report = build_report(&TradingDays, request, window()).await.unwrap();

        assert_eq!(report.company.ticker, "NFLX");
        assert_eq!(report.forecast.rows.len(), report.history.len() + 730);
        assert_eq!(report.raw_tail().len(), TAIL_ROWS);
        assert_eq!(report.forecast_tail().len(), TAIL_ROWS);

        let last_history = report.history.bars.last().unwrap().date;
        let last_forecast = report.forecast.rows.last().unwrap().ds;
        assert_eq!(last_forecast, last_history + Duration::days(730));
        assert!(report.training.y.iter().zip(&report.history.bars).all(|(y, b)| *y == b.close));
    }

    #[tokio::test]
    async fn fetch_failure_is_tagged() {
        let request = validate_request("Apple", None).unwrap().unwrap();
        let err = build_report(&Down, request, window()).await.unwrap_err();
        let stage = err.downcast_ref::<PipelineError>().map(|e| e.stage);
        assert_eq!(stage, Some(Stage::Fetch));
        assert!(err.to_string().contains("AAPL"));
    }

    #[tokio::test]
    async fn forecast_failure_is_tagged() {
        let request = validate_request("Apple", None).unwrap().unwrap();
        let history = Arc::new(PriceHistory::new("AAPL", Vec::new()));
        let err = report_from_history(request, window(), history).await.unwrap_err();
        let stage = err.downcast_ref::<PipelineError>().map(|e| e.stage);
        assert_eq!(stage, Some(Stage::Forecast));
    }
}
