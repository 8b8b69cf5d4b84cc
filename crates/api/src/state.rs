use chrono::{NaiveDate, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use stockcast_core::config::Settings;
use stockcast_core::domain::input::ForecastRequest;
use stockcast_core::ingest::provider::PriceDataProvider;
use stockcast_core::ingest::types::PriceHistory;
use stockcast_core::report::{self, ForecastReport, PipelineError, Stage};
use stockcast_core::time::window::{history_window, resolve_end_date, HistoryWindow};

type HistoryKey = (String, NaiveDate, NaiveDate);

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn PriceDataProvider>,
    history_cache: Cache<HistoryKey, Arc<PriceHistory>>,
    history_start: NaiveDate,
}

impl AppState {
    pub fn new(provider: Arc<dyn PriceDataProvider>, settings: &Settings) -> Self {
        let history_cache = Cache::builder()
            .max_capacity(settings.fetch_cache_capacity)
            .time_to_live(Duration::from_secs(settings.fetch_cache_ttl_secs))
            .build();

        Self {
            provider,
            history_cache,
            history_start: settings.history_start,
        }
    }

    fn window(&self) -> anyhow::Result<HistoryWindow> {
        let end = resolve_end_date(None, Utc::now())?;
        history_window(self.history_start, end)
    }

    /// Fetches through the cache, then forecasts. Concurrent requests for the
    /// same key share one fetch.
    pub async fn forecast(&self, request: ForecastRequest) -> anyhow::Result<ForecastReport> {
        let window = self.window()?;
        let ticker = request.company.ticker;
        let key = (ticker.to_string(), window.start, window.end);

        let history = self
            .history_cache
            .try_get_with(key, async {
                tracing::debug!(%ticker, "history cache miss");
                self.provider
                    .fetch_daily_prices(ticker, window.start, window.end)
                    .await
                    .map(Arc::new)
                    .map_err(|source| PipelineError {
                        stage: Stage::Fetch,
                        ticker: ticker.to_string(),
                        source,
                    })
            })
            .await
            .map_err(unshare)?;

        report::report_from_history(request, window, history).await
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }
}

/// Every waiter on a failed fetch gets the same `Arc`d error; hand back an
/// owned one with the stage intact.
fn unshare(err: Arc<PipelineError>) -> PipelineError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| PipelineError {
        stage: shared.stage,
        ticker: shared.ticker.clone(),
        source: anyhow::anyhow!("{:#}", shared.source),
    })
}
