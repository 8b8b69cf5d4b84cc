use crate::ingest::types::PriceHistory;
use anyhow::Result;
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;

#[async_trait::async_trait]
pub trait PriceDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars for `ticker` in `[start, end)`.
    async fn fetch_daily_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory>;
}

/// Errors worth another attempt are marked by wrapping them in this type.
#[derive(Debug)]
pub struct Retryable(pub anyhow::Error);

impl std::fmt::Display for Retryable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for Retryable {}

/// Runs `op` up to `max_attempts` times, sleeping 1s, 2s, 4s... between
/// attempts that failed with a [`Retryable`] error.
pub async fn with_retries<T, F, Fut>(ticker: &str, max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                let retryable = err.downcast_ref::<Retryable>().is_some();
                if !retryable || attempt >= max_attempts {
                    return Err(err);
                }
                let backoff = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(
                    attempt,
                    ?backoff,
                    %ticker,
                    error = %err,
                    "price fetch failed; retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
