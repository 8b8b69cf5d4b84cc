pub mod charts;
pub mod domain;
pub mod forecast;
pub mod ingest;
pub mod report;
pub mod time;

pub mod config {
    use anyhow::Context;
    use chrono::NaiveDate;
    use std::str::FromStr;

    pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_HISTORY_START: &str = "2015-01-01";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub price_provider_base_url: String,
        pub price_provider_timeout_secs: u64,
        pub price_provider_retries: u32,
        pub history_start: NaiveDate,
        pub fetch_cache_ttl_secs: u64,
        pub fetch_cache_capacity: u64,
        pub port: u16,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let history_start = std::env::var("HISTORY_START_DATE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HISTORY_START.to_string());
            let history_start = NaiveDate::parse_from_str(history_start.trim(), "%Y-%m-%d")
                .with_context(|| format!("HISTORY_START_DATE must be YYYY-MM-DD (got {history_start})"))?;

            Ok(Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty()),
                price_provider_base_url: std::env::var("PRICE_PROVIDER_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string()),
                price_provider_timeout_secs: env_or("PRICE_PROVIDER_TIMEOUT_SECS", 30)?,
                price_provider_retries: env_or("PRICE_PROVIDER_RETRIES", 3)?,
                history_start,
                fetch_cache_ttl_secs: env_or("FETCH_CACHE_TTL_SECS", 3600)?,
                fetch_cache_capacity: env_or("FETCH_CACHE_CAPACITY", 64)?,
                port: env_or("PORT", 3000)?,
            })
        }
    }

    fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(key) {
            Ok(v) if !v.trim().is_empty() => v
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: {v}")),
            _ => Ok(default),
        }
    }

}
