//! Additive trend + seasonality forecaster.
//!
//! `y(t) = trend(t) + yearly(t) + weekly(t)`, with a piecewise-linear trend
//! whose slope may change at evenly spaced changepoints and Fourier-series
//! seasonalities. The fit is a ridge-penalized least-squares problem.

mod features;
mod linalg;
mod model;

pub use model::{AdditiveModel, ModelConfig, Seasonality};

use crate::ingest::types::PriceHistory;
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Two-column training input: `ds` (date) and `y` (value).
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    pub ds: Vec<NaiveDate>,
    pub y: Vec<f64>,
}

impl TrainingFrame {
    /// Renames the history's date column to `ds` and close column to `y`.
    pub fn from_history(history: &PriceHistory) -> Self {
        Self {
            ds: history.bars.iter().map(|b| b.date).collect(),
            y: history.bars.iter().map(|b| b.close).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    pub trend: f64,
    pub trend_lower: f64,
    pub trend_upper: f64,
    pub weekly: f64,
    pub yearly: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub yhat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub rows: Vec<ForecastRow>,
    /// Width of the `[yhat_lower, yhat_upper]` interval, e.g. 0.8.
    pub interval_width: f64,
}

impl Forecast {
    pub fn tail(&self, n: usize) -> &[ForecastRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

/// History dates followed by `periods` consecutive days after the last one.
pub fn make_future_dates(history: &[NaiveDate], periods: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(history.len() + periods);
    out.extend_from_slice(history);
    if let Some(&last) = history.last() {
        out.extend((1..=periods as i64).map(|i| last + Duration::days(i)));
    }
    out
}
