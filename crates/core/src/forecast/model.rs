use crate::forecast::features::{
    changepoint_times, days_since_epoch, hinge, push_fourier, WEEK_PERIOD_DAYS, YEAR_PERIOD_DAYS,
};
use crate::forecast::linalg::{solve_spd, SymMatrix};
use crate::forecast::{Forecast, ForecastRow, TrainingFrame};
use anyhow::{Context, Result};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seasonality {
    /// Enabled when the history supports it.
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub yearly: Seasonality,
    pub yearly_order: usize,
    pub weekly: Seasonality,
    pub weekly_order: usize,
    pub interval_width: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly: Seasonality::Auto,
            yearly_order: 10,
            weekly: Seasonality::Auto,
            weekly_order: 3,
            interval_width: 0.8,
        }
    }
}

// Residual scale assumed for the first pass, in units of the scaled series.
const INITIAL_NOISE_SCALE: f64 = 0.05;
// Keeps the unpenalized offset and slope columns well conditioned.
const BASE_RIDGE: f64 = 1e-9;

/// A fitted additive model. Build with [`AdditiveModel::fit`].
#[derive(Debug, Clone)]
pub struct AdditiveModel {
    config: ModelConfig,
    start: NaiveDate,
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    yearly: bool,
    weekly: bool,
    offset: f64,
    slope: f64,
    deltas: Vec<f64>,
    yearly_beta: Vec<f64>,
    weekly_beta: Vec<f64>,
    sigma: f64,
}

impl AdditiveModel {
    pub fn fit(frame: &TrainingFrame, config: ModelConfig) -> Result<Self> {
        anyhow::ensure!(
            frame.ds.len() == frame.y.len(),
            "training frame columns differ in length ({} vs {})",
            frame.ds.len(),
            frame.y.len()
        );
        anyhow::ensure!(
            frame.len() >= 2,
            "training frame has less than 2 rows ({})",
            frame.len()
        );
        anyhow::ensure!(
            frame.y.iter().all(|v| v.is_finite()),
            "training frame contains non-finite values"
        );
        anyhow::ensure!(
            frame.ds.windows(2).all(|w| w[0] < w[1]),
            "training frame dates must be strictly increasing"
        );

        let start = frame.ds[0];
        let span_days = (frame.ds[frame.len() - 1] - start).num_days() as f64;
        let y_scale = match frame.y.iter().fold(0.0_f64, |m, v| m.max(v.abs())) {
            m if m > 0.0 => m,
            _ => 1.0,
        };

        let t: Vec<f64> = frame
            .ds
            .iter()
            .map(|d| (*d - start).num_days() as f64 / span_days)
            .collect();
        let changepoints = changepoint_times(&t, config.n_changepoints, config.changepoint_range);

        let yearly = match config.yearly {
            Seasonality::Auto => span_days >= 2.0 * YEAR_PERIOD_DAYS,
            s => s == Seasonality::On,
        };
        let min_spacing = frame
            .ds
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .min()
            .unwrap_or(i64::MAX);
        let weekly = match config.weekly {
            Seasonality::Auto => min_spacing < WEEK_PERIOD_DAYS as i64,
            s => s == Seasonality::On,
        };

        let mut model = Self {
            config,
            start,
            span_days,
            y_scale,
            changepoints,
            yearly,
            weekly,
            offset: 0.0,
            slope: 0.0,
            deltas: Vec::new(),
            yearly_beta: Vec::new(),
            weekly_beta: Vec::new(),
            sigma: 0.0,
        };

        let rows: Vec<Vec<f64>> = frame.ds.iter().map(|d| model.design_row(*d)).collect();
        let y: Vec<f64> = frame.y.iter().map(|v| v / y_scale).collect();

        // Second pass uses the noise level measured by the first.
        let beta = model.solve(&rows, &y, INITIAL_NOISE_SCALE)?;
        let sigma = residual_sigma(&rows, &y, &beta);
        let beta = model.solve(&rows, &y, sigma.max(1e-6))?;
        model.sigma = residual_sigma(&rows, &y, &beta);
        model.unpack(&beta);

        tracing::debug!(
            rows = frame.len(),
            changepoints = model.changepoints.len(),
            yearly = model.yearly,
            weekly = model.weekly,
            sigma = model.sigma * model.y_scale,
            "fitted additive model"
        );
        Ok(model)
    }

    fn n_columns(&self) -> usize {
        2 + self.changepoints.len()
            + if self.yearly { 2 * self.config.yearly_order } else { 0 }
            + if self.weekly { 2 * self.config.weekly_order } else { 0 }
    }

    fn scaled_time(&self, d: NaiveDate) -> f64 {
        (d - self.start).num_days() as f64 / self.span_days
    }

    /// `[1, t, hinge(t, s_1..s_k), yearly terms, weekly terms]`
    fn design_row(&self, d: NaiveDate) -> Vec<f64> {
        let t = self.scaled_time(d);
        let day = days_since_epoch(d);
        let mut row = Vec::with_capacity(self.n_columns());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|&s| hinge(t, s)));
        if self.yearly {
            push_fourier(day, YEAR_PERIOD_DAYS, self.config.yearly_order, &mut row);
        }
        if self.weekly {
            push_fourier(day, WEEK_PERIOD_DAYS, self.config.weekly_order, &mut row);
        }
        row
    }

    fn solve(&self, rows: &[Vec<f64>], y: &[f64], noise: f64) -> Result<Vec<f64>> {
        let p = self.n_columns();
        let mut xtx = SymMatrix::zeros(p);
        let mut xty = vec![0.0; p];
        for (row, &yi) in rows.iter().zip(y) {
            xtx.add_outer(row);
            for (acc, x) in xty.iter_mut().zip(row) {
                *acc += x * yi;
            }
        }

        // Gaussian priors N(0, scale²) turn into ridge penalties noise²/scale².
        let noise_sq = noise * noise;
        let delta_penalty = noise_sq / self.config.changepoint_prior_scale.powi(2);
        let season_penalty = noise_sq / self.config.seasonality_prior_scale.powi(2);
        let n_cp = self.changepoints.len();
        for j in 0..p {
            let penalty = match j {
                0 | 1 => BASE_RIDGE,
                j if j < 2 + n_cp => delta_penalty,
                _ => season_penalty.max(BASE_RIDGE),
            };
            xtx.add(j, j, penalty);
        }

        solve_spd(&xtx, &xty).context("normal equations are not positive definite")
    }

    fn unpack(&mut self, beta: &[f64]) {
        let n_cp = self.changepoints.len();
        let yearly_len = if self.yearly { 2 * self.config.yearly_order } else { 0 };
        self.offset = beta[0];
        self.slope = beta[1];
        self.deltas = beta[2..2 + n_cp].to_vec();
        self.yearly_beta = beta[2 + n_cp..2 + n_cp + yearly_len].to_vec();
        self.weekly_beta = beta[2 + n_cp + yearly_len..].to_vec();
    }

    pub fn changepoint_count(&self) -> usize {
        self.changepoints.len()
    }

    pub fn has_yearly(&self) -> bool {
        self.yearly
    }

    pub fn has_weekly(&self) -> bool {
        self.weekly
    }

    /// Scaled trend at scaled time `t`.
    fn trend_at(&self, t: f64) -> f64 {
        self.offset
            + self.slope * t
            + self
                .changepoints
                .iter()
                .zip(&self.deltas)
                .map(|(&s, &delta)| delta * hinge(t, s))
                .sum::<f64>()
    }

    /// Variance of the trend `tau` scaled units past the end of history,
    /// assuming future changepoints arrive at the historical rate with
    /// Laplace magnitudes matching the fitted ones.
    fn trend_variance(&self, tau: f64) -> f64 {
        if tau <= 0.0 || self.deltas.is_empty() {
            return 0.0;
        }
        let rate = self.deltas.len() as f64;
        let b = self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64;
        2.0 * rate * b * b * tau.powi(3) / 3.0
    }

    pub fn predict(&self, dates: &[NaiveDate]) -> Forecast {
        let z = z_score(self.config.interval_width);
        let rows = dates
            .iter()
            .map(|&d| {
                let t = self.scaled_time(d);
                let day = days_since_epoch(d);

                let mut terms = Vec::new();
                let yearly = if self.yearly {
                    push_fourier(day, YEAR_PERIOD_DAYS, self.config.yearly_order, &mut terms);
                    dot(&terms, &self.yearly_beta)
                } else {
                    0.0
                };
                terms.clear();
                let weekly = if self.weekly {
                    push_fourier(day, WEEK_PERIOD_DAYS, self.config.weekly_order, &mut terms);
                    dot(&terms, &self.weekly_beta)
                } else {
                    0.0
                };

                let trend = self.trend_at(t);
                let trend_var = self.trend_variance(t - 1.0);
                let trend_sd = trend_var.sqrt();
                let total_sd = (self.sigma * self.sigma + trend_var).sqrt();
                let yhat = trend + yearly + weekly;
                let s = self.y_scale;

                ForecastRow {
                    ds: d,
                    trend: trend * s,
                    trend_lower: (trend - z * trend_sd) * s,
                    trend_upper: (trend + z * trend_sd) * s,
                    weekly: weekly * s,
                    yearly: yearly * s,
                    yhat_lower: (yhat - z * total_sd) * s,
                    yhat_upper: (yhat + z * total_sd) * s,
                    yhat: yhat * s,
                }
            })
            .collect();

        Forecast {
            rows,
            interval_width: self.config.interval_width,
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn residual_sigma(rows: &[Vec<f64>], y: &[f64], beta: &[f64]) -> f64 {
    let sse: f64 = rows
        .iter()
        .zip(y)
        .map(|(row, &yi)| (yi - dot(row, beta)).powi(2))
        .sum();
    (sse / rows.len() as f64).sqrt()
}

/// Two-sided normal quantile for the common interval widths.
fn z_score(interval_width: f64) -> f64 {
    match interval_width {
        x if x >= 0.99 => 2.576,
        x if x >= 0.95 => 1.96,
        x if x >= 0.90 => 1.645,
        x if x >= 0.80 => 1.282,
        x if x >= 0.50 => 0.674,
        _ => 1.282,
    }
}
