use chrono::NaiveDate;
use std::f64::consts::PI;

pub(crate) const YEAR_PERIOD_DAYS: f64 = 365.25;
pub(crate) const WEEK_PERIOD_DAYS: f64 = 7.0;

pub(crate) fn days_since_epoch(d: NaiveDate) -> f64 {
    (d - NaiveDate::default()).num_days() as f64
}

/// Appends `[sin(2πk·day/P), cos(2πk·day/P)]` for `k = 1..=order`.
pub(crate) fn push_fourier(day: f64, period: f64, order: usize, out: &mut Vec<f64>) {
    for k in 1..=order {
        let x = 2.0 * PI * (k as f64) * day / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}

/// Scaled times of potential trend changepoints, spread evenly over the
/// first `range` fraction of the history rows. The first row never is one.
pub(crate) fn changepoint_times(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = ((t.len() as f64) * range).floor() as usize;
    let n = n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=n)
        .map(|i| {
            let idx = (last * (i as f64) / (n as f64)).round() as usize;
            t[idx]
        })
        .collect()
}

pub(crate) fn hinge(t: f64, s: f64) -> f64 {
    if t >= s {
        t - s
    } else {
        0.0
    }
}
