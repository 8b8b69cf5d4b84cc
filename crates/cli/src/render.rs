use anyhow::Context;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use stockcast_core::charts;
use stockcast_core::forecast::ForecastRow;
use stockcast_core::ingest::types::PriceBar;
use stockcast_core::report::ForecastReport;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

pub fn raw_table(bars: &[PriceBar]) -> String {
    let mut out = format!(
        "{:<10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>12}\n",
        "Date", "Open", "High", "Low", "Close", "Volume"
    );
    for b in bars {
        let _ = writeln!(
            out,
            "{:<10}  {:>10.2}  {:>10.2}  {:>10.2}  {:>10.2}  {:>12}",
            b.date, b.open, b.high, b.low, b.close, b.volume
        );
    }
    out
}

pub fn forecast_table(rows: &[ForecastRow]) -> String {
    let mut out = format!(
        "{:<10}  {:>10}  {:>10}  {:>10}  {:>8}  {:>8}  {:>10}\n",
        "ds", "trend", "yhat_lower", "yhat_upper", "weekly", "yearly", "yhat"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "{:<10}  {:>10.2}  {:>10.2}  {:>10.2}  {:>8.2}  {:>8.2}  {:>10.2}",
            r.ds, r.trend, r.yhat_lower, r.yhat_upper, r.weekly, r.yearly, r.yhat
        );
    }
    out
}

/// All component plots stacked on one standalone page.
pub fn components_page(report: &ForecastReport) -> String {
    let mut body = String::new();
    for (name, plot) in charts::component_charts(&report.forecast) {
        let div_id = format!("component-{name}");
        let _ = writeln!(body, "<h3>{name}</h3>");
        body.push_str(&plot.to_inline_html(Some(div_id.as_str())));
        body.push('\n');
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{} forecast components</title>\n<script src=\"{PLOTLY_CDN}\"></script>\n\
         </head>\n<body>\n{body}</body>\n</html>\n",
        report.company.ticker
    )
}

/// Writes `raw.html`, `forecast.html` and `components.html` under `dir`.
pub fn write_charts(report: &ForecastReport, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {} failed", dir.display()))?;

    let pages = [
        ("raw.html", charts::raw_data_chart(&report.history).to_html()),
        (
            "forecast.html",
            charts::forecast_chart(&report.training, &report.forecast).to_html(),
        ),
        ("components.html", components_page(report)),
    ];

    let mut written = Vec::with_capacity(pages.len());
    for (file, html) in pages {
        let path = dir.join(file);
        std::fs::write(&path, html).with_context(|| format!("write {} failed", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
