use askama::Template;
use axum::extract::{Query, State};
use axum::response::Html;
use serde::Deserialize;
use stockcast_core::charts;
use stockcast_core::domain::company::companies;
use stockcast_core::domain::input::{parse_years, select_company, ForecastRequest, DEFAULT_YEARS_TEXT};
use stockcast_core::report::ForecastReport;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    company: Option<String>,
    years: Option<String>,
}

pub struct RawRow {
    date: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: u64,
}

pub struct ForecastTableRow {
    ds: String,
    trend: String,
    yhat_lower: String,
    yhat_upper: String,
    weekly: String,
    yearly: String,
    yhat: String,
}

pub struct Component {
    name: &'static str,
    chart: String,
}

pub struct ResultView {
    years: u32,
    raw_rows: Vec<RawRow>,
    raw_chart: String,
    forecast_rows: Vec<ForecastTableRow>,
    forecast_chart: String,
    components: Vec<Component>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    company: String,
    company_hint: String,
    years: String,
    show_years: bool,
    company_error: Option<String>,
    years_error: Option<String>,
    result: Option<ResultView>,
}

fn money(v: f64) -> String {
    format!("{v:.2}")
}

impl From<&ForecastReport> for ResultView {
    fn from(report: &ForecastReport) -> Self {
        let raw_rows = report
            .raw_tail()
            .iter()
            .map(|b| RawRow {
                date: b.date.to_string(),
                open: money(b.open),
                high: money(b.high),
                low: money(b.low),
                close: money(b.close),
                volume: b.volume,
            })
            .collect();

        let forecast_rows = report
            .forecast_tail()
            .iter()
            .map(|r| ForecastTableRow {
                ds: r.ds.to_string(),
                trend: money(r.trend),
                yhat_lower: money(r.yhat_lower),
                yhat_upper: money(r.yhat_upper),
                weekly: money(r.weekly),
                yearly: money(r.yearly),
                yhat: money(r.yhat),
            })
            .collect();

        let components = charts::component_charts(&report.forecast)
            .into_iter()
            .map(|(name, plot)| {
                let div_id = format!("component-{name}");
                Component {
                    name,
                    chart: plot.to_inline_html(Some(div_id.as_str())),
                }
            })
            .collect();

        Self {
            years: report.horizon.years(),
            raw_rows,
            raw_chart: charts::raw_data_chart(&report.history).to_inline_html(Some("raw-chart")),
            forecast_rows,
            forecast_chart: charts::forecast_chart(&report.training, &report.forecast)
                .to_inline_html(Some("forecast-chart")),
            components,
        }
    }
}

/// Re-runs the whole page for the submitted inputs, like a fresh render.
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Html<String>, AppError> {
    let company_text = params.company.unwrap_or_default();
    let years_text = params
        .years
        .unwrap_or_else(|| DEFAULT_YEARS_TEXT.to_string());

    let mut page = IndexPage {
        company: company_text.clone(),
        company_hint: companies().take(3).map(|c| c.name).collect::<Vec<_>>().join(", "),
        years: years_text.clone(),
        show_years: false,
        company_error: None,
        years_error: None,
        result: None,
    };

    match select_company(&company_text) {
        Ok(None) => {}
        Err(e) => page.company_error = Some(e.to_string()),
        Ok(Some(company)) => {
            page.show_years = true;
            match parse_years(&years_text) {
                Err(e) => page.years_error = Some(e.to_string()),
                Ok(horizon) => {
                    let report = state.forecast(ForecastRequest { company, horizon }).await?;
                    page.result = Some(ResultView::from(&report));
                }
            }
        }
    }

    let body = page.render().map_err(anyhow::Error::new)?;
    Ok(Html(body))
}
