use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use stockcast_core::domain::company::{companies, Company};
use stockcast_core::domain::input::validate_request;
use stockcast_core::forecast::ForecastRow;
use stockcast_core::ingest::types::PriceBar;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    #[serde(default)]
    company: String,
    years: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct ApiForecast {
    pub company: &'static str,
    pub ticker: &'static str,
    pub years: u32,
    pub horizon_days: usize,
    pub provider: &'static str,
    pub raw_tail: Vec<PriceBar>,
    pub forecast_tail: Vec<ForecastRow>,
}

pub async fn list_companies() -> Json<Vec<Company>> {
    Json(companies().collect())
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
}

pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Response, AppError> {
    let request = match validate_request(&query.company, query.years.as_deref()) {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(bad_request("company is required".to_string())),
        Err(e) => return Ok(bad_request(e.to_string())),
    };

    let report = state.forecast(request).await?;

    Ok(Json(ApiForecast {
        company: report.company.name,
        ticker: report.company.ticker,
        years: report.horizon.years(),
        horizon_days: report.horizon.days(),
        provider: state.provider_name(),
        raw_tail: report.raw_tail().to_vec(),
        forecast_tail: report.forecast_tail().to_vec(),
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_all_ten_companies() {
        let server = server(Arc::new(FakeProvider::default()));
        let res = server.get("/api/companies").await;
        res.assert_status_ok();

        let body: Value = res.json();
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 10);
        assert_eq!(list[0]["name"], "Google");
        assert_eq!(list[0]["ticker"], "GOOG");
    }

    #[tokio::test]
    async fn rejects_bad_input_without_fetching() {
        let provider = Arc::new(FakeProvider::default());
        let server = server(provider.clone());

        let res = server.get("/api/forecast").expect_failure().await;
        res.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(res.json::<Value>()["error"], "company is required");

        let res = server
            .get("/api/forecast")
            .add_query_param("company", "Nokia")
            .expect_failure()
            .await;
        res.assert_status(StatusCode::BAD_REQUEST);
        assert!(res.json::<Value>()["error"]
            .as_str()
            .unwrap()
            .starts_with("Company 'Nokia' not found."));

        let res = server
            .get("/api/forecast")
            .add_query_param("company", "Apple")
            .add_query_param("years", "0")
            .expect_failure()
            .await;
        res.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            res.json::<Value>()["error"],
            "Please enter a number between 1 and 4."
        );

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn returns_tails_and_horizon() {
        let provider = Arc::new(FakeProvider::default());
        let server = server(provider.clone());

        let res = server
            .get("/api/forecast")
            .add_query_param("company", "Amazon")
            .add_query_param("years", "2")
            .await;
        res.assert_status_ok();

        let body: Value = res.json();
        assert_eq!(body["ticker"], "AMZN");
        assert_eq!(body["years"], 2);
        assert_eq!(body["horizon_days"], 730);
        assert_eq!(body["provider"], "fake");
        assert_eq!(body["raw_tail"].as_array().unwrap().len(), 5);
        assert_eq!(body["forecast_tail"].as_array().unwrap().len(), 5);
        assert_eq!(provider.calls(), 1);
    }
}
