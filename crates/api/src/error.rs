use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use stockcast_core::report::{PipelineError, Stage};

/// A failed fetch or forecast. Logged, reported, and rendered as a page.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<PipelineError>().map(|e| e.stage) {
            Some(Stage::Fetch) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    status: u16,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        sentry_anyhow::capture_anyhow(&self.0);
        tracing::error!(error = %self.0, %status, "request failed");

        let message = format!("{:#}", self.0);
        let page = ErrorPage {
            status: status.as_u16(),
            message: &message,
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(_) => (status, message).into_response(),
        }
    }
}
