use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use stockcast_core::domain::input::validate_request;
use stockcast_core::ingest::provider::PriceDataProvider;
use stockcast_core::ingest::yahoo::YahooChartProvider;
use stockcast_core::report;
use stockcast_core::time::window::{history_window, resolve_end_date};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "stockcast_cli")]
struct Args {
    /// Company display name, matched exactly (e.g. "Google").
    #[arg(long)]
    company: String,

    /// Forecast horizon in years, 1 to 4.
    #[arg(long, allow_hyphen_values = true)]
    years: Option<String>,

    /// Exclusive end of the history window (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long)]
    end_date: Option<String>,

    /// Directory for the HTML charts. Nothing is written without it.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let request = match validate_request(&args.company, args.years.as_deref()) {
        Ok(Some(request)) => request,
        Ok(None) => {
            eprintln!("Please enter a company name.");
            return Ok(ExitCode::from(2));
        }
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(2));
        }
    };

    let end = resolve_end_date(args.end_date.as_deref(), chrono::Utc::now())?;
    let window = history_window(settings.history_start, end)?;

    let provider = YahooChartProvider::from_settings(&settings)?;
    tracing::info!(
        ticker = request.company.ticker,
        start = %window.start,
        end = %window.end,
        provider = provider.provider_name(),
        "forecast run"
    );

    let report = match report::build_report(&provider, request, window).await {
        Ok(report) => report,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "forecast run failed");
            return Err(err);
        }
    };

    println!("Raw Data");
    print!("{}", render::raw_table(report.raw_tail()));
    println!();
    println!("Forecast Data");
    print!("{}", render::forecast_table(report.forecast_tail()));

    if let Some(dir) = args.out_dir.as_deref() {
        for path in render::write_charts(&report, dir)? {
            tracing::info!(path = %path.display(), "wrote chart");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_sentry(settings: &stockcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "stockcast_cli",
            "--company",
            "Nvidia",
            "--years",
            "2",
            "--end-date",
            "2026-01-05",
            "--out-dir",
            "charts",
        ])
        .unwrap();
        assert_eq!(args.company, "Nvidia");
        assert_eq!(args.years.as_deref(), Some("2"));
        assert_eq!(args.end_date.as_deref(), Some("2026-01-05"));
        assert_eq!(args.out_dir, Some(PathBuf::from("charts")));
    }

    #[test]
    fn company_is_required() {
        assert!(Args::try_parse_from(["stockcast_cli", "--years", "1"]).is_err());
    }

    #[test]
    fn years_text_is_kept_verbatim_for_validation() {
        let args = Args::try_parse_from(["stockcast_cli", "--company", "Meta", "--years", "two"]).unwrap();
        let err = validate_request(&args.company, args.years.as_deref()).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid number for years.");

        let args = Args::try_parse_from(["stockcast_cli", "--company", "Meta", "--years", "-1"]).unwrap();
        let err = validate_request(&args.company, args.years.as_deref()).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a number between 1 and 4.");
    }
}
