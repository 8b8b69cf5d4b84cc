use crate::forecast::{Forecast, ForecastRow, TrainingFrame};
use crate::ingest::types::PriceHistory;
use chrono::{Datelike, Weekday};
use plotly::common::{Fill, Line, Marker, Mode, Title};
use plotly::layout::{Axis, RangeSlider};
use plotly::{Layout, Plot, Scatter};

const ACTUAL_COLOR: &str = "rgb(0, 0, 0)";
const FORECAST_COLOR: &str = "rgb(0, 114, 178)";
const BAND_COLOR: &str = "rgba(0, 114, 178, 0.2)";
const CHART_HEIGHT: usize = 500;
const COMPONENT_HEIGHT: usize = 300;

fn dates<'a>(it: impl Iterator<Item = &'a ForecastRow>) -> Vec<String> {
    it.map(|r| r.ds.to_string()).collect()
}

fn with_range_slider(title: &str) -> Layout {
    Layout::new()
        .title(Title::from(title))
        .x_axis(Axis::new().range_slider(RangeSlider::new().visible(true)))
        .height(CHART_HEIGHT)
}

/// Open and close prices over time.
pub fn raw_data_chart(history: &PriceHistory) -> Plot {
    let x: Vec<String> = history.bars.iter().map(|b| b.date.to_string()).collect();
    let open: Vec<f64> = history.bars.iter().map(|b| b.open).collect();
    let close: Vec<f64> = history.bars.iter().map(|b| b.close).collect();

    let mut plot = Plot::new();
    plot.add_trace(Scatter::new(x.clone(), open).name("Stock Open"));
    plot.add_trace(Scatter::new(x, close).name("Stock Close"));
    plot.set_layout(with_range_slider("Time Series Data with Range Slider"));
    plot
}

/// Observed points, the predicted line and its uncertainty band.
pub fn forecast_chart(actual: &TrainingFrame, forecast: &Forecast) -> Plot {
    let mut plot = Plot::new();

    let x = dates(forecast.rows.iter());
    // Band first so the line draws on top; the lower edge fills up to the upper.
    plot.add_trace(
        Scatter::new(x.clone(), forecast.rows.iter().map(|r| r.yhat_lower).collect())
            .mode(Mode::Lines)
            .line(Line::new().width(0.0))
            .show_legend(false)
            .name("yhat_lower"),
    );
    plot.add_trace(
        Scatter::new(x.clone(), forecast.rows.iter().map(|r| r.yhat_upper).collect())
            .mode(Mode::Lines)
            .line(Line::new().width(0.0))
            .fill(Fill::ToNextY)
            .fill_color(BAND_COLOR)
            .show_legend(false)
            .name("yhat_upper"),
    );
    plot.add_trace(
        Scatter::new(
            actual.ds.iter().map(|d| d.to_string()).collect(),
            actual.y.clone(),
        )
        .mode(Mode::Markers)
        .marker(Marker::new().size(3).color(ACTUAL_COLOR))
        .name("Actual"),
    );
    plot.add_trace(
        Scatter::new(x, forecast.rows.iter().map(|r| r.yhat).collect())
            .mode(Mode::Lines)
            .line(Line::new().color(FORECAST_COLOR).width(2.0))
            .name("Predicted"),
    );

    plot.set_layout(
        with_range_slider("Forecast")
            .y_axis(Axis::new().title(Title::from("y"))),
    );
    plot
}

/// Trend, weekly and yearly components, one chart each. Seasonal charts are
/// omitted when that component is flat zero.
pub fn component_charts(forecast: &Forecast) -> Vec<(&'static str, Plot)> {
    let mut out = vec![("trend", trend_chart(forecast))];
    if forecast.rows.iter().any(|r| r.weekly != 0.0) {
        out.push(("weekly", weekly_chart(forecast)));
    }
    if forecast.rows.iter().any(|r| r.yearly != 0.0) {
        out.push(("yearly", yearly_chart(forecast)));
    }
    out
}

fn component_layout(x_title: &str, y_title: &str) -> Layout {
    Layout::new()
        .x_axis(Axis::new().title(Title::from(x_title)))
        .y_axis(Axis::new().title(Title::from(y_title)))
        .height(COMPONENT_HEIGHT)
}

fn trend_chart(forecast: &Forecast) -> Plot {
    let x = dates(forecast.rows.iter());
    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(x.clone(), forecast.rows.iter().map(|r| r.trend_lower).collect())
            .mode(Mode::Lines)
            .line(Line::new().width(0.0))
            .show_legend(false)
            .name("trend_lower"),
    );
    plot.add_trace(
        Scatter::new(x.clone(), forecast.rows.iter().map(|r| r.trend_upper).collect())
            .mode(Mode::Lines)
            .line(Line::new().width(0.0))
            .fill(Fill::ToNextY)
            .fill_color(BAND_COLOR)
            .show_legend(false)
            .name("trend_upper"),
    );
    plot.add_trace(
        Scatter::new(x, forecast.rows.iter().map(|r| r.trend).collect())
            .mode(Mode::Lines)
            .line(Line::new().color(FORECAST_COLOR).width(2.0))
            .name("trend"),
    );
    plot.set_layout(component_layout("ds", "trend"));
    plot
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Weekly effect by day of week, read from the last week of the forecast.
pub(crate) fn weekly_profile(forecast: &Forecast) -> Vec<(Weekday, f64)> {
    WEEKDAYS
        .iter()
        .filter_map(|&wd| {
            forecast
                .rows
                .iter()
                .rev()
                .find(|r| r.ds.weekday() == wd)
                .map(|r| (wd, r.weekly))
        })
        .collect()
}

fn weekly_chart(forecast: &Forecast) -> Plot {
    let profile = weekly_profile(forecast);
    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(
            profile.iter().map(|(wd, _)| format!("{wd:?}")).collect(),
            profile.iter().map(|(_, v)| *v).collect(),
        )
        .mode(Mode::LinesMarkers)
        .line(Line::new().color(FORECAST_COLOR).width(2.0))
        .name("weekly"),
    );
    plot.set_layout(component_layout("Day of week", "weekly"));
    plot
}

/// Yearly effect over the last 365 days of the forecast, by calendar day.
fn yearly_chart(forecast: &Forecast) -> Plot {
    let mut last_year: Vec<&ForecastRow> = forecast.tail(365).iter().collect();
    last_year.sort_by_key(|r| r.ds.ordinal());

    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(
            last_year.iter().map(|r| r.ds.format("%B %-d").to_string()).collect(),
            last_year.iter().map(|r| r.yearly).collect(),
        )
        .mode(Mode::Lines)
        .line(Line::new().color(FORECAST_COLOR).width(2.0))
        .name("yearly"),
    );
    plot.set_layout(component_layout("Day of year", "yearly"));
    plot
}
