use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

/// Half-open date range `[start, end)` of history to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// End of the history window: an explicit `YYYY-MM-DD`, or today's UTC date.
/// The end is exclusive, so today's unfinished session is never included.
pub fn resolve_end_date(end_date_arg: Option<&str>, now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    if let Some(s) = end_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("end date must be YYYY-MM-DD (got {s})"));
    }
    Ok(now_utc.date_naive())
}

pub fn history_window(start: NaiveDate, end: NaiveDate) -> anyhow::Result<HistoryWindow> {
    anyhow::ensure!(
        start < end,
        "history start {start} must be before end {end}"
    );
    Ok(HistoryWindow { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_to_utc_today() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 0).unwrap();
        let d = resolve_end_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn explicit_end_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let d = resolve_end_date(Some("2024-06-30"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert!(resolve_end_date(Some("30/06/2024"), now).is_err());
    }

    #[test]
    fn window_must_be_non_empty() {
        let d = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        assert!(history_window(d, d).is_err());
        assert!(history_window(d, d.succ_opt().unwrap()).is_ok());
    }
}
