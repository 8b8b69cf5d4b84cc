use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Daily bars for one ticker, ascending by date with no duplicate dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn tail(&self, n: usize) -> &[PriceBar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        }
    }

    #[test]
    fn sorts_and_dedups_by_date() {
        let h = PriceHistory::new(
            "AAPL",
            vec![bar(2024, 1, 3, 3.0), bar(2024, 1, 2, 2.0), bar(2024, 1, 3, 9.0)],
        );
        assert_eq!(h.len(), 2);
        assert_eq!(h.bars[0].close, 2.0);
        assert_eq!(h.bars[1].close, 3.0);
    }

    #[test]
    fn tail_is_clamped() {
        let h = PriceHistory::new("AAPL", vec![bar(2024, 1, 2, 2.0)]);
        assert_eq!(h.tail(5).len(), 1);
        assert_eq!(h.tail(0).len(), 0);
    }
}
