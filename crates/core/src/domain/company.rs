use serde::Serialize;

/// Display name to ticker symbol, in the order shown on the page.
pub const COMPANY_TICKERS: [(&str, &str); 10] = [
    ("Google", "GOOG"),
    ("Apple", "AAPL"),
    ("Microsoft", "MSFT"),
    ("GameStop", "GME"),
    ("Amazon", "AMZN"),
    ("Tesla", "TSLA"),
    ("Meta", "META"),
    ("Nvidia", "NVDA"),
    ("Netflix", "NFLX"),
    ("Adobe", "ADBE"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Company {
    pub name: &'static str,
    pub ticker: &'static str,
}

/// Exact, case-sensitive lookup.
pub fn find_company(name: &str) -> Option<Company> {
    COMPANY_TICKERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(name, ticker)| Company { name, ticker })
}

pub fn companies() -> impl Iterator<Item = Company> {
    COMPANY_TICKERS
        .iter()
        .map(|&(name, ticker)| Company { name, ticker })
}
