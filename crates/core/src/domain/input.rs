use crate::domain::company::{find_company, Company};
use serde::Serialize;
use std::fmt;
use std::num::IntErrorKind;

pub const MIN_YEARS: i64 = 1;
pub const MAX_YEARS: i64 = 4;
pub const DAYS_PER_YEAR: u32 = 365;
pub const DEFAULT_YEARS_TEXT: &str = "1";

/// Rejected user input. Rendering the message is the whole handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    UnknownCompany(String),
    YearsOutOfRange(String),
    YearsNotANumber(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::UnknownCompany(name) => write!(
                f,
                "Company '{name}' not found. Please check the spelling or use a valid company name."
            ),
            InputError::YearsOutOfRange(_) => {
                write!(f, "Please enter a number between {MIN_YEARS} and {MAX_YEARS}.")
            }
            InputError::YearsNotANumber(_) => write!(f, "Please enter a valid number for years."),
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForecastHorizon {
    years: u32,
}

impl ForecastHorizon {
    pub fn years(&self) -> u32 {
        self.years
    }

    /// Number of future daily periods handed to the forecaster.
    pub fn days(&self) -> usize {
        (self.years * DAYS_PER_YEAR) as usize
    }
}

/// `Ok(None)` for an empty name: nothing was asked yet, so nothing is shown.
pub fn select_company(name: &str) -> Result<Option<Company>, InputError> {
    if name.is_empty() {
        return Ok(None);
    }
    find_company(name)
        .map(Some)
        .ok_or_else(|| InputError::UnknownCompany(name.to_string()))
}

/// Drops `_` used as a digit separator (`1_0`). A separator must sit between
/// two digits; anything else makes the text not a number.
fn strip_digit_separators(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'_' {
            continue;
        }
        let after_digit = i > 0 && bytes[i - 1].is_ascii_digit();
        let before_digit = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
        if !(after_digit && before_digit) {
            return None;
        }
    }
    Some(text.replace('_', ""))
}

pub fn parse_years(text: &str) -> Result<ForecastHorizon, InputError> {
    let Some(digits) = strip_digit_separators(text.trim()) else {
        return Err(InputError::YearsNotANumber(text.to_string()));
    };
    let years = match digits.parse::<i64>() {
        Ok(n) => n,
        Err(e) => match e.kind() {
            // Integers too large to hold are still integers, just out of range.
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                return Err(InputError::YearsOutOfRange(text.to_string()))
            }
            _ => return Err(InputError::YearsNotANumber(text.to_string())),
        },
    };

    if !(MIN_YEARS..=MAX_YEARS).contains(&years) {
        return Err(InputError::YearsOutOfRange(text.to_string()));
    }

    Ok(ForecastHorizon {
        years: years as u32,
    })
}

/// A request that passed validation and is ready to fetch and forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastRequest {
    pub company: Company,
    pub horizon: ForecastHorizon,
}

/// Validates both inputs in page order. `Ok(None)` means the company field is
/// still empty and no work should happen.
pub fn validate_request(
    company: &str,
    years: Option<&str>,
) -> Result<Option<ForecastRequest>, InputError> {
    let Some(company) = select_company(company)? else {
        return Ok(None);
    };
    let horizon = parse_years(years.unwrap_or(DEFAULT_YEARS_TEXT))?;
    Ok(Some(ForecastRequest { company, horizon }))
}
