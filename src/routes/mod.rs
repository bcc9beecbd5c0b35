use chrono::NaiveDate;

use crate::errors::AppError;
use crate::services::alignment_service;

pub mod beta;
pub mod health;
pub mod prices;
pub mod scrape;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` path segment.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("{} must be YYYY-MM-DD, got '{}'", field, raw)))
}

/// Half-open `[start, end)` range; `start` must come before `end`.
pub fn parse_date_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = parse_date("startDate", start)?;
    let end = parse_date("endDate", end)?;
    if start >= end {
        return Err(AppError::Validation(format!(
            "startDate {} must be before endDate {}",
            start, end
        )));
    }
    Ok((start, end))
}

pub fn parse_tickers(raw: &str) -> Result<Vec<String>, AppError> {
    let tickers = alignment_service::parse_ticker_list(raw);
    if tickers.is_empty() {
        return Err(AppError::Validation("at least one ticker is required".to_string()));
    }
    Ok(tickers)
}
