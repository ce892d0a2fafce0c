use chrono::{Datelike, NaiveDate};

use crate::errors::FilterError;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Parse displayed price text such as `"$1,234.50"`.
pub fn parse_price(text: &str) -> Result<f64, FilterError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return Err(FilterError::parse("price", text));
    }
    match cleaned.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(FilterError::parse("price", text)),
    }
}

/// Parse a route date in `YYYY-MM-DD` form.
pub fn parse_date(text: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| FilterError::parse("date", text))
}

/// Cart snapshot key for a day and meal slot: `"{month}-{day}-{slot}"`,
/// month and day without padding.
pub fn cart_key(date: NaiveDate, meal_slot: &str) -> String {
    format!("{}-{}-{}", date.month(), date.day(), meal_slot)
}
