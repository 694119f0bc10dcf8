use crate::error::{PlanError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(PlanError::InvalidMonth(month));
    }
    Ok(())
}

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    validate_month(month)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| PlanError::DateError(format!("Invalid month {:04}-{:02}", year, month)))
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    validate_month(month)?;
    first_day_of_month(next_year, next_month)?
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| PlanError::DateError(format!("No last day for {:04}-{:02}", year, month)))
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    Ok(last_day_of_month(year, month)?.day())
}

/// Parses an amount written with the decimal-comma / thousands-dot
/// convention ("12.345,67"). A leading currency symbol is tolerated.
/// Returns `None` for empty, unparseable, non-finite or negative input.
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value)
}
