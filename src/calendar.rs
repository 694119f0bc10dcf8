use crate::apportion::apportion;
use crate::error::{PlanError, Result};
use crate::utils::{days_in_month, first_day_of_month, last_day_of_month};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A Sunday–Saturday week clipped to the boundaries of one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWeek {
    /// 1-based position of the week within the month.
    pub week_index: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub day_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekAllocation {
    pub group_key: String,
    pub month: u32,
    pub week_index: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub day_count: u32,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthDecomposition {
    pub weeks: Vec<WeekAllocation>,
    /// Simple mean over calendar days; not a partition.
    pub daily_average: f64,
}

pub fn weeks_in_month(year: i32, month: u32) -> Result<Vec<CalendarWeek>> {
    let first = first_day_of_month(year, month)?;
    let last = last_day_of_month(year, month)?;

    let mut weeks = Vec::new();
    let mut cursor = first;
    let mut week_index = 1;

    while cursor <= last {
        let to_saturday = 6 - cursor.weekday().num_days_from_sunday();
        let saturday = add_days(cursor, to_saturday as u64)?;
        let end_date = saturday.min(last);
        let day_count = (end_date - cursor).num_days() as u32 + 1;

        weeks.push(CalendarWeek {
            week_index,
            start_date: cursor,
            end_date,
            day_count,
        });

        week_index += 1;
        cursor = add_days(end_date, 1)?;
    }

    Ok(weeks)
}

/// Splits a group-month amount into its calendar weeks in proportion to the
/// days each week contributes to the month.
pub fn decompose_month(
    group_key: &str,
    year: i32,
    month: u32,
    amount: i64,
) -> Result<MonthDecomposition> {
    let weeks = weeks_in_month(year, month)?;
    let day_weights: Vec<f64> = weeks.iter().map(|w| w.day_count as f64).collect();
    let split = apportion(amount, &day_weights);

    let weeks = weeks
        .iter()
        .zip(split.parts)
        .map(|(week, part)| WeekAllocation {
            group_key: group_key.to_string(),
            month,
            week_index: week.week_index,
            start_date: week.start_date,
            end_date: week.end_date,
            day_count: week.day_count,
            amount: part,
        })
        .collect();

    Ok(MonthDecomposition {
        weeks,
        daily_average: amount as f64 / days_in_month(year, month)? as f64,
    })
}

/// Day-level targets for a month, each day weighted equally.
pub fn daily_targets(year: i32, month: u32, amount: i64) -> Result<Vec<(NaiveDate, i64)>> {
    let first = first_day_of_month(year, month)?;
    let days = days_in_month(year, month)?;
    let split = apportion(amount, &vec![1.0; days as usize]);

    split
        .parts
        .into_iter()
        .enumerate()
        .map(|(offset, part)| Ok((add_days(first, offset as u64)?, part)))
        .collect()
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| PlanError::DateError(format!("Date overflow adding {} days to {}", days, date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_week_clipped_when_month_starts_midweek() {
        // January 2025 starts on a Wednesday.
        assert_eq!(date(2025, 1, 1).weekday(), Weekday::Wed);

        let weeks = weeks_in_month(2025, 1).unwrap();
        assert_eq!(weeks[0].start_date, date(2025, 1, 1));
        assert_eq!(weeks[0].end_date, date(2025, 1, 4));
        assert_eq!(weeks[0].day_count, 4);

        let counts: Vec<u32> = weeks.iter().map(|w| w.day_count).collect();
        assert_eq!(counts, vec![4, 7, 7, 7, 6]);
        assert_eq!(weeks.last().unwrap().end_date, date(2025, 1, 31));
    }

    #[test]
    fn test_weeks_start_on_sunday() {
        let weeks = weeks_in_month(2025, 1).unwrap();
        for week in &weeks[1..] {
            assert_eq!(week.start_date.weekday(), Weekday::Sun);
        }
        for week in &weeks[..weeks.len() - 1] {
            assert_eq!(week.end_date.weekday(), Weekday::Sat);
        }
    }

    #[test]
    fn test_month_of_exactly_four_weeks() {
        // February 2026 starts on a Sunday and has 28 days.
        let weeks = weeks_in_month(2026, 2).unwrap();
        assert_eq!(weeks.len(), 4);
        assert!(weeks.iter().all(|w| w.day_count == 7));
    }

    #[test]
    fn test_six_week_month() {
        // August 2026 starts on a Saturday and ends on a Monday.
        let weeks = weeks_in_month(2026, 8).unwrap();
        assert_eq!(weeks.len(), 6);
        assert_eq!(weeks[0].day_count, 1);
        assert_eq!(weeks[5].day_count, 2);
        assert_eq!(weeks.iter().map(|w| w.day_count).sum::<u32>(), 31);
    }

    #[test]
    fn test_decompose_month_exact_sum() {
        let decomposition = decompose_month("Batel", 2025, 1, 1000).unwrap();
        let amounts: Vec<i64> = decomposition.weeks.iter().map(|w| w.amount).collect();
        assert_eq!(amounts, vec![129, 226, 226, 226, 193]);
        assert_eq!(amounts.iter().sum::<i64>(), 1000);
        assert!((decomposition.daily_average - 1000.0 / 31.0).abs() < 1e-9);
        assert!(decomposition.weeks.iter().all(|w| w.group_key == "Batel" && w.month == 1));
    }

    #[test]
    fn test_decompose_evenly_divisible_amount() {
        let decomposition = decompose_month("Batel", 2025, 1, 3100).unwrap();
        let amounts: Vec<i64> = decomposition.weeks.iter().map(|w| w.amount).collect();
        assert_eq!(amounts, vec![400, 700, 700, 700, 600]);
    }

    #[test]
    fn test_decompose_zero_amount() {
        let decomposition = decompose_month("Batel", 2024, 2, 0).unwrap();
        assert!(decomposition.weeks.iter().all(|w| w.amount == 0));
        assert_eq!(decomposition.daily_average, 0.0);
    }

    #[test]
    fn test_daily_targets() {
        let days = daily_targets(2024, 2, 100).unwrap();
        assert_eq!(days.len(), 29);
        assert_eq!(days[0].0, date(2024, 2, 1));
        assert_eq!(days[28].0, date(2024, 2, 29));
        assert_eq!(days.iter().map(|(_, a)| a).sum::<i64>(), 100);
        assert!(days.iter().all(|(_, a)| *a == 3 || *a == 4));
    }

    #[test]
    fn test_invalid_month() {
        assert!(matches!(weeks_in_month(2025, 13), Err(PlanError::InvalidMonth(13))));
    }
}
