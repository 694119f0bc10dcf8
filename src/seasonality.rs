use crate::history::HistoricalSeries;
use std::collections::BTreeMap;

/// Each month's share of the baseline year's total.
///
/// Always returns twelve entries. When the year's total is zero every share is
/// zero, which downstream distributors treat as undistributable.
pub fn monthly_participation(series: &HistoricalSeries, baseline_year: i32) -> BTreeMap<u32, f64> {
    let totals = series.totals_by_month(baseline_year);
    let year_total: f64 = totals.values().sum();

    totals
        .into_iter()
        .map(|(month, total)| {
            let share = if year_total == 0.0 {
                0.0
            } else {
                total / year_total
            };
            (month, share)
        })
        .collect()
}

/// Participation as a January-first vector, the shape the distributor takes.
pub fn participation_weights(participation: &BTreeMap<u32, f64>) -> Vec<f64> {
    (1..=12)
        .map(|month| participation.get(&month).copied().unwrap_or(0.0))
        .collect()
}
