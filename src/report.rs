use crate::engine::{AllocationTree, StoreMonthTarget};
use crate::error::{PlanError, Result};
use crate::schema::{Dimension, RoundingUnit};
use crate::scenario::ScenarioComparison;
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthLine {
    pub month: u32,
    pub participation: f64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupLine {
    pub group_key: String,
    pub weight: f64,
    pub store_count: usize,
    pub annual_amount: i64,
}

/// Flattened, display-ready view of a computed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub organization_name: String,
    pub target_year: i32,
    pub baseline_year: i32,
    pub rounding: RoundingUnit,
    pub dimension: Dimension,
    pub composite_rate: f64,
    pub baseline_total: f64,
    pub annual_amount: i64,
    pub unallocated: i64,
    pub months: Vec<MonthLine>,
    pub groups: Vec<GroupLine>,
    pub rows: Vec<StoreMonthTarget>,
}

impl PlanReport {
    pub fn from_tree(organization_name: impl Into<String>, tree: &AllocationTree) -> Self {
        let months = tree
            .months
            .iter()
            .map(|m| MonthLine {
                month: m.month,
                participation: m.participation,
                amount: m.amount,
            })
            .collect();

        let groups = tree
            .weights
            .groups
            .iter()
            .map(|(key, &weight)| GroupLine {
                group_key: key.clone(),
                weight,
                store_count: tree.weights.members.get(key).map_or(0, |m| m.len()),
                annual_amount: tree.group_year_total(key),
            })
            .collect();

        Self {
            organization_name: organization_name.into(),
            target_year: tree.target_year,
            baseline_year: tree.baseline_year,
            rounding: tree.rounding,
            dimension: tree.weights.dimension,
            composite_rate: tree.composite_rate,
            baseline_total: tree.baseline_total,
            annual_amount: tree.annual.amount,
            unallocated: tree.unallocated,
            months,
            groups,
            rows: tree.store_month_targets(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per store and month, amounts in currency.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["year", "month", "store", "city", "state", "target"])?;

        for row in &self.rows {
            writer.write_record([
                row.year.to_string(),
                row.month.to_string(),
                row.store.clone(),
                row.city.clone().unwrap_or_default(),
                row.state.clone().unwrap_or_default(),
                format_amount(self.rounding, row.amount),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| PlanError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# Sales Targets {} - {}\n\n",
            self.target_year, self.organization_name
        ));
        output.push_str(&format!(
            "**Baseline year:** {} ({})\n\n",
            self.baseline_year,
            format_amount(self.rounding, self.rounding.to_units(self.baseline_total))
        ));
        output.push_str(&format!(
            "**Composite rate:** {:.2}%\n\n",
            self.composite_rate * 100.0
        ));
        output.push_str(&format!(
            "**Annual target:** {}\n\n",
            format_amount(self.rounding, self.annual_amount)
        ));
        if self.unallocated != 0 {
            output.push_str(&format!(
                "**Unallocated:** {} ⚠️\n\n",
                format_amount(self.rounding, self.unallocated)
            ));
        }

        output.push_str("## Monthly Targets\n\n");
        output.push_str("| Month | Participation | Target |\n");
        output.push_str("|---|---:|---:|\n");
        for line in &self.months {
            output.push_str(&format!(
                "| {} | {:.2}% | {} |\n",
                month_name(line.month),
                line.participation * 100.0,
                format_amount(self.rounding, line.amount)
            ));
        }
        output.push('\n');

        output.push_str(&format!(
            "## Targets by {}\n\n",
            self.dimension.label()
        ));
        output.push_str("| Group | Weight | Stores | Annual target |\n");
        output.push_str("|---|---:|---:|---:|\n");
        for line in &self.groups {
            output.push_str(&format!(
                "| {} | {:.2}% | {} | {} |\n",
                line.group_key,
                line.weight * 100.0,
                line.store_count,
                format_amount(self.rounding, line.annual_amount)
            ));
        }
        output.push('\n');

        output
    }
}

impl ScenarioComparison {
    pub fn to_markdown(&self, rounding: RoundingUnit) -> String {
        let mut output = String::new();
        output.push_str("## Baseline vs Simulated\n\n");
        output.push_str(&format!(
            "**Composite rate delta:** {:+.2} pp\n\n",
            self.composite_rate_delta * 100.0
        ));
        output.push_str("| Month | Baseline | Simulated | Delta |\n");
        output.push_str("|---|---:|---:|---:|\n");
        for m in &self.months {
            output.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                month_name(m.month),
                format_amount(rounding, m.baseline),
                format_amount(rounding, m.simulated),
                format_amount(rounding, m.delta)
            ));
        }
        output.push_str(&format!(
            "| **Year** | {} | {} | {} |\n",
            format_amount(rounding, self.annual_baseline),
            format_amount(rounding, self.annual_simulated),
            format_amount(rounding, self.annual_delta)
        ));
        output
    }
}

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("?")
}

/// Renders an amount held in rounding units without going through `f64`.
pub fn format_amount(rounding: RoundingUnit, units: i64) -> String {
    match rounding {
        RoundingUnit::Whole => units.to_string(),
        RoundingUnit::Cents => {
            let sign = if units < 0 { "-" } else { "" };
            let abs = units.unsigned_abs();
            format!("{}{}.{:02}", sign, abs / 100, abs % 100)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compute;
    use crate::history::HistoricalSeries;
    use crate::schema::{HistoricalRecord, IndexParameters, PlanOptions, WeightConfig};

    fn tree(rounding: RoundingUnit) -> AllocationTree {
        let mut records = Vec::new();
        for month in 1..=12 {
            records.push(HistoricalRecord {
                year: 2024,
                month,
                store: "Loja Batel".to_string(),
                city: Some("Curitiba".to_string()),
                state: Some("PR".to_string()),
                amount: 600.0,
            });
            records.push(HistoricalRecord {
                year: 2024,
                month,
                store: "Loja Centro".to_string(),
                city: Some("Londrina".to_string()),
                state: Some("PR".to_string()),
                amount: 400.0,
            });
        }
        compute(
            &HistoricalSeries::new(records),
            &IndexParameters::new(0.1, 0.0, 0.0, 0.0),
            &WeightConfig::default(),
            PlanOptions {
                rounding,
                target_year: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_report_summary() {
        let report = PlanReport::from_tree("Rede Sul", &tree(RoundingUnit::Whole));
        assert_eq!(report.target_year, 2025);
        assert_eq!(report.annual_amount, 13_200);
        assert_eq!(report.months.len(), 12);
        assert_eq!(report.groups.len(), 2);

        let group_total: i64 = report.groups.iter().map(|g| g.annual_amount).sum();
        assert_eq!(group_total, report.annual_amount);
        assert_eq!(report.rows.len(), 24);
    }

    #[test]
    fn test_report_to_markdown() {
        let markdown = PlanReport::from_tree("Rede Sul", &tree(RoundingUnit::Whole)).to_markdown();
        assert!(markdown.contains("# Sales Targets 2025 - Rede Sul"));
        assert!(markdown.contains("**Annual target:** 13200"));
        assert!(markdown.contains("| January | 8.33% | 1100 |"));
        assert!(markdown.contains("## Targets by store"));
        assert!(markdown.contains("| Loja Batel | 60.00% | 1 | 7920 |"));
        assert!(!markdown.contains("Unallocated"));
    }

    #[test]
    fn test_report_to_csv() {
        let csv = PlanReport::from_tree("Rede Sul", &tree(RoundingUnit::Cents))
            .to_csv()
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "year,month,store,city,state,target");
        assert_eq!(lines.len(), 25);
        assert_eq!(lines[1], "2025,1,Loja Batel,Curitiba,PR,660.00");
        assert_eq!(lines[2], "2025,1,Loja Centro,Londrina,PR,440.00");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(RoundingUnit::Whole, -42), "-42");
        assert_eq!(format_amount(RoundingUnit::Cents, 123_456), "1234.56");
        assert_eq!(format_amount(RoundingUnit::Cents, -5), "-0.05");
        assert_eq!(month_name(0), "?");
        assert_eq!(month_name(12), "December");
    }
}
