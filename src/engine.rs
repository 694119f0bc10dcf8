use crate::apportion::apportion;
use crate::calendar::{decompose_month, WeekAllocation};
use crate::error::{PlanError, Result};
use crate::history::{HistoricalSeries, StoreInfo};
use crate::index::{annual_target, AnnualTarget};
use crate::schema::{IndexParameters, PlanOptions, RoundingUnit, WeightConfig};
use crate::seasonality::{monthly_participation, participation_weights};
use crate::weights::{ResolvedWeights, WeightResolver};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreAllocation {
    pub store: String,
    pub month: u32,
    /// Share of the enclosing group used for the split.
    pub inner_share: f64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAllocation {
    pub month: u32,
    pub group_key: String,
    pub weight: f64,
    pub amount: i64,
    pub daily_average: f64,
    /// Part of `amount` no store could take (all inner shares zero).
    pub unallocated: i64,
    pub stores: Vec<StoreAllocation>,
    pub weeks: Vec<WeekAllocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAllocation {
    pub month: u32,
    pub participation: f64,
    pub amount: i64,
    /// Part of `amount` no group could take (all group weights zero).
    pub unallocated: i64,
    pub groups: Vec<GroupAllocation>,
}

/// One finalized row per store and month, the shape handed to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMonthTarget {
    pub year: i32,
    pub month: u32,
    pub store: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub amount: i64,
}

/// The nested plan: year → month → group → (stores, weeks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTree {
    pub target_year: i32,
    pub baseline_year: i32,
    pub rounding: RoundingUnit,
    pub index: IndexParameters,
    pub composite_rate: f64,
    pub baseline_total: f64,
    pub annual: AnnualTarget,
    pub participation: BTreeMap<u32, f64>,
    pub weights: ResolvedWeights,
    pub stores: BTreeMap<String, StoreInfo>,
    pub months: Vec<MonthlyAllocation>,
    /// Amount that had no weighted bucket to land in, summed over all levels.
    pub unallocated: i64,
}

impl AllocationTree {
    pub fn month(&self, month: u32) -> Option<&MonthlyAllocation> {
        self.months.iter().find(|m| m.month == month)
    }

    pub fn monthly_amounts(&self) -> BTreeMap<u32, i64> {
        self.months.iter().map(|m| (m.month, m.amount)).collect()
    }

    pub fn group_allocations(&self) -> impl Iterator<Item = &GroupAllocation> {
        self.months.iter().flat_map(|m| m.groups.iter())
    }

    pub fn group_allocation(&self, month: u32, group_key: &str) -> Option<&GroupAllocation> {
        self.month(month)?
            .groups
            .iter()
            .find(|g| g.group_key == group_key)
    }

    pub fn group_year_total(&self, group_key: &str) -> i64 {
        self.group_allocations()
            .filter(|g| g.group_key == group_key)
            .map(|g| g.amount)
            .sum()
    }

    pub fn week_allocations(&self) -> impl Iterator<Item = &WeekAllocation> {
        self.group_allocations().flat_map(|g| g.weeks.iter())
    }

    pub fn store_month_targets(&self) -> Vec<StoreMonthTarget> {
        let mut rows = Vec::new();
        for group in self.group_allocations() {
            for store in &group.stores {
                let info = self.stores.get(&store.store);
                rows.push(StoreMonthTarget {
                    year: self.target_year,
                    month: store.month,
                    store: store.store.clone(),
                    city: info.and_then(|i| i.city.clone()),
                    state: info.and_then(|i| i.state.clone()),
                    amount: store.amount,
                });
            }
        }
        rows.sort_by(|a, b| (a.month, &a.store).cmp(&(b.month, &b.store)));
        rows
    }

    /// Part of the annual target no month could take. Lower-level
    /// shortfalls are kept on each month and group.
    pub fn year_unallocated(&self) -> i64 {
        let nested: i64 = self
            .months
            .iter()
            .map(|m| m.unallocated + m.groups.iter().map(|g| g.unallocated).sum::<i64>())
            .sum();
        self.unallocated - nested
    }

    pub fn to_currency(&self, units: i64) -> f64 {
        self.rounding.to_currency(units)
    }
}

/// Runs the allocation pipeline for one historical series.
pub struct Allocator<'a> {
    series: &'a HistoricalSeries,
    baseline_year: i32,
    target_year: i32,
    rounding: RoundingUnit,
}

impl<'a> Allocator<'a> {
    pub fn new(series: &'a HistoricalSeries, options: PlanOptions) -> Result<Self> {
        let baseline_year = series.baseline_year().ok_or(PlanError::NoHistoricalData)?;
        Ok(Self {
            series,
            baseline_year,
            target_year: options.target_year.unwrap_or(baseline_year + 1),
            rounding: options.rounding,
        })
    }

    pub fn baseline_year(&self) -> i32 {
        self.baseline_year
    }

    pub fn target_year(&self) -> i32 {
        self.target_year
    }

    pub fn annual_target(&self, params: &IndexParameters) -> Result<AnnualTarget> {
        annual_target(
            self.target_year,
            self.series.year_total(self.baseline_year),
            params,
            self.rounding,
        )
    }

    /// Monthly Distributor: spreads the annual amount by baseline
    /// participation. Returns (month, amount) for all twelve months and the
    /// amount left undistributed when the baseline year has no sales.
    pub fn distribute_months(
        &self,
        annual: &AnnualTarget,
        participation: &BTreeMap<u32, f64>,
    ) -> (Vec<(u32, i64)>, i64) {
        let split = apportion(annual.amount, &participation_weights(participation));
        let months = (1..=12).zip(split.parts).collect();
        (months, split.unallocated)
    }

    /// Group Allocator plus the nested store split and the calendar
    /// decomposition of each group-month. The returned amount is what no
    /// group could take; store-level shortfalls stay on each group.
    pub fn allocate_groups(
        &self,
        month: u32,
        amount: i64,
        weights: &ResolvedWeights,
    ) -> Result<(Vec<GroupAllocation>, i64)> {
        weights.ensure_normalized()?;

        let keys: Vec<&String> = weights.groups.keys().collect();
        let outer: Vec<f64> = weights.groups.values().copied().collect();
        let split = apportion(amount, &outer);

        let mut groups = Vec::with_capacity(keys.len());
        for ((key, weight), group_amount) in keys.into_iter().zip(outer).zip(split.parts) {
            let members = weights.members.get(key).cloned().unwrap_or_default();
            let inner: Vec<f64> = members.values().copied().collect();
            let store_split = apportion(group_amount, &inner);

            let stores = members
                .into_iter()
                .zip(store_split.parts)
                .map(|((store, inner_share), store_amount)| StoreAllocation {
                    store,
                    month,
                    inner_share,
                    amount: store_amount,
                })
                .collect();

            let calendar = decompose_month(key, self.target_year, month, group_amount)?;

            groups.push(GroupAllocation {
                month,
                group_key: key.clone(),
                weight,
                amount: group_amount,
                daily_average: calendar.daily_average,
                unallocated: store_split.unallocated,
                stores,
                weeks: calendar.weeks,
            });
        }

        Ok((groups, split.unallocated))
    }

    pub fn compute(
        &self,
        params: &IndexParameters,
        weight_config: &WeightConfig,
    ) -> Result<AllocationTree> {
        let baseline_total = self.series.year_total(self.baseline_year);
        let annual = self.annual_target(params)?;
        let participation = monthly_participation(self.series, self.baseline_year);
        let weights = WeightResolver::new(self.series, self.baseline_year).resolve(weight_config)?;

        info!(
            "Planning {} from baseline {}: total {:.2}, composite rate {:.4}, annual target {}",
            self.target_year,
            self.baseline_year,
            baseline_total,
            params.composite_rate(),
            annual.amount
        );

        let (month_amounts, mut unallocated) = self.distribute_months(&annual, &participation);

        let mut months = Vec::with_capacity(12);
        for (month, amount) in month_amounts {
            let (groups, month_unallocated) = self.allocate_groups(month, amount, &weights)?;
            unallocated += month_unallocated;
            unallocated += groups.iter().map(|g| g.unallocated).sum::<i64>();
            debug!(
                "Month {:02}: {} across {} {} groups",
                month,
                amount,
                groups.len(),
                weights.dimension.label()
            );

            months.push(MonthlyAllocation {
                month,
                participation: participation.get(&month).copied().unwrap_or(0.0),
                amount,
                unallocated: month_unallocated,
                groups,
            });
        }

        if unallocated != 0 {
            warn!(
                "{} units of the {} target had no data to allocate against",
                unallocated, self.target_year
            );
        }

        Ok(AllocationTree {
            target_year: self.target_year,
            baseline_year: self.baseline_year,
            rounding: self.rounding,
            index: *params,
            composite_rate: params.composite_rate(),
            baseline_total,
            annual,
            participation,
            weights,
            stores: self.series.stores(self.baseline_year),
            months,
            unallocated,
        })
    }
}

/// The whole pipeline as a pure function of its inputs.
pub fn compute(
    series: &HistoricalSeries,
    params: &IndexParameters,
    weight_config: &WeightConfig,
    options: PlanOptions,
) -> Result<AllocationTree> {
    Allocator::new(series, options)?.compute(params, weight_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Dimension, HistoricalRecord, InnerBase, WeightStrategy};

    fn record(month: u32, store: &str, city: &str, amount: f64) -> HistoricalRecord {
        HistoricalRecord {
            year: 2024,
            month,
            store: store.to_string(),
            city: Some(city.to_string()),
            state: Some("PR".to_string()),
            amount,
        }
    }

    fn three_store_series() -> HistoricalSeries {
        let mut records = Vec::new();
        for month in 1..=12 {
            records.push(record(month, "A", "Curitiba", 50_000.0 / 12.0));
            records.push(record(month, "B", "Curitiba", 30_000.0 / 12.0));
            records.push(record(month, "C", "Londrina", 20_000.0 / 12.0));
        }
        HistoricalSeries::new(records)
    }

    #[test]
    fn test_monthly_distribution_sums_to_annual() {
        let mut records = Vec::new();
        // January holds 8% of the year.
        records.push(record(1, "A", "Curitiba", 80_000.0));
        for month in 2..=12 {
            records.push(record(month, "A", "Curitiba", 920_000.0 / 11.0));
        }
        let series = HistoricalSeries::new(records);
        let allocator = Allocator::new(&series, PlanOptions::default()).unwrap();

        let params = IndexParameters::new(0.10, 0.0, 0.0, 0.0);
        let annual = allocator.annual_target(&params).unwrap();
        assert_eq!(annual.amount, 1_100_000);

        let participation = monthly_participation(&series, 2024);
        let (months, unallocated) = allocator.distribute_months(&annual, &participation);
        assert_eq!(unallocated, 0);
        assert_eq!(months.iter().map(|(_, a)| a).sum::<i64>(), 1_100_000);
        assert_eq!(months[0], (1, 88_000));
    }

    #[test]
    fn test_group_split_forces_remainder() {
        let series = three_store_series();
        let allocator = Allocator::new(&series, PlanOptions::default()).unwrap();
        let weights = WeightResolver::new(&series, 2024)
            .resolve(&WeightConfig::default())
            .unwrap();

        let (groups, unallocated) = allocator.allocate_groups(3, 101, &weights).unwrap();
        let amounts: Vec<(&str, i64)> = groups
            .iter()
            .map(|g| (g.group_key.as_str(), g.amount))
            .collect();

        assert_eq!(unallocated, 0);
        assert_eq!(amounts, vec![("A", 51), ("B", 30), ("C", 20)]);
        for group in &groups {
            assert_eq!(group.weeks.iter().map(|w| w.amount).sum::<i64>(), group.amount);
            assert_eq!(group.stores.len(), 1);
            assert_eq!(group.stores[0].amount, group.amount);
        }
    }

    #[test]
    fn test_month_without_groups_reports_shortfall() {
        let series = three_store_series();
        let allocator = Allocator::new(&series, PlanOptions::default()).unwrap();
        let weights = ResolvedWeights {
            dimension: Dimension::City,
            inner_base: InnerBase::Historical,
            groups: BTreeMap::new(),
            members: BTreeMap::new(),
        };

        let (groups, unallocated) = allocator.allocate_groups(2, 500, &weights).unwrap();
        assert!(groups.is_empty());
        assert_eq!(unallocated, 500);
    }

    #[test]
    fn test_city_groups_split_into_stores() {
        let series = three_store_series();
        let config = WeightConfig {
            dimension: Dimension::City,
            strategy: WeightStrategy::Historical,
            inner_base: InnerBase::Historical,
        };
        let tree = compute(
            &series,
            &IndexParameters::new(0.05, 0.0, 0.0, 0.0),
            &config,
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(tree.target_year, 2025);
        assert_eq!(tree.annual.amount, 105_000);

        for month in &tree.months {
            assert_eq!(month.groups.len(), 2);
            for group in &month.groups {
                let store_sum: i64 = group.stores.iter().map(|s| s.amount).sum();
                assert_eq!(store_sum, group.amount);
            }
        }

        let rows = tree.store_month_targets();
        assert_eq!(rows.len(), 36);
        assert_eq!(rows.iter().map(|r| r.amount).sum::<i64>(), 105_000);
        assert_eq!(rows[0].city.as_deref(), Some("Curitiba"));
    }

    #[test]
    fn test_no_history_is_an_error() {
        let series = HistoricalSeries::default();
        assert!(matches!(
            Allocator::new(&series, PlanOptions::default()),
            Err(PlanError::NoHistoricalData)
        ));
    }

    #[test]
    fn test_zero_baseline_emits_zeros() {
        let series = HistoricalSeries::new(vec![record(1, "A", "Curitiba", 0.0)]);
        let tree = compute(
            &series,
            &IndexParameters::new(0.1, 0.0, 0.0, 0.0),
            &WeightConfig::default(),
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(tree.annual.amount, 0);
        assert_eq!(tree.unallocated, 0);
        assert!(tree.months.iter().all(|m| m.amount == 0));
    }

    #[test]
    fn test_explicit_target_year() {
        let series = three_store_series();
        let options = PlanOptions {
            rounding: RoundingUnit::Cents,
            target_year: Some(2026),
        };
        let tree = compute(&series, &IndexParameters::default(), &WeightConfig::default(), options)
            .unwrap();

        assert_eq!(tree.target_year, 2026);
        assert_eq!(tree.annual.amount, 10_000_000);
        assert!((tree.to_currency(tree.annual.amount) - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let series = three_store_series();
        let params = IndexParameters::new(0.045, 0.12, 0.35, 0.013);
        let config = WeightConfig {
            dimension: Dimension::City,
            strategy: WeightStrategy::Equal,
            inner_base: InnerBase::Historical,
        };

        let first = compute(&series, &params, &config, PlanOptions::default()).unwrap();
        let second = compute(&series, &params, &config, PlanOptions::default()).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
