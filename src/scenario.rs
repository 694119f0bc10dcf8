use crate::engine::{compute, AllocationTree, StoreMonthTarget};
use crate::error::{PlanError, Result};
use crate::history::HistoricalSeries;
use crate::overrides::PlanAdjustments;
use crate::schema::{IndexParameters, PlanConfig, ScenarioKind};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStatus {
    Draft,
    Locked,
}

/// A snapshot of the configuration and the plan derived from it. Draft
/// scenarios recompute the whole plan on every edit; Locked scenarios reject
/// edits and can only be forked into a new Draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    name: String,
    kind: ScenarioKind,
    status: ScenarioStatus,
    config: PlanConfig,
    plan: AllocationTree,
}

impl Scenario {
    pub fn draft(
        name: impl Into<String>,
        kind: ScenarioKind,
        series: &HistoricalSeries,
        config: &PlanConfig,
    ) -> Result<Self> {
        let plan = compute(series, config.index(kind), &config.weights, config.options())?;
        Ok(Self {
            name: name.into(),
            kind,
            status: ScenarioStatus::Draft,
            config: config.clone(),
            plan,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn status(&self) -> ScenarioStatus {
        self.status
    }

    pub fn is_locked(&self) -> bool {
        self.status == ScenarioStatus::Locked
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn index_parameters(&self) -> &IndexParameters {
        self.config.index(self.kind)
    }

    pub fn plan(&self) -> &AllocationTree {
        &self.plan
    }

    /// Applies edits to a Draft and recomputes the plan from scratch. On
    /// error the scenario is left unchanged.
    pub fn apply(&mut self, series: &HistoricalSeries, adjustments: &PlanAdjustments) -> Result<()> {
        self.ensure_draft()?;

        let config = adjustments.apply(&self.config);
        let plan = compute(series, config.index(self.kind), &config.weights, config.options())?;

        self.config = config;
        self.plan = plan;
        Ok(())
    }

    pub fn set_index_parameters(
        &mut self,
        series: &HistoricalSeries,
        params: IndexParameters,
    ) -> Result<()> {
        self.apply(series, &PlanAdjustments::set_index(self.kind, params))
    }

    /// Recompute against a re-imported series.
    pub fn recompute(&mut self, series: &HistoricalSeries) -> Result<()> {
        self.apply(series, &PlanAdjustments::default())
    }

    /// The store-month rows this scenario would persist.
    pub fn consolidation_batch(&self) -> ConsolidationBatch {
        ConsolidationBatch {
            scenario: self.name.clone(),
            year: self.plan.target_year,
            rows: self.plan.store_month_targets(),
        }
    }

    /// Draft → Locked. The batch is written atomically; on failure the
    /// scenario stays a Draft and the call can simply be repeated.
    pub fn lock(&mut self, adapter: &mut dyn PersistenceAdapter) -> Result<usize> {
        self.ensure_draft()?;

        let batch = self.consolidation_batch();
        match adapter.upsert_targets(&batch) {
            Ok(written) => {
                self.status = ScenarioStatus::Locked;
                info!(
                    "Locked scenario '{}' for {}: {} store-month targets persisted",
                    self.name, batch.year, written
                );
                Ok(written)
            }
            Err(e) => {
                warn!("Consolidation of scenario '{}' failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// A new Draft carrying this scenario's configuration and plan.
    pub fn fork(&self, name: impl Into<String>) -> Scenario {
        Scenario {
            name: name.into(),
            kind: self.kind,
            status: ScenarioStatus::Draft,
            config: self.config.clone(),
            plan: self.plan.clone(),
        }
    }

    fn ensure_draft(&self) -> Result<()> {
        if self.is_locked() {
            return Err(PlanError::ScenarioLocked {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPair {
    pub baseline: Scenario,
    pub simulated: Scenario,
}

impl ScenarioPair {
    pub fn comparison(&self) -> ScenarioComparison {
        ScenarioComparison::between(&self.baseline, &self.simulated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthComparison {
    pub month: u32,
    pub baseline: i64,
    pub simulated: i64,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub composite_rate_delta: f64,
    pub annual_baseline: i64,
    pub annual_simulated: i64,
    pub annual_delta: i64,
    pub months: Vec<MonthComparison>,
}

impl ScenarioComparison {
    pub fn between(baseline: &Scenario, simulated: &Scenario) -> Self {
        let a = baseline.plan();
        let b = simulated.plan();
        let a_months = a.monthly_amounts();
        let b_months = b.monthly_amounts();

        let months = (1..=12)
            .map(|month| {
                let base = a_months.get(&month).copied().unwrap_or(0);
                let sim = b_months.get(&month).copied().unwrap_or(0);
                MonthComparison {
                    month,
                    baseline: base,
                    simulated: sim,
                    delta: sim - base,
                }
            })
            .collect();

        Self {
            composite_rate_delta: b.composite_rate - a.composite_rate,
            annual_baseline: a.annual.amount,
            annual_simulated: b.annual.amount,
            annual_delta: b.annual.amount - a.annual.amount,
            months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationBatch {
    pub scenario: String,
    pub year: i32,
    pub rows: Vec<StoreMonthTarget>,
}

/// Durable storage for consolidated targets.
///
/// Implementations create stores by name when absent and upsert targets keyed
/// by `(year, month, store_id)`. A batch is all-or-nothing: on error nothing
/// from it may be considered committed. Return the number of rows written.
pub trait PersistenceAdapter {
    fn upsert_targets(&mut self, batch: &ConsolidationBatch) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStore {
    pub id: u64,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTarget {
    pub year: i32,
    pub month: u32,
    pub store_id: u64,
    pub amount: i64,
    pub locked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTargetStore {
    stores: BTreeMap<String, StoredStore>,
    targets: BTreeMap<(i32, u32, u64), StoredTarget>,
}

impl InMemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, name: &str) -> Option<&StoredStore> {
        self.stores.get(name)
    }

    pub fn target(&self, year: i32, month: u32, store: &str) -> Option<&StoredTarget> {
        let id = self.stores.get(store)?.id;
        self.targets.get(&(year, month, id))
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

impl PersistenceAdapter for InMemoryTargetStore {
    fn upsert_targets(&mut self, batch: &ConsolidationBatch) -> Result<usize> {
        // Stage on copies so a failed row leaves the store untouched.
        let mut stores = self.stores.clone();
        let mut targets = self.targets.clone();

        for row in &batch.rows {
            if !(1..=12).contains(&row.month) {
                return Err(PlanError::Persistence {
                    message: format!("row for '{}' has invalid month {}", row.store, row.month),
                    retryable: false,
                });
            }

            let next_id = stores.len() as u64 + 1;
            let store = stores
                .entry(row.store.clone())
                .or_insert_with(|| StoredStore {
                    id: next_id,
                    name: row.store.clone(),
                    city: row.city.clone(),
                    state: row.state.clone(),
                });

            targets.insert(
                (row.year, row.month, store.id),
                StoredTarget {
                    year: row.year,
                    month: row.month,
                    store_id: store.id,
                    amount: row.amount,
                    locked: true,
                },
            );
        }

        self.stores = stores;
        self.targets = targets;
        Ok(batch.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::PlanAdjustment;
    use crate::schema::HistoricalRecord;

    struct UnavailableStore {
        attempts: usize,
    }

    impl PersistenceAdapter for UnavailableStore {
        fn upsert_targets(&mut self, _batch: &ConsolidationBatch) -> Result<usize> {
            self.attempts += 1;
            Err(PlanError::Persistence {
                message: "connection reset".to_string(),
                retryable: true,
            })
        }
    }

    fn series() -> HistoricalSeries {
        let mut records = Vec::new();
        for month in 1..=12 {
            for (store, city, amount) in [("A", "Curitiba", 700.0), ("B", "Londrina", 300.0)] {
                records.push(HistoricalRecord {
                    year: 2024,
                    month,
                    store: store.to_string(),
                    city: Some(city.to_string()),
                    state: Some("PR".to_string()),
                    amount,
                });
            }
        }
        HistoricalSeries::new(records)
    }

    fn config() -> PlanConfig {
        let mut config = PlanConfig::new("Rede Sul");
        config.baseline_index = IndexParameters::new(0.05, 0.0, 0.0, 0.0);
        config.simulated_index = IndexParameters::new(0.05, 0.0, 0.0, 0.05);
        config
    }

    #[test]
    fn test_lock_persists_and_freezes() {
        let series = series();
        let mut scenario = Scenario::draft("2025 base", ScenarioKind::Baseline, &series, &config()).unwrap();
        let mut store = InMemoryTargetStore::new();

        let written = scenario.lock(&mut store).unwrap();
        assert_eq!(written, 24);
        assert!(scenario.is_locked());
        assert_eq!(store.target_count(), 24);

        let jan_a = store.target(2025, 1, "A").unwrap();
        assert!(jan_a.locked);
        assert_eq!(store.store("A").unwrap().city.as_deref(), Some("Curitiba"));

        let edit = scenario.set_index_parameters(&series, IndexParameters::new(0.2, 0.0, 0.0, 0.0));
        assert!(matches!(edit, Err(PlanError::ScenarioLocked { .. })));
        assert!(matches!(scenario.lock(&mut store), Err(PlanError::ScenarioLocked { .. })));
    }

    #[test]
    fn test_relock_overwrites_same_keys() {
        let series = series();
        let mut store = InMemoryTargetStore::new();

        let mut first = Scenario::draft("v1", ScenarioKind::Baseline, &series, &config()).unwrap();
        first.lock(&mut store).unwrap();

        let mut second = first.fork("v2");
        assert_eq!(second.status(), ScenarioStatus::Draft);
        second
            .set_index_parameters(&series, IndexParameters::new(0.10, 0.0, 0.0, 0.0))
            .unwrap();
        second.lock(&mut store).unwrap();

        assert_eq!(store.target_count(), 24);
        let total: i64 = (1..=12)
            .flat_map(|m| ["A", "B"].map(|s| store.target(2025, m, s).unwrap().amount))
            .sum();
        assert_eq!(total, 13_200);
        assert!(first.is_locked());
        assert_eq!(first.plan().annual.amount, 12_600);
    }

    #[test]
    fn test_failed_persistence_keeps_draft() {
        let series = series();
        let mut scenario = Scenario::draft("retry", ScenarioKind::Baseline, &series, &config()).unwrap();
        let mut unavailable = UnavailableStore { attempts: 0 };

        let err = scenario.lock(&mut unavailable).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(scenario.status(), ScenarioStatus::Draft);

        let mut store = InMemoryTargetStore::new();
        assert!(scenario.lock(&mut store).is_ok());
        assert_eq!(unavailable.attempts, 1);
    }

    #[test]
    fn test_in_memory_store_is_atomic() {
        let mut store = InMemoryTargetStore::new();
        let batch = ConsolidationBatch {
            scenario: "bad".to_string(),
            year: 2025,
            rows: vec![
                StoreMonthTarget {
                    year: 2025,
                    month: 1,
                    store: "A".to_string(),
                    city: None,
                    state: None,
                    amount: 10,
                },
                StoreMonthTarget {
                    year: 2025,
                    month: 13,
                    store: "B".to_string(),
                    city: None,
                    state: None,
                    amount: 10,
                },
            ],
        };

        assert!(store.upsert_targets(&batch).is_err());
        assert_eq!(store.target_count(), 0);
        assert!(store.store("A").is_none());
    }

    #[test]
    fn test_draft_edits_recompute() {
        let series = series();
        let mut scenario = Scenario::draft("edit", ScenarioKind::Simulated, &series, &config()).unwrap();
        assert_eq!(scenario.plan().annual.amount, 13_200);

        let adjustments = PlanAdjustments {
            adjustments: vec![PlanAdjustment::SetGrowth {
                scenario: ScenarioKind::Simulated,
                value: 0.0,
            }],
        };
        scenario.apply(&series, &adjustments).unwrap();
        assert_eq!(scenario.plan().annual.amount, 12_600);
        assert_eq!(scenario.index_parameters().growth_rate, 0.0);
    }

    #[test]
    fn test_invalid_edit_leaves_scenario_unchanged() {
        let series = series();
        let mut scenario = Scenario::draft("guard", ScenarioKind::Baseline, &series, &config()).unwrap();
        let before = scenario.clone();

        let result = scenario.set_index_parameters(&series, IndexParameters::new(0.05, 0.1, 1.5, 0.0));
        assert!(matches!(result, Err(PlanError::InvalidIndexParameter { .. })));
        assert_eq!(scenario, before);
    }

    #[test]
    fn test_comparison() {
        let series = series();
        let config = config();
        let pair = ScenarioPair {
            baseline: Scenario::draft("base", ScenarioKind::Baseline, &series, &config).unwrap(),
            simulated: Scenario::draft("sim", ScenarioKind::Simulated, &series, &config).unwrap(),
        };

        let comparison = pair.comparison();
        assert_eq!(comparison.annual_baseline, 12_600);
        assert_eq!(comparison.annual_simulated, 13_200);
        assert_eq!(comparison.annual_delta, 600);
        assert_eq!(comparison.months.len(), 12);
        assert_eq!(comparison.months.iter().map(|m| m.delta).sum::<i64>(), 600);
        assert!((comparison.composite_rate_delta - 0.05).abs() < 1e-12);
    }
}
