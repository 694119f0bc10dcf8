//! # Sales Target Planner
//!
//! Turns a multi-year history of monthly store sales into an integer sales
//! target plan for the next year.
//!
//! ## Core Concepts
//!
//! - **Baseline year**: the most recent year present in the history
//! - **Composite rate**: inflation + regulated price index × category participation + growth
//! - **Participation**: each month's share of the baseline year, used to spread the annual target
//! - **Dimension**: targets are split among stores, cities or states by historical, equal or custom weights
//! - **Exact sums**: every level (year, month, group, store, week) is apportioned with the
//!   largest-remainder method, so children always add up to their parent
//! - **Scenarios**: a baseline and a simulated plan are computed side by side; locking a
//!   scenario persists its store-month targets and freezes it
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_target_planner::*;
//!
//! let import = import_historical_file("vendas.csv")?;
//! let series = import.into_series();
//!
//! let mut config = PlanConfig::new("Rede Sul");
//! config.baseline_index = IndexParameters::new(0.045, 0.10, 0.30, 0.02);
//! config.simulated_index = IndexParameters::new(0.060, 0.10, 0.30, 0.00);
//!
//! let mut pair = TargetPlanner::plan_with_verification(&series, &config)?;
//! println!("{}", PlanReport::from_tree("Rede Sul", pair.baseline.plan()).to_markdown());
//!
//! let mut store = InMemoryTargetStore::new();
//! pair.baseline.lock(&mut store)?;
//! ```

pub mod apportion;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod history;
pub mod index;
pub mod ingestion;
pub mod integrity;
pub mod overrides;
pub mod report;
pub mod scenario;
pub mod schema;
pub mod seasonality;
pub mod tracking;
pub mod utils;
pub mod weights;

pub use apportion::{apportion, Apportionment};
pub use calendar::{
    daily_targets, decompose_month, weeks_in_month, CalendarWeek, MonthDecomposition,
    WeekAllocation,
};
pub use engine::{
    compute, AllocationTree, Allocator, GroupAllocation, MonthlyAllocation, StoreAllocation,
    StoreMonthTarget,
};
pub use error::{PlanError, Result};
pub use history::{HistoricalSeries, StoreInfo};
pub use index::{annual_target, AnnualTarget};
pub use ingestion::*;
pub use integrity::{verify_plan, PlanVerifier, VerificationResult};
pub use overrides::*;
pub use report::{format_amount, PlanReport};
pub use scenario::{
    ConsolidationBatch, InMemoryTargetStore, PersistenceAdapter, Scenario, ScenarioComparison,
    ScenarioPair, ScenarioStatus,
};
pub use schema::*;
pub use seasonality::{monthly_participation, participation_weights};
pub use tracking::{Period, Scope, Tracker, TrackingReport, Variance};
pub use utils::*;
pub use weights::{validate_custom_weights, ResolvedWeights, Weight, WeightResolver};

use log::{debug, info};

pub struct TargetPlanner;

impl TargetPlanner {
    /// Validates the configuration and computes the baseline and simulated
    /// scenarios as Drafts.
    pub fn plan(series: &HistoricalSeries, config: &PlanConfig) -> Result<ScenarioPair> {
        config.validate()?;

        info!(
            "Planning sales targets for organization: {}",
            config.organization_name
        );
        debug!(
            "History contains {} records over years {:?}",
            series.len(),
            series.years()
        );

        let baseline = Scenario::draft("baseline", ScenarioKind::Baseline, series, config)?;
        let simulated = Scenario::draft("simulated", ScenarioKind::Simulated, series, config)?;

        Ok(ScenarioPair {
            baseline,
            simulated,
        })
    }

    pub fn plan_with_verification(
        series: &HistoricalSeries,
        config: &PlanConfig,
    ) -> Result<ScenarioPair> {
        let pair = Self::plan(series, config)?;

        for scenario in [&pair.baseline, &pair.simulated] {
            let verification = verify_plan(scenario.plan())?;
            for warning in verification.warnings {
                debug!("Scenario '{}': {}", scenario.name(), warning);
            }
        }

        Ok(pair)
    }

    pub fn track(
        scenario: &Scenario,
        history: &HistoricalSeries,
        actuals: &[ActualRecord],
    ) -> Result<TrackingReport> {
        Tracker::new(scenario.plan(), history, actuals).report()
    }
}

pub fn plan_targets(series: &HistoricalSeries, config: &PlanConfig) -> Result<ScenarioPair> {
    TargetPlanner::plan(series, config)
}

pub fn plan_with_verification(
    series: &HistoricalSeries,
    config: &PlanConfig,
) -> Result<ScenarioPair> {
    TargetPlanner::plan_with_verification(series, config)
}
