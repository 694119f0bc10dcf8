use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Group key used for stores that carry no city or state.
pub const UNASSIGNED_GROUP: &str = "(unassigned)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Dimension {
    #[schemars(description = "Allocate directly to individual stores.")]
    Store,

    #[schemars(description = "Allocate to cities; stores receive a share of their city's amount.")]
    City,

    #[schemars(description = "Allocate to states; stores receive a share of their state's amount.")]
    State,
}

impl Dimension {
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Store => "store",
            Dimension::City => "city",
            Dimension::State => "state",
        }
    }
}

impl Default for Dimension {
    fn default() -> Self {
        Self::Store
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum WeightStrategy {
    #[schemars(
        description = "Each group's share of the baseline year's total sales within the dimension."
    )]
    Historical,

    #[schemars(description = "Every group in the dimension receives the same share.")]
    Equal,

    #[schemars(
        description = "Operator-assigned fractions keyed by group name. Must sum to 1.0 (within 1e-6); never rescaled."
    )]
    Custom(BTreeMap<String, f64>),
}

impl Default for WeightStrategy {
    fn default() -> Self {
        Self::Historical
    }
}

/// How a City or State amount is split among the stores inside it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum InnerBase {
    #[schemars(description = "Stores share in proportion to their baseline-year sales.")]
    Historical,

    #[schemars(description = "Stores share equally.")]
    Equal,
}

impl Default for InnerBase {
    fn default() -> Self {
        Self::Historical
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct WeightConfig {
    #[serde(default)]
    pub dimension: Dimension,

    #[serde(default)]
    pub strategy: WeightStrategy,

    #[serde(default)]
    pub inner_base: InnerBase,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum RoundingUnit {
    #[schemars(description = "Targets are whole currency units.")]
    Whole,

    #[schemars(description = "Targets are integer cents.")]
    Cents,
}

impl RoundingUnit {
    pub fn scale(&self) -> i64 {
        match self {
            RoundingUnit::Whole => 1,
            RoundingUnit::Cents => 100,
        }
    }

    /// Rounds a currency amount to the nearest unit.
    pub fn to_units(&self, amount: f64) -> i64 {
        (amount * self.scale() as f64).round() as i64
    }

    pub fn to_currency(&self, units: i64) -> f64 {
        units as f64 / self.scale() as f64
    }
}

impl Default for RoundingUnit {
    fn default() -> Self {
        Self::Whole
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct IndexParameters {
    #[schemars(description = "Expected inflation for the target year as a fraction (0.045 = 4.5%). Must be >= 0.")]
    pub inflation_rate: f64,

    #[schemars(description = "Regulated-price index as a fraction. Must be >= 0.")]
    pub regulated_price_index: f64,

    #[schemars(
        description = "Share of sales exposed to the regulated-price index, between 0.0 and 1.0."
    )]
    pub category_participation: f64,

    #[schemars(description = "Planned real growth as a fraction. May be negative for a contraction.")]
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ScenarioKind {
    Baseline,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoricalRecord {
    pub year: i32,
    pub month: u32,
    pub store: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub amount: f64,
}

impl HistoricalRecord {
    pub fn group_key(&self, dimension: Dimension) -> &str {
        group_key(dimension, &self.store, &self.city, &self.state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActualRecord {
    pub date: NaiveDate,
    pub store: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub amount: f64,
}

impl ActualRecord {
    pub fn group_key(&self, dimension: Dimension) -> &str {
        group_key(dimension, &self.store, &self.city, &self.state)
    }
}

pub(crate) fn group_key<'a>(
    dimension: Dimension,
    store: &'a str,
    city: &'a Option<String>,
    state: &'a Option<String>,
) -> &'a str {
    match dimension {
        Dimension::Store => store,
        Dimension::City => city.as_deref().unwrap_or(UNASSIGNED_GROUP),
        Dimension::State => state.as_deref().unwrap_or(UNASSIGNED_GROUP),
    }
}

/// Everything the pipeline needs besides the data and the index parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PlanOptions {
    #[serde(default)]
    pub rounding: RoundingUnit,

    /// Defaults to the year after the baseline year.
    #[serde(default)]
    pub target_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PlanConfig {
    #[schemars(description = "The name of the retail organization the plan belongs to")]
    pub organization_name: String,

    #[serde(default)]
    #[schemars(description = "Smallest currency unit targets are rounded to")]
    pub rounding: RoundingUnit,

    #[serde(default)]
    #[schemars(
        description = "Year being planned. When omitted, the year after the most recent historical year."
    )]
    pub target_year: Option<i32>,

    #[schemars(description = "Index parameters reflecting current market expectations")]
    pub baseline_index: IndexParameters,

    #[schemars(description = "Index parameters for the what-if scenario")]
    pub simulated_index: IndexParameters,

    #[serde(default)]
    #[schemars(description = "How monthly targets are split among stores, cities or states")]
    pub weights: WeightConfig,
}

impl PlanConfig {
    pub fn new(organization_name: impl Into<String>) -> Self {
        Self {
            organization_name: organization_name.into(),
            rounding: RoundingUnit::default(),
            target_year: None,
            baseline_index: IndexParameters::default(),
            simulated_index: IndexParameters::default(),
            weights: WeightConfig::default(),
        }
    }

    pub fn options(&self) -> PlanOptions {
        PlanOptions {
            rounding: self.rounding,
            target_year: self.target_year,
        }
    }

    pub fn index(&self, kind: ScenarioKind) -> &IndexParameters {
        match kind {
            ScenarioKind::Baseline => &self.baseline_index,
            ScenarioKind::Simulated => &self.simulated_index,
        }
    }

    pub fn index_mut(&mut self, kind: ScenarioKind) -> &mut IndexParameters {
        match kind {
            ScenarioKind::Baseline => &mut self.baseline_index,
            ScenarioKind::Simulated => &mut self.simulated_index,
        }
    }

    /// Checks both index parameter sets and any custom weights before a
    /// plan is computed.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.baseline_index.validate()?;
        self.simulated_index.validate()?;
        if let WeightStrategy::Custom(weights) = &self.weights.strategy {
            crate::weights::validate_custom_weights(weights)?;
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PlanConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
