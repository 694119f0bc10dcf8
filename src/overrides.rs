use crate::schema::{
    Dimension, IndexParameters, InnerBase, PlanConfig, RoundingUnit, ScenarioKind,
    WeightStrategy,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered parameter edits. Applying them never mutates the base config; a
/// fresh config comes back and the plan is recomputed from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanAdjustments {
    #[serde(default)]
    pub adjustments: Vec<PlanAdjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAdjustment {
    /// Replace a scenario's index parameters wholesale.
    SetIndex {
        scenario: ScenarioKind,
        params: IndexParameters,
    },

    SetInflation { scenario: ScenarioKind, value: f64 },

    SetRegulatedPriceIndex { scenario: ScenarioKind, value: f64 },

    SetCategoryParticipation { scenario: ScenarioKind, value: f64 },

    SetGrowth { scenario: ScenarioKind, value: f64 },

    /// Switch the allocation dimension. Custom weights are keyed by group
    /// name, so a custom strategy falls back to Historical.
    SetDimension { dimension: Dimension },

    SetStrategy { strategy: WeightStrategy },

    /// Set one custom weight, switching to the Custom strategy if needed.
    SetCustomWeight {
        #[schemars(description = "Group name in the current dimension.")]
        key: String,
        value: f64,
    },

    RemoveCustomWeight { key: String },

    SetInnerBase { inner_base: InnerBase },

    SetRounding { rounding: RoundingUnit },

    SetTargetYear { year: Option<i32> },
}

impl PlanAdjustments {
    pub fn new(adjustments: Vec<PlanAdjustment>) -> Self {
        Self { adjustments }
    }

    pub fn set_index(scenario: ScenarioKind, params: IndexParameters) -> Self {
        Self::new(vec![PlanAdjustment::SetIndex { scenario, params }])
    }

    pub fn apply(&self, base_config: &PlanConfig) -> PlanConfig {
        let mut config = base_config.clone();
        for adjustment in &self.adjustments {
            apply_single_adjustment(&mut config, adjustment);
        }
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn apply_single_adjustment(config: &mut PlanConfig, adjustment: &PlanAdjustment) {
    match adjustment {
        PlanAdjustment::SetIndex { scenario, params } => {
            *config.index_mut(*scenario) = *params;
        }

        PlanAdjustment::SetInflation { scenario, value } => {
            config.index_mut(*scenario).inflation_rate = *value;
        }

        PlanAdjustment::SetRegulatedPriceIndex { scenario, value } => {
            config.index_mut(*scenario).regulated_price_index = *value;
        }

        PlanAdjustment::SetCategoryParticipation { scenario, value } => {
            config.index_mut(*scenario).category_participation = *value;
        }

        PlanAdjustment::SetGrowth { scenario, value } => {
            config.index_mut(*scenario).growth_rate = *value;
        }

        PlanAdjustment::SetDimension { dimension } => {
            if config.weights.dimension != *dimension {
                config.weights.dimension = *dimension;
                if matches!(config.weights.strategy, WeightStrategy::Custom(_)) {
                    config.weights.strategy = WeightStrategy::Historical;
                }
            }
        }

        PlanAdjustment::SetStrategy { strategy } => {
            config.weights.strategy = strategy.clone();
        }

        PlanAdjustment::SetCustomWeight { key, value } => {
            if !matches!(config.weights.strategy, WeightStrategy::Custom(_)) {
                config.weights.strategy = WeightStrategy::Custom(BTreeMap::new());
            }
            if let WeightStrategy::Custom(weights) = &mut config.weights.strategy {
                weights.insert(key.clone(), *value);
            }
        }

        PlanAdjustment::RemoveCustomWeight { key } => {
            if let WeightStrategy::Custom(weights) = &mut config.weights.strategy {
                weights.remove(key);
            }
        }

        PlanAdjustment::SetInnerBase { inner_base } => {
            config.weights.inner_base = *inner_base;
        }

        PlanAdjustment::SetRounding { rounding } => {
            config.rounding = *rounding;
        }

        PlanAdjustment::SetTargetYear { year } => {
            config.target_year = *year;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_leaves_base_untouched() {
        let base = PlanConfig::new("Rede Sul");
        let adjustments = PlanAdjustments::new(vec![
            PlanAdjustment::SetInflation {
                scenario: ScenarioKind::Simulated,
                value: 0.06,
            },
            PlanAdjustment::SetGrowth {
                scenario: ScenarioKind::Simulated,
                value: -0.02,
            },
            PlanAdjustment::SetRounding {
                rounding: RoundingUnit::Cents,
            },
        ]);

        let updated = adjustments.apply(&base);
        assert_eq!(base.simulated_index, IndexParameters::default());
        assert_eq!(updated.simulated_index.inflation_rate, 0.06);
        assert_eq!(updated.simulated_index.growth_rate, -0.02);
        assert_eq!(updated.baseline_index, IndexParameters::default());
        assert_eq!(updated.rounding, RoundingUnit::Cents);
    }

    #[test]
    fn test_custom_weights_build_up() {
        let base = PlanConfig::new("Rede Sul");
        let adjustments = PlanAdjustments::new(vec![
            PlanAdjustment::SetDimension {
                dimension: Dimension::City,
            },
            PlanAdjustment::SetCustomWeight {
                key: "Curitiba".to_string(),
                value: 0.6,
            },
            PlanAdjustment::SetCustomWeight {
                key: "Londrina".to_string(),
                value: 0.3,
            },
            PlanAdjustment::SetCustomWeight {
                key: "Maringa".to_string(),
                value: 0.1,
            },
            PlanAdjustment::RemoveCustomWeight {
                key: "Maringa".to_string(),
            },
        ]);

        let updated = adjustments.apply(&base);
        assert_eq!(updated.weights.dimension, Dimension::City);
        match &updated.weights.strategy {
            WeightStrategy::Custom(weights) => {
                assert_eq!(weights.len(), 2);
                assert_eq!(weights["Curitiba"], 0.6);
            }
            other => panic!("expected custom strategy, got {:?}", other),
        }
    }

    #[test]
    fn test_dimension_change_drops_custom_weights() {
        let mut base = PlanConfig::new("Rede Sul");
        let mut weights = BTreeMap::new();
        weights.insert("Batel".to_string(), 1.0);
        base.weights.strategy = WeightStrategy::Custom(weights);

        let updated = PlanAdjustments::new(vec![PlanAdjustment::SetDimension {
            dimension: Dimension::State,
        }])
        .apply(&base);

        assert_eq!(updated.weights.strategy, WeightStrategy::Historical);

        let same = PlanAdjustments::new(vec![PlanAdjustment::SetDimension {
            dimension: Dimension::Store,
        }])
        .apply(&base);
        assert_eq!(same.weights.strategy, base.weights.strategy);
    }

    #[test]
    fn test_adjustments_from_json() {
        let json = r#"{
            "adjustments": [
                { "action": "set_category_participation", "scenario": "Baseline", "value": 0.4 },
                { "action": "set_inner_base", "inner_base": "Equal" },
                { "action": "set_target_year", "year": 2027 }
            ]
        }"#;

        let adjustments = PlanAdjustments::from_json_str(json).unwrap();
        let updated = adjustments.apply(&PlanConfig::new("Rede Sul"));
        assert_eq!(updated.baseline_index.category_participation, 0.4);
        assert_eq!(updated.weights.inner_base, InnerBase::Equal);
        assert_eq!(updated.target_year, Some(2027));
    }
}
