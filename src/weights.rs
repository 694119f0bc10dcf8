use crate::error::{PlanError, Result};
use crate::history::HistoricalSeries;
use crate::schema::{Dimension, InnerBase, WeightConfig, WeightStrategy};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Custom weights must sum to 1 within this tolerance.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub dimension: Dimension,
    pub key: String,
    pub value: f64,
}

/// Weights for one dimension, kept as two factors: the outer weight of each
/// group and the inner share of each store within its group. A store's
/// effective weight is always the product of the two, so the outer weight can
/// be edited without touching the inner distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeights {
    pub dimension: Dimension,
    pub inner_base: InnerBase,
    /// Outer weight per group key.
    pub groups: BTreeMap<String, f64>,
    /// group key → store → share of the group (sums to 1 per group).
    pub members: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ResolvedWeights {
    pub fn sum(&self) -> f64 {
        self.groups.values().sum()
    }

    /// True when there is nothing to weight by (no groups, or all zero).
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|&w| w == 0.0)
    }

    /// Allocation may proceed when weights sum to 1, or when they are all
    /// zero (nothing to allocate).
    pub fn ensure_normalized(&self) -> Result<()> {
        let sum = self.sum();
        if self.is_empty() || (sum - 1.0).abs() <= WEIGHT_TOLERANCE {
            Ok(())
        } else {
            Err(PlanError::InvalidWeights { sum })
        }
    }

    pub fn weights(&self) -> Vec<Weight> {
        self.groups
            .iter()
            .map(|(key, &value)| Weight {
                dimension: self.dimension,
                key: key.clone(),
                value,
            })
            .collect()
    }

    pub fn store_weight(&self, store: &str) -> Option<f64> {
        self.members.iter().find_map(|(group, stores)| {
            stores
                .get(store)
                .map(|inner| self.groups.get(group).copied().unwrap_or(0.0) * inner)
        })
    }

    /// Effective store-level weights: outer group weight × inner share.
    pub fn store_weights(&self) -> BTreeMap<String, f64> {
        let mut result = BTreeMap::new();
        for (group, stores) in &self.members {
            let outer = self.groups.get(group).copied().unwrap_or(0.0);
            for (store, inner) in stores {
                result.insert(store.clone(), outer * inner);
            }
        }
        result
    }
}

pub struct WeightResolver<'a> {
    series: &'a HistoricalSeries,
    baseline_year: i32,
}

impl<'a> WeightResolver<'a> {
    pub fn new(series: &'a HistoricalSeries, baseline_year: i32) -> Self {
        Self {
            series,
            baseline_year,
        }
    }

    pub fn resolve(&self, config: &WeightConfig) -> Result<ResolvedWeights> {
        let groups = self.outer_weights(config.dimension, &config.strategy)?;
        let members = self.inner_shares(config.dimension, config.inner_base);

        debug!(
            "Resolved {} {} weights (sum {:.6})",
            groups.len(),
            config.dimension.label(),
            groups.values().sum::<f64>()
        );

        Ok(ResolvedWeights {
            dimension: config.dimension,
            inner_base: config.inner_base,
            groups,
            members,
        })
    }

    /// Group keys of `dimension` among stores trading in the baseline year.
    pub fn group_keys(&self, dimension: Dimension) -> BTreeSet<String> {
        self.series
            .stores(self.baseline_year)
            .values()
            .map(|store| store.group_key(dimension).to_string())
            .collect()
    }

    /// Baseline totals per group, with each store counted under the location
    /// it ends the year in.
    fn group_totals(&self, dimension: Dimension) -> BTreeMap<String, f64> {
        let store_totals = self
            .series
            .totals_by_group(self.baseline_year, Dimension::Store);

        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for store in self.series.stores(self.baseline_year).values() {
            *totals
                .entry(store.group_key(dimension).to_string())
                .or_default() += store_totals.get(&store.name).copied().unwrap_or(0.0);
        }
        totals
    }

    fn outer_weights(
        &self,
        dimension: Dimension,
        strategy: &WeightStrategy,
    ) -> Result<BTreeMap<String, f64>> {
        let keys = self.group_keys(dimension);

        let weights = match strategy {
            WeightStrategy::Historical => {
                let totals = self.group_totals(dimension);
                let dimension_total: f64 = totals.values().sum();
                keys.into_iter()
                    .map(|key| {
                        let amount = totals.get(&key).copied().unwrap_or(0.0);
                        let weight = if dimension_total == 0.0 {
                            0.0
                        } else {
                            amount / dimension_total
                        };
                        (key, weight)
                    })
                    .collect()
            }

            WeightStrategy::Equal => {
                let count = keys.len() as f64;
                keys.into_iter().map(|key| (key, 1.0 / count)).collect()
            }

            WeightStrategy::Custom(custom) => {
                validate_custom_weights(custom)?;
                if let Some(unknown) = custom.keys().find(|k| !keys.contains(*k)) {
                    return Err(PlanError::UnknownWeightKey {
                        key: unknown.clone(),
                    });
                }
                keys.into_iter()
                    .map(|key| {
                        let weight = custom.get(&key).copied().unwrap_or(0.0);
                        (key, weight)
                    })
                    .collect()
            }
        };

        Ok(weights)
    }

    fn inner_shares(
        &self,
        dimension: Dimension,
        inner_base: InnerBase,
    ) -> BTreeMap<String, BTreeMap<String, f64>> {
        let store_totals = self
            .series
            .totals_by_group(self.baseline_year, Dimension::Store);

        let mut members: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for store in self.series.stores(self.baseline_year).values() {
            members
                .entry(store.group_key(dimension).to_string())
                .or_default()
                .insert(store.name.clone(), 0.0);
        }

        for stores in members.values_mut() {
            let count = stores.len() as f64;
            let group_total: f64 = stores
                .keys()
                .map(|name| store_totals.get(name).copied().unwrap_or(0.0))
                .sum();

            for (name, share) in stores.iter_mut() {
                // A group with no baseline sales splits evenly.
                *share = match inner_base {
                    InnerBase::Historical if group_total > 0.0 => {
                        store_totals.get(name).copied().unwrap_or(0.0) / group_total
                    }
                    _ => 1.0 / count,
                };
            }
        }

        members
    }
}

/// Custom weights are never rescaled: they must already sum to 1.
pub fn validate_custom_weights(weights: &BTreeMap<String, f64>) -> Result<()> {
    for (key, &value) in weights {
        if !value.is_finite() || value < 0.0 {
            return Err(PlanError::NegativeWeight {
                key: key.clone(),
                value,
            });
        }
    }

    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(PlanError::InvalidWeights { sum });
    }

    Ok(())
}
