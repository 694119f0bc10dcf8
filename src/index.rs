use crate::error::{PlanError, Result};
use crate::schema::{IndexParameters, RoundingUnit};
use serde::{Deserialize, Serialize};

impl IndexParameters {
    pub fn new(
        inflation_rate: f64,
        regulated_price_index: f64,
        category_participation: f64,
        growth_rate: f64,
    ) -> Self {
        Self {
            inflation_rate,
            regulated_price_index,
            category_participation,
            growth_rate,
        }
    }

    /// inflation + regulated index × category participation + growth.
    pub fn composite_rate(&self) -> f64 {
        self.inflation_rate + self.regulated_price_index * self.category_participation
            + self.growth_rate
    }

    /// Growth may be negative as long as the composite rate stays at or
    /// above -1; the other rates may not be negative, and category
    /// participation is a share in [0, 1].
    pub fn validate(&self) -> Result<()> {
        check_finite("inflation_rate", self.inflation_rate)?;
        check_finite("regulated_price_index", self.regulated_price_index)?;
        check_finite("category_participation", self.category_participation)?;
        check_finite("growth_rate", self.growth_rate)?;

        if self.inflation_rate < 0.0 {
            return Err(invalid("inflation_rate", self.inflation_rate));
        }
        if self.regulated_price_index < 0.0 {
            return Err(invalid("regulated_price_index", self.regulated_price_index));
        }
        if !(0.0..=1.0).contains(&self.category_participation) {
            return Err(invalid(
                "category_participation",
                self.category_participation,
            ));
        }
        // Targets may shrink but never turn negative.
        if 1.0 + self.composite_rate() < 0.0 {
            return Err(invalid("growth_rate", self.growth_rate));
        }
        Ok(())
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, value))
    }
}

fn invalid(name: &str, value: f64) -> PlanError {
    PlanError::InvalidIndexParameter {
        name: name.to_string(),
        value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualTarget {
    pub year: i32,
    /// Integer amount in the plan's rounding unit.
    pub amount: i64,
}

/// baseline total × (1 + composite rate), rounded once to the plan's unit.
/// Every level below works from this integer.
pub fn annual_target(
    year: i32,
    baseline_total: f64,
    params: &IndexParameters,
    rounding: RoundingUnit,
) -> Result<AnnualTarget> {
    params.validate()?;

    let projected = baseline_total * (1.0 + params.composite_rate());
    Ok(AnnualTarget {
        year,
        amount: rounding.to_units(projected),
    })
}
