use crate::engine::AllocationTree;
use crate::error::Result;
use crate::history::HistoricalSeries;
use crate::schema::{ActualRecord, Dimension};
use crate::utils::validate_month;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Company,
    /// A group key in the plan's dimension (store, city or state).
    Group(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Year,
    Month(u32),
}

/// Realized vs planned for one (scope, period). Amounts are in currency.
/// Ratios are `None` when their denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variance {
    pub scope: Scope,
    pub period: Period,
    pub realized: f64,
    pub planned: f64,
    pub delta: f64,
    pub attainment: Option<f64>,
    pub baseline: f64,
    pub growth_vs_baseline: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub company_year: Variance,
    pub company_months: Vec<Variance>,
    pub group_years: Vec<Variance>,
    pub group_months: Vec<Variance>,
}

/// Stateless reconciliation of realized sales against a plan. Neither the
/// plan nor the actuals are modified.
pub struct Tracker<'a> {
    tree: &'a AllocationTree,
    history: &'a HistoricalSeries,
    actuals: &'a [ActualRecord],
}

impl<'a> Tracker<'a> {
    pub fn new(
        tree: &'a AllocationTree,
        history: &'a HistoricalSeries,
        actuals: &'a [ActualRecord],
    ) -> Self {
        Self {
            tree,
            history,
            actuals,
        }
    }

    pub fn variance(&self, scope: &Scope, period: Period) -> Result<Variance> {
        if let Period::Month(month) = period {
            validate_month(month)?;
        }

        let realized = self.realized(scope, period);
        let planned = self.tree.to_currency(self.planned_units(scope, period));
        let baseline = self.baseline(scope, period);

        Ok(Variance {
            scope: scope.clone(),
            period,
            realized,
            planned,
            delta: realized - planned,
            attainment: ratio(realized, planned),
            baseline,
            growth_vs_baseline: ratio(realized, baseline).map(|r| r - 1.0),
        })
    }

    pub fn report(&self) -> Result<TrackingReport> {
        let company = Scope::Company;
        let group_keys: Vec<String> = self.tree.weights.groups.keys().cloned().collect();

        let company_months = (1..=12)
            .map(|m| self.variance(&company, Period::Month(m)))
            .collect::<Result<Vec<_>>>()?;

        let mut group_years = Vec::with_capacity(group_keys.len());
        let mut group_months = Vec::with_capacity(group_keys.len() * 12);
        for key in group_keys {
            let scope = Scope::Group(key);
            group_years.push(self.variance(&scope, Period::Year)?);
            for month in 1..=12 {
                group_months.push(self.variance(&scope, Period::Month(month))?);
            }
        }

        Ok(TrackingReport {
            company_year: self.variance(&company, Period::Year)?,
            company_months,
            group_years,
            group_months,
        })
    }

    fn realized(&self, scope: &Scope, period: Period) -> f64 {
        self.actuals
            .iter()
            .filter(|a| a.date.year() == self.tree.target_year)
            .filter(|a| match period {
                Period::Year => true,
                Period::Month(m) => a.date.month() == m,
            })
            .filter(|a| match scope {
                Scope::Company => true,
                Scope::Group(key) => {
                    self.group_of(&a.store, a.group_key(self.dimension())) == key
                }
            })
            .map(|a| a.amount)
            .sum()
    }

    fn dimension(&self) -> Dimension {
        self.tree.weights.dimension
    }

    /// The group a store was planned under. Facts for stores the plan does
    /// not know fall back to their own location fields.
    fn group_of<'r>(&'r self, store: &str, own_key: &'r str) -> &'r str {
        match self.tree.stores.get(store) {
            Some(info) => info.group_key(self.dimension()),
            None => own_key,
        }
    }

    fn planned_units(&self, scope: &Scope, period: Period) -> i64 {
        match (scope, period) {
            (Scope::Company, Period::Year) => self.tree.annual.amount,
            (Scope::Company, Period::Month(m)) => self.tree.month(m).map_or(0, |a| a.amount),
            (Scope::Group(key), Period::Year) => self.tree.group_year_total(key),
            (Scope::Group(key), Period::Month(m)) => self
                .tree
                .group_allocation(m, key)
                .map_or(0, |g| g.amount),
        }
    }

    fn baseline(&self, scope: &Scope, period: Period) -> f64 {
        let year = self.tree.baseline_year;
        let month = match period {
            Period::Year => None,
            Period::Month(m) => Some(m),
        };

        match scope {
            Scope::Company => match month {
                None => self.history.year_total(year),
                Some(m) => self.history.month_total(year, m),
            },
            Scope::Group(key) => self
                .history
                .records()
                .iter()
                .filter(|r| r.year == year)
                .filter(|r| month.map_or(true, |m| r.month == m))
                .filter(|r| self.group_of(&r.store, r.group_key(self.dimension())) == key)
                .map(|r| r.amount)
                .sum(),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}
