use crate::schema::{group_key, Dimension, HistoricalRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl StoreInfo {
    pub fn group_key(&self, dimension: Dimension) -> &str {
        group_key(dimension, &self.name, &self.city, &self.state)
    }
}

/// Normalized, immutable table of past sales facts.
///
/// Records are kept sorted by (year, month, store) so every aggregate below
/// iterates in a stable order. Ties keep their import order. A re-import
/// replaces the whole series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    records: Vec<HistoricalRecord>,
}

impl HistoricalSeries {
    pub fn new(mut records: Vec<HistoricalRecord>) -> Self {
        records.sort_by(|a, b| (a.year, a.month, &a.store).cmp(&(b.year, b.month, &b.store)));
        Self { records }
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self.records.iter().map(|r| r.year).collect();
        years.into_iter().collect()
    }

    /// The most recent year present in the series.
    pub fn baseline_year(&self) -> Option<i32> {
        self.records.iter().map(|r| r.year).max()
    }

    pub fn year_total(&self, year: i32) -> f64 {
        self.in_year(year).map(|r| r.amount).sum()
    }

    pub fn month_total(&self, year: i32, month: u32) -> f64 {
        self.in_year(year)
            .filter(|r| r.month == month)
            .map(|r| r.amount)
            .sum()
    }

    /// Totals for all twelve months of `year`; months without records are zero.
    pub fn totals_by_month(&self, year: i32) -> BTreeMap<u32, f64> {
        let mut totals: BTreeMap<u32, f64> = (1..=12).map(|m| (m, 0.0)).collect();
        for record in self.in_year(year) {
            if let Some(total) = totals.get_mut(&record.month) {
                *total += record.amount;
            }
        }
        totals
    }

    /// Totals per group key of `dimension` for every group with at least one
    /// record in `year` (zero-sales groups included).
    pub fn totals_by_group(&self, year: i32, dimension: Dimension) -> BTreeMap<String, f64> {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for record in self.in_year(year) {
            *totals
                .entry(record.group_key(dimension).to_string())
                .or_default() += record.amount;
        }
        totals
    }

    pub fn group_total(
        &self,
        year: i32,
        month: Option<u32>,
        dimension: Dimension,
        key: &str,
    ) -> f64 {
        self.in_year(year)
            .filter(|r| month.map_or(true, |m| r.month == m))
            .filter(|r| r.group_key(dimension) == key)
            .map(|r| r.amount)
            .sum()
    }

    /// Stores trading in `year`, keyed by name. When a store's location
    /// changes within the year, the latest record wins.
    pub fn stores(&self, year: i32) -> BTreeMap<String, StoreInfo> {
        let mut stores = BTreeMap::new();
        for record in self.in_year(year) {
            stores.insert(
                record.store.clone(),
                StoreInfo {
                    name: record.store.clone(),
                    city: record.city.clone(),
                    state: record.state.clone(),
                },
            );
        }
        stores
    }

    fn in_year(&self, year: i32) -> impl Iterator<Item = &HistoricalRecord> {
        self.records.iter().filter(move |r| r.year == year)
    }
}

impl From<Vec<HistoricalRecord>> for HistoricalSeries {
    fn from(records: Vec<HistoricalRecord>) -> Self {
        Self::new(records)
    }
}
