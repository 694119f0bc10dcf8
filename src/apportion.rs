//! Largest-remainder (Hamilton) apportionment.
//!
//! Every level of the plan (months, groups, stores, weeks) splits an integer
//! total across weighted buckets with this one routine:
//!
//! 1. `ideal[i] = total × weight[i] / Σ weight`
//! 2. `part[i] = floor(ideal[i])`
//! 3. the integer remainder `total − Σ part` is handed out one unit at a time,
//!    largest fractional part first. Equal fractional parts go to the lower
//!    index. A negative remainder takes units back from the smallest
//!    fractional parts first, equal parts from the higher index.
//!
//! The parts always sum to `total` exactly and no part is more than one unit
//! away from its ideal share. Buckets with zero weight always receive zero.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apportionment {
    pub parts: Vec<i64>,
    /// Amount that could not be placed because no bucket carried weight.
    pub unallocated: i64,
}

impl Apportionment {
    pub fn allocated(&self) -> i64 {
        self.parts.iter().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unallocated == 0
    }
}

/// Real-valued shares before rounding. Negative or non-finite weights count
/// as zero; a zero weight sum yields all zeros.
pub fn ideal_shares(total: i64, weights: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = weights.iter().map(|&w| sanitize(w)).collect();
    let weight_sum: f64 = clean.iter().sum();

    if weight_sum <= 0.0 {
        return vec![0.0; clean.len()];
    }

    clean
        .iter()
        .map(|w| total as f64 * (w / weight_sum))
        .collect()
}

pub fn apportion(total: i64, weights: &[f64]) -> Apportionment {
    let clean: Vec<f64> = weights.iter().map(|&w| sanitize(w)).collect();
    let weight_sum: f64 = clean.iter().sum();

    if weight_sum <= 0.0 {
        return Apportionment {
            parts: vec![0; clean.len()],
            unallocated: total,
        };
    }

    let ideals = ideal_shares(total, &clean);
    let mut parts: Vec<i64> = ideals.iter().map(|x| x.floor() as i64).collect();
    let fractions: Vec<f64> = ideals
        .iter()
        .zip(&parts)
        .map(|(ideal, part)| ideal - *part as f64)
        .collect();

    let eligible: Vec<usize> = (0..clean.len()).filter(|&i| clean[i] > 0.0).collect();
    let remainder = total - parts.iter().sum::<i64>();

    match remainder.cmp(&0) {
        Ordering::Greater => {
            let mut order = eligible;
            order.sort_by(|&a, &b| fractions[b].total_cmp(&fractions[a]).then(a.cmp(&b)));
            for &idx in order.iter().cycle().take(remainder as usize) {
                parts[idx] += 1;
            }
        }
        Ordering::Less => {
            let mut order = eligible;
            order.sort_by(|&a, &b| fractions[a].total_cmp(&fractions[b]).then(b.cmp(&a)));
            for &idx in order.iter().cycle().take(remainder.unsigned_abs() as usize) {
                parts[idx] -= 1;
            }
        }
        Ordering::Equal => {}
    }

    Apportionment {
        parts,
        unallocated: 0,
    }
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
