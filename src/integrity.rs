use crate::engine::AllocationTree;
use crate::error::{PlanError, Result};
use log::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationResult {
    pub levels_checked: usize,
    pub warnings: Vec<String>,
}

/// Re-checks the exact-sum invariants of a computed plan:
/// months sum to the annual target, groups to their month, stores and weeks
/// to their group. Amounts a level recorded as undistributable are added
/// back before comparing and reported as warnings.
pub struct PlanVerifier<'a> {
    tree: &'a AllocationTree,
}

impl<'a> PlanVerifier<'a> {
    pub fn new(tree: &'a AllocationTree) -> Self {
        Self { tree }
    }

    pub fn verify(&self) -> Result<VerificationResult> {
        let mut result = VerificationResult::default();
        let tree = self.tree;

        if tree.months.len() != 12 {
            return Err(mismatch("month count", 12, tree.months.len() as i64));
        }

        let month_sum: i64 = tree.months.iter().map(|m| m.amount).sum();
        check(
            &mut result,
            format!("year {}", tree.target_year),
            tree.annual.amount,
            month_sum,
            tree.year_unallocated(),
        )?;

        for month in &tree.months {
            let group_sum: i64 = month.groups.iter().map(|g| g.amount).sum();
            check(
                &mut result,
                format!("month {:02}", month.month),
                month.amount,
                group_sum,
                month.unallocated,
            )?;

            for group in &month.groups {
                let store_sum: i64 = group.stores.iter().map(|s| s.amount).sum();
                check(
                    &mut result,
                    format!("month {:02} / {} stores", month.month, group.group_key),
                    group.amount,
                    store_sum,
                    group.unallocated,
                )?;

                let week_sum: i64 = group.weeks.iter().map(|w| w.amount).sum();
                check(
                    &mut result,
                    format!("month {:02} / {} weeks", month.month, group.group_key),
                    group.amount,
                    week_sum,
                    0,
                )?;
            }
        }

        debug!(
            "Verified {} allocation levels for {}",
            result.levels_checked, tree.target_year
        );
        Ok(result)
    }
}

/// Parts plus the amount recorded as undistributable at this level must
/// equal the parent exactly.
fn check(
    result: &mut VerificationResult,
    level: String,
    expected: i64,
    actual: i64,
    unallocated: i64,
) -> Result<()> {
    result.levels_checked += 1;
    if expected != actual + unallocated {
        return Err(mismatch(&level, expected, actual));
    }
    if unallocated != 0 {
        result
            .warnings
            .push(format!("{}: {} left unallocated (no data)", level, unallocated));
    }
    Ok(())
}

fn mismatch(level: &str, expected: i64, actual: i64) -> PlanError {
    PlanError::AllocationMismatch {
        level: level.to_string(),
        expected,
        actual,
    }
}

pub fn verify_plan(tree: &AllocationTree) -> Result<VerificationResult> {
    PlanVerifier::new(tree).verify()
}
