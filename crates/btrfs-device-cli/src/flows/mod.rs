// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-verb command flows
//!
//! Every flow resolves its handle once, then walks its device list with one
//! of two iteration strategies: [`best_effort`] (add, delete, stats and the
//! all-devices probe) or [`fail_fast`] (explicit scan). Handles are dropped
//! when the flow returns, on every path.

pub mod add;
pub mod ready;
pub mod remove;
pub mod scan;
pub mod stats;

use crate::report::{Failure, Report};

/// Run `step` for every item; a failure is recorded and the walk goes on.
/// Returns the number of failed items.
pub fn best_effort<T>(
    items: &[T],
    report: &mut Report<'_>,
    mut step: impl FnMut(&T, &mut Report<'_>) -> Result<(), Failure>,
) -> usize {
    let mut failed = 0;
    for item in items {
        if let Err(failure) = step(item, report) {
            report.fail(failure);
            failed += 1;
        }
    }
    failed
}

/// Run `step` for every item until the first failure, which is recorded.
/// Items after the failing one are never attempted. Returns `false` when
/// the walk stopped early.
pub fn fail_fast<T>(
    items: &[T],
    report: &mut Report<'_>,
    mut step: impl FnMut(&T, &mut Report<'_>) -> Result<(), Failure>,
) -> bool {
    for item in items {
        if let Err(failure) = step(item, report) {
            report.fail(failure);
            return false;
        }
    }
    true
}
