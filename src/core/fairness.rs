//! # Fairness selector.
//!
//! Chooses which live producer the next worker task should target so that
//! no producer starves and none monopolizes the concurrency budget. A
//! producer's currently-buffered task count is its debt; scheduling always
//! goes to the least indebted producer.
//!
//! ## Contract
//! Given the eligible owners in enumeration order (live sub-producers
//! first, then the root if not exhausted) and the buffered tasks' owners:
//!
//! - an owner with **zero** buffered tasks is returned immediately;
//! - otherwise the owner with the fewest buffered tasks wins;
//! - ties among nonzero counts resolve to the first in enumeration order.
//!
//! Used only in unordered mode; ordered mode replaces this with a strict
//! most-recently-registered-sub-first policy (see the scheduler).

use std::collections::HashMap;

use super::worker::Owner;

/// Picks the least-loaded owner among `eligible`, or `None` when no owner
/// is eligible.
///
/// `buffered` enumerates the owner of every task currently in the buffer.
pub(crate) fn pick_least_loaded(
    eligible: &[Owner],
    buffered: impl IntoIterator<Item = Owner>,
) -> Option<Owner> {
    let mut counts: HashMap<Owner, usize> = HashMap::new();
    for owner in buffered {
        *counts.entry(owner).or_insert(0) += 1;
    }

    let mut least: Option<(Owner, usize)> = None;
    for owner in eligible {
        let count = match counts.get(owner) {
            // Not targeted at all, so definitely one of the least used.
            None => return Some(*owner),
            Some(count) => *count,
        };

        match least {
            Some((_, smallest)) if count >= smallest => {}
            _ => least = Some((*owner, count)),
        }
    }

    least.map(|(owner, _)| owner)
}
