//! Tally aggregation
//!
//! A tally is never stored. It is rebuilt from the grouped vote counts each
//! time it is read and after every accepted vote.

use crate::error::{PollError, PollResult};
use crate::store::PollStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-option vote counts, aligned to the poll's option order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally(Vec<u64>);

impl Tally {
    /// All-zero tally for a poll with `option_count` options.
    pub fn zeroed(option_count: usize) -> Self {
        Self(vec![0; option_count])
    }

    /// Build a tally from grouped counts. Indices outside the option range
    /// are dropped.
    pub fn from_groups(option_count: usize, groups: &[(u32, u64)]) -> Self {
        let mut tally = Self::zeroed(option_count);
        for &(index, count) in groups {
            if let Some(slot) = tally.0.get_mut(index as usize) {
                *slot = count;
            }
        }
        tally
    }

    pub fn counts(&self) -> &[u64] {
        &self.0
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn into_inner(self) -> Vec<u64> {
        self.0
    }
}

/// Computes tallies from the Identity Store.
#[derive(Clone)]
pub struct TallyAggregator {
    store: Arc<dyn PollStore>,
}

impl TallyAggregator {
    pub fn new(store: Arc<dyn PollStore>) -> Self {
        Self { store }
    }

    /// Count vector of exactly `option_count` entries for `poll_id`.
    ///
    /// Read-only; a store failure is reported as `Aggregation`.
    pub fn tally(&self, poll_id: &str, option_count: usize) -> PollResult<Tally> {
        let groups = self.store.vote_counts(poll_id).map_err(|e| {
            tracing::error!(poll_id = %poll_id, error = %e, "tally_query_failed");
            PollError::Aggregation(e)
        })?;
        Ok(Tally::from_groups(option_count, &groups))
    }
}
