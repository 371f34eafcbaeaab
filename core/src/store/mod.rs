//! Identity Store
//!
//! Persists polls and vote rows. The store answers the two questions the
//! admission path needs (does the poll exist, has this identity voted) and the
//! grouped count query used for tallies. It does not serialize callers; the
//! admission controller holds the per-poll critical section.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::error::StoreError;
use crate::types::{Poll, VoteRecord};

pub trait PollStore: Send + Sync {
    fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError>;

    fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError>;

    /// True if any vote on `poll_id` matches `origin` OR `fingerprint`.
    fn has_prior_vote(
        &self,
        poll_id: &str,
        origin: &str,
        fingerprint: &str,
    ) -> Result<bool, StoreError>;

    /// Append one vote row. All-or-nothing.
    fn insert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError>;

    /// Votes for `poll_id` grouped by option index: `(option_index, count)`.
    fn vote_counts(&self, poll_id: &str) -> Result<Vec<(u32, u64)>, StoreError>;
}
