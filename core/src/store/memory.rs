//! In-process Identity Store used for ephemeral runs and tests

use super::PollStore;
use crate::error::StoreError;
use crate::types::{Poll, VoteRecord};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct MemoryStore {
    polls: RwLock<HashMap<String, Poll>>,
    votes: RwLock<HashMap<String, Vec<VoteRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PollStore for MemoryStore {
    fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        self.polls.write().insert(poll.id.clone(), poll.clone());
        Ok(())
    }

    fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        Ok(self.polls.read().get(id).cloned())
    }

    fn has_prior_vote(
        &self,
        poll_id: &str,
        origin: &str,
        fingerprint: &str,
    ) -> Result<bool, StoreError> {
        let votes = self.votes.read();
        Ok(votes.get(poll_id).is_some_and(|rows| {
            rows.iter()
                .any(|v| v.origin == origin || v.fingerprint == fingerprint)
        }))
    }

    fn insert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        self.votes
            .write()
            .entry(vote.poll_id.clone())
            .or_default()
            .push(vote.clone());
        Ok(())
    }

    fn vote_counts(&self, poll_id: &str) -> Result<Vec<(u32, u64)>, StoreError> {
        let votes = self.votes.read();
        let mut groups: BTreeMap<u32, u64> = BTreeMap::new();
        for vote in votes.get(poll_id).into_iter().flatten() {
            *groups.entry(vote.option_index).or_insert(0) += 1;
        }
        Ok(groups.into_iter().collect())
    }
}
