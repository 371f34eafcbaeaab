//! Sled-based persistence for polls and votes
//!
//! Trees:
//! - `polls`: poll id -> bincode(Poll)
//! - `votes`: poll id, 0x00, big-endian sequence -> bincode(VoteRecord)
//! - `voter_index`: poll id, 0x00, signal tag, 0x00, signal value -> empty

use super::PollStore;
use crate::error::StoreError;
use crate::types::{Poll, VoteRecord};
use sled::transaction::{TransactionError, TransactionResult};
use sled::Transactional;
use std::collections::BTreeMap;
use std::path::Path;

const ORIGIN_TAG: u8 = b'o';
const FINGERPRINT_TAG: u8 = b'f';

#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
    polls: sled::Tree,
    votes: sled::Tree,
    voter_index: sled::Tree,
    path: String,
}

impl SledStore {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = sled::open(&path)
            .map_err(|e| StoreError::Database(format!("Failed to open database: {}", e)))?;

        Ok(SledStore {
            polls: db.open_tree("polls")?,
            votes: db.open_tree("votes")?,
            voter_index: db.open_tree("voter_index")?,
            db,
            path: path_str,
        })
    }

    /// Get the database path
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn poll_prefix(poll_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(poll_id.len() + 1);
    key.extend_from_slice(poll_id.as_bytes());
    key.push(0);
    key
}

fn vote_key(poll_id: &str, seq: u64) -> Vec<u8> {
    let mut key = poll_prefix(poll_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn index_key(poll_id: &str, tag: u8, value: &str) -> Vec<u8> {
    let mut key = poll_prefix(poll_id);
    key.push(tag);
    key.push(0);
    key.extend_from_slice(value.as_bytes());
    key
}

impl PollStore for SledStore {
    fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let value = bincode::serialize(poll)?;
        self.polls.insert(poll.id.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        match self.polls.get(id.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn has_prior_vote(
        &self,
        poll_id: &str,
        origin: &str,
        fingerprint: &str,
    ) -> Result<bool, StoreError> {
        if self
            .voter_index
            .contains_key(index_key(poll_id, ORIGIN_TAG, origin))?
        {
            return Ok(true);
        }
        Ok(self
            .voter_index
            .contains_key(index_key(poll_id, FINGERPRINT_TAG, fingerprint))?)
    }

    fn insert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        let key = vote_key(&vote.poll_id, self.db.generate_id()?);
        let value = bincode::serialize(vote)?;
        let origin_key = index_key(&vote.poll_id, ORIGIN_TAG, &vote.origin);
        let fingerprint_key = index_key(&vote.poll_id, FINGERPRINT_TAG, &vote.fingerprint);

        // Row and identity index land together or not at all
        let result: TransactionResult<(), ()> =
            (&self.votes, &self.voter_index).transaction(|(votes, index)| {
                votes.insert(key.as_slice(), value.as_slice())?;
                index.insert(origin_key.as_slice(), &b""[..])?;
                index.insert(fingerprint_key.as_slice(), &b""[..])?;
                Ok(())
            });

        match result {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => return Err(e.into()),
            Err(TransactionError::Abort(())) => {
                return Err(StoreError::Database("Vote transaction aborted".to_string()))
            }
        }

        self.db.flush()?;
        Ok(())
    }

    fn vote_counts(&self, poll_id: &str) -> Result<Vec<(u32, u64)>, StoreError> {
        let mut groups: BTreeMap<u32, u64> = BTreeMap::new();
        for entry in self.votes.scan_prefix(poll_prefix(poll_id)) {
            let (_, data) = entry?;
            let vote: VoteRecord = bincode::deserialize(&data)?;
            *groups.entry(vote.option_index).or_insert(0) += 1;
        }
        Ok(groups.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{exercise_store, poll, vote};

    #[test]
    fn test_sled_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("polls.db")).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_votes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polls.db");

        {
            let store = SledStore::open(&path).unwrap();
            store.insert_poll(&poll("p1", 2)).unwrap();
            store.insert_vote(&vote("p1", 1, "10.0.0.1", "fp-a")).unwrap();
        }

        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get_poll("p1").unwrap().unwrap().id, "p1");
        assert_eq!(store.vote_counts("p1").unwrap(), vec![(1, 1)]);
        assert!(store.has_prior_vote("p1", "10.0.0.1", "x").unwrap());
    }

    #[test]
    fn test_poll_id_prefix_does_not_leak_into_other_polls() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("polls.db")).unwrap();
        store.insert_poll(&poll("abc", 2)).unwrap();
        store.insert_poll(&poll("abcd", 2)).unwrap();
        store.insert_vote(&vote("abcd", 0, "10.0.0.1", "fp")).unwrap();

        assert!(store.vote_counts("abc").unwrap().is_empty());
        assert!(!store.has_prior_vote("abc", "10.0.0.1", "fp").unwrap());
    }
}
