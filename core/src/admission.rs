//! Vote Admission Controller
//!
//! Decides whether a ballot may be recorded and, if so, writes it. This is the
//! only write path for vote rows.
//!
//! The duplicate check and the insert run inside a per-poll critical section.
//! Two requests carrying the same identity for the same poll can therefore
//! never both observe "no prior vote". The guard is handed back to the caller
//! so that aggregation and broadcast for that vote also run before the next
//! vote on the same poll is admitted, which keeps update order equal to
//! acceptance order.

use crate::error::{PollError, PollResult};
use crate::origin::NetworkOrigin;
use crate::store::PollStore;
use crate::types::{Poll, VoteRecord};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Maximum accepted fingerprint length in bytes
pub const MAX_FINGERPRINT_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Loopback origins skip the duplicate check entirely.
    pub loopback_exempt: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            loopback_exempt: true,
        }
    }
}

/// A vote request as it reaches the controller.
#[derive(Debug, Clone)]
pub struct Ballot {
    pub poll_id: String,
    pub option_index: i64,
    pub fingerprint: String,
    pub origin: NetworkOrigin,
}

/// Keyed async mutexes, one per poll id.
#[derive(Debug, Default)]
pub struct PollLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PollLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, poll_id: &str) -> PollGuard {
        let lock = self.locks.entry(poll_id.to_string()).or_default().clone();
        PollGuard {
            poll_id: poll_id.to_string(),
            _guard: lock.lock_owned().await,
        }
    }
}

/// Proof that the holder is inside a poll's critical section.
#[derive(Debug)]
pub struct PollGuard {
    poll_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl PollGuard {
    pub fn poll_id(&self) -> &str {
        &self.poll_id
    }
}

/// An accepted, durably recorded vote. Dropping it releases the poll.
#[derive(Debug)]
pub struct Admission {
    pub poll: Poll,
    pub vote: VoteRecord,
    pub guard: PollGuard,
}

pub struct AdmissionController {
    store: Arc<dyn PollStore>,
    policy: AdmissionPolicy,
    locks: PollLocks,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn PollStore>, policy: AdmissionPolicy) -> Self {
        Self {
            store,
            policy,
            locks: PollLocks::new(),
        }
    }

    /// Validate, deduplicate and record one ballot.
    pub async fn admit(&self, ballot: Ballot) -> PollResult<Admission> {
        if ballot.fingerprint.is_empty() {
            return Err(PollError::InvalidArgument(
                "Missing fingerprint".to_string(),
            ));
        }
        if ballot.fingerprint.len() > MAX_FINGERPRINT_LEN {
            return Err(PollError::InvalidArgument(format!(
                "Fingerprint exceeds {} bytes",
                MAX_FINGERPRINT_LEN
            )));
        }

        let poll = self
            .store
            .get_poll(&ballot.poll_id)?
            .ok_or_else(|| PollError::NotFound(ballot.poll_id.clone()))?;

        let option_index = u32::try_from(ballot.option_index)
            .ok()
            .filter(|&i| (i as usize) < poll.option_count())
            .ok_or_else(|| PollError::InvalidArgument("Invalid option index".to_string()))?;

        let exempt = self.policy.loopback_exempt && ballot.origin.is_loopback();
        let origin = ballot.origin.to_string();
        tracing::debug!(
            poll_id = %poll.id,
            origin = %origin,
            exempt = exempt,
            "vote_request_received"
        );

        let guard = self.locks.acquire(&poll.id).await;

        if !exempt
            && self
                .store
                .has_prior_vote(&poll.id, &origin, &ballot.fingerprint)?
        {
            tracing::info!(poll_id = %poll.id, origin = %origin, "duplicate_vote_rejected");
            return Err(PollError::Forbidden(
                "You have already voted on this poll.".to_string(),
            ));
        }

        let vote = VoteRecord {
            poll_id: poll.id.clone(),
            option_index,
            origin,
            fingerprint: ballot.fingerprint,
            cast_at: chrono::Utc::now().timestamp(),
        };
        self.store.insert_vote(&vote)?;

        tracing::info!(
            poll_id = %vote.poll_id,
            option_index = vote.option_index,
            origin = %vote.origin,
            "vote_recorded"
        );

        Ok(Admission { poll, vote, guard })
    }
}
