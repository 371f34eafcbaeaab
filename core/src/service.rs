//! Poll service
//!
//! Owns the request flows: create a poll, read a poll with its tally, and
//! cast a vote (admit, aggregate, broadcast).

use crate::admission::{AdmissionController, AdmissionPolicy, Ballot};
use crate::error::{PollError, PollResult};
use crate::hub::BroadcastHub;
use crate::store::PollStore;
use crate::tally::{Tally, TallyAggregator};
use crate::types::{NewPoll, Poll};
use std::sync::Arc;

/// A poll together with its current tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollView {
    pub poll: Poll,
    pub votes: Tally,
}

pub struct PollService {
    store: Arc<dyn PollStore>,
    admission: AdmissionController,
    aggregator: TallyAggregator,
    hub: Arc<BroadcastHub>,
}

impl PollService {
    pub fn new(store: Arc<dyn PollStore>, policy: AdmissionPolicy, hub: Arc<BroadcastHub>) -> Self {
        Self {
            admission: AdmissionController::new(store.clone(), policy),
            aggregator: TallyAggregator::new(store.clone()),
            store,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn create_poll(&self, question: &str, options: &[String]) -> PollResult<Poll> {
        let poll = NewPoll::new(question, options)?.into_poll();
        self.store.insert_poll(&poll)?;

        tracing::info!(
            poll_id = %poll.id,
            options = poll.option_count(),
            "poll_created"
        );
        Ok(poll)
    }

    pub fn get_poll(&self, id: &str) -> PollResult<PollView> {
        let poll = self
            .store
            .get_poll(id)?
            .ok_or_else(|| PollError::NotFound(id.to_string()))?;
        let votes = self.aggregator.tally(&poll.id, poll.option_count())?;
        Ok(PollView { poll, votes })
    }

    /// Record a vote and push the new tally to the poll's watchers.
    ///
    /// The poll stays locked until the broadcast has been handed off, so
    /// watchers see updates in acceptance order. If the tally cannot be
    /// recomputed the vote is still recorded but nothing is broadcast.
    pub async fn cast_vote(&self, ballot: Ballot) -> PollResult<Tally> {
        let admission = self.admission.admit(ballot).await?;
        let poll = &admission.poll;

        let tally = self.aggregator.tally(&poll.id, poll.option_count())?;
        let delivered = self.hub.publish(admission.guard.poll_id(), &tally).await;
        tracing::debug!(
            poll_id = %poll.id,
            total = tally.total(),
            watchers = delivered,
            "tally_broadcast"
        );

        drop(admission);
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::hub::ServerEvent;
    use crate::origin::NetworkOrigin;
    use crate::store::MemoryStore;
    use crate::types::VoteRecord;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn service() -> PollService {
        PollService::new(
            Arc::new(MemoryStore::new()),
            AdmissionPolicy::default(),
            Arc::new(BroadcastHub::new()),
        )
    }

    fn ballot(poll_id: &str, option_index: i64, fingerprint: &str, ip: &str) -> Ballot {
        Ballot {
            poll_id: poll_id.to_string(),
            option_index,
            fingerprint: fingerprint.to_string(),
            origin: NetworkOrigin::new(ip.parse::<IpAddr>().unwrap()),
        }
    }

    fn options(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fresh_poll_has_zero_tally() {
        let service = service();
        let poll = service
            .create_poll("Pick one", &options(&["a", "b", "c", "d"]))
            .unwrap();
        let view = service.get_poll(&poll.id).unwrap();
        assert_eq!(view.votes.counts(), &[0, 0, 0, 0]);
        assert_eq!(view.poll, poll);
    }

    #[tokio::test]
    async fn test_get_unknown_poll() {
        assert!(matches!(
            service().get_poll("nope"),
            Err(PollError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_accepted_vote_increments_only_its_option() {
        let service = service();
        let poll = service.create_poll("Q", &options(&["a", "b", "c"])).unwrap();

        let mut expected = vec![0u64; 3];
        for (i, option) in [2i64, 0, 2, 1].iter().enumerate() {
            let tally = service
                .cast_vote(ballot(&poll.id, *option, &format!("fp{}", i), &format!("10.0.0.{}", i)))
                .await
                .unwrap();
            expected[*option as usize] += 1;
            assert_eq!(tally.counts(), expected.as_slice());
        }
    }

    #[tokio::test]
    async fn test_best_color_scenario() {
        let service = service();
        let poll = service
            .create_poll("Best color?", &options(&["Red", "Blue"]))
            .unwrap();
        assert_eq!(service.get_poll(&poll.id).unwrap().votes.counts(), &[0, 0]);

        let (watcher, mut rx) = service.hub().connect().await;
        service.hub().join(watcher, &poll.id).await;

        let tally = service
            .cast_vote(ballot(&poll.id, 1, "identity-a", "203.0.113.5"))
            .await
            .unwrap();
        assert_eq!(tally.counts(), &[0, 1]);

        let err = service
            .cast_vote(ballot(&poll.id, 0, "identity-a", "203.0.113.5"))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Forbidden(_)));
        assert_eq!(service.get_poll(&poll.id).unwrap().votes.counts(), &[0, 1]);

        let tally = service
            .cast_vote(ballot(&poll.id, 0, "identity-b", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(tally.counts(), &[1, 1]);

        let mut seen = Vec::new();
        while let Ok(ServerEvent::UpdateResults { votes, .. }) = rx.try_recv() {
            seen.push(votes.into_inner());
        }
        assert_eq!(seen, vec![vec![0, 1], vec![1, 1]]);
    }

    #[tokio::test]
    async fn test_invalid_index_does_not_mutate_or_broadcast() {
        let service = service();
        let poll = service.create_poll("Q", &options(&["a", "b"])).unwrap();
        let (watcher, mut rx) = service.hub().connect().await;
        service.hub().join(watcher, &poll.id).await;

        for index in [-1, 2] {
            let err = service
                .cast_vote(ballot(&poll.id, index, "fp", "10.0.0.1"))
                .await
                .unwrap_err();
            assert!(matches!(err, PollError::InvalidArgument(_)));
        }
        assert_eq!(service.get_poll(&poll.id).unwrap().votes.counts(), &[0, 0]);
        assert!(rx.try_recv().is_err());
    }

    /// Memory store whose individual queries can be switched off.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        prior_vote_down: AtomicBool,
        insert_down: AtomicBool,
        counts_down: AtomicBool,
    }

    impl PollStore for FaultyStore {
        fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
            self.inner.insert_poll(poll)
        }
        fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError> {
            self.inner.get_poll(id)
        }
        fn has_prior_vote(&self, p: &str, o: &str, f: &str) -> Result<bool, StoreError> {
            if self.prior_vote_down.load(Ordering::SeqCst) {
                return Err(StoreError::Database("index unreadable".into()));
            }
            self.inner.has_prior_vote(p, o, f)
        }
        fn insert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
            if self.insert_down.load(Ordering::SeqCst) {
                return Err(StoreError::Database("disk full".into()));
            }
            self.inner.insert_vote(vote)
        }
        fn vote_counts(&self, poll_id: &str) -> Result<Vec<(u32, u64)>, StoreError> {
            if self.counts_down.load(Ordering::SeqCst) {
                return Err(StoreError::Database("timeout".into()));
            }
            self.inner.vote_counts(poll_id)
        }
    }

    async fn faulty_setup() -> (
        Arc<FaultyStore>,
        PollService,
        Poll,
        tokio::sync::mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let store = Arc::new(FaultyStore::default());
        let service = PollService::new(
            store.clone(),
            AdmissionPolicy::default(),
            Arc::new(BroadcastHub::new()),
        );
        let poll = service.create_poll("Q", &options(&["a", "b"])).unwrap();
        let (watcher, rx) = service.hub().connect().await;
        service.hub().join(watcher, &poll.id).await;
        (store, service, poll, rx)
    }

    #[tokio::test]
    async fn test_failed_insert_is_not_broadcast() {
        let (store, service, poll, mut rx) = faulty_setup().await;

        store.insert_down.store(true, Ordering::SeqCst);
        let err = service
            .cast_vote(ballot(&poll.id, 1, "fp", "10.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Storage(_)));
        assert!(rx.try_recv().is_err());
        assert_eq!(service.get_poll(&poll.id).unwrap().votes.counts(), &[0, 0]);

        // Nothing was half-written: the same identity can vote once storage recovers
        store.insert_down.store(false, Ordering::SeqCst);
        let tally = service
            .cast_vote(ballot(&poll.id, 1, "fp", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(tally.counts(), &[0, 1]);
    }

    #[tokio::test]
    async fn test_failed_duplicate_check_is_not_recorded() {
        let (store, service, poll, mut rx) = faulty_setup().await;

        store.prior_vote_down.store(true, Ordering::SeqCst);
        let err = service
            .cast_vote(ballot(&poll.id, 0, "fp", "10.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Storage(_)));
        assert!(rx.try_recv().is_err());
        assert_eq!(service.get_poll(&poll.id).unwrap().votes.counts(), &[0, 0]);
    }

    #[tokio::test]
    async fn test_aggregation_failure_after_write() {
        let (store, service, poll, mut rx) = faulty_setup().await;

        store.counts_down.store(true, Ordering::SeqCst);
        let err = service
            .cast_vote(ballot(&poll.id, 0, "fp", "10.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Aggregation(_)));
        assert!(rx.try_recv().is_err());

        // The vote itself was kept
        store.counts_down.store(false, Ordering::SeqCst);
        assert_eq!(service.get_poll(&poll.id).unwrap().votes.counts(), &[1, 0]);
        let err = service
            .cast_vote(ballot(&poll.id, 1, "fp", "10.0.0.2"))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_poll_validation() {
        let service = service();
        assert!(matches!(
            service.create_poll("", &options(&["a", "b"])),
            Err(PollError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.create_poll("Q", &options(&["a"])),
            Err(PollError::InvalidArgument(_))
        ));
    }
}
