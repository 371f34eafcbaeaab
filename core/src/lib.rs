//! LivePoll Core Library
//!
//! Vote admission, tally aggregation and live result fan-out for LivePoll

pub mod admission;
pub mod error;
pub mod hub;
pub mod origin;
pub mod service;
pub mod store;
pub mod tally;
pub mod types;

// Re-export main types
pub use admission::{Admission, AdmissionController, AdmissionPolicy, Ballot, PollGuard, PollLocks};
pub use error::{PollError, PollResult, StoreError};
pub use hub::{BroadcastHub, ClientEvent, ConnectionId, ServerEvent};
pub use origin::NetworkOrigin;
pub use service::{PollService, PollView};
pub use store::{MemoryStore, PollStore, SledStore};
pub use tally::{Tally, TallyAggregator};
pub use types::{NewPoll, Poll, VoteRecord};
