//! API State Management
use livepoll_core::PollService;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<PollService>,
    pub start_time: std::time::Instant,
}

impl ApiState {
    pub fn new(service: Arc<PollService>) -> Self {
        Self {
            service,
            start_time: std::time::Instant::now(),
        }
    }
}
