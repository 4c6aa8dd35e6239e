use crate::agent::Analyst;
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only request state
#[derive(Clone)]
pub struct AppState {
    pub analyst: Arc<Analyst>,
    /// Upper bound on one question's whole pipeline
    pub agent_timeout: Duration,
}

impl AppState {
    pub fn new(analyst: Analyst, agent_timeout: Duration) -> Self {
        Self {
            analyst: Arc::new(analyst),
            agent_timeout,
        }
    }
}
