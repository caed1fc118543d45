//! State-change polling
//!
//! Repeatedly refreshes a remote object until it reports one of the target
//! states often enough in a row, or a deadline passes.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::Instant;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single refresh: the observed object (if any) and its state
pub type RefreshResult<T> = Result<(Option<T>, String), BoxError>;

pub type RefreshFunc<'a, T> = Box<dyn FnMut() -> BoxFuture<'a, RefreshResult<T>> + Send + 'a>;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("timeout while waiting for state to become '{target}' (last state: '{last_state}', timeout: {timeout:?})")]
    Timeout {
        last_state: String,
        target: String,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    #[error("{0}")]
    Refresh(#[source] BoxError),
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

/// Configuration of a wait for a state transition
pub struct StateChangeConf<'a, T> {
    pending: Vec<String>,
    target: Vec<String>,
    refresh: RefreshFunc<'a, T>,
    poll_interval: Duration,
    continuous_target_occurrence: u32,
    timeout: Duration,
}

impl<'a, T> StateChangeConf<'a, T> {
    pub fn new(pending: &[&str], target: &[&str], refresh: RefreshFunc<'a, T>) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            refresh,
            poll_interval: Duration::from_secs(10),
            continuous_target_occurrence: 1,
            timeout: Duration::from_secs(300),
        }
    }

    /// Fixed wait between two refreshes
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Number of consecutive target observations required before succeeding
    pub fn continuous_target_occurrence(mut self, n: u32) -> Self {
        self.continuous_target_occurrence = n.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll until the target state has been seen `continuous_target_occurrence`
    /// times in a row, returning the last refreshed object
    pub async fn wait_for_state(mut self) -> Result<Option<T>, PollError> {
        let deadline = Instant::now() + self.timeout;
        let mut target_occurrence = 0;
        let mut last_state = String::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let refreshed = match tokio::time::timeout_at(deadline, (self.refresh)()).await {
                Ok(result) => result.map_err(PollError::Refresh)?,
                Err(_) => return Err(self.timeout_error(last_state)),
            };
            let (value, state) = refreshed;

            if self.target.contains(&state) {
                target_occurrence += 1;
                tracing::debug!(
                    "poll {}: target state '{}' observed ({}/{})",
                    attempt,
                    state,
                    target_occurrence,
                    self.continuous_target_occurrence
                );
                if target_occurrence >= self.continuous_target_occurrence {
                    return Ok(value);
                }
            } else if self.pending.contains(&state) {
                if target_occurrence > 0 {
                    tracing::debug!("poll {}: back to '{}', resetting target count", attempt, state);
                }
                target_occurrence = 0;
            } else if !self.pending.is_empty() {
                return Err(PollError::UnexpectedState {
                    state,
                    target: self.target.join(", "),
                });
            }
            last_state = state;

            let next = Instant::now() + self.poll_interval;
            tokio::time::sleep_until(next.min(deadline)).await;
            if Instant::now() >= deadline {
                return Err(self.timeout_error(last_state));
            }
        }
    }

    fn timeout_error(&self, last_state: String) -> PollError {
        PollError::Timeout {
            last_state,
            target: self.target.join(", "),
            timeout: self.timeout,
        }
    }
}
