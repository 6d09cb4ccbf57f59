//! Cancellation token bounded by a response deadline.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline horizon used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cancellation for one query: an external stop or the response deadline.
#[derive(Debug, Clone)]
pub struct QueryCancellation {
    token: CancellationToken,
    deadline: Instant,
}

impl QueryCancellation {
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            token: CancellationToken::new(),
            deadline,
        }
    }

    /// The token registered for external stop requests.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the query was stopped or ran past its deadline.
    pub fn is_cancelled(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        if Instant::now() >= self.deadline {
            self.token.cancel();
            return true;
        }
        false
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = sleep_until(self.deadline) => {
                self.token.cancel();
            }
        }
    }
}
