//! Polling waiter shared by every resource
//!
//! A waiter repeatedly fetches a resource until its status is terminal. It is
//! parameterised by the fetch call and a status classifier, so resource
//! bindings only describe *what* terminal means for them.

use crate::{ErrorClass, ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Partition of a resource status enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    /// Accepted but not started
    Pending,
    /// Work in progress
    Transitional,
    /// Done, resource usable
    Success,
    /// Done, resource broken
    Failure,
}

impl StatusClass {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusClass::Success | StatusClass::Failure)
    }
}

/// What a finished wait observed
#[derive(Clone, Debug, PartialEq)]
pub enum WaitOutcome<T> {
    /// The resource reached a terminal status (success or failure)
    Terminal(T),
    /// The resource disappeared and the caller tolerates that
    Gone,
}

impl<T> WaitOutcome<T> {
    pub fn into_terminal(self) -> Option<T> {
        match self {
            WaitOutcome::Terminal(value) => Some(value),
            WaitOutcome::Gone => None,
        }
    }
}

/// Poll loop configuration for one wait
#[derive(Clone, Debug)]
pub struct Waiter {
    kind: String,
    id: String,
    interval: Duration,
    deadline: Instant,
    cancel: CancellationToken,
    tolerate_not_found: bool,
}

impl Waiter {
    pub fn new(
        kind: impl Into<String>,
        id: impl Into<String>,
        interval: Duration,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            interval,
            deadline,
            cancel,
            tolerate_not_found: false,
        }
    }

    /// Treat a not-found answer as a successful end of the wait.
    pub fn tolerate_not_found(mut self) -> Self {
        self.tolerate_not_found = true;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll `fetch` until `classify` reports a terminal status.
    ///
    /// Transient errors are retried until the deadline. Cancellation is
    /// observed between polls, never during one.
    pub async fn wait<T, F, Fut, C>(&self, mut fetch: F, classify: C) -> Result<WaitOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&T) -> StatusClass,
    {
        let mut polls: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            polls += 1;
            match fetch().await {
                Ok(value) => {
                    let class = classify(&value);
                    if class.is_terminal() {
                        debug!(kind = %self.kind, id = %self.id, polls, ?class, "wait finished");
                        return Ok(WaitOutcome::Terminal(value));
                    }
                    debug!(kind = %self.kind, id = %self.id, polls, ?class, "still waiting");
                }
                Err(err) => match err.class() {
                    ErrorClass::NotFound if self.tolerate_not_found => {
                        debug!(kind = %self.kind, id = %self.id, polls, "resource is gone");
                        return Ok(WaitOutcome::Gone);
                    }
                    ErrorClass::Transient => {
                        debug!(kind = %self.kind, id = %self.id, error = %err, "transient error, retrying");
                    }
                    _ => return Err(err),
                },
            }

            let now = Instant::now();
            if now >= self.deadline {
                return Err(ProviderError::Timeout {
                    kind: self.kind.clone(),
                    id: self.id.clone(),
                });
            }
            let pause = self.interval.min(self.deadline - now);
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(self.cancelled()),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    fn cancelled(&self) -> ProviderError {
        ProviderError::Cancelled {
            kind: self.kind.clone(),
            id: self.id.clone(),
        }
    }
}
