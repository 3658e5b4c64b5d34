//! Retry policy and backoff state machine
//!
//! One `RetryState` per page attempt chain, owned exclusively by the
//! processor and discarded when the page reaches a terminal outcome:
//!
//! ```text
//! Pending -> Attempting -> { Succeeded | Retrying | Exhausted }
//! ```
//!
//! Transient failures consume retry budget and back off exponentially;
//! permanent failures exhaust immediately without consuming budget. The
//! transient/permanent rule is a pluggable predicate over [`FailureKind`],
//! and the actual sleeping goes through the [`Sleeper`] trait so the same
//! logic runs under test with a recording fake instead of wall-clock delays.

use crate::config::RetryConfig;
use crate::fetch::FailureKind;
use async_trait::async_trait;
use std::time::Duration;

/// Phase of a page's attempt chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Pending,
    Attempting,
    Succeeded,
    Retrying,
    Exhausted,
}

/// Decision for a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Wait for the delay, then re-attempt
    Retry { delay: Duration },
    /// No further attempts; report the page as permanently failed
    Exhausted,
}

/// Per-page retry state
///
/// The attempt counter never exceeds the policy's configured maximum.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub phase: RetryPhase,
    pub attempt: u32,
    pub last_failure: Option<String>,
    pub next_delay: Option<Duration>,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            phase: RetryPhase::Pending,
            attempt: 0,
            last_failure: None,
            next_delay: None,
        }
    }

    /// Marks the start of an attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.phase = RetryPhase::Attempting;
        self.attempt += 1;
        self.attempt
    }

    /// Marks the chain as successfully finished
    pub fn succeed(&mut self) {
        self.phase = RetryPhase::Succeeded;
        self.next_delay = None;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Predicate deciding whether a failure kind is worth retrying
pub type TransientPredicate = Box<dyn Fn(&FailureKind) -> bool + Send + Sync>;

/// Retry policy: attempt budget, exponential backoff, failure classification
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    is_transient: TransientPredicate,
}

impl RetryPolicy {
    /// Builds the policy from configuration with the default classification
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            is_transient: Box::new(FailureKind::is_transient),
        }
    }

    /// Replaces the transient/permanent classification rule
    pub fn with_classifier(
        mut self,
        predicate: impl Fn(&FailureKind) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_transient = Box::new(predicate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay after the given 1-based attempt number:
    /// `min(base * 2^(attempt-1), cap)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }

    /// Records a failed attempt and decides whether to retry
    ///
    /// Permanent failures transition straight to Exhausted without consuming
    /// retry budget; transient ones retry until the attempt cap.
    pub fn on_failure(
        &self,
        state: &mut RetryState,
        kind: &FailureKind,
        message: &str,
    ) -> AttemptDecision {
        state.last_failure = Some(message.to_string());

        if !(self.is_transient)(kind) || state.attempt >= self.max_attempts {
            state.phase = RetryPhase::Exhausted;
            state.next_delay = None;
            return AttemptDecision::Exhausted;
        }

        let delay = self.backoff_delay(state.attempt);
        state.phase = RetryPhase::Retrying;
        state.next_delay = Some(delay);
        AttemptDecision::Retry { delay }
    }
}

/// Scheduler-level sleep primitive
///
/// Production uses [`TokioSleeper`]; tests inject a fake that records
/// requested delays and returns immediately.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        })
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = test_policy();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_respects_cap() {
        let policy = RetryPolicy::new(&RetryConfig {
            max_attempts: 10,
            base_delay_ms: 500,
            max_delay_ms: 3_000,
        });
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(3_000));
        assert_eq!(policy.backoff_delay(9), Duration::from_millis(3_000));
    }

    #[test]
    fn test_transient_failure_retries_until_cap() {
        let policy = test_policy();
        let mut state = RetryState::new();

        state.begin_attempt();
        let first = policy.on_failure(&mut state, &FailureKind::Timeout, "timed out");
        assert_eq!(
            first,
            AttemptDecision::Retry {
                delay: Duration::from_millis(500)
            }
        );
        assert_eq!(state.phase, RetryPhase::Retrying);

        state.begin_attempt();
        let second = policy.on_failure(&mut state, &FailureKind::Timeout, "timed out");
        assert_eq!(
            second,
            AttemptDecision::Retry {
                delay: Duration::from_millis(1000)
            }
        );

        state.begin_attempt();
        let third = policy.on_failure(&mut state, &FailureKind::Timeout, "timed out");
        assert_eq!(third, AttemptDecision::Exhausted);
        assert_eq!(state.phase, RetryPhase::Exhausted);
        assert_eq!(state.attempt, 3);
    }

    #[test]
    fn test_permanent_failure_exhausts_immediately() {
        let policy = test_policy();
        let mut state = RetryState::new();

        state.begin_attempt();
        let decision = policy.on_failure(&mut state, &FailureKind::Unauthorized, "401");
        assert_eq!(decision, AttemptDecision::Exhausted);
        assert_eq!(state.attempt, 1);
    }

    #[test]
    fn test_attempt_count_never_exceeds_maximum() {
        let policy = test_policy();
        let mut state = RetryState::new();

        loop {
            state.begin_attempt();
            match policy.on_failure(&mut state, &FailureKind::ServiceError, "boom") {
                AttemptDecision::Retry { .. } => continue,
                AttemptDecision::Exhausted => break,
            }
        }

        assert_eq!(state.attempt, policy.max_attempts());
    }

    #[test]
    fn test_custom_classifier() {
        // Treat everything as permanent
        let policy = test_policy().with_classifier(|_| false);
        let mut state = RetryState::new();

        state.begin_attempt();
        let decision = policy.on_failure(&mut state, &FailureKind::Timeout, "timed out");
        assert_eq!(decision, AttemptDecision::Exhausted);
    }

    #[test]
    fn test_success_clears_pending_delay() {
        let policy = test_policy();
        let mut state = RetryState::new();

        state.begin_attempt();
        policy.on_failure(&mut state, &FailureKind::Timeout, "timed out");
        assert!(state.next_delay.is_some());

        state.begin_attempt();
        state.succeed();
        assert_eq!(state.phase, RetryPhase::Succeeded);
        assert!(state.next_delay.is_none());
    }

    #[test]
    fn test_state_records_last_failure() {
        let policy = test_policy();
        let mut state = RetryState::new();

        state.begin_attempt();
        policy.on_failure(&mut state, &FailureKind::RateLimited, "HTTP 429");
        assert_eq!(state.last_failure.as_deref(), Some("HTTP 429"));
    }
}
