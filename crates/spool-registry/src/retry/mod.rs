//! Exponential backoff for registry requests

use std::time::Duration;

use spool_core::error::SpoolError;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub multiplier: f64,
}

impl Default for RetryConfig {
    /// Two retries, factor 10, 10s minimum, 60s maximum: three attempts span
    /// roughly a minute.
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            multiplier: 10.0,
        }
    }
}

impl RetryConfig {
    /// Configuration that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// What went wrong with one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// DNS, connect or reset failure
    NetworkError,
    /// Deadline expired or HTTP 408
    Timeout,
    /// HTTP 5xx
    ServerError,
    /// Connection closed before a response arrived
    NoResponse,
    /// Anything else: 4xx, auth, parse, conflict
    ClientError,
}

impl FailureKind {
    /// Classify an error from the request engine
    pub fn of(error: &SpoolError) -> Self {
        match error {
            SpoolError::Network { .. } => FailureKind::NetworkError,
            SpoolError::Timeout { .. } => FailureKind::Timeout,
            SpoolError::Server { .. } => FailureKind::ServerError,
            SpoolError::NoResponse { .. } => FailureKind::NoResponse,
            _ => FailureKind::ClientError,
        }
    }

    /// Classify a failing HTTP status
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            408 => Some(FailureKind::Timeout),
            400..=499 => Some(FailureKind::ClientError),
            s if s >= 500 => Some(FailureKind::ServerError),
            _ => None,
        }
    }

    /// Only client errors are final
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::ClientError)
    }
}

/// Outcome of asking the session whether to try again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made
    pub retry: bool,
    /// How long to wait before it
    pub delay: Duration,
}

/// Attempt counter for one logical request
#[derive(Debug, Clone)]
pub struct RetrySession {
    config: RetryConfig,
    attempt: u32,
}

impl RetrySession {
    /// Start a session; the first attempt is number 1
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 1 }
    }

    /// Number of the attempt currently in flight
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay after a failed attempt: `initial * multiplier^(attempt-1)`,
    /// capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis =
            self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let cap = self.config.max_delay.as_millis() as f64;

        if !millis.is_finite() || millis >= cap {
            self.config.max_delay
        } else {
            Duration::from_millis(millis.max(0.0) as u64)
        }
    }

    /// Decide whether attempt number `attempt`, which failed with `kind`,
    /// should be followed by another one
    pub fn should_retry(&self, attempt: u32, kind: FailureKind) -> RetryDecision {
        if !kind.is_retryable() || attempt > self.config.max_retries {
            return RetryDecision {
                retry: false,
                delay: Duration::ZERO,
            };
        }

        RetryDecision {
            retry: true,
            delay: self.delay_for(attempt),
        }
    }

    /// Record a failure of the current attempt. Returns the delay before the
    /// next attempt, or `None` when the session is over.
    pub fn record_failure(&mut self, kind: FailureKind) -> Option<Duration> {
        let decision = self.should_retry(self.attempt, kind);
        if decision.retry {
            self.attempt += 1;
            Some(decision.delay)
        } else {
            None
        }
    }

    /// Whether no retries remain
    pub fn is_exhausted(&self) -> bool {
        self.attempt > self.config.max_retries
    }
}
