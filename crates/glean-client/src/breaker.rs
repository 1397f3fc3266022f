//! Circuit breaker guarding calls to the annotation service.
//!
//! Closed: calls flow; failures inside `failure_window` are counted and
//! `failure_threshold` of them open the circuit. Open: calls are rejected
//! until `reset_timeout` has passed, then the circuit half-opens. Half-open:
//! `success_threshold` successes close it, any failure reopens it.
//!
//! State lives in atomics so the breaker can be shared without a lock.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            OPEN => CircuitState::Open,
            HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 1,
            failure_window: Duration::from_secs(60),
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: AtomicU8,
    failures: AtomicU32,
    successes: AtomicU32,
    /// Milliseconds since the epoch; 0 means never.
    last_failure_ms: AtomicU64,
    opened_at_ms: AtomicU64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CLOSED),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            opened_at_ms: AtomicU64::new(0),
        }
    }

    /// Whether a call may go through now. Moves Open to HalfOpen once the
    /// reset timeout has passed.
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
                let elapsed = now_ms().saturating_sub(opened_at);
                if elapsed >= self.config.reset_timeout.as_millis() as u64 {
                    self.half_open();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => self.failures.store(0, Ordering::SeqCst),
            CircuitState::HalfOpen => {
                let count = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.success_threshold {
                    self.close();
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let now = now_ms();
                let last = self.last_failure_ms.swap(now, Ordering::SeqCst);
                if last > 0
                    && now.saturating_sub(last) > self.config.failure_window.as_millis() as u64
                {
                    self.failures.store(0, Ordering::SeqCst);
                }
                let count = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.failure_threshold {
                    self.open();
                }
            }
            CircuitState::HalfOpen => self.open(),
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.close();
    }

    fn open(&self) {
        self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
        self.successes.store(0, Ordering::SeqCst);
        self.state.store(OPEN, Ordering::SeqCst);
        warn!(breaker = %self.name, failures = self.failure_count(), "circuit opened");
    }

    fn half_open(&self) {
        self.successes.store(0, Ordering::SeqCst);
        self.state.store(HALF_OPEN, Ordering::SeqCst);
        info!(breaker = %self.name, "circuit half-open");
    }

    fn close(&self) {
        self.failures.store(0, Ordering::SeqCst);
        self.successes.store(0, Ordering::SeqCst);
        self.last_failure_ms.store(0, Ordering::SeqCst);
        self.state.store(CLOSED, Ordering::SeqCst);
        info!(breaker = %self.name, "circuit closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(reset_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 3,
                reset_timeout,
                ..BreakerConfig::default()
            },
        )
    }

    #[test]
    fn opens_after_threshold() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..2 {
            cb.record_failure();
            assert!(cb.allow_request());
        }
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_opens_then_closes_on_success() {
        let cb = breaker(Duration::ZERO);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn failure_while_half_open_reopens() {
        let cb = breaker(Duration::ZERO);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn reset_closes() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..3 {
            cb.record_failure();
        }
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }
}
