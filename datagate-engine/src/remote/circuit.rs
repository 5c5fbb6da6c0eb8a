//! Circuit breaker for the remote data service.
//!
//! Calls go through a [`CallPermit`]. While closed every caller gets one.
//! While open nobody does until the open timeout has passed. Half-open
//! admits exactly one trial call at a time; its result decides whether
//! the circuit closes (after `success_threshold` good trial calls) or reopens.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use datagate_core::{CircuitBreakerConfig, CircuitState};

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32, in_trial: bool },
}

impl Phase {
    fn state(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

pub struct CircuitBreaker {
    phase: Mutex<Phase>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            phase: Mutex::new(Phase::Closed { failures: 0 }),
            config,
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.phase().state()
    }

    /// Ask to make one call.
    ///
    /// Returns `None` while open, or while half-open with a trial call already
    /// outstanding. An open circuit whose timeout has passed turns half-open
    /// and hands its trial slot to this caller.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut phase = self.phase();
        let admitted = match *phase {
            Phase::Closed { .. } => true,
            Phase::Open { since } => {
                if since.elapsed() >= self.config.open_timeout() {
                    *phase = Phase::HalfOpen {
                        successes: 0,
                        in_trial: true,
                    };
                    true
                } else {
                    false
                }
            }
            Phase::HalfOpen {
                successes,
                in_trial: false,
            } => {
                *phase = Phase::HalfOpen {
                    successes,
                    in_trial: true,
                };
                true
            }
            Phase::HalfOpen { in_trial: true, .. } => false,
        };
        admitted.then(|| CallPermit {
            breaker: self,
            settled: false,
        })
    }

    fn on_success(&self) {
        let mut phase = self.phase();
        *phase = match *phase {
            Phase::HalfOpen { successes, .. } if successes + 1 >= self.config.success_threshold => {
                Phase::Closed { failures: 0 }
            }
            Phase::HalfOpen { successes, .. } => Phase::HalfOpen {
                successes: successes + 1,
                in_trial: false,
            },
            Phase::Closed { .. } => Phase::Closed { failures: 0 },
            open @ Phase::Open { .. } => open,
        };
    }

    fn on_failure(&self) {
        let mut phase = self.phase();
        *phase = match *phase {
            Phase::Closed { failures } if failures + 1 < self.config.failure_threshold => {
                Phase::Closed {
                    failures: failures + 1,
                }
            }
            // Threshold reached, failed trial call, or a late failure while open.
            _ => Phase::Open {
                since: Instant::now(),
            },
        };
    }

    /// Free a half-open trial slot without counting the call either way.
    fn on_release(&self) {
        let mut phase = self.phase();
        if let Phase::HalfOpen {
            successes,
            in_trial: true,
        } = *phase
        {
            *phase = Phase::HalfOpen {
                successes,
                in_trial: false,
            };
        }
    }

    pub fn reset(&self) {
        *self.phase() = Phase::Closed { failures: 0 };
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("phase", &*self.phase())
            .field("config", &self.config)
            .finish()
    }
}

/// Admission for one call.
///
/// Settle it with [`CallPermit::succeed`] or [`CallPermit::fail`]. Dropping
/// it unsettled (a client error, a cancelled request) counts for nothing but
/// still frees the half-open trial slot.
#[must_use = "an unsettled permit counts as neither success nor failure"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_release();
        }
    }
}
