//! Circuit breakers, one per query kind, and the guard that runs upstream
//! calls through them.
//!
//! # States
//! - Closed: calls pass through and their outcomes are recorded.
//! - Open: calls are answered with a placeholder without touching the network.
//! - HalfOpen: one probe call is let through; the rest still get placeholders.
//!
//! ```text
//! Closed   -> Open      consecutive failures >= threshold, or window failure ratio > limit
//! Open     -> HalfOpen  first admission after the cooldown (that call is the probe)
//! HalfOpen -> Closed    probe succeeded
//! HalfOpen -> Open      probe failed
//! ```
//!
//! Health state sits behind a `std::sync::Mutex` that is only taken to admit
//! a call or to record its outcome, never across an `.await`.
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::fallback::Synthesize;
use crate::query::{CatalogQuery, QueryKind};

/// Thresholds for a single circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitPolicy {
    /// Consecutive health faults that open the circuit.
    pub failure_threshold: u32,
    /// Failure ratio over the trailing window above which the circuit opens.
    pub failure_rate_threshold: f64,
    /// Number of most recent outcomes kept for the ratio.
    pub window_size: usize,
    /// Outcomes required in the window before the ratio is considered.
    pub minimum_calls: usize,
    /// Time spent Open before a probe is allowed.
    pub cooldown: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { since: Instant },
    HalfOpen { probing: bool },
}

#[derive(Debug)]
struct Health {
    phase: Phase,
    /// `true` marks a failure.
    window: VecDeque<bool>,
    consecutive_failures: u32,
}

impl Health {
    fn reset(&mut self, phase: Phase) {
        self.phase = phase;
        self.window.clear();
        self.consecutive_failures = 0;
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    kind: QueryKind,
    policy: CircuitPolicy,
    health: Mutex<Health>,
}

impl CircuitBreaker {
    pub fn new(kind: QueryKind, policy: CircuitPolicy) -> Self {
        let window = VecDeque::with_capacity(policy.window_size);
        Self {
            kind,
            policy,
            health: Mutex::new(Health {
                phase: Phase::Closed,
                window,
                consecutive_failures: 0,
            }),
        }
    }

    /// Current state. An Open circuit whose cooldown has passed still reads
    /// Open until the next call is admitted as the probe.
    pub fn state(&self) -> CircuitState {
        match self.lock().phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Admit a call, or return `None` if it must be short-circuited.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut health = self.lock();
        let phase = health.phase;
        match phase {
            Phase::Closed => Some(Permit::new(self, false)),
            Phase::Open { since } if since.elapsed() >= self.policy.cooldown => {
                health.phase = Phase::HalfOpen { probing: true };
                info!(kind = %self.kind, "circuit half-open; probing upstream");
                Some(Permit::new(self, true))
            }
            Phase::Open { .. } | Phase::HalfOpen { probing: true } => None,
            Phase::HalfOpen { probing: false } => {
                health.phase = Phase::HalfOpen { probing: true };
                Some(Permit::new(self, true))
            }
        }
    }

    fn record_success(&self, probe: bool) {
        let mut health = self.lock();
        let phase = health.phase;
        match phase {
            Phase::HalfOpen { .. } if probe => {
                health.reset(Phase::Closed);
                info!(kind = %self.kind, "probe succeeded; circuit closed");
            }
            Phase::Closed => {
                health.consecutive_failures = 0;
                self.push_outcome(&mut health, false);
            }
            // Late results from calls admitted before the circuit opened.
            _ => {}
        }
    }

    fn record_failure(&self, probe: bool) {
        let mut health = self.lock();
        let phase = health.phase;
        match phase {
            Phase::HalfOpen { .. } if probe => {
                health.reset(Phase::Open {
                    since: Instant::now(),
                });
                info!(kind = %self.kind, "probe failed; circuit re-opened");
            }
            Phase::Closed => {
                health.consecutive_failures += 1;
                self.push_outcome(&mut health, true);
                if self.should_trip(&health) {
                    let failures = health.consecutive_failures;
                    health.reset(Phase::Open {
                        since: Instant::now(),
                    });
                    info!(
                        kind = %self.kind,
                        consecutive_failures = failures,
                        "circuit opened"
                    );
                }
            }
            _ => {}
        }
    }

    fn release_probe(&self) {
        let mut health = self.lock();
        if let Phase::HalfOpen { probing: true } = health.phase {
            health.phase = Phase::HalfOpen { probing: false };
        }
    }

    fn push_outcome(&self, health: &mut Health, failed: bool) {
        if health.window.len() >= self.policy.window_size.max(1) {
            health.window.pop_front();
        }
        health.window.push_back(failed);
    }

    fn should_trip(&self, health: &Health) -> bool {
        if health.consecutive_failures >= self.policy.failure_threshold {
            return true;
        }
        let calls = health.window.len();
        if calls == 0 || calls < self.policy.minimum_calls {
            return false;
        }
        let failures = health.window.iter().filter(|failed| **failed).count();
        failures as f64 / calls as f64 > self.policy.failure_rate_threshold
    }

    fn lock(&self) -> MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission ticket for one call. A probe permit dropped without an outcome
/// (the caller's future was cancelled) frees the probe slot.
#[must_use]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.probe);
    }

    /// Settle without a health verdict (client-side errors).
    pub fn release(mut self) {
        self.settled = true;
        if self.probe {
            self.breaker.release_probe();
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}

/// Runs upstream calls under the circuit of their query kind and a per-call
/// timeout, substituting placeholders for health faults.
#[derive(Debug)]
pub struct ResilienceGuard {
    circuits: [CircuitBreaker; QueryKind::COUNT],
    call_timeout: Duration,
}

impl ResilienceGuard {
    pub fn new(call_timeout: Duration, policy_for: impl Fn(QueryKind) -> CircuitPolicy) -> Self {
        Self {
            circuits: QueryKind::ALL.map(|kind| CircuitBreaker::new(kind, policy_for(kind))),
            call_timeout,
        }
    }

    /// One circuit per query kind, with the configured defaults and
    /// overrides; the call timeout is `api.timeout_ms`.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.api.timeout(), |kind| cfg.circuit.policy_for(kind))
    }

    pub fn circuit(&self, kind: QueryKind) -> &CircuitBreaker {
        &self.circuits[kind.index()]
    }

    pub fn state(&self, kind: QueryKind) -> CircuitState {
        self.circuit(kind).state()
    }

    /// Run `call` for `query`. Health faults and open circuits yield
    /// `T::synthesize(query)` as a success; any other error is returned as is.
    #[instrument(skip_all, fields(kind = %query.kind()))]
    pub async fn execute<T, F, Fut>(&self, query: &CatalogQuery, call: F) -> CatalogResult<T>
    where
        T: Synthesize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let Some(permit) = self.circuit(query.kind()).try_acquire() else {
            debug!("circuit open; serving placeholder");
            return Ok(T::synthesize(query));
        };
        if permit.is_probe() {
            debug!("probe call admitted");
        }

        let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CatalogError::UpstreamUnreachable(format!(
                "no response within {} ms",
                self.call_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) if err.is_upstream_fault() => {
                permit.fail();
                warn!(?err, "upstream call failed; serving placeholder");
                Ok(T::synthesize(query))
            }
            Err(err) => {
                permit.release();
                Err(err)
            }
        }
    }
}
