//! Per-provider circuit breaker.
//!
//! After `failure_threshold` consecutive failures a provider's circuit
//! opens and the router skips it. Once `recovery_timeout` has passed since
//! the last failure, exactly one probe call is admitted: success closes the
//! circuit, failure re-opens it and restarts the timeout.
//!
//! Time comes from `tokio::time::Instant` so tests can drive it with a
//! paused clock.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::providers::Provider;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Time after the last failure before a probe is admitted
    #[serde(with = "crate::config::duration_human")]
    pub recovery_timeout: Duration,

    /// When false an open circuit stays open until reset by hand.
    pub auto_recovery: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            auto_recovery: true,
        }
    }
}

/// Externally visible state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    /// A probe call is in flight.
    HalfOpen,
}

/// Whether a call may go to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, normal call.
    Closed,
    /// The single recovery probe.
    Probe,
    Rejected,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open,
    Probing { since: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Circuit {
    failures: u32,
    last_failure_at: Option<Instant>,
    phase: Phase,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            failures: 0,
            last_failure_at: None,
            phase: Phase::Closed,
        }
    }
}

/// Read-only view of one provider's circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub provider: Provider,
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,

    /// Time since the last recorded failure.
    #[serde(with = "crate::config::option_duration_human")]
    pub since_last_failure: Option<Duration>,
}

impl CircuitSnapshot {
    pub fn is_open(&self) -> bool {
        self.state != CircuitState::Closed
    }
}

/// Circuit breaker holding one circuit per provider.
pub struct CircuitBreaker {
    circuits: RwLock<HashMap<Provider, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Decide whether a call may go to `provider`.
    ///
    /// Admitting a probe moves the circuit to half-open, so concurrent
    /// callers are rejected until the probe reports back. A probe that has
    /// not reported back within `recovery_timeout` counts as abandoned.
    pub fn admit(&self, provider: Provider) -> Admission {
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(provider).or_default();
        let now = Instant::now();

        match circuit.phase {
            Phase::Closed => Admission::Closed,
            Phase::Open => {
                if !self.config.auto_recovery {
                    return Admission::Rejected;
                }
                let waited = circuit
                    .last_failure_at
                    .map(|at| now.duration_since(at))
                    .unwrap_or(Duration::MAX);
                if waited >= self.config.recovery_timeout {
                    circuit.phase = Phase::Probing { since: now };
                    tracing::info!(provider = %provider, "Circuit half-open, admitting probe");
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            Phase::Probing { since } => {
                if now.duration_since(since) >= self.config.recovery_timeout {
                    circuit.phase = Phase::Probing { since: now };
                    tracing::debug!(provider = %provider, "Previous probe abandoned, admitting another");
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Whether a call would be rejected right now. Does not admit a probe.
    pub fn is_open(&self, provider: Provider) -> bool {
        self.snapshot(provider).is_open()
    }

    /// Record a successful call. Closes the circuit from any state.
    pub fn record_success(&self, provider: Provider) {
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(provider).or_default();

        if !matches!(circuit.phase, Phase::Closed) {
            tracing::info!(provider = %provider, "Circuit closed after successful recovery");
        }
        *circuit = Circuit::default();
    }

    /// Record a failed call.
    pub fn record_failure(&self, provider: Provider) {
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(provider).or_default();
        let now = Instant::now();

        circuit.failures = circuit.failures.saturating_add(1);
        circuit.last_failure_at = Some(now);

        match circuit.phase {
            Phase::Closed => {
                if circuit.failures >= self.config.failure_threshold {
                    circuit.phase = Phase::Open;
                    tracing::warn!(
                        provider = %provider,
                        failures = circuit.failures,
                        "Circuit opened after repeated failures"
                    );
                }
            }
            Phase::Probing { .. } => {
                circuit.phase = Phase::Open;
                tracing::warn!(provider = %provider, "Circuit reopened after failed probe");
            }
            // A call admitted before the circuit opened; the timeout restarts.
            Phase::Open => {}
        }
    }

    pub fn snapshot(&self, provider: Provider) -> CircuitSnapshot {
        let circuit = self
            .circuits
            .read()
            .get(&provider)
            .copied()
            .unwrap_or_default();

        CircuitSnapshot {
            provider,
            state: match circuit.phase {
                Phase::Closed => CircuitState::Closed,
                Phase::Open => CircuitState::Open,
                Phase::Probing { .. } => CircuitState::HalfOpen,
            },
            failure_count: circuit.failures,
            threshold: self.config.failure_threshold,
            since_last_failure: circuit.last_failure_at.map(|at| at.elapsed()),
        }
    }

    /// Close one circuit and forget its failures.
    pub fn reset(&self, provider: Provider) {
        self.circuits.write().remove(&provider);
        tracing::info!(provider = %provider, "Circuit reset");
    }

    /// Close every circuit.
    pub fn reset_all(&self) {
        self.circuits.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("circuits", &self.circuits.read().len())
            .finish()
    }
}
