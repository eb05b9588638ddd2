//! Per-service circuit breaker (§4.11): closed → open when the failure
//! count in a sliding window reaches `failure_threshold`; open →
//! half_open after `recovery_timeout`; half_open → closed on N
//! consecutive successes, half_open → open on any failure. Distinct from
//! `aegis_core::sandbox::CircuitBreaker` (a simpler consecutive-failure
//! counter for patch execution retries) — this one needs the explicit
//! half-open probe state the gateway's routing policy requires.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::entities::CircuitState;

#[derive(Debug, Clone)]
struct ServiceCircuit {
    state: CircuitState,
    failure_count: u32,
    consecutive_successes: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl ServiceCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes required to close (§4.11 "N
    /// consecutive successes"); the spec leaves N unspecified, so this
    /// defaults to 1 (any single half-open success closes the circuit),
    /// per DESIGN.md's Open Question decision.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_success_threshold: 1,
        }
    }
}

pub enum Admission {
    Allowed,
    Rejected { retry_after_secs: u64 },
}

#[derive(Default)]
pub struct CircuitBreakerRegistry {
    circuits: Mutex<HashMap<String, ServiceCircuit>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.11: evaluated at "circuit breaker" step, before the downstream
    /// call. Transitions an open circuit to half_open once the recovery
    /// timeout has elapsed.
    pub fn admit(&self, service: &str, config: &CircuitBreakerConfig) -> Admission {
        let now = Utc::now();
        let mut circuits = self.circuits.lock().unwrap();
        let circuit = circuits.entry(service.to_string()).or_insert_with(ServiceCircuit::new);

        if circuit.state == CircuitState::Open {
            let opened_at = circuit.opened_at.unwrap_or(now);
            let elapsed = now.signed_duration_since(opened_at).num_seconds().max(0) as u64;
            if elapsed >= config.recovery_timeout.as_secs() {
                circuit.state = CircuitState::HalfOpen;
                circuit.consecutive_successes = 0;
            } else {
                return Admission::Rejected { retry_after_secs: config.recovery_timeout.as_secs().saturating_sub(elapsed) };
            }
        }

        Admission::Allowed
    }

    /// §4.11: "recording of successes and failures happens after the
    /// downstream call returns (or times out)".
    pub fn record_success(&self, service: &str, config: &CircuitBreakerConfig) {
        let mut circuits = self.circuits.lock().unwrap();
        let circuit = circuits.entry(service.to_string()).or_insert_with(ServiceCircuit::new);
        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.consecutive_successes += 1;
                if circuit.consecutive_successes >= config.half_open_success_threshold {
                    circuit.state = CircuitState::Closed;
                    circuit.failure_count = 0;
                    circuit.opened_at = None;
                }
            }
            CircuitState::Closed => {
                circuit.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, service: &str, config: &CircuitBreakerConfig) {
        let mut circuits = self.circuits.lock().unwrap();
        let circuit = circuits.entry(service.to_string()).or_insert_with(ServiceCircuit::new);
        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Utc::now());
                circuit.consecutive_successes = 0;
            }
            CircuitState::Closed => {
                circuit.failure_count += 1;
                if circuit.failure_count >= config.failure_threshold {
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Utc::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state_of(&self, service: &str) -> CircuitState {
        self.circuits.lock().unwrap().get(service).map(|c| c.state).unwrap_or(CircuitState::Closed)
    }
}
