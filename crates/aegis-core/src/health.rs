//! Health probe interface (C12). Generalizes the teacher's
//! `multi_repo::health::CIHealthView` rollup pattern (any-failed wins,
//! else any-degraded, else healthy) to an arbitrary set of named
//! dependencies (LLM client, scanner adapters, downstream services).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: ComponentStatus,
    pub last_checked: DateTime<Utc>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub components: Vec<ComponentHealth>,
    pub computed_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn overall(&self) -> ComponentStatus {
        if self.components.iter().any(|c| c.status == ComponentStatus::Unhealthy) {
            ComponentStatus::Unhealthy
        } else if self.components.iter().any(|c| c.status == ComponentStatus::Degraded) {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// A service is stale (and therefore degraded) past this age, per §4.11's
/// "health-checked every 60s; stale > 5 min marks the service degraded".
pub const STALE_AFTER_SECS: i64 = 5 * 60;

pub fn staleness_status(last_checked: DateTime<Utc>, now: DateTime<Utc>) -> ComponentStatus {
    if (now - last_checked).num_seconds() > STALE_AFTER_SECS {
        ComponentStatus::Degraded
    } else {
        ComponentStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn overall_escalates_to_worst_component() {
        let now = Utc::now();
        let report = HealthReport {
            components: vec![
                ComponentHealth {
                    name: "llm".to_string(),
                    status: ComponentStatus::Healthy,
                    last_checked: now,
                    detail: None,
                },
                ComponentHealth {
                    name: "scanner".to_string(),
                    status: ComponentStatus::Unhealthy,
                    last_checked: now,
                    detail: Some("timeout".to_string()),
                },
            ],
            computed_at: now,
        };
        assert_eq!(report.overall(), ComponentStatus::Unhealthy);
    }

    #[test]
    fn stale_past_five_minutes_is_degraded() {
        let now = Utc::now();
        let stale = now - Duration::seconds(301);
        assert_eq!(staleness_status(stale, now), ComponentStatus::Degraded);
        assert_eq!(staleness_status(now, now), ComponentStatus::Healthy);
    }
}
