//! Service registry (§4.11 "Routing"): resolves a service by name,
//! health-checked every 60s (run by the caller's own scheduler — this
//! registry just exposes `health_check_all` for that loop to call), with
//! staleness past 5 minutes marked degraded. Grounded on the original
//! `RoutingService`'s `_services` map, `_health_check_loop`, and
//! `get_service_status` staleness check.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::entities::{ServiceRegistration, ServiceStatus};
use crate::error::{GatewayError, Result};

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self, health_check_url: &str) -> bool;
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceRegistration>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, registration: ServiceRegistration) {
        self.services.write().unwrap().insert(registration.name.clone(), registration);
    }

    pub fn deregister(&self, name: &str) -> bool {
        self.services.write().unwrap().remove(name).is_some()
    }

    pub fn resolve(&self, name: &str) -> Result<ServiceRegistration> {
        self.services.read().unwrap().get(name).cloned().ok_or_else(|| GatewayError::NotFound(name.to_string()))
    }

    /// §4.11: status considers both the stored flag and health-check
    /// staleness, never the flag alone.
    pub fn effective_status(&self, name: &str) -> Option<ServiceStatus> {
        self.services.read().unwrap().get(name).map(|s| s.effective_status(Utc::now()))
    }

    /// Run one round of health checks against every registered service
    /// (§4.11 "health-checked every 60s" — the 60s cadence is the caller's
    /// scheduling responsibility, not this method's).
    pub async fn health_check_all(&self, probe: &dyn HealthProbe) {
        let snapshot: Vec<ServiceRegistration> = self.services.read().unwrap().values().cloned().collect();
        for service in snapshot {
            let healthy = probe.is_healthy(&service.health_check_url).await;
            let mut services = self.services.write().unwrap();
            if let Some(entry) = services.get_mut(&service.name) {
                entry.status = if healthy { ServiceStatus::Healthy } else { ServiceStatus::Down };
                entry.last_health_check = Some(Utc::now());
            }
            if !healthy {
                warn!(service = %service.name, "health check failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct AlwaysHealthy;

    #[async_trait]
    impl HealthProbe for AlwaysHealthy {
        async fn is_healthy(&self, _url: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn health_check_marks_registered_service_healthy() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceRegistration::new("scan", "1.0", vec!["http://scan.local".to_string()], "http://scan.local/health"));
        registry.health_check_all(&AlwaysHealthy).await;
        assert_eq!(registry.effective_status("scan"), Some(ServiceStatus::Healthy));
    }

    #[test]
    fn service_with_no_health_check_yet_is_degraded() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceRegistration::new("scan", "1.0", vec![], "http://scan.local/health"));
        assert_eq!(registry.effective_status("scan"), Some(ServiceStatus::Degraded));
    }

    #[test]
    fn stale_health_check_past_five_minutes_is_degraded() {
        let mut registration = ServiceRegistration::new("scan", "1.0", vec![], "http://scan.local/health");
        registration.status = ServiceStatus::Healthy;
        registration.last_health_check = Some(Utc::now() - Duration::minutes(6));
        assert_eq!(registration.effective_status(Utc::now()), ServiceStatus::Degraded);
    }

    #[test]
    fn unknown_service_resolves_to_not_found() {
        let registry = ServiceRegistry::new();
        assert!(registry.resolve("missing").is_err());
    }
}
