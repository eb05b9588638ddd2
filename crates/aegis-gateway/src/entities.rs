//! Gateway entities (§4.11, §3 "the gateway entities"): route descriptors,
//! service registry records, auth principals, and the per-request
//! context/response pair. Grounded field-for-field on the original
//! `services/api-gateway/models/gateway_models.py` Pydantic models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Developer,
    Viewer,
}

/// Per-(service, endpoint) policy (§4.11 "Route descriptor").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub service: String,
    pub endpoint: String,
    pub method: String,
    pub backend_path: String,
    pub rate_limit_group: String,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub auth_required: bool,
    pub required_roles: Vec<Role>,
    pub required_permissions: Vec<String>,
    pub circuit_breaker_group: String,
    pub timeout_secs: u64,
}

impl RouteDescriptor {
    pub fn is_anonymous(&self) -> bool {
        !self.auth_required
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub service_id: String,
    pub name: String,
    pub version: String,
    /// Round-robin backend target list, carried over from the original's
    /// single `url` field generalized to many targets.
    pub backends: Vec<String>,
    pub health_check_url: String,
    pub status: ServiceStatus,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ServiceRegistration {
    pub fn new(name: impl Into<String>, version: impl Into<String>, backends: Vec<String>, health_check_url: impl Into<String>) -> Self {
        Self {
            service_id: Uuid::new_v4().to_string(),
            name: name.into(),
            version: version.into(),
            backends,
            health_check_url: health_check_url.into(),
            status: ServiceStatus::Healthy,
            last_health_check: None,
        }
    }

    /// §4.11 "stale > 5 min marks the service degraded".
    pub fn effective_status(&self, now: DateTime<Utc>) -> ServiceStatus {
        match self.last_health_check {
            Some(last) if now.signed_duration_since(last).num_seconds() > 300 => ServiceStatus::Degraded,
            Some(_) => self.status,
            None => ServiceStatus::Degraded,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub username: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<String>,
}

impl UserInfo {
    pub fn has_all_roles(&self, required: &[Role]) -> bool {
        required.iter().all(|r| self.roles.contains(r))
    }

    pub fn has_all_permissions(&self, required: &[String]) -> bool {
        required.iter().all(|p| self.permissions.contains(p))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Opaque API key record (§4.11 "key lookup is by SHA-256 of the raw key").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub key_hash: String,
    pub key_prefix: String,
    pub user: UserInfo,
    pub enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Empty set means "all allowed" (§4.11).
    pub allowed_api_versions: Vec<String>,
    pub allowed_services: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub endpoint: String,
    pub user: Option<UserInfo>,
    pub trace_id: String,
}

impl RequestContext {
    pub fn new(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            service: service.into(),
            endpoint: endpoint.into(),
            user: None,
            trace_id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Value,
    pub duration_ms: f64,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error_code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(status_code: u16, error_code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            status_code,
            error_code: error_code.into(),
            message: message.into(),
            details: None,
            trace_id: trace_id.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub response_time_ms_total: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limit_hits: u64,
    pub circuit_breaker_trips: u64,
}

impl ServiceMetrics {
    pub fn avg_response_time_ms(&self) -> f64 {
        if self.requests_total == 0 {
            0.0
        } else {
            self.response_time_ms_total / self.requests_total as f64
        }
    }
}
