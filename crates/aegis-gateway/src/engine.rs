//! The gateway request pipeline (§4.11, §5 "Gateway per-request
//! ordering"): auth → authorization → rate limit → circuit breaker →
//! cache lookup → forward → cache store → metrics → circuit-breaker
//! update. Any step that produces a terminal response skips all
//! subsequent steps except metrics.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use aegis_core::config::AegisConfig;

use crate::auth::{ApiKeyAuthenticator, TokenAuthenticator};
use crate::authz::authorize;
use crate::cache::{cache_key, ResponseCache};
use crate::circuit_breaker::{Admission, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::downstream::{DownstreamClient, OutboundRequest};
use crate::entities::{RouteDescriptor, ServiceResponse, UserInfo};
use crate::error::{GatewayError, Result};
use crate::metrics::{MetricsRegistry, RequestOutcome};
use crate::rate_limit::{RateLimitGroup, RateLimiter};
use crate::registry::ServiceRegistry;

pub enum Credential {
    BearerToken(String),
    ApiKey(String),
}

pub struct IncomingRequest {
    pub route: RouteDescriptor,
    pub credential: Option<Credential>,
    pub api_version: String,
    pub query: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

pub struct GatewayEngine {
    token_auth: TokenAuthenticator,
    api_key_auth: ApiKeyAuthenticator,
    rate_limiter: RateLimiter,
    circuit_breakers: CircuitBreakerRegistry,
    cache: ResponseCache,
    registry: ServiceRegistry,
    metrics: MetricsRegistry,
    downstream: Arc<dyn DownstreamClient>,
}

impl GatewayEngine {
    pub fn new(token_auth: TokenAuthenticator, api_key_auth: ApiKeyAuthenticator, registry: ServiceRegistry, downstream: Arc<dyn DownstreamClient>) -> Self {
        Self {
            token_auth,
            api_key_auth,
            rate_limiter: RateLimiter::new(),
            circuit_breakers: CircuitBreakerRegistry::new(),
            cache: ResponseCache::new(),
            registry,
            metrics: MetricsRegistry::new(),
            downstream,
        }
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    fn authenticate(&self, route: &RouteDescriptor, credential: &Option<Credential>, api_version: &str) -> Result<Option<UserInfo>> {
        match credential {
            Some(Credential::BearerToken(token)) => Ok(Some(self.token_auth.verify(token)?)),
            Some(Credential::ApiKey(key)) => Ok(Some(self.api_key_auth.verify(key, api_version, &route.service)?)),
            None if route.is_anonymous() => Ok(None),
            None => Err(GatewayError::Unauthorized),
        }
    }

    fn record_outcome(&self, service: &str, duration_ms: f64, status_code: u16, rate_limit_hit: bool, circuit_tripped: bool, cache_hit: bool) {
        self.metrics.record(&RequestOutcome {
            service: service.to_string(),
            duration_ms,
            status_code,
            rate_limit_hit,
            circuit_tripped,
            cache_hit,
        });
    }

    pub async fn handle_request(&self, config: &AegisConfig, request: IncomingRequest) -> Result<ServiceResponse> {
        let route = &request.route;
        let start = std::time::Instant::now();

        // auth
        let user = match self.authenticate(route, &request.credential, &request.api_version) {
            Ok(user) => user,
            Err(e) => {
                self.record_outcome(&route.service, start.elapsed().as_secs_f64() * 1000.0, e.status_code(), false, false, false);
                return Err(e);
            }
        };

        // authorization
        if let Err(e) = authorize(route, user.as_ref()) {
            self.record_outcome(&route.service, start.elapsed().as_secs_f64() * 1000.0, e.status_code(), false, false, false);
            return Err(e);
        }

        // rate limit
        let rate_group = config
            .rate_limit_groups
            .get(&route.rate_limit_group)
            .map(|g| RateLimitGroup { requests: g.requests, window_seconds: g.window_seconds })
            .unwrap_or(RateLimitGroup { requests: 100, window_seconds: 60 });
        let rate_key = format!("{}:{}:{}", route.service, route.endpoint, user.as_ref().map(|u| u.user_id.as_str()).unwrap_or("anonymous"));
        let decision = self.rate_limiter.check(&rate_key, &rate_group);
        if !decision.allowed {
            self.record_outcome(&route.service, start.elapsed().as_secs_f64() * 1000.0, 429, true, false, false);
            return Err(GatewayError::RateLimited { retry_after_secs: decision.retry_after_secs });
        }

        // circuit breaker
        let cb_group = config
            .circuit_breaker_groups
            .get(&route.circuit_breaker_group)
            .map(|g| CircuitBreakerConfig {
                failure_threshold: g.failure_threshold,
                recovery_timeout: Duration::from_secs(g.recovery_timeout_secs),
                ..Default::default()
            })
            .unwrap_or_default();
        if let Admission::Rejected { retry_after_secs } = self.circuit_breakers.admit(&route.service, &cb_group) {
            self.record_outcome(&route.service, start.elapsed().as_secs_f64() * 1000.0, 503, false, true, false);
            return Err(GatewayError::CircuitOpen { retry_after_secs });
        }

        // cache lookup
        let cacheable = route.method.eq_ignore_ascii_case("GET") && route.cache_enabled;
        let key = cache_key(&route.service, &route.endpoint, &route.method, &request.query);
        if cacheable {
            if let Some(cached) = self.cache.get(&key) {
                self.record_outcome(&route.service, start.elapsed().as_secs_f64() * 1000.0, cached.status_code, false, false, true);
                return Ok(cached);
            }
        }

        // forward
        let service_reg = match self.registry.resolve(&route.service) {
            Ok(reg) => reg,
            Err(e) => {
                self.record_outcome(&route.service, start.elapsed().as_secs_f64() * 1000.0, e.status_code(), false, false, false);
                return Err(e);
            }
        };
        let backend = service_reg.backends.first().cloned().ok_or_else(|| GatewayError::NotFound(route.service.clone()))?;
        let url = format!("{}{}", backend.trim_end_matches('/'), route.backend_path);
        let outbound = OutboundRequest {
            method: route.method.clone(),
            url,
            headers: request.headers.clone(),
            body: request.body.clone(),
            timeout: Duration::from_secs(route.timeout_secs),
        };

        let forward_result = self.downstream.forward(outbound).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match forward_result {
            Ok(response) => {
                // cache store
                if cacheable && response.status_code < 400 {
                    self.cache.put(&key, response.clone(), Duration::from_secs(route.cache_ttl_secs));
                }
                // metrics
                self.record_outcome(&route.service, elapsed_ms, response.status_code, false, false, false);
                // circuit-breaker update
                if response.status_code >= 500 {
                    self.circuit_breakers.record_failure(&route.service, &cb_group);
                } else {
                    self.circuit_breakers.record_success(&route.service, &cb_group);
                }
                Ok(response)
            }
            Err(e) => {
                self.record_outcome(&route.service, elapsed_ms, e.status_code(), false, false, false);
                self.circuit_breakers.record_failure(&route.service, &cb_group);
                Err(e)
            }
        }
    }
}
