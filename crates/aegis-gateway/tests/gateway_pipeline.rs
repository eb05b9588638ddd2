//! Black-box test over `GatewayEngine`'s public API (§4.11, §5 "Gateway
//! per-request ordering", §8 scenarios 4 and 5), using only the public
//! surface a real caller (the CLI, or a future wire adapter) would see.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use aegis_core::config::AegisConfig;
use aegis_gateway::auth::{ApiKeyAuthenticator, TokenAuthenticator};
use aegis_gateway::downstream::{DownstreamClient, OutboundRequest};
use aegis_gateway::entities::{RouteDescriptor, ServiceRegistration, ServiceResponse, UserInfo};
use aegis_gateway::error::{GatewayError, Result};
use aegis_gateway::registry::ServiceRegistry;
use aegis_gateway::{Credential, GatewayEngine, IncomingRequest};

struct CountingDownstream {
    calls: AtomicU32,
}

#[async_trait]
impl DownstreamClient for CountingDownstream {
    async fn forward(&self, _request: OutboundRequest) -> Result<ServiceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ServiceResponse {
            status_code: 200,
            headers: BTreeMap::new(),
            body: serde_json::json!({"ok": true}),
            duration_ms: 1.0,
            cached: false,
        })
    }
}

fn engine(downstream: Arc<dyn DownstreamClient>) -> GatewayEngine {
    let registry = ServiceRegistry::new();
    registry.register(ServiceRegistration::new("status-service", "1.0.0", vec!["http://status.local".to_string()], "http://status.local/health"));
    GatewayEngine::new(TokenAuthenticator::new("an-integration-test-signing-secret", 15), ApiKeyAuthenticator::new(), registry, downstream)
}

fn route() -> RouteDescriptor {
    RouteDescriptor {
        service: "status-service".to_string(),
        endpoint: "get-status".to_string(),
        method: "GET".to_string(),
        backend_path: "/v1/status".to_string(),
        rate_limit_group: "demo".to_string(),
        cache_enabled: false,
        cache_ttl_secs: 60,
        auth_required: false,
        required_roles: vec![],
        required_permissions: vec![],
        circuit_breaker_group: "default".to_string(),
        timeout_secs: 5,
    }
}

fn request(route: RouteDescriptor) -> IncomingRequest {
    IncomingRequest {
        route,
        credential: None,
        api_version: "v1".to_string(),
        query: String::new(),
        headers: BTreeMap::new(),
        body: None,
    }
}

#[tokio::test]
async fn a_request_beyond_the_per_route_allowance_is_rate_limited() {
    let downstream = Arc::new(CountingDownstream { calls: AtomicU32::new(0) });
    let engine = engine(downstream.clone());
    let mut config = AegisConfig::default();
    config.rate_limit_groups.insert(
        "demo".to_string(),
        aegis_core::config::RateLimitGroup { requests: 2, window_seconds: 60 },
    );

    for _ in 0..2 {
        engine.handle_request(&config, request(route())).await.unwrap();
    }
    let err = engine.handle_request(&config, request(route())).await.unwrap_err();
    assert!(matches!(err, GatewayError::RateLimited { .. }));
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn two_users_on_the_same_route_get_independent_rate_limit_buckets() {
    let downstream = Arc::new(CountingDownstream { calls: AtomicU32::new(0) });
    let engine = engine(downstream.clone());
    let mut config = AegisConfig::default();
    config.rate_limit_groups.insert(
        "demo".to_string(),
        aegis_core::config::RateLimitGroup { requests: 1, window_seconds: 60 },
    );

    let token_auth = TokenAuthenticator::new("an-integration-test-signing-secret", 15);
    let alice = UserInfo { user_id: "alice".to_string(), username: "alice".to_string(), roles: vec![], permissions: vec![] };
    let bob = UserInfo { user_id: "bob".to_string(), username: "bob".to_string(), roles: vec![], permissions: vec![] };
    let alice_token = token_auth.issue(&alice).unwrap();
    let bob_token = token_auth.issue(&bob).unwrap();

    let mut alice_request = request(route());
    alice_request.credential = Some(Credential::BearerToken(alice_token.access_token));
    engine.handle_request(&config, alice_request).await.unwrap();

    let mut alice_request_again = request(route());
    alice_request_again.credential = Some(Credential::BearerToken(
        token_auth.issue(&alice).unwrap().access_token,
    ));
    let err = engine.handle_request(&config, alice_request_again).await.unwrap_err();
    assert!(matches!(err, GatewayError::RateLimited { .. }), "alice should be limited after one request");

    let mut bob_request = request(route());
    bob_request.credential = Some(Credential::BearerToken(bob_token.access_token));
    let response = engine.handle_request(&config, bob_request).await.unwrap();
    assert_eq!(response.status_code, 200, "bob's bucket is independent of alice's");

    assert_eq!(downstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cache_enabled_route_serves_the_second_identical_request_from_cache() {
    let downstream = Arc::new(CountingDownstream { calls: AtomicU32::new(0) });
    let engine = engine(downstream.clone());
    let config = AegisConfig::default();
    let mut cached_route = route();
    cached_route.cache_enabled = true;

    let first = engine.handle_request(&config, request(cached_route.clone())).await.unwrap();
    assert!(!first.cached);
    let second = engine.handle_request(&config, request(cached_route)).await.unwrap();
    assert!(second.cached);
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 1, "the cache hit must not reach the downstream client");
}

#[tokio::test]
async fn forwarding_to_an_unregistered_service_fails_without_touching_the_downstream_client() {
    let downstream = Arc::new(CountingDownstream { calls: AtomicU32::new(0) });
    let engine = engine(downstream.clone());
    let config = AegisConfig::default();
    let mut unknown_route = route();
    unknown_route.service = "nonexistent-service".to_string();

    let err = engine.handle_request(&config, request(unknown_route)).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 0);
}
