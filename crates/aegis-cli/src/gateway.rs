//! `aegis gateway`: registers one demo service and route, issues a token,
//! and drives a single request through the full gateway pipeline (§4.11,
//! §5 "Gateway per-request ordering") twice in a row so the cache hit on
//! the second call is visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use aegis_core::config::AegisConfig;
use aegis_gateway::auth::{ApiKeyAuthenticator, TokenAuthenticator};
use aegis_gateway::downstream::ReqwestDownstreamClient;
use aegis_gateway::entities::{RouteDescriptor, ServiceRegistration, UserInfo};
use aegis_gateway::registry::ServiceRegistry;
use aegis_gateway::{Credential, GatewayEngine, IncomingRequest};

pub async fn run(backend_url: String) -> Result<()> {
    let config = AegisConfig::default();

    let token_auth = TokenAuthenticator::new("demo-signing-secret", 15);
    let api_key_auth = ApiKeyAuthenticator::new();
    let registry = ServiceRegistry::new();
    let downstream = Arc::new(ReqwestDownstreamClient::new());

    registry.register(ServiceRegistration::new("status-service", "1.0.0", vec![backend_url], "/health"));

    let user = UserInfo {
        user_id: "demo-user".to_string(),
        username: "demo".to_string(),
        roles: vec![aegis_gateway::entities::Role::Developer],
        permissions: vec!["status.read".to_string()],
    };
    let token = token_auth.issue(&user)?;
    println!("issued token: {}", token.access_token);

    let engine = GatewayEngine::new(token_auth, api_key_auth, registry, downstream);

    let route = RouteDescriptor {
        service: "status-service".to_string(),
        endpoint: "get-status".to_string(),
        method: "GET".to_string(),
        backend_path: "".to_string(),
        rate_limit_group: "default".to_string(),
        cache_enabled: true,
        cache_ttl_secs: config.cache_ttl_default,
        auth_required: true,
        required_roles: vec![],
        required_permissions: vec!["status.read".to_string()],
        circuit_breaker_group: "default".to_string(),
        timeout_secs: 10,
    };

    for attempt in 1..=2 {
        let request = IncomingRequest {
            route: route.clone(),
            credential: Some(Credential::BearerToken(token.access_token.clone())),
            api_version: "v1".to_string(),
            query: String::new(),
            headers: BTreeMap::new(),
            body: None,
        };
        let response = engine.handle_request(&config, request).await?;
        println!("\n== request #{attempt} ==");
        println!("status={} cached={} duration_ms={:.2}", response.status_code, response.cached, response.duration_ms);
    }

    println!("\n== metrics ==");
    println!("{}", serde_json::to_string_pretty(&engine.metrics().snapshot("status-service"))?);
    Ok(())
}
