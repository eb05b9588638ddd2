//! Forwards an admitted request to its resolved backend (§4.11 "Routing":
//! "Forward headers (minus hop-by-hop), method, query, and body"). The
//! concrete HTTP client follows `aegis-llm::HttpChatClient`'s
//! `reqwest::Client` construction style; the trait seam exists so the
//! engine's policy ordering can be tested without a live downstream.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use crate::entities::ServiceResponse;
use crate::error::{GatewayError, Result};

const HOP_BY_HOP_HEADERS: &[&str] = &["connection", "keep-alive", "proxy-authenticate", "proxy-authorization", "te", "trailers", "transfer-encoding", "upgrade"];

pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

fn strip_hop_by_hop(headers: BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers.into_iter().filter(|(k, _)| !HOP_BY_HOP_HEADERS.contains(&k.to_ascii_lowercase().as_str())).collect()
}

#[async_trait]
pub trait DownstreamClient: Send + Sync {
    async fn forward(&self, request: OutboundRequest) -> Result<ServiceResponse>;
}

pub struct ReqwestDownstreamClient {
    http: reqwest::Client,
}

impl Default for ReqwestDownstreamClient {
    fn default() -> Self {
        Self {
            http: reqwest::Client::builder().user_agent(concat!("aegis-gateway/", env!("CARGO_PKG_VERSION"))).build().expect("reqwest client builds"),
        }
    }
}

impl ReqwestDownstreamClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DownstreamClient for ReqwestDownstreamClient {
    async fn forward(&self, request: OutboundRequest) -> Result<ServiceResponse> {
        let span = tracing::info_span!("gateway.downstream.forward", method = %request.method, url = %request.url);
        async move {
            let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| GatewayError::Downstream(e.to_string()))?;
            let mut builder = self.http.request(method, &request.url).timeout(request.timeout);
            for (key, value) in strip_hop_by_hop(request.headers) {
                builder = builder.header(key, value);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let start = std::time::Instant::now();
            let response = builder.send().await.map_err(|e| GatewayError::Downstream(e.to_string()))?;
            let status_code = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();
            let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

            Ok(ServiceResponse {
                status_code,
                headers,
                body,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                cached: false,
            })
        }
        .instrument(span)
        .await
    }
}
