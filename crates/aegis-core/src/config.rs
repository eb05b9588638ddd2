//! Runtime configuration (§6 "Configuration"). Defaults match the spec's
//! enumerated defaults verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitGroup {
    pub requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerGroup {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AegisConfig {
    pub ml_confidence_threshold: f64,
    pub similarity_threshold: f64,
    pub auto_patch_enabled: bool,
    pub patch_approval_required: bool,
    pub max_auto_patches_per_run: u32,
    pub artifact_storage_path: String,
    /// environment -> severity -> allowed count
    pub vulnerability_thresholds: BTreeMap<String, BTreeMap<String, u32>>,
    pub rate_limit_groups: BTreeMap<String, RateLimitGroup>,
    pub circuit_breaker_groups: BTreeMap<String, CircuitBreakerGroup>,
    pub cache_ttl_default: u64,
    pub llm: LlmConfig,
}

impl Default for AegisConfig {
    fn default() -> Self {
        let mut vulnerability_thresholds = BTreeMap::new();
        for env in ["development", "staging", "production"] {
            let mut per_severity = BTreeMap::new();
            let (critical, high, medium, low) = match env {
                "development" => (0, 5, 10, 20),
                "staging" => (0, 2, 5, 10),
                _ => (0, 0, 2, 5),
            };
            per_severity.insert("critical".to_string(), critical);
            per_severity.insert("high".to_string(), high);
            per_severity.insert("medium".to_string(), medium);
            per_severity.insert("low".to_string(), low);
            vulnerability_thresholds.insert(env.to_string(), per_severity);
        }

        let mut rate_limit_groups = BTreeMap::new();
        rate_limit_groups.insert(
            "default".to_string(),
            RateLimitGroup {
                requests: 100,
                window_seconds: 60,
            },
        );

        let mut circuit_breaker_groups = BTreeMap::new();
        circuit_breaker_groups.insert(
            "default".to_string(),
            CircuitBreakerGroup {
                failure_threshold: 5,
                recovery_timeout_secs: 30,
            },
        );

        Self {
            ml_confidence_threshold: 0.6,
            similarity_threshold: 0.8,
            auto_patch_enabled: true,
            patch_approval_required: true,
            max_auto_patches_per_run: 3,
            artifact_storage_path: "artifacts".to_string(),
            vulnerability_thresholds,
            rate_limit_groups,
            circuit_breaker_groups,
            cache_ttl_default: 300,
            llm: LlmConfig::default(),
        }
    }
}
