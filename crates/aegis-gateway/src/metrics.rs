//! Metrics aggregation (§4.11 "Metrics"): per-service aggregates
//! (requests_total, requests_failed, response_time_ms, cache_hits,
//! cache_misses, rate_limit_hits, circuit_breaker_trips).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::entities::ServiceMetrics;

#[derive(Debug)]
pub struct RequestOutcome {
    pub service: String,
    pub duration_ms: f64,
    pub status_code: u16,
    pub rate_limit_hit: bool,
    pub circuit_tripped: bool,
    pub cache_hit: bool,
}

#[derive(Default)]
pub struct MetricsRegistry {
    by_service: Mutex<HashMap<String, ServiceMetrics>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        let mut by_service = self.by_service.lock().unwrap();
        let metrics = by_service.entry(outcome.service.clone()).or_default();
        metrics.requests_total += 1;
        metrics.response_time_ms_total += outcome.duration_ms;
        if outcome.status_code >= 400 {
            metrics.requests_failed += 1;
        }
        if outcome.cache_hit {
            metrics.cache_hits += 1;
        } else {
            metrics.cache_misses += 1;
        }
        if outcome.rate_limit_hit {
            metrics.rate_limit_hits += 1;
        }
        if outcome.circuit_tripped {
            metrics.circuit_breaker_trips += 1;
        }
    }

    pub fn snapshot(&self, service: &str) -> ServiceMetrics {
        self.by_service.lock().unwrap().get(service).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_across_multiple_requests() {
        let registry = MetricsRegistry::new();
        registry.record(&RequestOutcome {
            service: "scan".to_string(),
            duration_ms: 10.0,
            status_code: 200,
            rate_limit_hit: false,
            circuit_tripped: false,
            cache_hit: true,
        });
        registry.record(&RequestOutcome {
            service: "scan".to_string(),
            duration_ms: 20.0,
            status_code: 503,
            rate_limit_hit: false,
            circuit_tripped: true,
            cache_hit: false,
        });
        let snapshot = registry.snapshot("scan");
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.requests_failed, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.circuit_breaker_trips, 1);
        assert_eq!(snapshot.avg_response_time_ms(), 15.0);
    }
}
