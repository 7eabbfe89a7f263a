//! `GET /cache/stats` and `POST /cache/reset` handlers for the demo binary.

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::cache::{CacheMetrics, ReadThroughCache};

pub type DemoCache = ReadThroughCache<String, String>;

#[derive(Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub hit_rate_percent: f64,
    pub total_requests: u64,
    pub entry_count: usize,
}

impl CacheStatsResponse {
    fn from_cache(cache: &DemoCache) -> Self {
        let metrics: CacheMetrics = cache.metrics();
        Self {
            hits: metrics.hits,
            misses: metrics.misses,
            invalidations: metrics.invalidations,
            hit_rate_percent: metrics.hit_rate(),
            total_requests: metrics.hits + metrics.misses,
            entry_count: cache.stats().len(),
        }
    }
}

/// `GET /cache/stats` — hit/miss/invalidation counters, ETag/Last-Modified
/// cacheable like any other read-mostly JSON endpoint.
pub async fn get_cache_stats(State(cache): State<Arc<DemoCache>>, headers: HeaderMap) -> Response {
    let response = CacheStatsResponse::from_cache(&cache);

    match crate::http_cache::cached_json_response(&headers, "cache:stats", &response, 5) {
        Ok(resp) => resp,
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// `POST /cache/reset` — zeroes the counters without touching stored
/// entries or in-flight lookups.
pub async fn reset_cache_stats(State(cache): State<Arc<DemoCache>>) -> Json<serde_json::Value> {
    cache.reset_metrics();
    Json(serde_json::json!({
        "status": "success",
        "message": "cache statistics reset",
    }))
}

pub fn routes(cache: Arc<DemoCache>) -> Router {
    Router::new()
        .route("/cache/stats", get(get_cache_stats))
        .route("/cache/reset", post(reset_cache_stats))
        .with_state(cache)
}
