//! Demo binary: an `axum` server fronting a [`ReadThroughCache`] over a
//! synthetic in-memory "backing store", so the crate is runnable and
//! observable end-to-end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use readthrough_cache::api::cache_stats::{self, DemoCache};
use readthrough_cache::cache::{NullServiceContext, ReadThroughCache, SimpleThreadPool};
use readthrough_cache::{env_config, error::CacheError, logging};

/// Stand-in for the authoritative data source the real lookup function
/// would call out to. Unbounded and untyped by design — it exists only to
/// give the cache's lookup function something to fetch; it deliberately
/// does not reintroduce persistence, TTL, or pinning of its own.
#[derive(Default)]
struct BackingStore {
    rows: StdMutex<HashMap<String, String>>,
}

impl BackingStore {
    fn seed() -> Self {
        let mut rows = HashMap::new();
        rows.insert("hello".to_string(), "world".to_string());
        Self {
            rows: StdMutex::new(rows),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.rows.lock().expect("backing store lock poisoned").get(key).cloned()
    }
}

#[derive(Deserialize)]
struct PutValue {
    value: String,
}

async fn get_value(
    State(cache): State<Arc<DemoCache>>,
    Path(key): Path<String>,
) -> Response {
    match cache.acquire_async(key).await {
        Ok(handle) if handle.is_present() => (
            StatusCode::OK,
            Json(serde_json::json!({
                "value": handle.get(),
                "valid": handle.is_valid(),
                "updated_at": handle.update_wall_clock_time(),
            })),
        )
            .into_response(),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(CacheError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn put_value(
    State(cache): State<Arc<DemoCache>>,
    Path(key): Path<String>,
    Json(body): Json<PutValue>,
) -> Response {
    let handle = cache.insert_or_assign(key, body.value, chrono::Utc::now());
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "value": handle.get(),
            "updated_at": handle.update_wall_clock_time(),
        })),
    )
        .into_response()
}

async fn delete_value(State(cache): State<Arc<DemoCache>>, Path(key): Path<String>) -> StatusCode {
    cache.invalidate(&key);
    StatusCode::NO_CONTENT
}

async fn invalidate_all(State(cache): State<Arc<DemoCache>>) -> Json<serde_json::Value> {
    cache.invalidate_all();
    Json(serde_json::json!({ "status": "success", "message": "all entries invalidated" }))
}

fn build_router(cache: Arc<DemoCache>) -> Router {
    let value_routes = Router::new()
        .route("/value/:key", get(get_value).post(put_value).delete(delete_value))
        .route("/invalidate-all", post(invalidate_all))
        .with_state(Arc::clone(&cache));

    Router::new()
        .merge(value_routes)
        .merge(cache_stats::routes(cache))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging()?;
    env_config::validate_env()?;
    env_config::log_env_config();

    let capacity = env_config::cache_capacity()?;
    let workers = env_config::cache_lookup_workers()?;
    let host = env_config::demo_host();
    let port = env_config::demo_port()?;

    let backing_store = Arc::new(BackingStore::seed());

    let cache: Arc<DemoCache> = Arc::new(ReadThroughCache::with_components(
        Arc::new(StdMutex::new(())),
        Arc::new(NullServiceContext),
        Arc::new(SimpleThreadPool::new(workers)),
        Arc::new(readthrough_cache::cache::DashMapLruStore::new(capacity)),
        Arc::new(readthrough_cache::cache::SystemClock),
        move |key: String, _op_ctx: Arc<dyn readthrough_cache::cache::OperationContext>| {
            let backing_store = Arc::clone(&backing_store);
            async move {
                tracing::debug!(%key, "running lookup round");
                Ok(backing_store.get(&key))
            }
        },
    ));

    let app = build_router(cache);

    let addr = format!("{host}:{port}");
    tracing::info!("cache-demo-server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
