use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    routing::{get, post},
    Router,
};
use cu_client::CuClient;
use tokio::sync::OwnedMutexGuard;

pub mod presets;
pub mod routes;

use presets::{PresetRegistry, DEFAULT_TEMPLATE_DIR};

/// Shared handler state, built once in `main` and handed to the router.
pub struct AppState {
    pub client: CuClient,
    pub presets: PresetRegistry,
    pub analyzer_locks: AnalyzerLocks,
}

impl AppState {
    pub fn new(client: CuClient, presets: PresetRegistry) -> Self {
        Self {
            client,
            presets,
            analyzer_locks: AnalyzerLocks::default(),
        }
    }
}

/// One async lock per analyzer id. Requests that name the same analyzer
/// run one after another so a batch never sees another batch's analyzer
/// or has it deleted underneath it.
#[derive(Debug, Default)]
pub struct AnalyzerLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AnalyzerLocks {
    pub async fn lock(&self, analyzer_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(analyzer_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub template_dir: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            template_dir: std::env::var("PRESET_TEMPLATE_DIR")
                .unwrap_or_else(|_| DEFAULT_TEMPLATE_DIR.to_string()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/api/run", post(routes::api_run))
        .route("/api/extract", post(routes::api_extract))
        .route("/api/dynamic", post(routes::api_dynamic))
        .route("/api/presets", get(routes::api_presets))
        .route("/api/presets/{name}", post(routes::api_run_preset))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // method + path only; request bodies carry document URLs
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
