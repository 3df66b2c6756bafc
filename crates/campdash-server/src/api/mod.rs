mod campaigns;
mod catalog;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use campdash_core::{AppConfig, CampaignStore, CatalogStore, StoreError, ValidationError};
use campdash_db::{CatalogError, MetricsEngine, MetricsError, PgSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId, REQUEST_ID_HEADER};

/// Shared handler state.
///
/// The metrics engine sits behind one async mutex, so at most one metrics
/// computation runs at a time and all requests share its cache.
#[derive(Clone)]
pub struct AppState {
    pub source: PgSource,
    pub engine: Arc<Mutex<MetricsEngine<PgSource>>>,
    pub campaigns: CampaignStore,
    pub catalog: CatalogStore,
    /// Serializes read-modify-write appends to the campaign file.
    pub campaign_writes: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: &AppConfig, source: PgSource) -> Self {
        Self {
            engine: Arc::new(Mutex::new(MetricsEngine::new(source.clone()))),
            source,
            campaigns: CampaignStore::new(&config.campaigns_path),
            catalog: CatalogStore::new(&config.catalog_dir),
            campaign_writes: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

#[derive(Debug, Serialize)]
struct CacheClearData {
    cleared: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: &RequestId, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id.0.clone()),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "database_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_validation_error(request_id: &str, error: &ValidationError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

pub(super) fn map_store_error(request_id: &str, error: &StoreError) -> ApiError {
    tracing::error!(error = %error, "flat-file store access failed");
    ApiError::new(request_id, "internal_error", "failed to access local data files")
}

pub(super) fn map_catalog_error(request_id: &str, error: &CatalogError) -> ApiError {
    match error {
        CatalogError::Db(e) => {
            tracing::warn!(error = %e, "catalog rebuild failed: database unavailable");
            ApiError::new(request_id, "database_unavailable", "sales database unavailable")
        }
        CatalogError::Store(e) => map_store_error(request_id, e),
        CatalogError::Task(e) => map_task_error(request_id, e),
    }
}

pub(super) fn map_task_error(request_id: &str, error: &tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %error, "blocking file task failed");
    ApiError::new(request_id, "internal_error", "failed to access local data files")
}

/// Run a [`CampaignStore`] file operation on the blocking pool.
pub(super) async fn on_campaign_file<T, F>(
    request_id: &str,
    store: &CampaignStore,
    op: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CampaignStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| map_task_error(request_id, &e))?
        .map_err(|e| map_store_error(request_id, &e))
}

pub(super) fn map_metrics_error(request_id: &str, error: &MetricsError) -> ApiError {
    match error {
        MetricsError::Validation(e) => map_validation_error(request_id, e),
        MetricsError::Connectivity(e) => {
            tracing::warn!(error = %e, "metrics query failed");
            ApiError::new(request_id, "database_unavailable", "sales database unavailable")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/api/v1/catalog/stores", get(catalog::list_stores))
        .route("/api/v1/catalog/suppliers", get(catalog::list_suppliers))
        .route(
            "/api/v1/catalog/suppliers/{supplier}/groups",
            get(catalog::list_supplier_groups),
        )
        .route("/api/v1/catalog/refresh", post(catalog::refresh))
        .route("/api/v1/cache/clear", post(clear_cache))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match campdash_db::health_check(state.source.pool()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

/// POST /api/v1/cache/clear: forget memoized metrics so the next read
/// re-queries the database.
async fn clear_cache(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<CacheClearData>> {
    let mut engine = state.engine.lock().await;
    let cleared = engine.cache_len();
    engine.clear_cache();
    Json(ApiResponse::new(&req_id, CacheClearData { cleared }))
}

#[cfg(test)]
mod tests;
