//! Catalog handlers. Reads rebuild a missing cache file from the database.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use campdash_core::Store;
use campdash_db::{
    load_groups_or_rebuild, load_stores_or_rebuild, load_suppliers_or_rebuild, refresh_catalog,
    CatalogSummary,
};

use crate::middleware::RequestId;

use super::{map_catalog_error, ApiError, ApiResponse, AppState};

pub(in crate::api) async fn list_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Store>>>, ApiError> {
    let stores = load_stores_or_rebuild(&state.source, &state.catalog)
        .await
        .map_err(|e| map_catalog_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(&req_id, stores)))
}

pub(in crate::api) async fn list_suppliers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let suppliers = load_suppliers_or_rebuild(&state.source, &state.catalog)
        .await
        .map_err(|e| map_catalog_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(&req_id, suppliers)))
}

/// Unknown suppliers yield an empty list rather than 404.
pub(in crate::api) async fn list_supplier_groups(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(supplier): Path<String>,
) -> Result<Json<ApiResponse<BTreeSet<String>>>, ApiError> {
    let groups = load_groups_or_rebuild(&state.source, &state.catalog, &supplier)
        .await
        .map_err(|e| map_catalog_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(&req_id, groups)))
}

/// POST /api/v1/catalog/refresh
pub(in crate::api) async fn refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CatalogSummary>>, ApiError> {
    let summary = refresh_catalog(&state.source, &state.catalog)
        .await
        .map_err(|e| map_catalog_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(&req_id, summary)))
}
