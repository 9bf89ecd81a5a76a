use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension, Json,
};
use courier_core::{render_query_result, CancellationFlag, MerchantsData, QueryMeta, QueryRequest};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_core_error, ApiError, ApiResponse, AppState};

/// Query string of `GET /merchants-by-location`. camelCase, with snake_case
/// accepted as an alias.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MerchantsQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(alias = "require_accepting_orders")]
    pub require_accepting_orders: Option<bool>,
    #[serde(alias = "include_ineligible")]
    pub include_ineligible: Option<bool>,
}

/// Raises the flag when the handler future is dropped, e.g. on client
/// disconnect, so the blocking query stops at its next check.
struct CancelOnDrop(CancellationFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

pub(super) async fn merchants_by_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<MerchantsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<MerchantsData, QueryMeta>>, ApiError> {
    let Query(query) = query
        .map_err(|rejection| ApiError::new(req_id.0.clone(), "bad_request", rejection.body_text()))?;

    let config = &state.config;
    let limit = query
        .limit
        .unwrap_or(i64::try_from(config.default_page_size).unwrap_or(i64::MAX))
        .min(i64::try_from(config.max_page_size).unwrap_or(i64::MAX));

    let request = QueryRequest::new(
        query.latitude,
        query.longitude,
        query.radius,
        limit,
        query.offset.unwrap_or(0),
        config.max_search_radius_meters,
    )
    .map_err(|e| map_core_error(req_id.0.clone(), &e))?
    .require_accepting_orders(query.require_accepting_orders.unwrap_or(true))
    .include_ineligible(query.include_ineligible.unwrap_or(false));

    let snapshot = state
        .snapshots
        .current()
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;

    let flag = CancellationFlag::new();
    let _cancel_guard = CancelOnDrop(flag.clone());
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.execute(&snapshot, &request, Some(&flag)))
        .await
        .map_err(|e| {
            tracing::error!(request_id = %req_id.0, error = %e, "query task failed");
            ApiError::new(req_id.0.clone(), "internal_error", "internal error")
        })?
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;

    tracing::debug!(
        request_id = %req_id.0,
        snapshot_version = result.snapshot_version,
        total_count = result.total_count,
        peak_hour = result.is_peak,
        "merchants-by-location answered"
    );

    let (data, meta) = render_query_result(result, req_id.0);
    Ok(Json(ApiResponse::new(data, meta)))
}
