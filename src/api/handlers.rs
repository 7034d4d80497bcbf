//! API handlers

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::Uri,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::api::error::ApiError;
use crate::api::routes::{Params, Route};
use crate::api::AppState;

/// Decode a route's path parameters
///
/// Routes without captures get an empty map. Any other rejection (for
/// example a segment that is not valid UTF-8) fails the request before a
/// query is built.
pub fn path_params(
    route: &Route,
    params: Result<Path<Params>, PathRejection>,
) -> Result<Params, ApiError> {
    match params {
        Ok(Path(params)) => Ok(params),
        Err(PathRejection::MissingPathParams(_)) => Ok(Params::new()),
        Err(rejection) => {
            let message = rejection.body_text();
            tracing::warn!(route = route.path, error = %message, "Rejected path parameters");
            Err(ApiError::BadRequest(message))
        }
    }
}

/// Run one route: build its query, execute it, shape the rows
pub async fn run_route(
    state: AppState,
    route: &'static Route,
    params: Params,
) -> Result<Json<Vec<Value>>, ApiError> {
    let start = Instant::now();
    let query = route.query(&params);

    tracing::debug!(route = route.path, query = %query, "Executing query");

    let response = state.store.execute(&query).await.map_err(|e| {
        tracing::error!(route = route.path, error = %e, "Store round trip failed");
        ApiError::Internal(e)
    })?;

    if let Some(error) = response.error {
        tracing::warn!(
            route = route.path,
            code = error.code.as_deref().unwrap_or("-"),
            message = %error.message,
            "Store rejected query"
        );
        return Err(ApiError::Store(error));
    }

    let rows = route.shape.apply(response.data);
    if rows.is_empty() {
        return Err(ApiError::NotFound(route.not_found(&params)));
    }

    tracing::debug!(
        route = route.path,
        rows = rows.len(),
        took_ms = start.elapsed().as_millis() as u64,
        "Query complete"
    );

    Ok(Json(rows))
}

/// Health check
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.backend().to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

/// Unmatched paths
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("{} does not exist", uri.path()))
}
