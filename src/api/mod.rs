//! HTTP API server

use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use routes::{Params, Route, ROUTES};
pub use state::AppState;

/// Build the API router using the provided application state
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health));

    for route in ROUTES {
        router = router.route(
            route.path,
            get(
                move |State(state): State<AppState>,
                      params: Result<Path<Params>, PathRejection>| async move {
                    match handlers::path_params(route, params) {
                        Ok(params) => handlers::run_route(state, route, params).await,
                        Err(e) => Err(e),
                    }
                },
            ),
        );
    }

    router
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router with permissive CORS for browser clients
pub fn create_public_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state).layer(cors)
}
