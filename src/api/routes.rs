use std::path::Path;

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeFile, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{
    json_method_not_allowed, make_span_with_request_id, request_id_middleware,
};

/// Creates the main API router with all routes
///
/// `static_dir` must contain the `index.html` landing page served at `/`.
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let index = static_dir.as_ref().join("index.html");

    Router::new()
        .route_service("/", ServeFile::new(index))
        .route("/health", get(handlers::health_check))
        // Recommendations
        .route(
            "/recommendations",
            get(handlers::list_recommendations).post(handlers::create_recommendation),
        )
        .route("/recommendations/reset", delete(handlers::reset_recommendations))
        .route(
            "/recommendations/category/:category_id",
            put(handlers::reassign_category),
        )
        .route(
            "/recommendations/:id",
            get(handlers::get_recommendation)
                .put(handlers::update_recommendation)
                .delete(handlers::delete_recommendation),
        )
        .fallback(handlers::route_not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive())
                .layer(middleware::map_response(json_method_not_allowed)),
        )
}
