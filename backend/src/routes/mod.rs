//! Route definitions for the Fiber Trade Ledger API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected_routes(state))
}

/// Ledger routes; every request must carry an actor token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/reports", report_routes())
        .nest("/lots", lot_routes())
        .nest("/deliveries", delivery_routes())
        .route("/analytics", get(handlers::get_analytics))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sales report routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_reports).post(handlers::submit_report))
        .route("/:report_id", get(handlers::get_report))
        .route("/:report_id/review", post(handlers::review_report))
}

/// Inventory lot routes
fn lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_lots).post(handlers::register_lot))
        .route("/:lot_id", get(handlers::get_lot))
}

/// Delivery routes
fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_deliveries).post(handlers::create_delivery),
        )
        .route(
            "/:delivery_id",
            get(handlers::get_delivery)
                .put(handlers::update_delivery)
                .delete(handlers::delete_delivery),
        )
        .route("/:delivery_id/deliver", post(handlers::mark_delivered))
        .route("/:delivery_id/complete", post(handlers::complete_delivery))
        .route("/:delivery_id/cancel", post(handlers::cancel_delivery))
}
