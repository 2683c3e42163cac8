use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, campaigns, handlers, order_sets, orders, queue, smm};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Action queue
        .route("/queue", get(queue::get_queue))
        .route("/sweep", post(queue::sweep_now))
        // Orders
        .route("/orders/{order_id}/import", post(orders::import_order))
        .route("/orders/{order_id}/deadline", get(orders::get_deadline))
        // Campaigns
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        .route("/campaigns/{id}/slots/{index}", put(campaigns::set_slot))
        .route(
            "/campaigns/{id}/direct-streams",
            post(campaigns::submit_direct_streams),
        )
        .route(
            "/campaigns/{id}/playlists-added",
            post(campaigns::confirm_playlists_added),
        )
        .route("/campaigns/{id}/removal", post(campaigns::confirm_removal))
        .route("/campaigns/{id}/hide", post(campaigns::hide_campaign))
        .route(
            "/campaigns/{id}/purchase-logs",
            get(campaigns::list_purchase_logs),
        )
        // Order set templates
        .route(
            "/order-sets",
            get(order_sets::list_order_sets).post(order_sets::create_order_set),
        )
        .route("/order-sets/{id}", put(order_sets::update_order_set))
        // SMM panel
        .route("/smm/balance", get(smm::get_balance))
        .route("/smm/services", get(smm::list_services))
        .route("/smm/orders/status", post(smm::get_order_statuses))
        .route("/smm/orders/{order_id}/status", get(smm::get_order_status))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
