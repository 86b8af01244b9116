//! Route definitions for the GreenLeaf storefront

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    handlers,
    middleware::{auth_middleware, optional_auth_middleware},
    AppState,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Catalog (public)
        .nest("/strains", strain_routes())
        // Cart (anonymous session or signed-in user)
        .nest("/cart", cart_routes(state.clone()))
        // Protected routes - checkout
        .nest("/checkout", checkout_routes(state.clone()))
        // Protected routes - order history
        .nest("/orders", order_routes(state.clone()))
        // Protected routes - admin role
        .nest("/admin", admin_routes(state))
}

/// Payment gateway callbacks (signature checked per request)
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/stripe", post(handlers::stripe_webhook))
}

/// Catalog routes (public)
fn strain_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_strains))
        .route("/featured", get(handlers::list_featured_strains))
        .route("/:slug", get(handlers::get_strain))
}

/// Cart routes (bearer token optional)
fn cart_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_cart).delete(handlers::clear_cart))
        .route("/items", post(handlers::add_to_cart))
        .route(
            "/items/:strain_id",
            put(handlers::update_cart_item).delete(handlers::remove_cart_item),
        )
        .route("/merge", post(handlers::merge_cart))
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}

/// Checkout routes (protected)
fn checkout_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_checkout))
        .route("/:session_id", get(handlers::get_checkout_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Order history routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_my_orders))
        .route("/:order_id", get(handlers::get_my_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Admin routes (protected, admin role checked by the `AdminUser` extractor)
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::admin_dashboard))
        .route("/orders", get(handlers::admin_list_orders))
        .route("/orders/export", get(handlers::admin_export_orders))
        .route("/orders/:order_id", get(handlers::admin_get_order))
        .route(
            "/orders/:order_id/status",
            put(handlers::admin_update_order_status),
        )
        .route("/strains", post(handlers::admin_create_strain))
        .route(
            "/strains/:strain_id",
            put(handlers::admin_update_strain).delete(handlers::admin_delete_strain),
        )
        .route("/inventory/low-stock", get(handlers::admin_low_stock))
        .route(
            "/inventory/:strain_id",
            get(handlers::admin_get_inventory).put(handlers::admin_set_inventory),
        )
        .route(
            "/inventory/:strain_id/adjust",
            post(handlers::admin_adjust_inventory),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
