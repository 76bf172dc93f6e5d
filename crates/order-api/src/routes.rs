//! 路由配置

use axum::{Router, middleware, routing::get};
use order_shared::observability::middleware::http_tracing;

use crate::handlers;

pub fn api_routes() -> Router {
    Router::new()
        .route("/order", get(handlers::get_order))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(http_tracing))
}
