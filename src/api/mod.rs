//! HTTP surface: PayFast callbacks and health check

pub mod health;
pub mod payfast;

use crate::payments::providers::payfast::{CANCEL_PATH, NOTIFY_PATH, RETURN_PATH};
use crate::payments::TransactionProcessor;
use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub environment: String,
    pub processor: Arc<TransactionProcessor>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(NOTIFY_PATH, any(payfast::notify))
        .route(RETURN_PATH, any(payfast::payment_return))
        .route(CANCEL_PATH, any(payfast::payment_cancel))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
