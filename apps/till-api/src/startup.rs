//! Router construction.

use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::extract::USER_ID_HEADER;
use crate::handlers::{health, payment_methods, sales, sessions};
use crate::AppState;

/// Builds the application router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payment-methods", get(payment_methods::list_payment_methods))
        .route("/sales", post(sales::create_sale).get(sales::list_sales))
        .route("/sales/:id", get(sales::get_sale).put(sales::update_sale))
        .route("/pos-sessions", get(sessions::list_sessions))
        .route("/pos-sessions/open", post(sessions::open_session))
        .route("/pos-sessions/close", post(sessions::close_session))
        .route(
            "/pos-sessions/:id",
            get(sessions::get_session).put(sessions::update_session),
        )
        .route(
            "/pos-sessions/user/:user_id/open",
            get(sessions::get_open_session),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let cashier = request
                    .headers()
                    .get(USER_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = %cashier,
                )
            }),
        )
        .with_state(state)
}
