//! Request extractors.
//!
//! - [`CashierId`] - the authenticated cashier, from the `X-User-ID` header
//! - [`ApiJson`] / [`ApiQuery`] - `Json` / `Query` whose rejections render
//!   as [`ApiError`] bodies instead of axum's plain-text ones

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::error::ApiError;

/// Header the upstream gateway sets to the authenticated user's id.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// The cashier making the request.
///
/// Authentication happens upstream; this only trusts the gateway's header.
#[derive(Debug, Clone)]
pub struct CashierId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CashierId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;

        tracing::Span::current().record("user_id", user_id);

        Ok(CashierId(user_id.to_string()))
    }
}

/// JSON body extractor.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
