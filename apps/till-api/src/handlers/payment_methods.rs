use axum::extract::State;
use axum::Json;
use serde::Serialize;

use till_core::PaymentMethod;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodsResponse {
    pub payment_methods: Vec<PaymentMethod>,
}

/// `GET /payment-methods` - active tender types.
pub async fn list_payment_methods(State(state): State<AppState>) -> ApiResult<Json<PaymentMethodsResponse>> {
    let payment_methods = state.db.payment_methods().list_active().await?;
    Ok(Json(PaymentMethodsResponse { payment_methods }))
}
