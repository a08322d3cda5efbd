//! `/sales` handlers.
//!
//! ```text
//! POST /sales        create, link to the cashier's open session   201
//! PUT  /sales/:id    replace items and payments                   200
//! GET  /sales        newest first, ?cashierId=&page=&limit=       200
//! GET  /sales/:id                                                  200 | 404
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use till_core::{CoreError, Sale, SaleRequest};
use till_db::{PageRequest, Pagination};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, CashierId};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleResponse {
    pub msg: &'static str,
    pub sale: Sale,
    pub added_to_session: bool,
}

#[derive(Debug, Serialize)]
pub struct SaleMessageResponse {
    pub msg: &'static str,
    pub sale: Sale,
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub sale: Sale,
}

#[derive(Debug, Serialize)]
pub struct SalesPage {
    pub sales: Vec<Sale>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesParams {
    pub cashier_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `POST /sales`
pub async fn create_sale(
    State(state): State<AppState>,
    CashierId(cashier_id): CashierId,
    ApiJson(request): ApiJson<SaleRequest>,
) -> ApiResult<(StatusCode, Json<CreateSaleResponse>)> {
    let created = state.db.checkout().create_sale(&cashier_id, &request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSaleResponse {
            msg: "Sale created successfully",
            sale: created.sale,
            added_to_session: created.added_to_session,
        }),
    ))
}

/// `PUT /sales/:id`
pub async fn update_sale(
    State(state): State<AppState>,
    CashierId(cashier_id): CashierId,
    Path(sale_id): Path<String>,
    ApiJson(request): ApiJson<SaleRequest>,
) -> ApiResult<Json<SaleMessageResponse>> {
    debug!(sale_id = %sale_id, requested_by = %cashier_id, "Updating sale");
    let sale = state.db.checkout().update_sale(&sale_id, &request).await?;

    Ok(Json(SaleMessageResponse {
        msg: "Sale updated successfully",
        sale,
    }))
}

/// `GET /sales/:id`
pub async fn get_sale(State(state): State<AppState>, Path(sale_id): Path<String>) -> ApiResult<Json<SaleResponse>> {
    let sale = state
        .db
        .sales()
        .get_by_id(&sale_id)
        .await?
        .ok_or(CoreError::SaleNotFound(sale_id))?;

    Ok(Json(SaleResponse { sale }))
}

/// `GET /sales`
pub async fn list_sales(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListSalesParams>,
) -> ApiResult<Json<SalesPage>> {
    let page = state
        .db
        .sales()
        .list(params.cashier_id.as_deref(), PageRequest::new(params.page, params.limit))
        .await?;

    Ok(Json(SalesPage {
        sales: page.items,
        pagination: page.pagination,
    }))
}
