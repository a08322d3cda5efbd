//! `/pos-sessions` handlers.
//!
//! ```text
//! POST /pos-sessions/open                  {initialCash}                 201
//! POST /pos-sessions/close                 {sessionId, actualCash, notes?} 200
//! GET  /pos-sessions                       ?status=&cashierId=&from=&to=&page=&limit=
//! GET  /pos-sessions/:id                   {session, sales}
//! PUT  /pos-sessions/:id                   {notes}
//! GET  /pos-sessions/user/:userId/open     {hasOpenSession, session}     200 | 404
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use till_core::{CashSession, Money, Sale, SessionStatus, ValidationError};
use till_db::{PageRequest, Pagination, SessionFilter};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, CashierId};
use crate::AppState;

// =============================================================================
// Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionBody {
    pub initial_cash: Option<Money>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionBody {
    #[serde(default)]
    pub session_id: String,
    pub actual_cash: Option<Money>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionBody {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsParams {
    pub status: Option<SessionStatus>,
    pub cashier_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive match on the session notes.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SessionMessageResponse {
    pub msg: &'static str,
    pub session: CashSession,
}

#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub session: CashSession,
    pub sales: Vec<Sale>,
}

#[derive(Debug, Serialize)]
pub struct SessionsPage {
    pub sessions: Vec<CashSession>,
    pub pagination: Pagination,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /pos-sessions/open`
pub async fn open_session(
    State(state): State<AppState>,
    CashierId(cashier_id): CashierId,
    ApiJson(body): ApiJson<OpenSessionBody>,
) -> ApiResult<(StatusCode, Json<SessionMessageResponse>)> {
    let initial_cash = required(body.initial_cash, "initialCash")?;
    let session = state.db.drawer().open_session(&cashier_id, initial_cash).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionMessageResponse {
            msg: "Session opened successfully",
            session,
        }),
    ))
}

/// `POST /pos-sessions/close`
pub async fn close_session(
    State(state): State<AppState>,
    CashierId(cashier_id): CashierId,
    ApiJson(body): ApiJson<CloseSessionBody>,
) -> ApiResult<Json<SessionMessageResponse>> {
    if body.session_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "sessionId".to_string(),
        }
        .into());
    }
    let actual_cash = required(body.actual_cash, "actualCash")?;

    let session = state
        .db
        .drawer()
        .close_session(&body.session_id, actual_cash, body.notes.as_deref(), &cashier_id)
        .await?;

    Ok(Json(SessionMessageResponse {
        msg: "Session closed successfully",
        session,
    }))
}

/// `GET /pos-sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListSessionsParams>,
) -> ApiResult<Json<SessionsPage>> {
    let filter = SessionFilter {
        status: params.status,
        cashier_id: params.cashier_id,
        from: params.from,
        to: params.to,
        search: params.search,
    };
    let page = state
        .db
        .drawer()
        .list_sessions(&filter, PageRequest::new(params.page, params.limit))
        .await?;

    Ok(Json(SessionsPage {
        sessions: page.items,
        pagination: page.pagination,
    }))
}

/// `GET /pos-sessions/:id`
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionDetailResponse>> {
    let detail = state.db.drawer().get_session(&session_id).await?;

    Ok(Json(SessionDetailResponse {
        session: detail.session,
        sales: detail.sales,
    }))
}

/// `PUT /pos-sessions/:id`
pub async fn update_session(
    State(state): State<AppState>,
    CashierId(_): CashierId,
    Path(session_id): Path<String>,
    ApiJson(body): ApiJson<UpdateSessionBody>,
) -> ApiResult<Json<SessionMessageResponse>> {
    let notes = required(body.notes, "notes")?;
    let session = state.db.drawer().update_notes(&session_id, &notes).await?;

    Ok(Json(SessionMessageResponse {
        msg: "Session updated successfully",
        session,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionStatus {
    has_open_session: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<CashSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<&'static str>,
}

/// `GET /pos-sessions/user/:userId/open`
pub async fn get_open_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let response = match state.db.drawer().get_open_session(&user_id).await? {
        Some(session) => Json(OpenSessionStatus {
            has_open_session: true,
            session: Some(session),
            msg: None,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(OpenSessionStatus {
                has_open_session: false,
                session: None,
                msg: Some("No open session found for this user"),
            }),
        )
            .into_response(),
    };
    Ok(response)
}
