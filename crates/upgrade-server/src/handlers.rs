//! HTTP Handlers

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use upgrade_core::{Plan, RenderDirective, SessionId};

use crate::state::AppState;

/// Header carrying the flow session id in both directions
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: String,
    pub payments_configured: bool,
}

#[derive(Serialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NavigateQuery {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderQuery {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectPlanRequest {
    pub plan_id: String,
}

/// Render directive plus the session header
pub struct DirectiveResponse(pub RenderDirective);

impl IntoResponse for DirectiveResponse {
    fn into_response(self) -> Response {
        let mut response = Json(&self.0).into_response();
        if let Ok(value) = HeaderValue::from_str(self.0.session_id.as_str()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
        response
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request Context
// ============================================================================

/// Session id from the request, or a fresh one
fn session_id(headers: &HeaderMap) -> SessionId {
    headers
        .get(&SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(SessionId::new, SessionId::from_string)
}

/// Where the browser should come back to after checkout
///
/// An explicit `base_url` wins; otherwise the proxy headers, then `Host`.
fn request_base_url(headers: &HeaderMap, explicit: Option<String>) -> Option<String> {
    if explicit.is_some() {
        return explicit;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = header("x-forwarded-host").or_else(|| header("host"))?;
    let scheme = header("x-forwarded-proto").unwrap_or("http");
    Some(format!("{scheme}://{host}/"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let gateway = state.orchestrator.gateway();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: gateway.name().to_string(),
        payments_configured: gateway.is_configured(),
    })
}

/// Pricing catalog
pub async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    Json(PlansResponse {
        plans: state.orchestrator.plans().to_vec(),
    })
}

/// Navigation signal: `?page=premium|payment|confirmation`
pub async fn navigate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NavigateQuery>,
) -> DirectiveResponse {
    let id = session_id(&headers);
    let base_url = request_base_url(&headers, query.base_url);

    DirectiveResponse(
        state
            .orchestrator
            .navigate(&id, query.page.as_deref(), base_url.as_deref())
            .await,
    )
}

/// Re-render the current step
pub async fn current_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RenderQuery>,
) -> DirectiveResponse {
    let id = session_id(&headers);
    let base_url = request_base_url(&headers, query.base_url);

    DirectiveResponse(state.orchestrator.render(&id, base_url.as_deref()).await)
}

/// Plan card clicked
pub async fn select_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SelectPlanRequest>, JsonRejection>,
) -> Result<DirectiveResponse, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!("Rejected plan selection body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: rejection.body_text(),
                code: "INVALID_REQUEST".into(),
            }),
        )
    })?;

    let id = session_id(&headers);
    Ok(DirectiveResponse(
        state.orchestrator.select_plan(&id, &payload.plan_id).await,
    ))
}

/// "Return to Dashboard" on the confirmation page
pub async fn exit(State(state): State<AppState>, headers: HeaderMap) -> DirectiveResponse {
    let id = session_id(&headers);
    DirectiveResponse(state.orchestrator.exit(&id).await)
}

/// Drop all flow state for the session
pub async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = session_id(&headers);

    state.orchestrator.end_session(&id).await.map_err(|e| {
        tracing::error!(session_id = %id, "Failed to end session: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.user_message().into(),
                code: "SESSION_ERROR".into(),
            }),
        )
    })?;

    Ok(StatusCode::NO_CONTENT)
}
