//! HTTP handlers for the main application: health, the validation endpoints
//! the wizard shell calls, and the authentication surface.

use crate::adapters::{CreditService, IdentityService};
use crate::auth::{AuthService, AuthSession, Profile, UserKind};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    CreditValidationRequest, CreditValidationResponse, IdentityValidationRequest,
    IdentityValidationResponse,
};
use crate::portal;
use crate::steps::validate_identity_submission;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub identity: IdentityService,
    pub credit: CreditService,
    pub auth: AuthService,
}

/// Health check endpoint. Kept outside the rate limiter so platform probes
/// are never throttled.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "telco-bpms-api",
        "mode": state.config.mode,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Identity validation for step 1. Input shape problems are a 400; provider
/// outcomes (including mismatches) come back in the envelope.
pub async fn validate_identity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IdentityValidationRequest>,
) -> Result<Json<IdentityValidationResponse>, AppError> {
    validate_identity_submission(&request)?;
    Ok(Json(state.identity.validate(&request).await))
}

/// Credit validation for step 4.
pub async fn validate_credit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreditValidationRequest>,
) -> Result<Json<CreditValidationResponse>, AppError> {
    if request.document_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Número de documento requerido".to_string(),
        ));
    }
    Ok(Json(state.credit.validate(&request).await))
}

#[derive(Debug, Deserialize)]
pub struct AdvisorLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLoginRequest {
    pub document_number: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

pub async fn login_advisor(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AdvisorLoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = state
        .auth
        .login_advisor(&request.email, &request.password)
        .await?;
    Ok(Json(session))
}

pub async fn login_client(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClientLoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = state.auth.login_client(&request.document_number).await?;
    Ok(Json(session))
}

pub async fn session_info(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<AuthSession>, AppError> {
    state
        .auth
        .session(&request.token)
        .await
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Sesión inválida o expirada".to_string()))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> impl IntoResponse {
    state.auth.logout(&request.token).await;
    Json(json!({ "success": true }))
}

/// Client portal view: resolves the case bound to the client session.
/// Advisor sessions are rejected; the case list is their surface.
pub async fn client_case_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = state.auth.require(&request.token, UserKind::Client).await?;
    let Profile::Client(profile) = session.profile else {
        return Err(AppError::Unauthorized(
            "Sesión sin permisos para esta operación".to_string(),
        ));
    };

    let case = portal::client_case(&profile.case_number).ok_or_else(|| {
        AppError::NotFound(format!("Caso no encontrado: {}", profile.case_number))
    })?;

    Ok(Json(json!({ "success": true, "case": case })))
}
