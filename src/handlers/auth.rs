// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::{AuthResponse, RefreshTokenRequest},
        session::Session,
    },
};

const REFRESH_FAILED: &str = "Refresh token inválido ou expirado.";

// A claim de tenant da emissão reflete a seleção corrente da sessão.
fn current_tenant_claim(session: &Session) -> Option<(uuid::Uuid, &str)> {
    let tenant_id = session.current_tenant_id?;
    session
        .tenants
        .iter()
        .find(|t| t.tenant_id == tenant_id)
        .map(|t| (t.tenant_id, t.tenant_name.as_str()))
}

// POST /api/auth/token
#[utoipa::path(
    post,
    path = "/api/auth/token",
    tag = "Auth",
    responses(
        (status = 200, description = "Par access + refresh token emitido", body = AuthResponse),
        (status = 404, description = "Sem sessão para emitir tokens")
    ),
    security(("api_jwt" = []))
)]
pub async fn issue_tokens(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .session_service
        .get_session(principal.user_id)
        .await
        .ok_or(AppError::SessionNotFound)?;

    let pair = app_state
        .jwt_service
        .issue_token_pair(&session.principal, current_tenant_claim(&session))
        .await?;

    tracing::info!("Par de tokens emitido para {}", session.principal.display_name());
    Ok((
        StatusCode::OK,
        Json(AuthResponse::ok("Tokens emitidos com sucesso.", Some(pair))),
    ))
}

// POST /api/auth/refresh
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens renovados (com rotação do refresh token)", body = AuthResponse),
        (status = 401, description = "Refresh token inválido, expirado ou sem sessão", body = AuthResponse)
    )
)]
pub async fn refresh_tokens(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    if !app_state
        .jwt_service
        .validate_refresh_token(payload.user_id, &payload.refresh_token)
        .await
    {
        return Ok((StatusCode::UNAUTHORIZED, Json(AuthResponse::fail(REFRESH_FAILED))));
    }

    // Renovar exige uma sessão viva: logout revoga os refresh tokens, mas
    // sessão expirada pelo TTL também encerra a cadeia de renovação.
    let Some(session) = app_state.session_service.get_session(payload.user_id).await else {
        tracing::warn!("Refresh token válido sem sessão para {}", payload.user_id);
        return Ok((StatusCode::UNAUTHORIZED, Json(AuthResponse::fail(REFRESH_FAILED))));
    };

    // Rotação: o token apresentado é revogado antes do novo par existir.
    app_state.jwt_service.revoke_refresh_token(&payload.refresh_token).await;

    let pair = app_state
        .jwt_service
        .issue_token_pair(&session.principal, current_tenant_claim(&session))
        .await?;

    Ok((
        StatusCode::OK,
        Json(AuthResponse::ok("Tokens renovados com sucesso.", Some(pair))),
    ))
}
