// src/handlers/session.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, tenancy::OptionalTenant},
    models::session::{
        SessionRequest, SessionResponse, SetCurrentBreweryRequest, SetCurrentTenantRequest,
    },
};

// Mensagem única para qualquer falha de autenticação: o cliente não deve
// distinguir token ruim de claims ruins.
const AUTH_FAILED: &str = "Token de autenticação inválido ou ausente.";

// POST /api/session/create
#[utoipa::path(
    post,
    path = "/api/session/create",
    tag = "Session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Sessão criada a partir do token", body = SessionResponse),
        (status = 401, description = "Token inválido ou sem as claims obrigatórias", body = SessionResponse)
    ),
    params(
        ("x-tenant-schema" = Option<String>, Header, description = "Fallback legado: tenant_<32 hex>"),
        ("x-tenant-id" = Option<String>, Header, description = "Fallback legado: UUID do tenant")
    )
)]
pub async fn create_session(
    State(app_state): State<AppState>,
    OptionalTenant(header_tenant): OptionalTenant,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    match app_state
        .session_service
        .create_session_from_token(&payload.token, header_tenant)
        .await
    {
        Some(session) => Ok((
            StatusCode::OK,
            Json(SessionResponse::ok("Sessão criada com sucesso.", Some(session))),
        )),
        None => Ok((StatusCode::UNAUTHORIZED, Json(SessionResponse::fail(AUTH_FAILED)))),
    }
}

// GET /api/session/current
#[utoipa::path(
    get,
    path = "/api/session/current",
    tag = "Session",
    responses(
        (status = 200, description = "Sessão corrente", body = SessionResponse),
        (status = 404, description = "Sem sessão para o usuário", body = SessionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_current_session(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> impl IntoResponse {
    match app_state.session_service.get_session(principal.user_id).await {
        Some(session) => (
            StatusCode::OK,
            Json(SessionResponse::ok("Sessão encontrada.", Some(session))),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(SessionResponse::fail("Sessão não encontrada.")),
        ),
    }
}

// POST /api/session/set-current-tenant
#[utoipa::path(
    post,
    path = "/api/session/set-current-tenant",
    tag = "Session",
    request_body = SetCurrentTenantRequest,
    responses(
        (status = 200, description = "Tenant corrente atualizado", body = SessionResponse),
        (status = 400, description = "Tenant fora dos vínculos do usuário", body = SessionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn set_current_tenant(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<SetCurrentTenantRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let user_id = principal.user_id;
    let success = app_state
        .session_service
        .set_current_tenant(user_id, payload.tenant_id)
        .await;

    if !success {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(SessionResponse::fail(
                "Não foi possível definir o tenant corrente. Verifique o vínculo do usuário.",
            )),
        ));
    }

    let session = app_state.session_service.get_session(user_id).await;
    Ok((
        StatusCode::OK,
        Json(SessionResponse::ok("Tenant corrente atualizado.", session)),
    ))
}

// POST /api/session/set-current-brewery
#[utoipa::path(
    post,
    path = "/api/session/set-current-brewery",
    tag = "Session",
    request_body = SetCurrentBreweryRequest,
    responses(
        (status = 200, description = "Cervejaria corrente atualizada", body = SessionResponse),
        (status = 400, description = "Cervejaria fora do tenant corrente", body = SessionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn set_current_brewery(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<SetCurrentBreweryRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let user_id = principal.user_id;
    let success = app_state
        .session_service
        .set_current_brewery(user_id, payload.brewery_id)
        .await;

    if !success {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(SessionResponse::fail(
                "Não foi possível definir a cervejaria corrente. Verifique o vínculo e o tenant.",
            )),
        ));
    }

    let session = app_state.session_service.get_session(user_id).await;
    Ok((
        StatusCode::OK,
        Json(SessionResponse::ok("Cervejaria corrente atualizada.", session)),
    ))
}

// POST /api/session/refresh-tenants
#[utoipa::path(
    post,
    path = "/api/session/refresh-tenants",
    tag = "Session",
    responses(
        (status = 200, description = "Vínculos de tenant recarregados", body = SessionResponse),
        (status = 400, description = "Sem sessão para recarregar", body = SessionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn refresh_tenants(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> impl IntoResponse {
    let user_id = principal.user_id;
    if !app_state.session_service.refresh_tenant_data(user_id).await {
        return (
            StatusCode::BAD_REQUEST,
            Json(SessionResponse::fail("Não foi possível recarregar os tenants.")),
        );
    }

    let session = app_state.session_service.get_session(user_id).await;
    (
        StatusCode::OK,
        Json(SessionResponse::ok("Tenants recarregados.", session)),
    )
}

// POST /api/session/refresh-breweries
#[utoipa::path(
    post,
    path = "/api/session/refresh-breweries",
    tag = "Session",
    responses(
        (status = 200, description = "Vínculos de cervejaria recarregados", body = SessionResponse),
        (status = 400, description = "Sem sessão para recarregar", body = SessionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn refresh_breweries(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> impl IntoResponse {
    let user_id = principal.user_id;
    if !app_state.session_service.refresh_brewery_data(user_id).await {
        return (
            StatusCode::BAD_REQUEST,
            Json(SessionResponse::fail("Não foi possível recarregar as cervejarias.")),
        );
    }

    let session = app_state.session_service.get_session(user_id).await;
    (
        StatusCode::OK,
        Json(SessionResponse::ok("Cervejarias recarregadas.", session)),
    )
}

// POST /api/session/invalidate
#[utoipa::path(
    post,
    path = "/api/session/invalidate",
    tag = "Session",
    responses(
        (status = 200, description = "Sessão invalidada (logout)", body = SessionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn invalidate_session(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> impl IntoResponse {
    app_state.session_service.invalidate_session(principal.user_id).await;
    (
        StatusCode::OK,
        Json(SessionResponse::ok("Sessão invalidada.", None)),
    )
}
