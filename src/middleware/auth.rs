// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::ClaimTenant,
    models::auth::Principal,
    services::claims::{extract_principal, tenant_from_claims},
};

// O middleware em si: valida o bearer token, normaliza as claims num
// Principal e o deixa nos "extensions" da requisição. A claim de tenant do
// token (se houver) vai junto, para o resolvedor de tenant consultar com
// prioridade sobre os cabeçalhos.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: axum::extract::Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::InvalidToken)?;

    let claims = app_state
        .jwt_service
        .claims_from_token(bearer.token())
        .ok_or(AppError::InvalidToken)?;

    let principal = extract_principal(&claims)?;
    let claim_tenant = ClaimTenant(tenant_from_claims(&claims));

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(claim_tenant);
    Ok(next.run(request).await)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
pub struct AuthenticatedUser(pub Principal);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(AppError::InvalidToken)
    }
}
