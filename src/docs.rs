// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::issue_tokens,
        handlers::auth::refresh_tokens,

        // --- Session ---
        handlers::session::create_session,
        handlers::session::get_current_session,
        handlers::session::set_current_tenant,
        handlers::session::set_current_brewery,
        handlers::session::refresh_tenants,
        handlers::session::refresh_breweries,
        handlers::session::invalidate_session,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Principal,
            models::auth::User,
            models::auth::TokenPair,
            models::auth::RefreshTokenRequest,
            models::auth::AuthResponse,

            // --- Session ---
            models::session::TenantRole,
            models::session::MembershipState,
            models::session::TenantMembership,
            models::session::BreweryMembership,
            models::session::Session,
            models::session::SessionRequest,
            models::session::SetCurrentTenantRequest,
            models::session::SetCurrentBreweryRequest,
            models::session::SessionResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Emissão e renovação de tokens (access + refresh)"),
        (name = "Session", description = "Sessão multi-tenant: criação a partir do token, troca de tenant/cervejaria e refresh de vínculos")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    pub fn with_security() -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        if let Some(components) = doc.components.as_mut() {
            components.add_security_scheme(
                "api_jwt",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
        doc
    }
}
