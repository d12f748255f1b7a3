// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalhos de compatibilidade. Existem para ferramentas e clientes
// legados; quando o token traz a claim de tenant, ela SEMPRE ganha.
pub const TENANT_SCHEMA_HEADER: &str = "x-tenant-schema";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

const SCHEMA_PREFIX: &str = "tenant_";

// Tenant embutido no token validado, plantado nos extensions pelo
// auth_guard. É a fonte de maior prioridade da resolução.
#[derive(Debug, Clone, Copy)]
pub struct ClaimTenant(pub Option<Uuid>);

// Ausência de tenant é um estado legítimo, não erro.
#[derive(Debug, Clone, Copy)]
pub struct OptionalTenant(pub Option<Uuid>);

/// Decodifica o cabeçalho estilo schema: `tenant_<32 hex>` vira o UUID no
/// agrupamento canônico 8-4-4-4-12; o sufixo também pode vir já com traços.
/// Qualquer outra coisa é None.
pub fn tenant_from_schema(raw: &str) -> Option<Uuid> {
    let rest = raw.strip_prefix(SCHEMA_PREFIX)?;

    if rest.len() == 32 && rest.chars().all(|c| c.is_ascii_hexdigit()) {
        let dashed = format!(
            "{}-{}-{}-{}-{}",
            &rest[..8],
            &rest[8..12],
            &rest[12..16],
            &rest[16..20],
            &rest[20..]
        );
        Uuid::parse_str(&dashed).ok()
    } else {
        Uuid::parse_str(rest).ok()
    }
}

/// Resolução com prioridade fixa: claim do token, depois o cabeçalho de
/// schema, depois o cabeçalho direto de tenant-id. Fonte inválida cai para
/// a próxima; nenhuma fonte → None.
pub fn resolve_tenant(parts: &Parts) -> Option<Uuid> {
    if let Some(ClaimTenant(Some(tenant_id))) = parts.extensions.get::<ClaimTenant>() {
        return Some(*tenant_id);
    }

    if let Some(raw) = parts
        .headers
        .get(TENANT_SCHEMA_HEADER)
        .and_then(|value| value.to_str().ok())
        && let Some(tenant_id) = tenant_from_schema(raw)
    {
        return Some(tenant_id);
    }

    parts
        .headers
        .get(TENANT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

impl<S> FromRequestParts<S> for OptionalTenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalTenant(resolve_tenant(parts)))
    }
}
