// src/db/membership_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::session::{BreweryMembership, MembershipState, TenantMembership, TenantRole},
};

// Limites do plano Starter, usados quando o tenant não tem linha em 'plans'.
const STARTER_PLAN_NAME: &str = "Starter";
const STARTER_BREWERY_LIMIT: i32 = 1;
const STARTER_USER_LIMIT: i32 = 3;

// Linhas cruas do banco; a conversão para o modelo de domínio (enum de
// papel, estado de vínculo) acontece no From logo abaixo.
#[derive(sqlx::FromRow)]
struct TenantMembershipRow {
    tenant_id: Uuid,
    tenant_name: String,
    role: String,
    is_active: bool,
    joined_at: DateTime<Utc>,
    plan_id: Option<Uuid>,
    plan_name: Option<String>,
    brewery_limit: Option<i32>,
    user_limit: Option<i32>,
    subscription_status: Option<String>,
    trial_ends_at: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
}

impl From<TenantMembershipRow> for TenantMembership {
    fn from(row: TenantMembershipRow) -> Self {
        TenantMembership {
            tenant_id: row.tenant_id,
            tenant_name: row.tenant_name,
            role: TenantRole::from_db(&row.role),
            joined_at: row.joined_at,
            state: MembershipState::from_flag(row.is_active),
            plan_id: row.plan_id,
            plan_name: row.plan_name.unwrap_or_else(|| STARTER_PLAN_NAME.to_string()),
            brewery_limit: row.brewery_limit.unwrap_or(STARTER_BREWERY_LIMIT),
            user_limit: row.user_limit.unwrap_or(STARTER_USER_LIMIT),
            subscription_status: row.subscription_status,
            trial_ends_at: row.trial_ends_at,
            current_period_end: row.current_period_end,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BreweryMembershipRow {
    brewery_id: Uuid,
    tenant_id: Uuid,
    name: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<BreweryMembershipRow> for BreweryMembership {
    fn from(row: BreweryMembershipRow) -> Self {
        BreweryMembership {
            brewery_id: row.brewery_id,
            tenant_id: row.tenant_id,
            name: row.name,
            role: TenantRole::from_db(&row.role),
            created_at: row.created_at,
            state: MembershipState::from_flag(row.is_active),
        }
    }
}

// Consultas de vínculo usuário ↔ tenant/cervejaria. TODAS rodam no executor
// recebido do chamador, que é a conexão já com bind RLS — nunca direto na
// pool.
#[derive(Clone)]
pub struct MembershipRepository;

impl MembershipRepository {
    pub fn new() -> Self {
        Self
    }

    /// Tenants do usuário, com a projeção do plano (user_tenants × tenants × plans).
    pub async fn tenant_memberships<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<TenantMembership>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, TenantMembershipRow>(
            "SELECT
                ut.tenant_id,
                t.name AS tenant_name,
                ut.role,
                ut.is_active,
                ut.created_at AS joined_at,
                p.id AS plan_id,
                p.name AS plan_name,
                p.brewery_limit,
                p.user_limit,
                t.subscription_status,
                t.trial_ends_at,
                t.current_period_end
             FROM user_tenants ut
             JOIN tenants t ON t.id = ut.tenant_id
             LEFT JOIN plans p ON p.id = t.plan_id
             WHERE ut.user_id = $1 AND ut.is_active = TRUE
             ORDER BY ut.created_at",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(TenantMembership::from).collect())
    }

    /// Cervejarias acessíveis ao usuário, transitivamente pelos vínculos de
    /// tenant (user_tenants × breweries).
    pub async fn brewery_memberships<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<BreweryMembership>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, BreweryMembershipRow>(
            "SELECT
                b.id AS brewery_id,
                b.tenant_id,
                b.name,
                ut.role,
                ut.is_active,
                b.created_at
             FROM user_tenants ut
             JOIN breweries b ON b.tenant_id = ut.tenant_id
             WHERE ut.user_id = $1 AND ut.is_active = TRUE
             ORDER BY b.created_at",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(BreweryMembership::from).collect())
    }

    /// Employee ativo do usuário numa cervejaria, se existir.
    pub async fn find_active_employee<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        brewery_id: Uuid,
    ) -> Result<Option<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let employee_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM employees
             WHERE user_id = $1 AND brewery_id = $2 AND is_active = TRUE",
        )
        .bind(user_id)
        .bind(brewery_id)
        .fetch_optional(executor)
        .await?;
        Ok(employee_id)
    }
}
