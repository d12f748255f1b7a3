// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::Principal;

// Versão do blob serializado no cache. Blob com versão desconhecida é
// tratado como "sem sessão" e reconstruído a partir do token.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

// ---
// 1. TenantRole (papel do usuário dentro de um tenant)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    Owner,
    Admin,
    Manager,
    Member,
    Viewer,
}

impl TenantRole {
    /// Papel vindo da coluna TEXT do banco. Valor desconhecido rebaixa
    /// para Viewer, nunca promove.
    pub fn from_db(raw: &str) -> TenantRole {
        match raw {
            "owner" => TenantRole::Owner,
            "admin" => TenantRole::Admin,
            "manager" => TenantRole::Manager,
            "member" => TenantRole::Member,
            "viewer" => TenantRole::Viewer,
            other => {
                tracing::warn!("Papel de tenant desconhecido '{}', usando viewer", other);
                TenantRole::Viewer
            }
        }
    }
}

// ---
// 2. MembershipState (ciclo de vida do vínculo)
// ---
// Soft-delete: vínculos nunca são removidos fisicamente, apenas desativados.
// Todo caminho de leitura usa o MESMO predicado de visibilidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Active,
    Deactivated,
}

impl MembershipState {
    pub fn from_flag(is_active: bool) -> MembershipState {
        if is_active { MembershipState::Active } else { MembershipState::Deactivated }
    }

    pub fn is_visible(self) -> bool {
        self == MembershipState::Active
    }
}

// ---
// 3. TenantMembership (vínculo usuário ↔ tenant, com projeção do plano)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantMembership {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub role: TenantRole,
    pub joined_at: DateTime<Utc>,
    pub state: MembershipState,

    // Projeção do plano (padrões do plano Starter quando o tenant não tem plano)
    pub plan_id: Option<Uuid>,
    pub plan_name: String,
    pub brewery_limit: i32,
    pub user_limit: i32,

    // Cobrança
    pub subscription_status: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl TenantMembership {
    pub fn is_owner(&self) -> bool {
        self.role == TenantRole::Owner
    }
}

// ---
// 4. BreweryMembership (acesso a uma cervejaria, derivado do tenant)
// ---
// Uma cervejaria pertence a exatamente um tenant; o acesso do usuário é
// transitivo pelo vínculo de tenant, nunca concedido direto.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BreweryMembership {
    pub brewery_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub role: TenantRole,
    pub created_at: DateTime<Utc>,
    pub state: MembershipState,
}

impl BreweryMembership {
    pub fn is_owner(&self) -> bool {
        self.role == TenantRole::Owner
    }
}

// ---
// 5. Session (a projeção cacheada por usuário)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub schema_version: u32,
    pub principal: Principal,

    pub tenants: Vec<TenantMembership>,
    pub current_tenant_id: Option<Uuid>,

    pub breweries: Vec<BreweryMembership>,
    pub current_brewery_id: Option<Uuid>,
    pub current_employee_id: Option<Uuid>,

    pub access_token: String,
    pub last_updated: DateTime<Utc>,
}

impl Session {
    pub fn new(principal: Principal, access_token: &str) -> Self {
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            principal,
            tenants: Vec::new(),
            current_tenant_id: None,
            breweries: Vec::new(),
            current_brewery_id: None,
            current_employee_id: None,
            access_token: access_token.to_string(),
            last_updated: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    fn visible_tenant(&self, tenant_id: Uuid) -> Option<&TenantMembership> {
        self.tenants
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.state.is_visible())
    }

    fn visible_brewery(&self, brewery_id: Uuid) -> Option<&BreweryMembership> {
        self.breweries
            .iter()
            .find(|b| b.brewery_id == brewery_id && b.state.is_visible())
    }

    /// Troca o tenant corrente. Só aceita um tenant presente (e visível) na
    /// lista de vínculos; caso contrário retorna false sem modificar nada.
    pub fn set_current_tenant(&mut self, tenant_id: Uuid) -> bool {
        if self.visible_tenant(tenant_id).is_none() {
            return false;
        }

        if self.current_tenant_id != Some(tenant_id) {
            // Cervejaria do tenant anterior não pode sobreviver à troca.
            self.current_brewery_id = None;
            self.current_employee_id = None;
        }
        self.current_tenant_id = Some(tenant_id);
        self.touch();
        true
    }

    /// Valida a seleção de uma cervejaria: precisa ser um vínculo visível e
    /// pertencer ao tenant corrente. Retorna o vínculo para o chamador
    /// (que ainda vai derivar o employee no banco).
    pub fn brewery_for_selection(&self, brewery_id: Uuid) -> Option<&BreweryMembership> {
        let brewery = self.visible_brewery(brewery_id)?;
        if self.current_tenant_id != Some(brewery.tenant_id) {
            return None;
        }
        Some(brewery)
    }

    /// Aplica a seleção de cervejaria já validada. O employee_id recebido
    /// substitui o anterior SEMPRE — inclusive por None, para nunca carregar
    /// o employee de uma cervejaria antiga.
    pub fn apply_brewery_selection(&mut self, brewery_id: Uuid, employee_id: Option<Uuid>) {
        self.current_brewery_id = Some(brewery_id);
        self.current_employee_id = employee_id;
        self.touch();
    }

    /// Substitui a lista de tenants por inteiro (nada de merge: vínculo
    /// que não voltou do banco não sobrevive ao refresh). Seleções correntes
    /// que apontem para vínculos sumidos são descartadas.
    pub fn replace_tenants(&mut self, tenants: Vec<TenantMembership>) {
        self.tenants = tenants;
        if let Some(current) = self.current_tenant_id
            && self.visible_tenant(current).is_none()
        {
            self.current_tenant_id = None;
            self.current_brewery_id = None;
            self.current_employee_id = None;
        }
        self.touch();
    }

    /// Idem para cervejarias.
    pub fn replace_breweries(&mut self, breweries: Vec<BreweryMembership>) {
        self.breweries = breweries;
        if let Some(current) = self.current_brewery_id
            && self.brewery_for_selection(current).is_none()
        {
            self.current_brewery_id = None;
            self.current_employee_id = None;
        }
        self.touch();
    }
}

// ---
// 6. DTOs da API de sessão
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[validate(length(min = 1, message = "O token é obrigatório."))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentTenantRequest {
    pub tenant_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentBreweryRequest {
    pub brewery_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<Session>,
}

impl SessionResponse {
    pub fn ok(message: &str, data: Option<Session>) -> Self {
        Self { success: true, message: message.to_string(), data }
    }

    pub fn fail(message: &str) -> Self {
        Self { success: false, message: message.to_string(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            external_id: "idp-user-test-123".into(),
            email: "brewer@x.com".into(),
            first_name: "Ana".into(),
            last_name: "Souza".into(),
            email_verified: true,
            role: "tenant".into(),
        }
    }

    fn tenant(id: Uuid, state: MembershipState) -> TenantMembership {
        TenantMembership {
            tenant_id: id,
            tenant_name: "Cervejaria Alfa".into(),
            role: TenantRole::Owner,
            joined_at: Utc::now(),
            state,
            plan_id: None,
            plan_name: "Starter".into(),
            brewery_limit: 1,
            user_limit: 3,
            subscription_status: None,
            trial_ends_at: None,
            current_period_end: None,
        }
    }

    fn brewery(id: Uuid, tenant_id: Uuid) -> BreweryMembership {
        BreweryMembership {
            brewery_id: id,
            tenant_id,
            name: "Unidade Centro".into(),
            role: TenantRole::Owner,
            created_at: Utc::now(),
            state: MembershipState::Active,
        }
    }

    #[test]
    fn set_current_tenant_rejects_unknown_tenant() {
        let mut session = Session::new(principal(), "tok");
        let t1 = Uuid::new_v4();
        session.tenants = vec![tenant(t1, MembershipState::Active)];

        assert!(!session.set_current_tenant(Uuid::new_v4()));
        assert_eq!(session.current_tenant_id, None);

        assert!(session.set_current_tenant(t1));
        assert_eq!(session.current_tenant_id, Some(t1));
    }

    #[test]
    fn set_current_tenant_rejects_deactivated_membership() {
        let mut session = Session::new(principal(), "tok");
        let t1 = Uuid::new_v4();
        session.tenants = vec![tenant(t1, MembershipState::Deactivated)];

        assert!(!session.set_current_tenant(t1));
        assert_eq!(session.current_tenant_id, None);
    }

    #[test]
    fn switching_tenant_drops_brewery_selection() {
        let mut session = Session::new(principal(), "tok");
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let b1 = Uuid::new_v4();
        session.tenants = vec![
            tenant(t1, MembershipState::Active),
            tenant(t2, MembershipState::Active),
        ];
        session.breweries = vec![brewery(b1, t1)];

        assert!(session.set_current_tenant(t1));
        session.apply_brewery_selection(b1, Some(Uuid::new_v4()));

        assert!(session.set_current_tenant(t2));
        assert_eq!(session.current_brewery_id, None);
        assert_eq!(session.current_employee_id, None);
    }

    #[test]
    fn brewery_selection_requires_matching_tenant() {
        let mut session = Session::new(principal(), "tok");
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let b2 = Uuid::new_v4();
        session.tenants = vec![
            tenant(t1, MembershipState::Active),
            tenant(t2, MembershipState::Active),
        ];
        session.breweries = vec![brewery(b2, t2)];
        session.set_current_tenant(t1);

        // Cervejaria pertence a t2, tenant corrente é t1: seleção recusada.
        assert!(session.brewery_for_selection(b2).is_none());

        session.set_current_tenant(t2);
        assert!(session.brewery_for_selection(b2).is_some());
    }

    #[test]
    fn brewery_switch_never_keeps_stale_employee() {
        let mut session = Session::new(principal(), "tok");
        let t1 = Uuid::new_v4();
        let (b1, b2) = (Uuid::new_v4(), Uuid::new_v4());
        let e1 = Uuid::new_v4();
        session.tenants = vec![tenant(t1, MembershipState::Active)];
        session.breweries = vec![brewery(b1, t1), brewery(b2, t1)];
        session.set_current_tenant(t1);

        session.apply_brewery_selection(b1, Some(e1));
        assert_eq!(session.current_employee_id, Some(e1));

        // B2 não tem registro de employee para este usuário.
        session.apply_brewery_selection(b2, None);
        assert_eq!(session.current_brewery_id, Some(b2));
        assert_eq!(session.current_employee_id, None);
    }

    #[test]
    fn refresh_drops_selections_that_disappeared() {
        let mut session = Session::new(principal(), "tok");
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let b1 = Uuid::new_v4();
        session.tenants = vec![tenant(t1, MembershipState::Active)];
        session.breweries = vec![brewery(b1, t1)];
        session.set_current_tenant(t1);
        session.apply_brewery_selection(b1, Some(Uuid::new_v4()));

        // O refresh volta só com t2: t1 foi desativado no banco.
        session.replace_tenants(vec![tenant(t2, MembershipState::Active)]);
        assert_eq!(session.current_tenant_id, None);
        assert_eq!(session.current_brewery_id, None);
        assert_eq!(session.current_employee_id, None);
    }

    #[test]
    fn ownership_follows_role() {
        let t = tenant(Uuid::new_v4(), MembershipState::Active);
        assert!(t.is_owner());

        let mut b = brewery(Uuid::new_v4(), Uuid::new_v4());
        assert!(b.is_owner());
        b.role = TenantRole::Member;
        assert!(!b.is_owner());
    }

    #[test]
    fn role_from_db_downgrades_unknown_values() {
        assert_eq!(TenantRole::from_db("owner"), TenantRole::Owner);
        assert_eq!(TenantRole::from_db("ceo"), TenantRole::Viewer);
    }
}
