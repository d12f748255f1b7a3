// src/services/session.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::get_rls_connection, error::AppError},
    db::MembershipRepository,
    models::session::Session,
    services::{
        claims::{extract_principal, tenant_from_claims},
        identity::IdentityReconciler,
        jwt::JwtService,
        session_store::SessionStore,
    },
};

/// Orquestra o ciclo de vida da sessão multi-tenant.
///
/// Máquina de estados da criação:
/// ValidarToken → ExtrairClaims → ReconciliarIdentidade → SessãoInicial →
/// Persistir → RefreshTenants → RefreshCervejarias → Fim.
/// Falha antes de Persistir aborta com None; falha de refresh depois disso
/// é logada e a sessão best-effort (listas possivelmente vazias) é entregue.
#[derive(Clone)]
pub struct SessionService {
    store: SessionStore,
    jwt: JwtService,
    reconciler: IdentityReconciler,
    membership_repo: MembershipRepository,
    pool: PgPool,
}

impl SessionService {
    pub fn new(
        store: SessionStore,
        jwt: JwtService,
        reconciler: IdentityReconciler,
        membership_repo: MembershipRepository,
        pool: PgPool,
    ) -> Self {
        Self { store, jwt, reconciler, membership_repo, pool }
    }

    pub async fn get_session(&self, user_id: Uuid) -> Option<Session> {
        self.store.get(user_id).await
    }

    /// Cria (ou recria) a sessão a partir de um bearer token.
    ///
    /// `header_tenant` é o fallback de compatibilidade resolvido dos
    /// cabeçalhos; a claim de tenant do próprio token sempre tem prioridade.
    pub async fn create_session_from_token(
        &self,
        token: &str,
        header_tenant: Option<Uuid>,
    ) -> Option<Session> {
        if !self.jwt.validate_token(token) {
            tracing::warn!("Token JWT inválido, sessão não criada");
            return None;
        }

        let claims = self.jwt.claims_from_token(token)?;

        let mut principal = match extract_principal(&claims) {
            Ok(principal) => principal,
            Err(e) => {
                tracing::warn!("Claims insuficientes para criar sessão: {}", e);
                return None;
            }
        };

        // A claim do token ganha do cabeçalho quando ambas existem.
        let initial_tenant = tenant_from_claims(&claims).or(header_tenant);

        // Id durável resolvido pelo e-mail. Erro de banco aqui degrada para
        // o id asserido em vez de derrubar o login.
        match self.reconciler.reconcile(&principal).await {
            Ok(durable_id) => principal.user_id = durable_id,
            Err(e) => {
                tracing::error!(
                    "Reconciliação de identidade falhou para {}: {}; usando id asserido",
                    principal.email,
                    e
                );
            }
        }
        let user_id = principal.user_id;

        let session = Session::new(principal, token);
        if !self.store.put(user_id, &session).await {
            return None;
        }

        let tenants_ok = self.refresh_tenant_data(user_id).await;
        let breweries_ok = self.refresh_brewery_data(user_id).await;
        if !tenants_ok || !breweries_ok {
            tracing::warn!(
                "Sessão de {} criada com dados incompletos (tenants: {}, cervejarias: {})",
                user_id,
                tenants_ok,
                breweries_ok
            );
        }

        // Tenant inicial só cola se aparecer na lista recém-carregada.
        if let Some(tenant_id) = initial_tenant && !self.set_current_tenant(user_id, tenant_id).await {
            tracing::warn!(
                "Tenant inicial {} não está nos vínculos de {}, ignorando",
                tenant_id,
                user_id
            );
        }

        match self.store.get(user_id).await {
            Some(fresh) => Some(fresh),
            None => Some(session),
        }
    }

    /// Troca o tenant corrente. Valida contra a lista cacheada de vínculos
    /// (não re-consulta o banco a cada troca — tradeoff documentado).
    pub async fn set_current_tenant(&self, user_id: Uuid, tenant_id: Uuid) -> bool {
        let Some(mut session) = self.store.get(user_id).await else {
            return false;
        };
        if !session.set_current_tenant(tenant_id) {
            tracing::warn!("Usuário {} sem vínculo visível com o tenant {}", user_id, tenant_id);
            return false;
        }
        self.store.put(user_id, &session).await
    }

    /// Troca a cervejaria corrente e re-deriva o employee de forma síncrona.
    pub async fn set_current_brewery(&self, user_id: Uuid, brewery_id: Uuid) -> bool {
        let Some(mut session) = self.store.get(user_id).await else {
            return false;
        };

        let Some(brewery_tenant) = session.brewery_for_selection(brewery_id).map(|b| b.tenant_id)
        else {
            tracing::warn!(
                "Cervejaria {} recusada para {}: sem vínculo visível ou tenant corrente divergente",
                brewery_id,
                user_id
            );
            return false;
        };

        // A consulta do employee roda na mesma conexão que recebeu o bind.
        // Se o bind falhar, nada é mutado.
        let mut conn =
            match get_rls_connection(&self.pool, user_id, Some(brewery_tenant)).await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("Bind RLS falhou ao trocar de cervejaria: {}", e);
                    return false;
                }
            };

        let employee_id = match self
            .membership_repo
            .find_active_employee(&mut *conn, user_id, brewery_id)
            .await
        {
            Ok(employee_id) => employee_id,
            Err(e) => {
                tracing::error!(
                    "Erro ao buscar employee de {} na cervejaria {}: {}",
                    user_id,
                    brewery_id,
                    e
                );
                return false;
            }
        };

        match employee_id {
            Some(id) => {
                tracing::info!("Employee {} encontrado para {} na cervejaria {}", id, user_id, brewery_id)
            }
            None => tracing::warn!(
                "Nenhum employee ativo para {} na cervejaria {}",
                user_id,
                brewery_id
            ),
        }

        session.apply_brewery_selection(brewery_id, employee_id);
        self.store.put(user_id, &session).await
    }

    /// Recarrega os vínculos de tenant do banco e substitui a lista por
    /// inteiro — vínculo desativado não sobrevive ao refresh.
    pub async fn refresh_tenant_data(&self, user_id: Uuid) -> bool {
        match self.try_refresh_tenants(user_id).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!("Erro ao recarregar tenants de {}: {}", user_id, e);
                false
            }
        }
    }

    async fn try_refresh_tenants(&self, user_id: Uuid) -> Result<bool, AppError> {
        let Some(mut session) = self.store.get(user_id).await else {
            tracing::warn!("Sem sessão para {}, refresh de tenants ignorado", user_id);
            return Ok(false);
        };

        let mut conn = get_rls_connection(&self.pool, user_id, None).await?;
        let tenants = self.membership_repo.tenant_memberships(&mut *conn, user_id).await?;
        tracing::info!("{} tenant(s) carregados para {}", tenants.len(), user_id);

        session.replace_tenants(tenants);
        Ok(self.store.put(user_id, &session).await)
    }

    /// Idem para cervejarias (derivadas transitivamente dos tenants).
    pub async fn refresh_brewery_data(&self, user_id: Uuid) -> bool {
        match self.try_refresh_breweries(user_id).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!("Erro ao recarregar cervejarias de {}: {}", user_id, e);
                false
            }
        }
    }

    async fn try_refresh_breweries(&self, user_id: Uuid) -> Result<bool, AppError> {
        let Some(mut session) = self.store.get(user_id).await else {
            tracing::warn!("Sem sessão para {}, refresh de cervejarias ignorado", user_id);
            return Ok(false);
        };

        let mut conn = get_rls_connection(&self.pool, user_id, None).await?;
        let breweries = self.membership_repo.brewery_memberships(&mut *conn, user_id).await?;
        tracing::info!("{} cervejaria(s) carregadas para {}", breweries.len(), user_id);

        session.replace_breweries(breweries);
        Ok(self.store.put(user_id, &session).await)
    }

    /// Logout: derruba a sessão cacheada e revoga os refresh tokens.
    pub async fn invalidate_session(&self, user_id: Uuid) -> bool {
        self.store.invalidate(user_id).await;
        self.jwt.revoke_all_user_tokens(user_id).await;
        true
    }
}
