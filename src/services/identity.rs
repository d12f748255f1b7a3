// src/services/identity.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::bind_rls_user_local, error::AppError},
    db::UserRepository,
    models::auth::{Principal, User},
};

/// Política de precedência do merge de perfil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePrecedence {
    /// Campo já preenchido no registro existente nunca é sobrescrito
    /// (first-write-wins). É a política da reconciliação.
    KeepExisting,
    /// Valor não-vazio vindo da claim sempre ganha.
    PreferIncoming,
}

pub use crate::db::user_repo::ProfilePatch;

/// Calcula o patch de perfil a gravar sobre o registro existente.
///
/// Só campos de perfil entram aqui; e-mail é a chave de busca e nunca faz
/// parte do merge.
pub fn merge_profile(
    existing: &User,
    incoming: &Principal,
    precedence: MergePrecedence,
) -> ProfilePatch {
    fn pick(
        existing: Option<&str>,
        incoming: &str,
        precedence: MergePrecedence,
    ) -> Option<String> {
        if incoming.is_empty() {
            return None;
        }
        let existing_filled = existing.is_some_and(|v| !v.is_empty());
        match precedence {
            MergePrecedence::KeepExisting if existing_filled => None,
            _ if existing == Some(incoming) => None,
            _ => Some(incoming.to_string()),
        }
    }

    ProfilePatch {
        first_name: pick(existing.first_name.as_deref(), &incoming.first_name, precedence),
        last_name: pick(existing.last_name.as_deref(), &incoming.last_name, precedence),
        external_idp_id: pick(
            existing.external_idp_id.as_deref(),
            &incoming.external_id,
            precedence,
        ),
    }
}

/// Decide o id durável da identidade: um registro interno existente (achado
/// pelo e-mail) sempre ganha do id asserido pelo token; sem registro, o id
/// asserido vira o id interno do novo usuário.
pub fn resolve_durable_id(existing: Option<&User>, asserted: Uuid) -> Uuid {
    match existing {
        Some(user) => user.id,
        None => asserted,
    }
}

/// Mapeia a identidade asserida pelo token num registro interno durável.
///
/// Regra central: a busca é pelo E-MAIL, nunca pelo id asserido. O id vindo
/// do provedor externo é regenerável; um registro interno existente com o
/// mesmo e-mail sempre ganha, evitando usuário duplicado quando o provedor
/// troca de UUID.
#[derive(Clone)]
pub struct IdentityReconciler {
    user_repo: UserRepository,
    pool: PgPool,
}

impl IdentityReconciler {
    pub fn new(user_repo: UserRepository, pool: PgPool) -> Self {
        Self { user_repo, pool }
    }

    pub async fn reconcile(&self, principal: &Principal) -> Result<Uuid, AppError> {
        // Uma transação única cobre a busca, o INSERT e a releitura: a
        // escrita precisa estar visível para a próxima leitura da mesma
        // unidade de trabalho.
        let mut tx = self.pool.begin().await?;

        // Bind transacional do id asserido: se formos inserir, o INSERT
        // precisa passar pela policy de RLS com esse id.
        bind_rls_user_local(&mut tx, principal.user_id).await?;

        let existing = self.user_repo.find_by_email(&mut *tx, &principal.email).await?;
        let durable_id = resolve_durable_id(existing.as_ref(), principal.user_id);

        match existing {
            Some(user) => {
                if user.id != principal.user_id {
                    tracing::warn!(
                        "Conflito de reconciliação para {}: id interno {} difere do id \
                         asserido {}; mantendo o interno",
                        principal.email,
                        user.id,
                        principal.user_id
                    );
                }

                let patch = merge_profile(&user, principal, MergePrecedence::KeepExisting);
                if !patch.is_empty() {
                    self.user_repo.apply_profile_patch(&mut *tx, durable_id, &patch).await?;
                    tracing::info!("Perfil do usuário {} atualizado (backfill)", durable_id);
                }
            }
            None => {
                self.user_repo
                    .create_user(
                        &mut *tx,
                        durable_id,
                        &principal.email,
                        &principal.first_name,
                        &principal.last_name,
                        &principal.external_id,
                    )
                    .await?;

                // Releitura na mesma transação. Se o INSERT reportou sucesso
                // e a linha não aparece aqui, a fronteira transacional está
                // quebrada — logamos como erro de integridade e seguimos com
                // o id asserido em vez de derrubar o login.
                let verified = self.user_repo.find_by_id(&mut *tx, durable_id).await?;
                if verified.is_none() {
                    tracing::error!(
                        "Falha de verificação pós-escrita: usuário {} ({}) não visível \
                         após INSERT na mesma transação",
                        durable_id,
                        principal.email
                    );
                } else {
                    tracing::info!("Usuário {} criado para {}", durable_id, principal.email);
                }
            }
        }

        tx.commit().await?;
        Ok(durable_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn existing_user(first_name: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            first_name: first_name.map(String::from),
            last_name: None,
            external_idp_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn incoming(first_name: &str, last_name: &str) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            external_id: "idp-user-test-456".into(),
            email: "a@x.com".into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email_verified: true,
            role: "tenant".into(),
        }
    }

    #[test]
    fn existing_internal_id_wins_over_asserted_id() {
        let user = existing_user(Some("Ana"));
        let asserted = Uuid::new_v4();

        assert_eq!(resolve_durable_id(Some(&user), asserted), user.id);
    }

    #[test]
    fn asserted_id_is_adopted_only_without_existing_record() {
        let asserted = Uuid::new_v4();
        assert_eq!(resolve_durable_id(None, asserted), asserted);
    }

    #[test]
    fn repeated_logins_with_regenerated_idp_id_converge_on_one_record() {
        // Primeiro login: sem registro para o e-mail, o id asserido vira o
        // id interno. O provedor então regenera o UUID do usuário; o segundo
        // login encontra o mesmo e-mail e mantém o id interno — nenhum
        // segundo registro é criado.
        let first_asserted = Uuid::new_v4();
        let internal = resolve_durable_id(None, first_asserted);
        assert_eq!(internal, first_asserted);

        let mut user = existing_user(Some("Ana"));
        user.id = internal;

        let second_asserted = Uuid::new_v4();
        assert_eq!(resolve_durable_id(Some(&user), second_asserted), internal);
    }

    #[test]
    fn keep_existing_backfills_only_empty_fields() {
        let user = existing_user(Some("Ana"));
        let patch = merge_profile(&user, &incoming("Beatriz", "Souza"), MergePrecedence::KeepExisting);

        // first_name já preenchido: não sobrescreve. last_name e idp vazios: backfill.
        assert_eq!(patch.first_name, None);
        assert_eq!(patch.last_name, Some("Souza".into()));
        assert_eq!(patch.external_idp_id, Some("idp-user-test-456".into()));
    }

    #[test]
    fn prefer_incoming_overwrites_populated_fields() {
        let user = existing_user(Some("Ana"));
        let patch = merge_profile(&user, &incoming("Beatriz", ""), MergePrecedence::PreferIncoming);

        assert_eq!(patch.first_name, Some("Beatriz".into()));
        // Claim vazia nunca gera escrita, em nenhuma política.
        assert_eq!(patch.last_name, None);
    }

    #[test]
    fn identical_values_produce_no_patch() {
        let mut user = existing_user(Some("Ana"));
        user.last_name = Some("Souza".into());
        user.external_idp_id = Some("idp-user-test-456".into());

        let patch = merge_profile(&user, &incoming("Ana", "Souza"), MergePrecedence::PreferIncoming);
        assert!(patch.is_empty());
    }

    #[test]
    fn empty_incoming_profile_is_a_noop() {
        let user = existing_user(None);
        let mut principal = incoming("", "");
        principal.external_id.clear();

        let patch = merge_profile(&user, &principal, MergePrecedence::KeepExisting);
        assert!(patch.is_empty());
    }
}
