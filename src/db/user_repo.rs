// src/db/user_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::auth::User};

// O repositório de usuários, responsável por todas as interações com a
// tabela 'users'. Os métodos recebem um executor para poderem rodar dentro
// da transação (e, portanto, da conexão com bind RLS) do chamador.
#[derive(Clone)]
pub struct UserRepository;

/// Campos que a reconciliação decidiu gravar no registro existente.
#[derive(Debug, Default, PartialEq)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub external_idp_id: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.external_idp_id.is_none()
    }
}

impl UserRepository {
    pub fn new() -> Self {
        Self
    }

    // Busca um usuário pelo seu e-mail (a chave natural durável)
    pub async fn find_by_email<'e, E>(
        &self,
        executor: E,
        email: &str,
    ) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe_user = sqlx::query_as::<_, User>(
            "SELECT id, email, first_name, last_name, external_idp_id, created_at, updated_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;
        Ok(maybe_user)
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe_user = sqlx::query_as::<_, User>(
            "SELECT id, email, first_name, last_name, external_idp_id, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(maybe_user)
    }

    // Cria um novo usuário com o id asserido pelo token. A conexão do
    // executor precisa estar com `app.user_id` já apontando para esse id,
    // senão o INSERT não passa pela policy de RLS.
    pub async fn create_user<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
        external_idp_id: &str,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, first_name, last_name, external_idp_id)
             VALUES ($1, $2, NULLIF($3, ''), NULLIF($4, ''), NULLIF($5, ''))
             RETURNING id, email, first_name, last_name, external_idp_id, created_at, updated_at",
        )
        .bind(id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(external_idp_id)
        .fetch_one(executor)
        .await?;
        Ok(user)
    }

    // Aplica o patch de backfill calculado pela reconciliação.
    pub async fn apply_profile_patch<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                external_idp_id = COALESCE($4, external_idp_id),
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(patch.external_idp_id.as_deref())
        .execute(executor)
        .await?;
        Ok(())
    }
}
