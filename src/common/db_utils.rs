use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
// As policies de row-level-security do Postgres leem `app.user_id` e
// `app.tenant_id` via current_setting(). O bind precisa acontecer na MESMA
// conexão da pool que vai executar as queries escopadas — fazer o SET numa
// conexão e a query em outra deixa a query rodar sem escopo.

/// Adquire uma conexão da pool e define as variáveis RLS (a "chave").
///
/// Quando `tenant_id` é `None`, a variável de tenant é LIMPA em vez de
/// herdada de um checkout anterior da mesma conexão.
pub(crate) async fn get_rls_connection(
    pool: &PgPool,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
) -> Result<sqlx::pool::PoolConnection<Postgres>, AppError> {
    let mut conn = pool.acquire().await?;
    bind_rls(&mut conn, user_id, tenant_id).await?;
    Ok(conn)
}

/// Executa os dois SETs de sessão na conexão recebida.
///
/// Falha aqui aborta a unidade de trabalho: o chamador nunca deve seguir
/// para a query escopada com o bind pendente.
pub(crate) async fn bind_rls(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
) -> Result<(), AppError> {
    sqlx::query("SELECT set_config('app.user_id', $1, false)")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(AppError::RlsBindFailure)?;

    let tenant_value = tenant_id.map(|t| t.to_string()).unwrap_or_default();
    sqlx::query("SELECT set_config('app.tenant_id', $1, false)")
        .bind(tenant_value)
        .execute(&mut *conn)
        .await
        .map_err(AppError::RlsBindFailure)?;

    Ok(())
}

/// Variante transacional: o bind vale só até o COMMIT/ROLLBACK corrente
/// (`set_config(..., true)`). Usada pela reconciliação de identidade, onde
/// o INSERT do usuário precisa passar pela policy dentro da mesma transação.
pub(crate) async fn bind_rls_user_local(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query("SELECT set_config('app.user_id', $1, true)")
        .bind(user_id.to_string())
        .execute(conn)
        .await
        .map_err(AppError::RlsBindFailure)?;
    Ok(())
}
