// src/config.rs

use std::{env, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{MembershipRepository, UserRepository},
    services::{
        identity::IdentityReconciler, jwt::JwtService, session::SessionService,
        session_store::SessionStore,
    },
};

const DEFAULT_JWT_EXPIRY_MINUTES: i64 = 60;
const DEFAULT_SESSION_TTL_HOURS: u64 = 24;

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub session_service: SessionService,
}

impl AppState {
    // Carrega as configurações do ambiente e monta o gráfico de serviços.
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "cervejaria-api".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "cervejaria-app".to_string());

        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_JWT_EXPIRY_MINUTES);
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        // O cache de sessões nasce aqui, uma única vez, e é injetado no
        // serviço — nenhum estado ambiente/global.
        let jwt_service =
            JwtService::new(jwt_secret, jwt_issuer, jwt_audience, jwt_expiry_minutes);
        let session_store =
            SessionStore::new(Duration::from_secs(session_ttl_hours * 60 * 60));

        let user_repo = UserRepository::new();
        let membership_repo = MembershipRepository::new();
        let reconciler = IdentityReconciler::new(user_repo, db_pool.clone());

        let session_service = SessionService::new(
            session_store,
            jwt_service.clone(),
            reconciler,
            membership_repo,
            db_pool.clone(),
        );

        Ok(Self { db_pool, jwt_service, session_service })
    }
}
