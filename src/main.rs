//src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() {
    // Inicializa o logger.
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização (schema + policies de RLS)
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas de sessão protegidas pelo guard de autenticação.
    let session_protected_routes = Router::new()
        .route("/current", get(handlers::session::get_current_session))
        .route("/set-current-tenant", post(handlers::session::set_current_tenant))
        .route("/set-current-brewery", post(handlers::session::set_current_brewery))
        .route("/refresh-tenants", post(handlers::session::refresh_tenants))
        .route("/refresh-breweries", post(handlers::session::refresh_breweries))
        .route("/invalidate", post(handlers::session::invalidate_session))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // A criação de sessão é pública: o token vem no corpo da requisição.
    let session_routes = Router::new()
        .route("/create", post(handlers::session::create_session))
        .merge(session_protected_routes);

    // Emissão de par de tokens exige bearer válido; a renovação é pública
    // (autentica pelo próprio refresh token).
    let auth_protected_routes = Router::new()
        .route("/token", post(handlers::auth::issue_tokens))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let auth_routes = Router::new()
        .route("/refresh", post(handlers::auth::refresh_tokens))
        .merge(auth_protected_routes);

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/session", session_routes)
        .nest("/api/auth", auth_routes)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::with_security()),
        )
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
