use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Token inválido")]
    InvalidToken,

    // Token válido, mas sem user-id ou e-mail após a coerção das claims.
    #[error("Claim obrigatória ausente: {0}")]
    MissingRequiredClaim(&'static str),

    #[error("Sessão não encontrada")]
    SessionNotFound,

    // O SET da variável de sessão RLS falhou. A unidade de trabalho inteira
    // é abortada: nenhuma query escopada roda em conexão sem bind.
    #[error("Falha ao definir contexto RLS na conexão")]
    RlsBindFailure(#[source] sqlx::Error),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            // Mesma mensagem genérica para token inválido e claim ausente:
            // o cliente não deve conseguir distinguir os dois casos.
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.")
            }
            AppError::MissingRequiredClaim(claim) => {
                tracing::warn!("Claim obrigatória ausente no token: {}", claim);
                (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.")
            }

            AppError::SessionNotFound => (StatusCode::NOT_FOUND, "Sessão não encontrada."),

            // Todos os outros erros (RlsBindFailure, DatabaseError, ...) viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
