// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. ClaimValue (valor de uma claim do token)
// ---
// O provedor de identidade upstream codifica claims repetidas de duas formas:
// chaves repetidas (viram array no payload) ou um array JSON embutido numa
// string. O enum é decidido no parse, a partir do JSON do payload — nada de
// adivinhar o formato em tempo de execução depois disso.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Array(Vec<String>),
    Scalar(String),
}

impl ClaimValue {
    /// Converte um valor JSON cru do payload do token.
    /// Números e booleanos (exp, iat, email_verified) viram escalares.
    pub fn from_json(value: &serde_json::Value) -> Option<ClaimValue> {
        match value {
            serde_json::Value::String(s) => Some(ClaimValue::Scalar(s.clone())),
            serde_json::Value::Number(n) => Some(ClaimValue::Scalar(n.to_string())),
            serde_json::Value::Bool(b) => Some(ClaimValue::Scalar(b.to_string())),
            serde_json::Value::Array(items) => {
                let strings = items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                Some(ClaimValue::Array(strings))
            }
            _ => None,
        }
    }
}

// ---
// 2. Principal (a identidade autenticada, independente de tenant)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: Uuid,

    // Id atribuído pelo provedor de identidade externo. NÃO é durável:
    // a reconciliação sempre prefere o id interno encontrado pelo e-mail.
    pub external_id: String,

    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub role: String,
}

impl Principal {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

// ---
// 3. User (registro durável vindo do banco de dados)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    // Id no provedor de identidade externo (preenchido uma vez, nunca sobrescrito)
    pub external_idp_id: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

// ---
// 4. Claims (estrutura usada na EMISSÃO de tokens)
// ---
// Na validação o payload é lido como mapa genérico de ClaimValue; esta
// struct só existe para o caminho de emissão (e para os testes).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    pub email_verified: bool,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_user_id: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: usize, // Issued At (quando o token foi criado)
    pub exp: usize, // Expiration time (quando o token expira)
}

// ---
// 5. DTOs da API de autenticação
// ---
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,

    // Expiração do ACCESS token; o refresh token tem prazo próprio, interno.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "O refresh token é obrigatório."))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<TokenPair>,
}

impl AuthResponse {
    pub fn ok(message: &str, data: Option<TokenPair>) -> Self {
        Self { success: true, message: message.to_string(), data }
    }

    pub fn fail(message: &str) -> Self {
        Self { success: false, message: message.to_string(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claim_value_from_string() {
        let v = ClaimValue::from_json(&json!("brewer@x.com")).unwrap();
        assert_eq!(v, ClaimValue::Scalar("brewer@x.com".into()));
    }

    #[test]
    fn claim_value_from_array() {
        let v = ClaimValue::from_json(&json!(["owner", "tenant"])).unwrap();
        assert_eq!(v, ClaimValue::Array(vec!["owner".into(), "tenant".into()]));
    }

    #[test]
    fn claim_value_from_number_and_bool() {
        assert_eq!(
            ClaimValue::from_json(&json!(1735689600)).unwrap(),
            ClaimValue::Scalar("1735689600".into())
        );
        assert_eq!(
            ClaimValue::from_json(&json!(true)).unwrap(),
            ClaimValue::Scalar("true".into())
        );
    }

    #[test]
    fn claim_value_ignores_objects() {
        assert!(ClaimValue::from_json(&json!({"k": "v"})).is_none());
    }
}
