// src/services/claims.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{ClaimValue, Principal},
};

// Chaves alternativas, em ordem fixa de prioridade. O provedor upstream já
// emitiu o id do usuário sob cada um desses nomes em versões diferentes.
const USER_ID_KEYS: [&str; 3] = ["sub", "nameid", "user_id"];
const EMAIL_KEYS: [&str; 2] = ["email", "email_address"];
const FIRST_NAME_KEYS: [&str; 2] = ["given_name", "first_name"];
const LAST_NAME_KEYS: [&str; 2] = ["family_name", "last_name"];

const DEFAULT_ROLE: &str = "tenant";

/// Reduz um valor de claim a uma única string.
///
/// Array → elemento 0. String com cara de array JSON (`[...]`) → tenta o
/// parse e usa o elemento 0, caindo para a string crua se o PARSE falhar.
/// Parse bem-sucedido de um array vazio é ausência: a claim conta como não
/// fornecida (próxima chave de fallback, ou o default).
/// Qualquer outra string → como está.
pub fn coerce_single(value: &ClaimValue) -> Option<String> {
    match value {
        ClaimValue::Array(items) => items.first().cloned(),
        ClaimValue::Scalar(s) => {
            if s.starts_with('[') && s.ends_with(']') {
                match serde_json::from_str::<Vec<String>>(s) {
                    Ok(items) => items.into_iter().next(),
                    Err(_) => Some(s.clone()),
                }
            } else {
                Some(s.clone())
            }
        }
    }
}

fn first_claim(claims: &HashMap<String, ClaimValue>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| claims.get(*key).and_then(coerce_single))
        .filter(|s| !s.is_empty())
}

/// Normaliza o mapa de claims num Principal canônico.
///
/// Sem user-id ou e-mail não existe sessão parcial nem anônima: a criação
/// inteira é abortada com MissingRequiredClaim.
pub fn extract_principal(claims: &HashMap<String, ClaimValue>) -> Result<Principal, AppError> {
    let raw_user_id =
        first_claim(claims, &USER_ID_KEYS).ok_or(AppError::MissingRequiredClaim("user_id"))?;
    let user_id = Uuid::parse_str(&raw_user_id).map_err(|_| {
        tracing::warn!("Claim de user-id não é um UUID: '{}'", raw_user_id);
        AppError::MissingRequiredClaim("user_id")
    })?;

    let email = first_claim(claims, &EMAIL_KEYS).ok_or(AppError::MissingRequiredClaim("email"))?;

    let first_name = first_claim(claims, &FIRST_NAME_KEYS).unwrap_or_default();
    let last_name = first_claim(claims, &LAST_NAME_KEYS).unwrap_or_default();
    let role = first_claim(claims, &["role"]).unwrap_or_else(|| DEFAULT_ROLE.to_string());
    let external_id = first_claim(claims, &["idp_user_id"]).unwrap_or_default();

    let email_verified = first_claim(claims, &["email_verified"])
        .map(|v| v == "true")
        .unwrap_or(true);

    Ok(Principal {
        user_id,
        external_id,
        email,
        first_name,
        last_name,
        email_verified,
        role,
    })
}

/// Tenant embutido no token, quando presente. Ausência não é erro.
pub fn tenant_from_claims(claims: &HashMap<String, ClaimValue>) -> Option<Uuid> {
    first_claim(claims, &["tenant_id"]).and_then(|raw| Uuid::parse_str(&raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_claims() -> HashMap<String, ClaimValue> {
        let mut claims = HashMap::new();
        claims.insert(
            "sub".to_string(),
            ClaimValue::Scalar("11111111-2222-3333-4444-555555555555".into()),
        );
        claims.insert("email".to_string(), ClaimValue::Scalar("brewer@x.com".into()));
        claims
    }

    #[test]
    fn coercion_is_identical_for_array_and_json_array_string() {
        let as_array = ClaimValue::Array(vec!["owner".into(), "tenant".into()]);
        let as_json_string = ClaimValue::Scalar(r#"["owner","tenant"]"#.into());

        assert_eq!(coerce_single(&as_array), Some("owner".into()));
        assert_eq!(coerce_single(&as_json_string), Some("owner".into()));
    }

    #[test]
    fn coercion_falls_back_to_raw_string_on_parse_failure() {
        let broken = ClaimValue::Scalar("[nao é json".into());
        assert_eq!(coerce_single(&broken), Some("[nao é json".into()));

        // Começa com '[' e termina com ']' mas não é array de strings.
        let not_strings = ClaimValue::Scalar("[1, 2]".into());
        assert_eq!(coerce_single(&not_strings), Some("[1, 2]".into()));
    }

    #[test]
    fn empty_json_array_string_counts_as_absent() {
        assert_eq!(coerce_single(&ClaimValue::Scalar("[]".into())), None);
        assert_eq!(coerce_single(&ClaimValue::Array(vec![])), None);
    }

    #[test]
    fn empty_array_email_aborts_extraction() {
        let mut claims = base_claims();
        claims.insert("email".to_string(), ClaimValue::Scalar("[]".into()));

        let err = extract_principal(&claims).unwrap_err();
        assert!(matches!(err, AppError::MissingRequiredClaim("email")));
    }

    #[test]
    fn empty_array_role_falls_back_to_default() {
        let mut claims = base_claims();
        claims.insert("role".to_string(), ClaimValue::Scalar("[]".into()));

        assert_eq!(extract_principal(&claims).unwrap().role, "tenant");
    }

    #[test]
    fn role_claim_coerces_through_both_encodings() {
        let mut claims = base_claims();
        claims.insert(
            "role".to_string(),
            ClaimValue::Array(vec!["owner".into(), "tenant".into()]),
        );
        assert_eq!(extract_principal(&claims).unwrap().role, "owner");

        claims.insert(
            "role".to_string(),
            ClaimValue::Scalar(r#"["owner","tenant"]"#.into()),
        );
        assert_eq!(extract_principal(&claims).unwrap().role, "owner");
    }

    #[test]
    fn user_id_keys_are_tried_in_priority_order() {
        let id_sub = Uuid::new_v4();
        let id_fallback = Uuid::new_v4();

        let mut claims = base_claims();
        claims.insert("user_id".to_string(), ClaimValue::Scalar(id_fallback.to_string()));
        claims.insert("sub".to_string(), ClaimValue::Scalar(id_sub.to_string()));
        assert_eq!(extract_principal(&claims).unwrap().user_id, id_sub);

        claims.remove("sub");
        assert_eq!(extract_principal(&claims).unwrap().user_id, id_fallback);
    }

    #[test]
    fn missing_email_aborts_extraction() {
        let mut claims = base_claims();
        claims.remove("email");

        let err = extract_principal(&claims).unwrap_err();
        assert!(matches!(err, AppError::MissingRequiredClaim("email")));
    }

    #[test]
    fn missing_user_id_aborts_extraction() {
        let mut claims = base_claims();
        claims.remove("sub");

        let err = extract_principal(&claims).unwrap_err();
        assert!(matches!(err, AppError::MissingRequiredClaim("user_id")));
    }

    #[test]
    fn non_uuid_user_id_aborts_extraction() {
        let mut claims = base_claims();
        claims.insert("sub".to_string(), ClaimValue::Scalar("user-42".into()));

        let err = extract_principal(&claims).unwrap_err();
        assert!(matches!(err, AppError::MissingRequiredClaim("user_id")));
    }

    #[test]
    fn defaults_apply_for_optional_claims() {
        let principal = extract_principal(&base_claims()).unwrap();
        assert_eq!(principal.role, "tenant");
        assert_eq!(principal.first_name, "");
        assert!(principal.email_verified);
    }

    #[test]
    fn tenant_claim_is_optional() {
        let mut claims = base_claims();
        assert_eq!(tenant_from_claims(&claims), None);

        let tenant_id = Uuid::new_v4();
        claims.insert("tenant_id".to_string(), ClaimValue::Scalar(tenant_id.to_string()));
        assert_eq!(tenant_from_claims(&claims), Some(tenant_id));
    }
}
