// src/services/jwt.rs

use std::collections::HashMap;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::future::Cache;
use rand::RngCore;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{ClaimValue, Claims, Principal, TokenPair},
};

// Refresh tokens ficam no cache por até 30 dias; o registro ainda carrega
// o expires_at próprio, conferido na validação.
const REFRESH_TOKEN_TTL_DAYS: i64 = 30;
const REFRESH_TOKEN_TTL: Duration =
    Duration::from_secs(REFRESH_TOKEN_TTL_DAYS as u64 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct RefreshTokenRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// Emissão e validação de tokens HS256, mais o estoque de refresh tokens.
///
/// A validação nunca propaga erro: token ruim é simplesmente "não
/// autenticado" para quem chamou.
#[derive(Clone)]
pub struct JwtService {
    secret: String,
    issuer: String,
    audience: String,
    expiry_minutes: i64,
    refresh_tokens: Cache<String, RefreshTokenRecord>,
    user_tokens: Cache<Uuid, Vec<String>>,
}

impl JwtService {
    pub fn new(secret: String, issuer: String, audience: String, expiry_minutes: i64) -> Self {
        let refresh_tokens = Cache::builder().time_to_live(REFRESH_TOKEN_TTL).build();
        let user_tokens = Cache::builder().time_to_live(REFRESH_TOKEN_TTL).build();
        Self { secret, issuer, audience, expiry_minutes, refresh_tokens, user_tokens }
    }

    // Tolerância zero de clock-skew: um token expirado há um segundo já é inválido.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation
    }

    pub fn generate_access_token(
        &self,
        principal: &Principal,
        tenant: Option<(Uuid, &str)>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::minutes(self.expiry_minutes);

        let claims = Claims {
            sub: principal.user_id,
            email: principal.email.clone(),
            given_name: (!principal.first_name.is_empty()).then(|| principal.first_name.clone()),
            family_name: (!principal.last_name.is_empty()).then(|| principal.last_name.clone()),
            email_verified: principal.email_verified,
            role: principal.role.clone(),
            tenant_id: tenant.map(|(id, _)| id),
            tenant_name: tenant.map(|(_, name)| name.to_string()),
            idp_user_id: (!principal.external_id.is_empty())
                .then(|| principal.external_id.clone()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )?)
    }

    /// Emite e registra um par access + refresh token para o principal.
    pub async fn issue_token_pair(
        &self,
        principal: &Principal,
        tenant: Option<(Uuid, &str)>,
    ) -> Result<TokenPair, AppError> {
        let access_token = self.generate_access_token(principal, tenant)?;
        let refresh_token = self.generate_refresh_token();

        let refresh_expires_at = Utc::now() + chrono::Duration::days(REFRESH_TOKEN_TTL_DAYS);
        self.store_refresh_token(principal.user_id, &refresh_token, refresh_expires_at)
            .await;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::minutes(self.expiry_minutes),
        })
    }

    /// Token opaco de renovação: 64 bytes aleatórios em base64.
    pub fn generate_refresh_token(&self) -> String {
        let mut bytes = [0u8; 64];
        rand::rng().fill_bytes(&mut bytes);
        BASE64.encode(bytes)
    }

    /// Assinatura, emissor, audiência e expiração. Qualquer falha vira false.
    pub fn validate_token(&self, token: &str) -> bool {
        match decode::<serde_json::Value>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &self.validation(),
        ) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Validação de token falhou: {}", e);
                false
            }
        }
    }

    /// Extrai o payload como mapa de ClaimValue. O formato (escalar vs
    /// array) é decidido aqui, direto do JSON do payload.
    pub fn claims_from_token(&self, token: &str) -> Option<HashMap<String, ClaimValue>> {
        let data = decode::<serde_json::Value>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &self.validation(),
        )
        .map_err(|e| tracing::debug!("Falha ao extrair claims do token: {}", e))
        .ok()?;

        let object = data.claims.as_object()?;
        let mut claims = HashMap::with_capacity(object.len());
        for (key, value) in object {
            if let Some(claim) = ClaimValue::from_json(value) {
                claims.insert(key.clone(), claim);
            }
        }
        Some(claims)
    }

    pub async fn store_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) {
        let record = RefreshTokenRecord { user_id, expires_at };
        self.refresh_tokens.insert(refresh_token.to_string(), record).await;

        // Índice reverso usuário -> tokens, para o logout-geral.
        let mut tokens = self.user_tokens.get(&user_id).await.unwrap_or_default();
        tokens.push(refresh_token.to_string());
        self.user_tokens.insert(user_id, tokens).await;
    }

    pub async fn validate_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> bool {
        match self.refresh_tokens.get(refresh_token).await {
            Some(record) => record.user_id == user_id && record.expires_at > Utc::now(),
            None => false,
        }
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) {
        self.refresh_tokens.invalidate(refresh_token).await;
    }

    /// Revoga todos os refresh tokens do usuário (logout em todos os clientes).
    pub async fn revoke_all_user_tokens(&self, user_id: Uuid) {
        if let Some(tokens) = self.user_tokens.get(&user_id).await {
            for token in &tokens {
                self.refresh_tokens.invalidate(token).await;
            }
        }
        self.user_tokens.invalidate(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(
            "segredo-de-teste-bem-longo".into(),
            "cervejaria-api".into(),
            "cervejaria-app".into(),
            60,
        )
    }

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

    #[test]
    fn minted_token_validates_and_round_trips_claims() {
        let svc = service();
        let p = principal();
        let token = svc.generate_access_token(&p, None).unwrap();

        assert!(svc.validate_token(&token));

        let claims = svc.claims_from_token(&token).unwrap();
        assert_eq!(
            claims.get("email"),
            Some(&ClaimValue::Scalar("brewer@x.com".into()))
        );
        assert_eq!(
            claims.get("sub"),
            Some(&ClaimValue::Scalar(p.user_id.to_string()))
        );
        // Sem tenant na emissão, sem claim de tenant no payload.
        assert!(!claims.contains_key("tenant_id"));
    }

    #[test]
    fn token_carries_tenant_claim_when_issued_with_tenant() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        let token = svc
            .generate_access_token(&principal(), Some((tenant_id, "Cervejaria Alfa")))
            .unwrap();

        let claims = svc.claims_from_token(&token).unwrap();
        assert_eq!(
            claims.get("tenant_id"),
            Some(&ClaimValue::Scalar(tenant_id.to_string()))
        );
    }

    #[test]
    fn expired_token_is_rejected_with_zero_leeway() {
        let svc = JwtService::new(
            "segredo-de-teste-bem-longo".into(),
            "cervejaria-api".into(),
            "cervejaria-app".into(),
            -5, // emitido já expirado
        );
        let token = svc.generate_access_token(&principal(), None).unwrap();

        assert!(!svc.validate_token(&token));
        assert!(svc.claims_from_token(&token).is_none());
    }

    #[test]
    fn token_from_other_audience_is_rejected() {
        let other = JwtService::new(
            "segredo-de-teste-bem-longo".into(),
            "cervejaria-api".into(),
            "outra-aplicacao".into(),
            60,
        );
        let token = other.generate_access_token(&principal(), None).unwrap();

        assert!(!service().validate_token(&token));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let mut token = svc.generate_access_token(&principal(), None).unwrap();
        token.pop();
        token.push('A');

        assert!(!svc.validate_token(&token));
    }

    #[tokio::test]
    async fn issued_pair_is_immediately_usable() {
        let svc = service();
        let p = principal();

        let pair = svc.issue_token_pair(&p, None).await.unwrap();
        assert!(svc.validate_token(&pair.access_token));
        assert!(svc.validate_refresh_token(p.user_id, &pair.refresh_token).await);
        assert!(pair.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn refresh_token_lifecycle() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.generate_refresh_token();
        let expires_at = Utc::now() + chrono::Duration::days(7);

        svc.store_refresh_token(user_id, &token, expires_at).await;
        assert!(svc.validate_refresh_token(user_id, &token).await);

        // Token de um usuário não vale para outro.
        assert!(!svc.validate_refresh_token(Uuid::new_v4(), &token).await);

        svc.revoke_refresh_token(&token).await;
        assert!(!svc.validate_refresh_token(user_id, &token).await);
    }

    #[tokio::test]
    async fn revoke_all_drops_every_user_token() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let expires_at = Utc::now() + chrono::Duration::days(7);

        let t1 = svc.generate_refresh_token();
        let t2 = svc.generate_refresh_token();
        svc.store_refresh_token(user_id, &t1, expires_at).await;
        svc.store_refresh_token(user_id, &t2, expires_at).await;

        svc.revoke_all_user_tokens(user_id).await;
        assert!(!svc.validate_refresh_token(user_id, &t1).await);
        assert!(!svc.validate_refresh_token(user_id, &t2).await);
    }
}
