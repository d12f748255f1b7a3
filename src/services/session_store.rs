// src/services/session_store.rs

use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::models::session::{SESSION_SCHEMA_VERSION, Session};

const SESSION_KEY_PREFIX: &str = "session:";

/// Projeção cacheada de sessão por usuário.
///
/// Janela DESLIZANTE (time_to_idle): cada leitura renova o prazo; 24h sem
/// atividade e a entrada expira. O valor é um blob JSON opaco com versão de
/// schema — blob de versão desconhecida é tratado como sessão inexistente.
///
/// Construído uma vez no boot e injetado; nada de cache ambiente/global.
/// As mutações são read-modify-write sem compare-and-swap: duas requisições
/// do mesmo usuário podem intercalar e a última escrita ganha (limitação
/// aceita, ver DESIGN.md).
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, String>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_idle(ttl).build();
        Self { cache }
    }

    fn key(user_id: Uuid) -> String {
        format!("{SESSION_KEY_PREFIX}{user_id}")
    }

    pub async fn get(&self, user_id: Uuid) -> Option<Session> {
        let blob = self.cache.get(&Self::key(user_id)).await?;
        match serde_json::from_str::<Session>(&blob) {
            Ok(session) if session.schema_version == SESSION_SCHEMA_VERSION => Some(session),
            Ok(session) => {
                tracing::warn!(
                    "Sessão do usuário {} com versão de schema {} (esperada {}), descartando",
                    user_id,
                    session.schema_version,
                    SESSION_SCHEMA_VERSION
                );
                None
            }
            Err(e) => {
                tracing::error!("Blob de sessão ilegível para o usuário {}: {}", user_id, e);
                None
            }
        }
    }

    pub async fn put(&self, user_id: Uuid, session: &Session) -> bool {
        match serde_json::to_string(session) {
            Ok(blob) => {
                self.cache.insert(Self::key(user_id), blob).await;
                true
            }
            Err(e) => {
                tracing::error!("Falha ao serializar sessão do usuário {}: {}", user_id, e);
                false
            }
        }
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(&Self::key(user_id)).await;
    }
}
