//! # ClientRepository
//!
//! 認証要求を送るクライアントアプリケーションの登録情報を参照する。
//! クライアントシークレットは Argon2id ハッシュとして保存されている。

use async_trait::async_trait;
use salesdesk_domain::{
    client::{ClientId, ClientRecord, ClientScope, ClientType},
    password::PasswordHash,
};
use sqlx::{Postgres, pool::PoolConnection};

use crate::error::InfraError;

#[async_trait]
pub trait ClientRepository: Send {
    async fn find_by_id(&mut self, id: &ClientId) -> Result<Option<ClientRecord>, InfraError>;
}

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    client_id:          String,
    client_type:        String,
    client_scope:       String,
    client_secret_hash: String,
    is_active:          bool,
}

/// PostgreSQL 実装の ClientRepository
pub struct PostgresClientRepository {
    conn: PoolConnection<Postgres>,
}

impl PostgresClientRepository {
    pub fn new(conn: PoolConnection<Postgres>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ClientRepository for PostgresClientRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&mut self, id: &ClientId) -> Result<Option<ClientRecord>, InfraError> {
        let row = sqlx::query_as::<_, ClientRow>(
            r#"
            SELECT client_id, client_type, client_scope, client_secret_hash, is_active
            FROM app_clients
            WHERE client_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ClientRecord::from_db(
            ClientId::new(row.client_id)?,
            ClientType::parse(&row.client_type),
            ClientScope::new(row.client_scope),
            PasswordHash::new(row.client_secret_hash),
            row.is_active,
        )))
    }
}
