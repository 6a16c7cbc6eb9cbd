//! # StoreProvider
//!
//! ユースケースが必要とするリポジトリハンドルを開く。
//!
//! | ハンドル | 接続先 | スコープ |
//! |---------|-------|---------|
//! | [`TenantRegistry`] | プラットフォーム DB | なし |
//! | [`ClientRepository`] | プラットフォーム DB | なし |
//! | [`CredentialStore`] | リージョン DB | 事業者 |
//! | [`EntityRepository`] | リージョン DB | 事業者 + 種別 |
//!
//! 各ハンドルは開いた時点でコネクションを 1 本借り、ドロップ時に返却する。

use std::sync::Arc;

use async_trait::async_trait;
use salesdesk_domain::{entity::EntityKind, tenant::BusinessId};
use sqlx::PgPool;

use crate::{
    db::TenantConnection,
    error::InfraError,
    password::PasswordHasher,
    repository::{
        ClientRepository,
        CredentialStore,
        EntityRepository,
        PostgresClientRepository,
        PostgresCredentialStore,
        PostgresEntityRepository,
        PostgresTenantRegistry,
        TenantRegistry,
    },
};

#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn tenant_registry(&self) -> Result<Box<dyn TenantRegistry>, InfraError>;

    async fn client_repository(&self) -> Result<Box<dyn ClientRepository>, InfraError>;

    async fn credential_store(
        &self,
        business_id: &BusinessId,
    ) -> Result<Box<dyn CredentialStore>, InfraError>;

    async fn entity_repository(
        &self,
        kind: EntityKind,
        business_id: &BusinessId,
    ) -> Result<Box<dyn EntityRepository>, InfraError>;
}

/// PostgreSQL 実装の StoreProvider
#[derive(Clone)]
pub struct PostgresStoreProvider {
    platform: PgPool,
    region:   PgPool,
    hasher:   Arc<dyn PasswordHasher>,
}

impl PostgresStoreProvider {
    pub fn new(platform: PgPool, region: PgPool, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            platform,
            region,
            hasher,
        }
    }
}

#[async_trait]
impl StoreProvider for PostgresStoreProvider {
    async fn tenant_registry(&self) -> Result<Box<dyn TenantRegistry>, InfraError> {
        let conn = self.platform.acquire().await?;
        Ok(Box::new(PostgresTenantRegistry::new(conn)))
    }

    async fn client_repository(&self) -> Result<Box<dyn ClientRepository>, InfraError> {
        let conn = self.platform.acquire().await?;
        Ok(Box::new(PostgresClientRepository::new(conn)))
    }

    async fn credential_store(
        &self,
        business_id: &BusinessId,
    ) -> Result<Box<dyn CredentialStore>, InfraError> {
        let conn = TenantConnection::acquire(&self.region, business_id).await?;
        Ok(Box::new(PostgresCredentialStore::new(conn, Arc::clone(&self.hasher))))
    }

    async fn entity_repository(
        &self,
        kind: EntityKind,
        business_id: &BusinessId,
    ) -> Result<Box<dyn EntityRepository>, InfraError> {
        let conn = TenantConnection::acquire(&self.region, business_id).await?;
        Ok(Box::new(PostgresEntityRepository::new(conn, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_store_providerはsendとsyncを実装している() {
        assert_send_sync::<PostgresStoreProvider>();
        assert_send_sync::<Arc<dyn StoreProvider>>();
    }
}
