//! # サービスコンテキスト
//!
//! 起動時に一度だけ構築し、リクエストごとのユースケースを生成する。
//!
//! ```text
//! SalesConfig ──▶ SalesContext ──┬─▶ AuthenticationFlow
//!                                ├─▶ EntityUseCase（種別ごと）
//!                                └─▶ CustomerUseCase
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use salesdesk_domain::{
    clock::{Clock, SystemClock},
    entity::EntityKind,
};
use salesdesk_infra::{Argon2PasswordHasher, PasswordHasher, PostgresStoreProvider, StoreProvider, db};
use salesdesk_shared::observability::{TracingConfig, init_tracing};

use crate::{
    config::{AuthSettings, SalesConfig},
    error::ServiceError,
    usecase::{AuthenticationFlow, CustomerUseCase, EntityUseCase, parse_business_id},
};

const SERVICE_NAME: &str = "sales-service";

/// ユースケースが共有する依存関係
#[derive(Clone)]
pub struct SalesContext {
    store:  Arc<dyn StoreProvider>,
    hasher: Arc<dyn PasswordHasher>,
    clock:  Arc<dyn Clock>,
    auth:   AuthSettings,
}

impl SalesContext {
    pub fn new(
        store: Arc<dyn StoreProvider>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        auth: AuthSettings,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
            auth,
        }
    }

    /// `.env` と環境変数から設定を読み込み、ログを初期化して接続する
    pub async fn bootstrap() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = SalesConfig::from_env().context("設定の読み込みに失敗")?;
        init_tracing(TracingConfig::new(SERVICE_NAME, config.log_format));

        Self::connect(&config).await
    }

    /// データベースに接続し、マイグレーションを適用する
    pub async fn connect(config: &SalesConfig) -> anyhow::Result<Self> {
        let platform = db::create_pool(&config.platform_database_url, config.max_connections)
            .await
            .context("プラットフォーム DB への接続に失敗")?;
        db::run_migrations(&platform)
            .await
            .context("プラットフォーム DB のマイグレーションに失敗")?;

        let region = if config.region_database_url == config.platform_database_url {
            platform.clone()
        } else {
            let region = db::create_pool(&config.region_database_url, config.max_connections)
                .await
                .context("リージョン DB への接続に失敗")?;
            db::run_migrations(&region)
                .await
                .context("リージョン DB のマイグレーションに失敗")?;
            region
        };
        tracing::info!(
            max_connections = config.max_connections,
            alternate_login_keys = config.auth.alternate_login_keys,
            "データベースに接続しました"
        );

        let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2PasswordHasher::new());
        let store = PostgresStoreProvider::new(platform, region, Arc::clone(&hasher));

        Ok(Self::new(Arc::new(store), hasher, Arc::new(SystemClock), config.auth))
    }

    pub fn authentication_flow(&self) -> AuthenticationFlow {
        AuthenticationFlow::new(Arc::clone(&self.store), Arc::clone(&self.hasher), self.auth)
    }

    /// エンティティサービスを開く
    ///
    /// 顧客 ID は顧客従属エンティティ（カート・注文・レビュー・ウィッシュリスト）にのみ指定できる。
    /// 顧客そのものは [`Self::customer_service`] で扱う。
    pub async fn entity_service(
        &self,
        kind: EntityKind,
        business_id: &str,
        customer_id: Option<&str>,
    ) -> Result<EntityUseCase, ServiceError> {
        let business_id = parse_business_id(business_id)?;
        EntityUseCase::open(
            self.store.as_ref(),
            Arc::clone(&self.clock),
            kind,
            &business_id,
            customer_id,
        )
        .await
    }

    pub async fn customer_service(&self, business_id: &str) -> Result<CustomerUseCase, ServiceError> {
        let business_id = parse_business_id(business_id)?;
        CustomerUseCase::open(
            self.store.as_ref(),
            Arc::clone(&self.clock),
            Arc::clone(&self.hasher),
            &business_id,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use salesdesk_domain::{
        auth::AuthRequest,
        client::{ClientId, ClientRecord, ClientScope, ClientType},
        password::PasswordHash,
    };
    use salesdesk_infra::mock::{InMemoryStore, StubPasswordHasher};
    use serde_json::json;

    use super::*;
    use crate::usecase::test_support::*;

    fn context(store: &InMemoryStore) -> SalesContext {
        SalesContext::new(
            Arc::new(store.clone()),
            Arc::new(StubPasswordHasher),
            clock(),
            AuthSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_作成した顧客でログインできる() {
        // Given
        let store = store_with_business();
        store.add_client(ClientRecord::from_db(
            ClientId::new("dream_pos").unwrap(),
            ClientType::BusinessApp,
            ClientScope::new(BUSINESS_ID),
            PasswordHash::new("hashed:s3cret"),
            true,
        ));
        let ctx = context(&store);
        let customer = {
            let mut customers = ctx.customer_service(BUSINESS_ID).await.unwrap();
            customers
                .create(
                    json!({"customer_login_id": "alice", "customer_password": "pw-123"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                )
                .await
                .unwrap()
        };

        // When
        let request = AuthRequest::new("dream_pos", "s3cret", "password").with_credentials("alice", "pw-123");
        let grant = ctx.authentication_flow().authenticate(&request).await.unwrap();

        // Then
        assert_eq!(grant.user_id(), Some(customer.id()));
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_すべての種別のサービスを開ける() {
        use strum::IntoEnumIterator;

        let store = store_with_business();
        let ctx = context(&store);

        for kind in EntityKind::iter().filter(|k| !k.is_customer_owned() && *k != EntityKind::Customer) {
            let mut service = ctx.entity_service(kind, BUSINESS_ID, None).await.unwrap();
            let created = service.create(Default::default()).await.unwrap();
            assert!(created.id().as_str().starts_with(kind.id_prefix()));
        }

        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_顧客は汎用サービスで開けず平文パスワードも保存されない() {
        // Given
        let store = store_with_business();
        let ctx = context(&store);

        // When
        let generic = ctx.entity_service(EntityKind::Customer, BUSINESS_ID, None).await;
        let created = ctx
            .customer_service(BUSINESS_ID)
            .await
            .unwrap()
            .create(
                json!({"customer_login_id": "eve", "customer_password": "plain-pw"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        // Then
        assert!(matches!(generic, Err(ServiceError::Validation(_))));
        let stored = store
            .record(&business_id(), EntityKind::Customer, created.id())
            .unwrap();
        assert_eq!(stored.attribute("customer_password"), Some(&json!("hashed:plain-pw")));
        assert!(created.attribute("customer_password").is_none());
    }

    #[tokio::test]
    async fn test_空の事業者idはmissing_parameter() {
        let store = store_with_business();

        let result = context(&store).entity_service(EntityKind::Blog, "", None).await;

        assert!(matches!(result, Err(ServiceError::MissingParameter(_))));
        assert_eq!(store.tracker().total_acquired(), 0);
    }
}
