//! # クライアント認証
//!
//! 認証要求を送ってきたクライアントアプリケーションを `app_clients` の
//! レコードと照合する。
//!
//! クライアント種別・スコープは認証済みレコードの値だけを信頼し、
//! 要求に含まれる自己申告値は使用しない。

use std::sync::Arc;

use salesdesk_domain::{
    auth::AuthRequest,
    client::{ClientId, ClientRecord, ScopeParams},
    password::PlainPassword,
};
use salesdesk_infra::{PasswordHasher, StoreProvider};

use crate::error::ServiceError;

/// クライアントアプリケーションの認証
pub struct ClientAuthenticator {
    store:  Arc<dyn StoreProvider>,
    hasher: Arc<dyn PasswordHasher>,
}

impl ClientAuthenticator {
    pub fn new(store: Arc<dyn StoreProvider>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// クライアント ID とシークレットを照合する
    ///
    /// 未登録・無効化済み・シークレット不一致はいずれも
    /// [`ServiceError::ClientAuthFailure`] になる。
    /// 未登録の場合もダミーハッシュで照合し、応答時間を均一化する。
    #[tracing::instrument(skip_all, fields(client_id = %client_id))]
    pub async fn authenticate(
        &self,
        client_id: &str,
        secret: &PlainPassword,
    ) -> Result<ClientRecord, ServiceError> {
        let Ok(id) = ClientId::new(client_id) else {
            self.hasher.dummy_verify(secret);
            return Err(ServiceError::ClientAuthFailure);
        };

        let client = {
            let mut clients = self.store.client_repository().await?;
            clients.find_by_id(&id).await?
        };

        match client {
            Some(client) if client.is_active() => {
                match self.hasher.verify(secret, client.secret_hash()) {
                    Ok(result) if result.is_match() => Ok(client),
                    Ok(_) => {
                        tracing::info!("クライアントシークレットが一致しない");
                        Err(ServiceError::ClientAuthFailure)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "クライアントシークレットのハッシュが不正");
                        Err(ServiceError::ClientAuthFailure)
                    }
                }
            }
            Some(_) => {
                self.hasher.dummy_verify(secret);
                tracing::info!("無効化されたクライアント");
                Err(ServiceError::ClientAuthFailure)
            }
            None => {
                self.hasher.dummy_verify(secret);
                tracing::info!("未登録のクライアント");
                Err(ServiceError::ClientAuthFailure)
            }
        }
    }

    /// 認証要求のスコープ文字列をパラメータに分解する
    pub fn parse_scope(request: &AuthRequest) -> ScopeParams {
        request.scope_params()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use salesdesk_domain::{
        client::{ClientScope, ClientType},
        password::PasswordHash,
    };
    use salesdesk_infra::mock::{HandleKind, InMemoryStore, StubPasswordHasher};

    use super::*;

    fn client(id: &str, secret: &str, is_active: bool) -> ClientRecord {
        ClientRecord::from_db(
            ClientId::new(id).unwrap(),
            ClientType::CommonApp,
            ClientScope::new("platform"),
            PasswordHash::new(format!("hashed:{secret}")),
            is_active,
        )
    }

    fn sut(store: &InMemoryStore) -> ClientAuthenticator {
        ClientAuthenticator::new(
            Arc::new(store.clone()),
            Arc::new(StubPasswordHasher),
        )
    }

    #[tokio::test]
    async fn test_シークレットが一致すればクライアントを返す() {
        // Given
        let store = InMemoryStore::new();
        store.add_client(client("web", "s3cret", true));

        // When
        let result = sut(&store)
            .authenticate("web", &PlainPassword::new("s3cret"))
            .await;

        // Then
        let client = result.unwrap();
        assert_eq!(client.client_id().as_str(), "web");
        assert_eq!(store.tracker().acquired(HandleKind::ClientRepository), 1);
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[rstest]
    #[case::シークレット不一致("web", "wrong", true)]
    #[case::無効化済み("web", "s3cret", false)]
    #[case::未登録("mobile", "s3cret", true)]
    #[case::空のクライアントid("", "s3cret", true)]
    #[tokio::test]
    async fn test_クライアント認証の失敗(
        #[case] client_id: &str,
        #[case] secret: &str,
        #[case] is_active: bool,
    ) {
        // Given
        let store = InMemoryStore::new();
        store.add_client(client("web", "s3cret", is_active));

        // When
        let result = sut(&store)
            .authenticate(client_id, &PlainPassword::new(secret))
            .await;

        // Then
        assert!(matches!(result, Err(ServiceError::ClientAuthFailure)));
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[test]
    fn test_スコープ文字列を分解する() {
        let request = AuthRequest::new("web", "s3cret", "password")
            .with_scope("business_id:biz_1 login_type:email");

        let params = ClientAuthenticator::parse_scope(&request);

        assert_eq!(params.get("business_id"), Some("biz_1"));
        assert_eq!(params.get("login_type"), Some("email"));
    }
}
