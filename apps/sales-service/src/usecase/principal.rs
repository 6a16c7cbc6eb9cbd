//! # 顧客認証（password グラント）
//!
//! 解決済みの事業者にスコープされた [`CredentialStore`](salesdesk_infra::repository::CredentialStore)
//! を開き、ログインキーとパスワードで顧客を認証する。
//!
//! ## 判定順序
//!
//! 1. 事業者が未解決 → `MissingParameter("business_id")`
//! 2. ユーザー名・パスワードの欠落 → `MissingParameter`
//! 3. ログイン ID 不明・パスワード不一致 → `AuthenticationFailed`
//! 4. 論理削除済み・検証済みフラグが false → `AuthenticationFailed`
//!
//! 3 と 4 は応答では区別せず、理由はログにのみ残す。

use std::sync::Arc;

use salesdesk_domain::{
    auth::AuthRequest,
    client::{SCOPE_BUSINESS_ID, SCOPE_LOGIN_TYPE, ScopeParams},
    customer::{Customer, CustomerStatus, LoginKey},
    tenant::BusinessId,
};
use salesdesk_infra::StoreProvider;

use crate::{config::AuthSettings, error::ServiceError};

/// 事業者内の顧客認証
pub struct PrincipalAuthenticator {
    store:    Arc<dyn StoreProvider>,
    settings: AuthSettings,
}

impl PrincipalAuthenticator {
    pub fn new(store: Arc<dyn StoreProvider>, settings: AuthSettings) -> Self {
        Self { store, settings }
    }

    /// ログインに使用するキーを決定する
    ///
    /// 代替キー（電話番号・メール）は設定で有効化されている場合のみ
    /// スコープパラメータ `login_type` から選択する。
    pub fn login_key(&self, params: &ScopeParams) -> Result<LoginKey, ServiceError> {
        if !self.settings.alternate_login_keys {
            return Ok(LoginKey::LoginId);
        }

        match params.get(SCOPE_LOGIN_TYPE) {
            None => Ok(LoginKey::LoginId),
            Some(value) => LoginKey::from_login_type(value).ok_or_else(|| {
                ServiceError::Validation(format!("未対応のログイン種別です: {value}"))
            }),
        }
    }

    /// 顧客を認証する
    #[tracing::instrument(skip_all, fields(business_id = tracing::field::Empty))]
    pub async fn authenticate(
        &self,
        business_id: Option<&BusinessId>,
        request: &AuthRequest,
        params: &ScopeParams,
    ) -> Result<Customer, ServiceError> {
        let business_id =
            business_id.ok_or_else(|| ServiceError::MissingParameter(SCOPE_BUSINESS_ID.to_string()))?;
        tracing::Span::current().record("business_id", tracing::field::display(business_id));

        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::MissingParameter("username".to_string()))?;
        let password = request
            .password
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServiceError::MissingParameter("password".to_string()))?;
        let login_key = self.login_key(params)?;

        let customer = {
            let mut credentials = self.store.credential_store(business_id).await?;
            credentials.authenticate(login_key, username, password).await?
        };

        let Some(customer) = customer else {
            tracing::info!(%login_key, "顧客認証に失敗");
            return Err(ServiceError::AuthenticationFailed);
        };

        match customer.status() {
            CustomerStatus::Active => Ok(customer),
            CustomerStatus::Inactive => {
                tracing::info!(customer_id = %customer.id(), "削除済みの顧客によるログイン");
                Err(ServiceError::AuthenticationFailed)
            }
            CustomerStatus::Unverified => {
                tracing::info!(customer_id = %customer.id(), "未検証の顧客によるログイン");
                Err(ServiceError::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use salesdesk_domain::entity::{EntityId, EntityKind, EntityPatch};
    use salesdesk_infra::mock::{HandleKind, InMemoryStore};
    use serde_json::json;

    use super::*;
    use crate::usecase::test_support::*;

    fn store_with_alice() -> InMemoryStore {
        let store = store_with_business();
        store.add_record(record(
            EntityKind::Customer,
            "cust_alice",
            json!({
                "customer_login_id": "alice",
                "customer_email": "alice@example.com",
                "customer_password": "hashed:pw-123",
            }),
        ));
        store
    }

    fn sut(store: &InMemoryStore, alternate_login_keys: bool) -> PrincipalAuthenticator {
        PrincipalAuthenticator::new(
            Arc::new(store.clone()),
            AuthSettings {
                alternate_login_keys,
            },
        )
    }

    fn request(username: &str, password: &str) -> AuthRequest {
        AuthRequest::new("web", "s3cret", "password").with_credentials(username, password)
    }

    #[tokio::test]
    async fn test_ログインidとパスワードで認証できる() {
        // Given
        let store = store_with_alice();

        // When
        let result = sut(&store, false)
            .authenticate(Some(&business_id()), &request("alice", "pw-123"), &ScopeParams::default())
            .await;

        // Then
        assert_eq!(result.unwrap().id().as_str(), "cust_alice");
        assert_eq!(store.tracker().acquired(HandleKind::CredentialStore), 1);
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_不明なログインidと誤ったパスワードは区別できない() {
        // Given
        let store = store_with_alice();
        let sut = sut(&store, false);

        // When
        let unknown = sut
            .authenticate(Some(&business_id()), &request("bob", "pw-123"), &ScopeParams::default())
            .await
            .unwrap_err();
        let wrong = sut
            .authenticate(Some(&business_id()), &request("alice", "nope"), &ScopeParams::default())
            .await
            .unwrap_err();

        // Then
        assert_eq!(unknown.to_response(), wrong.to_response());
        assert!(matches!(unknown, ServiceError::AuthenticationFailed));
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[rstest]
    #[case::削除済み(json!({"is_deleted": true}))]
    #[case::未検証(json!({"is_verified": false}))]
    #[tokio::test]
    async fn test_無効な顧客はパスワード誤りと区別されない(#[case] patch: serde_json::Value) {
        // Given
        let store = store_with_alice();
        let id = EntityId::new("cust_alice").unwrap();
        let alice = store.record(&business_id(), EntityKind::Customer, &id).unwrap();
        let patch = EntityPatch::new(patch.as_object().cloned().unwrap()).unwrap();
        store.add_record(alice.patched(&patch, now()));

        // When
        let rejected = sut(&store, false)
            .authenticate(Some(&business_id()), &request("alice", "pw-123"), &ScopeParams::default())
            .await
            .unwrap_err();
        let wrong = sut(&store, false)
            .authenticate(Some(&business_id()), &request("alice", "nope"), &ScopeParams::default())
            .await
            .unwrap_err();

        // Then
        assert!(matches!(rejected, ServiceError::AuthenticationFailed));
        assert_eq!(rejected.to_response(), wrong.to_response());
    }

    #[tokio::test]
    async fn test_事業者が未解決ならストアを開かずmissing_parameter() {
        // Given
        let store = store_with_alice();

        // When
        let result = sut(&store, false)
            .authenticate(None, &request("alice", "pw-123"), &ScopeParams::default())
            .await;

        // Then
        assert!(matches!(result, Err(ServiceError::MissingParameter(name)) if name == "business_id"));
        assert_eq!(store.tracker().total_acquired(), 0);
    }

    #[rstest]
    #[case::ユーザー名なし("", "pw-123", "username")]
    #[case::パスワードなし("alice", "", "password")]
    #[tokio::test]
    async fn test_資格情報の欠落はmissing_parameter(
        #[case] username: &str,
        #[case] password: &str,
        #[case] expected: &str,
    ) {
        let store = store_with_alice();

        let result = sut(&store, false)
            .authenticate(Some(&business_id()), &request(username, password), &ScopeParams::default())
            .await;

        assert!(matches!(result, Err(ServiceError::MissingParameter(name)) if name == expected));
        assert_eq!(store.tracker().total_acquired(), 0);
    }

    #[tokio::test]
    async fn test_代替キーは既定で無効() {
        // Given
        let store = store_with_alice();
        let params = ScopeParams::parse("login_type:email");

        // When
        let result = sut(&store, false)
            .authenticate(Some(&business_id()), &request("alice@example.com", "pw-123"), &params)
            .await;

        // Then
        assert!(matches!(result, Err(ServiceError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_代替キーを有効にするとメールで認証できる() {
        // Given
        let store = store_with_alice();
        let params = ScopeParams::parse("login_type:email");

        // When
        let result = sut(&store, true)
            .authenticate(Some(&business_id()), &request("alice@example.com", "pw-123"), &params)
            .await;

        // Then
        assert_eq!(result.unwrap().id().as_str(), "cust_alice");
    }

    #[test]
    fn test_未対応のログイン種別はバリデーションエラー() {
        let store = InMemoryStore::new();

        let result = sut(&store, true).login_key(&ScopeParams::parse("login_type:fax"));

        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
