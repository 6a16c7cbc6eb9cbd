//! # 認証フロー
//!
//! クライアント認証 → テナント解決 → テナント検証 → グラント分岐 → 顧客認証
//! の順に処理し、成功時のみ [`AuthGrant`] を返す。
//!
//! ```text
//! Start ──▶ TenantValidated ──▶ GrantDispatched ──▶ Success
//!   │              │                   │
//!   └──────────────┴───────────────────┴──────────▶ Failure
//! ```
//!
//! 認証要求は参照で受け取り、変更しない。
//!
//! ## タイミング攻撃対策
//!
//! 未登録クライアント・未登録ログイン ID の場合もダミーハッシュで照合を行い、
//! 応答時間から存在を推測されないようにする。

use std::{str::FromStr, sync::Arc};

use salesdesk_domain::{
    auth::{AuthGrant, AuthRequest, GrantType},
    client::resolve_tenant,
};
use salesdesk_infra::{PasswordHasher, StoreProvider};

use super::{client::ClientAuthenticator, ensure_business, principal::PrincipalAuthenticator};
use crate::{config::AuthSettings, error::ServiceError};

/// 認証フロー
pub struct AuthenticationFlow {
    store:      Arc<dyn StoreProvider>,
    clients:    ClientAuthenticator,
    principals: PrincipalAuthenticator,
}

impl AuthenticationFlow {
    pub fn new(
        store: Arc<dyn StoreProvider>,
        hasher: Arc<dyn PasswordHasher>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            clients: ClientAuthenticator::new(Arc::clone(&store), hasher),
            principals: PrincipalAuthenticator::new(Arc::clone(&store), settings),
            store,
        }
    }

    /// 認証要求を処理する
    ///
    /// # Errors
    ///
    /// - クライアント認証失敗・未対応のクライアント種別: `ClientAuthFailure`
    /// - スコープに事業者 ID がない: `MissingParameter`
    /// - 事業者が存在しない: `InvalidTenant`
    /// - `client_credentials` や未知のグラント: `GrantNotSupported`
    /// - 顧客認証の失敗（削除済み・未検証を含む）: `AuthenticationFailed`
    #[tracing::instrument(
        skip_all,
        fields(
            client_id = %request.client_id,
            grant_type = %request.grant_type,
            business_id = tracing::field::Empty,
        )
    )]
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<AuthGrant, ServiceError> {
        let client = self
            .clients
            .authenticate(&request.client_id, &request.client_secret)
            .await?;

        // 種別・スコープは認証済みクライアントのものを使う
        let params = ClientAuthenticator::parse_scope(request);
        let business_id = resolve_tenant(client.client_type(), client.client_scope(), &params)?;

        if let Some(business_id) = &business_id {
            tracing::Span::current().record("business_id", tracing::field::display(business_id));
            ensure_business(self.store.as_ref(), business_id).await?;
        }

        let grant_type = GrantType::from_str(&request.grant_type)
            .map_err(|_| ServiceError::GrantNotSupported(request.grant_type.clone()))?;
        let grant = AuthGrant::new(&client, grant_type, business_id);

        match grant_type {
            GrantType::ClientCredentials => {
                Err(ServiceError::GrantNotSupported(grant_type.to_string()))
            }
            GrantType::Password => {
                let customer = self
                    .principals
                    .authenticate(grant.business_id(), request, &params)
                    .await?;
                tracing::info!(customer_id = %customer.id(), "顧客認証に成功");
                Ok(grant.with_user(customer.id().clone()))
            }
            GrantType::RefreshToken => {
                // TODO: リフレッシュトークンの発行元ストアを実装したら署名と有効期限を検証する
                tracing::warn!("リフレッシュトークンは検証せずに受理している");
                Ok(grant)
            }
        }
    }
}
