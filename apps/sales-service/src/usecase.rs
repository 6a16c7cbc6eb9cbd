//! # ユースケース層
//!
//! Sales Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **ハンドル単位のリソース管理**: リポジトリは [`StoreProvider`] から開き、
//!   スコープを抜けた時点でコネクションを返却する
//! - **依存性注入**: ストア、パスワードハッシャー、時計を外部から注入
//! - **汎用 CRUD**: エンティティ種別ごとのサービスは [`EntityUseCase`] 1 つで表現する

pub mod auth;
pub mod client;
pub mod customer;
pub mod entity;
pub mod principal;

pub use auth::AuthenticationFlow;
pub use client::ClientAuthenticator;
pub use customer::CustomerUseCase;
pub use entity::EntityUseCase;
pub use principal::PrincipalAuthenticator;
use salesdesk_domain::tenant::{Business, BusinessId};
use salesdesk_infra::StoreProvider;

use crate::error::ServiceError;

/// 事業者が存在し、削除されていないことを確認する
///
/// レジストリのハンドルはこの関数内で返却される。
pub(crate) async fn ensure_business(
    store: &dyn StoreProvider,
    business_id: &BusinessId,
) -> Result<Business, ServiceError> {
    let business = {
        let mut registry = store.tenant_registry().await?;
        registry.find_by_id(business_id).await?
    };

    match business {
        Some(business) if business.is_active() => Ok(business),
        _ => {
            tracing::info!(%business_id, "存在しない事業者が指定された");
            Err(ServiceError::InvalidTenant(business_id.to_string()))
        }
    }
}

/// 呼び出し元から受け取った事業者 ID を検証する
pub(crate) fn parse_business_id(value: &str) -> Result<BusinessId, ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::MissingParameter("business_id".to_string()));
    }
    BusinessId::new(value).map_err(|_| ServiceError::InvalidTenant(value.to_string()))
}
