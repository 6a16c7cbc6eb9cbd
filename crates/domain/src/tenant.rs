//! # 事業者（テナント）
//!
//! マルチテナント構成における事業者（Business）のモデル。
//!
//! すべての販売データ（顧客、商品、キャンペーン等）は事業者に所属し、
//! 他の事業者からはアクセスできない。事業者そのものはプラットフォーム DB に、
//! 事業者配下のデータはリージョン DB に保存される。
//!
//! ## 使用例
//!
//! ```rust
//! use salesdesk_domain::tenant::{Business, BusinessId, BusinessName};
//!
//! let business = Business::from_db(
//!     BusinessId::new("biz_001").unwrap(),
//!     BusinessName::new("Dream Mattress").unwrap(),
//!     false,
//! );
//! assert!(business.is_active());
//! ```

use crate::DomainError;

define_string_id! {
    /// 事業者 ID
    ///
    /// テナント境界の識別子。外部から受け取った値をそのまま保持する
    /// （エンティティ ID と異なり小文字化しない）。
    ///
    /// # セキュリティ考慮事項
    ///
    /// 認証時の事業者 ID は認証済みクライアントのレコード、または
    /// スコープパラメータから解決され、存在確認を経てから使用される。
    pub struct BusinessId {
        label: "事業者 ID",
        max_length: 64,
    }
}

/// 事業者名（値オブジェクト）
///
/// # 不変条件
///
/// - 空文字列ではない
/// - 最大 255 文字
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_more::Display)]
#[display("{_0}")]
pub struct BusinessName(String);

impl BusinessName {
    /// 事業者名を作成する
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation("事業者名は必須です".to_string()));
        }

        if value.chars().count() > 255 {
            return Err(DomainError::Validation(
                "事業者名は 255 文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 事業者エンティティ
///
/// 認証フローでは存在確認のみに使用する。
#[derive(Debug, Clone)]
pub struct Business {
    id:         BusinessId,
    name:       BusinessName,
    is_deleted: bool,
}

impl Business {
    /// データベースから事業者を復元する
    pub fn from_db(id: BusinessId, name: BusinessName, is_deleted: bool) -> Self {
        Self {
            id,
            name,
            is_deleted,
        }
    }

    pub fn id(&self) -> &BusinessId {
        &self.id
    }

    pub fn name(&self) -> &BusinessName {
        &self.name
    }

    /// 論理削除されていないか
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
