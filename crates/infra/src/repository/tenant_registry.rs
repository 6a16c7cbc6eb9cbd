//! # TenantRegistry
//!
//! プラットフォーム DB の事業者テーブルを参照し、事業者の存在を確認する。
//!
//! 読み取り専用。事業者の登録・更新はプラットフォーム側の責務。

use async_trait::async_trait;
use salesdesk_domain::tenant::{Business, BusinessId, BusinessName};
use sqlx::{Postgres, pool::PoolConnection};

use crate::error::InfraError;

/// 事業者レジストリトレイト
#[async_trait]
pub trait TenantRegistry: Send {
    /// ID で事業者を検索する
    ///
    /// 論理削除済みの事業者も返す（呼び出し側が [`Business::is_active`] で判定する）。
    async fn find_by_id(&mut self, id: &BusinessId) -> Result<Option<Business>, InfraError>;
}

#[derive(Debug, sqlx::FromRow)]
struct BusinessRow {
    business_id:   String,
    business_name: String,
    is_deleted:    bool,
}

/// PostgreSQL 実装の TenantRegistry
///
/// プラットフォームプールから借りたコネクションを所有する。
pub struct PostgresTenantRegistry {
    conn: PoolConnection<Postgres>,
}

impl PostgresTenantRegistry {
    pub fn new(conn: PoolConnection<Postgres>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TenantRegistry for PostgresTenantRegistry {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&mut self, id: &BusinessId) -> Result<Option<Business>, InfraError> {
        let row = sqlx::query_as::<_, BusinessRow>(
            r#"
            SELECT business_id, business_name, is_deleted
            FROM businesses
            WHERE business_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Business::from_db(
            BusinessId::new(row.business_id)?,
            BusinessName::new(row.business_name)?,
            row.is_deleted,
        )))
    }
}
