//! # CredentialStore
//!
//! 事業者にスコープされた顧客の認証情報を照合する。
//!
//! ストアは解決済みの事業者のテナントコネクションで開かれるため、
//! 他の事業者に同じログイン ID の顧客が存在しても照合対象にならない。
//!
//! ## タイミング攻撃対策
//!
//! ログイン ID に一致する顧客がいない場合、またはパスワードハッシュを
//! 持たない顧客の場合もダミーハッシュで照合を行い、処理時間を均一化する。

use std::sync::Arc;

use async_trait::async_trait;
use salesdesk_domain::{
    customer::{Customer, LoginKey},
    entity::{EntityKind, EntityRecord},
    password::PlainPassword,
    tenant::BusinessId,
};

use crate::{
    db::TenantConnection,
    error::InfraError,
    password::PasswordHasher,
    repository::entity_repository::{RECORD_COLUMNS, RecordRow},
};

#[async_trait]
pub trait CredentialStore: Send {
    fn business_id(&self) -> &BusinessId;

    /// ログインキーとパスワードで顧客を照合する
    ///
    /// 顧客が存在しない場合とパスワードが一致しない場合は、
    /// どちらも `Ok(None)` を返し区別しない。
    /// 論理削除・未検証の判定は行わない（呼び出し側の責務）。
    async fn authenticate(
        &mut self,
        login_key: LoginKey,
        login_value: &str,
        password: &PlainPassword,
    ) -> Result<Option<Customer>, InfraError>;
}

/// 照合済みの顧客レコードに対してパスワードを検証する
///
/// PostgreSQL 実装とインメモリ実装で共有する。
pub(crate) fn verify_customer(
    hasher: &dyn PasswordHasher,
    record: Option<EntityRecord>,
    password: &PlainPassword,
) -> Result<Option<Customer>, InfraError> {
    let Some(record) = record else {
        hasher.dummy_verify(password);
        return Ok(None);
    };

    let customer = Customer::from_record(&record)?;
    let Some(hash) = customer.password_hash() else {
        hasher.dummy_verify(password);
        return Ok(None);
    };

    if hasher.verify(password, hash)?.is_match() {
        Ok(Some(customer))
    } else {
        Ok(None)
    }
}

/// PostgreSQL 実装の CredentialStore
pub struct PostgresCredentialStore {
    conn:   TenantConnection,
    hasher: Arc<dyn PasswordHasher>,
}

impl PostgresCredentialStore {
    pub fn new(conn: TenantConnection, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { conn, hasher }
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    fn business_id(&self) -> &BusinessId {
        self.conn.business_id()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%login_key))]
    async fn authenticate(
        &mut self,
        login_key: LoginKey,
        login_value: &str,
        password: &PlainPassword,
    ) -> Result<Option<Customer>, InfraError> {
        let business_id = self.conn.business_id().clone();

        // ログインキーの属性名は LoginKey の固定値のみ。
        // 削除済みの顧客より、同じキーで登録し直された有効な顧客を優先する
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM sales_records
            WHERE business_id = $1 AND kind = $2 AND attributes ->> $3 = $4
            ORDER BY is_deleted ASC, created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(business_id.as_str())
        .bind(EntityKind::Customer.as_str())
        .bind(login_key.attribute_name())
        .bind(login_value)
        .fetch_optional(&mut *self.conn)
        .await?;

        let record = row.map(EntityRecord::try_from).transpose()?;
        verify_customer(self.hasher.as_ref(), record, password)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use salesdesk_domain::{
        entity::EntityId,
        password::{PasswordHash, PasswordVerifyResult},
    };
    use serde_json::json;

    use super::*;

    /// `hashed:<平文>` 形式で照合するスタブ
    struct StubHasher;

    impl PasswordHasher for StubHasher {
        fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError> {
            Ok(PasswordHash::new(format!("hashed:{}", password.as_str())))
        }

        fn verify(
            &self,
            password: &PlainPassword,
            hash: &PasswordHash,
        ) -> Result<PasswordVerifyResult, InfraError> {
            Ok((hash.as_str() == format!("hashed:{}", password.as_str())).into())
        }
    }

    fn customer(attributes: serde_json::Value) -> EntityRecord {
        EntityRecord::new(
            EntityKind::Customer,
            EntityId::new("cust_1").unwrap(),
            BusinessId::new("biz_1").unwrap(),
            None,
            attributes.as_object().cloned().unwrap(),
            DateTime::from_timestamp(0, 0).unwrap(),
        )
    }

    #[test]
    fn test_パスワードが一致すれば顧客を返す() {
        let record = customer(json!({"customer_login_id": "alice", "customer_password": "hashed:pw"}));

        let result = verify_customer(&StubHasher, Some(record), &PlainPassword::new("pw")).unwrap();

        assert_eq!(result.unwrap().id().as_str(), "cust_1");
    }

    #[test]
    fn test_パスワード不一致と顧客不在は同じ結果になる() {
        let record = customer(json!({"customer_password": "hashed:pw"}));

        let mismatch = verify_customer(&StubHasher, Some(record), &PlainPassword::new("nope")).unwrap();
        let missing = verify_customer(&StubHasher, None, &PlainPassword::new("nope")).unwrap();

        assert!(mismatch.is_none());
        assert!(missing.is_none());
    }

    #[test]
    fn test_パスワードを持たない顧客は照合に失敗する() {
        let record = customer(json!({"customer_login_id": "alice"}));

        let result = verify_customer(&StubHasher, Some(record), &PlainPassword::new("")).unwrap();

        assert!(result.is_none());
    }
}
