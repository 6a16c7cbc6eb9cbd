//! # 顧客サービス
//!
//! 顧客レコードの CRUD。汎用の [`EntityUseCase`] に以下を加える。
//!
//! - 作成・更新時、平文パスワードを Argon2id ハッシュに置き換えて保存する
//! - 読み取り経路ではパスワードハッシュを取り除いて返す
//! - パスワード変更

use std::sync::Arc;

use salesdesk_domain::{
    clock::Clock,
    customer::FIELD_PASSWORD,
    entity::{Attributes, EntityId, EntityKind, EntityPatch, EntityRecord},
    password::PlainPassword,
    query::{Filter, ListQuery, Page},
    tenant::BusinessId,
};
use salesdesk_infra::{PasswordHasher, StoreProvider};
use serde_json::Value;

use super::entity::EntityUseCase;
use crate::error::ServiceError;

/// 顧客サービス
pub struct CustomerUseCase {
    inner:  EntityUseCase,
    hasher: Arc<dyn PasswordHasher>,
}

impl CustomerUseCase {
    pub async fn open(
        store: &dyn StoreProvider,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn PasswordHasher>,
        business_id: &BusinessId,
    ) -> Result<Self, ServiceError> {
        let inner =
            EntityUseCase::open_unchecked(store, clock, EntityKind::Customer, business_id, None)
                .await?;
        Ok(Self { inner, hasher })
    }

    pub async fn list(&mut self, query: ListQuery) -> Result<Page<EntityRecord>, ServiceError> {
        if query.filter.conditions().contains_key(FIELD_PASSWORD) {
            return Err(password_filter_rejected());
        }
        Ok(self.inner.list(query).await?.map(strip_password))
    }

    pub async fn get(&mut self, id: &str) -> Result<EntityRecord, ServiceError> {
        self.inner.get(id).await.map(strip_password)
    }

    pub async fn find(&mut self, filter: Filter) -> Result<Option<EntityRecord>, ServiceError> {
        if filter.conditions().contains_key(FIELD_PASSWORD) {
            return Err(password_filter_rejected());
        }
        Ok(self.inner.find(filter).await?.map(strip_password))
    }

    /// 顧客を作成する
    #[tracing::instrument(skip_all, fields(business_id = %self.inner.business_id()))]
    pub async fn create(&mut self, mut input: Attributes) -> Result<EntityRecord, ServiceError> {
        self.hash_password_field(&mut input)?;
        self.inner.create(input).await.map(strip_password)
    }

    /// 顧客を部分更新する
    ///
    /// パスワードが含まれていれば再ハッシュ化する。
    #[tracing::instrument(skip(self, input), fields(business_id = %self.inner.business_id()))]
    pub async fn update(&mut self, id: &str, mut input: Attributes) -> Result<EntityRecord, ServiceError> {
        self.hash_password_field(&mut input)?;
        self.inner.update(id, input).await.map(strip_password)
    }

    /// パスワードを変更する
    #[tracing::instrument(skip(self, password), fields(business_id = %self.inner.business_id()))]
    pub async fn change_password(&mut self, id: &str, password: &PlainPassword) -> Result<(), ServiceError> {
        if password.is_empty() {
            return Err(ServiceError::Validation("パスワードは必須です".to_string()));
        }
        let hash = self.hasher.hash(password)?;
        let id = EntityId::new(id)?;
        self.inner
            .apply(&id, &EntityPatch::set(FIELD_PASSWORD, hash.into_string()))
            .await?;
        tracing::info!("パスワードを変更");
        Ok(())
    }

    pub async fn delete(&mut self, id: &str, permanent: bool) -> Result<(), ServiceError> {
        self.inner.delete(id, permanent).await
    }

    /// 入力中の平文パスワードをハッシュに置き換える
    fn hash_password_field(&self, input: &mut Attributes) -> Result<(), ServiceError> {
        let hash = match input.get(FIELD_PASSWORD) {
            None => return Ok(()),
            Some(Value::String(plain)) if !plain.is_empty() => {
                self.hasher.hash(&PlainPassword::new(plain.as_str()))?
            }
            Some(_) => {
                return Err(ServiceError::Validation(
                    "パスワードは空でない文字列である必要があります".to_string(),
                ));
            }
        };
        input.insert(FIELD_PASSWORD.to_string(), Value::String(hash.into_string()));
        Ok(())
    }
}

fn strip_password(record: EntityRecord) -> EntityRecord {
    record.without_attribute(FIELD_PASSWORD)
}

fn password_filter_rejected() -> ServiceError {
    ServiceError::Validation("パスワードを検索条件に指定することはできません".to_string())
}
