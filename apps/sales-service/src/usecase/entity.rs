//! # エンティティ CRUD
//!
//! バナー、ブランド、キャンペーン、商品など、すべての販売エンティティに共通の
//! List / Get / Find / Create / Update / Delete を提供する。
//!
//! ## 事業者スコープ
//!
//! [`EntityUseCase::open`] は事業者の存在を確認してから、その事業者に
//! スコープされたリポジトリを開く。以降の操作はすべてこのリポジトリを通る。
//!
//! ## 顧客従属エンティティ
//!
//! カート・注文・レビュー・ウィッシュリストは顧客 ID を伴って開くことができる。
//! この場合、顧客の存在を確認し、作成時に顧客 ID を付与し、一覧・検索・取得を
//! その顧客のレコードに限定する。
//!
//! ## 削除
//!
//! - `permanent = true`: 物理削除
//! - `permanent = false`: `is_deleted = true` の部分更新（論理削除）

use std::sync::Arc;

use salesdesk_domain::{
    clock::Clock,
    entity::{Attributes, EntityId, EntityKind, EntityPatch, EntityRecord},
    query::{Filter, ListQuery, Page},
    tenant::BusinessId,
};
use salesdesk_infra::{StoreProvider, repository::EntityRepository};
use serde_json::Value;

use super::ensure_business;
use crate::error::ServiceError;

const FIELD_ID: &str = "id";
const FIELD_CUSTOMER_ID: &str = "customer_id";

/// 1 つのエンティティ種別に対する CRUD サービス
///
/// 保持しているリポジトリハンドルは、このサービスのドロップ時に返却される。
pub struct EntityUseCase {
    repo:        Box<dyn EntityRepository>,
    clock:       Arc<dyn Clock>,
    customer_id: Option<EntityId>,
}

impl EntityUseCase {
    /// 事業者（と顧客）を検証してサービスを開く
    ///
    /// 検証に失敗した場合、それまでに開いたハンドルはすべて返却される。
    /// 顧客はパスワードを扱うため [`CustomerUseCase`](super::CustomerUseCase) からのみ操作できる。
    pub async fn open(
        store: &dyn StoreProvider,
        clock: Arc<dyn Clock>,
        kind: EntityKind,
        business_id: &BusinessId,
        customer_id: Option<&str>,
    ) -> Result<Self, ServiceError> {
        if kind == EntityKind::Customer {
            return Err(ServiceError::Validation(
                "顧客は顧客サービスから操作してください".to_string(),
            ));
        }
        Self::open_unchecked(store, clock, kind, business_id, customer_id).await
    }

    #[tracing::instrument(skip_all, fields(%kind, %business_id, customer_id = ?customer_id))]
    pub(crate) async fn open_unchecked(
        store: &dyn StoreProvider,
        clock: Arc<dyn Clock>,
        kind: EntityKind,
        business_id: &BusinessId,
        customer_id: Option<&str>,
    ) -> Result<Self, ServiceError> {
        ensure_business(store, business_id).await?;

        let customer_id = match customer_id {
            None => None,
            Some(_) if !kind.is_customer_owned() => {
                return Err(ServiceError::Validation(format!(
                    "{kind} は顧客に従属しないエンティティです"
                )));
            }
            Some(raw) => {
                let id = EntityId::new(raw)
                    .map_err(|_| ServiceError::InvalidPrincipal(raw.to_string()))?;
                ensure_customer(store, business_id, &id).await?;
                Some(id)
            }
        };

        let repo = store.entity_repository(kind, business_id).await?;
        Ok(Self {
            repo,
            clock,
            customer_id,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.repo.kind()
    }

    pub fn business_id(&self) -> &BusinessId {
        self.repo.business_id()
    }

    pub fn customer_id(&self) -> Option<&EntityId> {
        self.customer_id.as_ref()
    }

    /// 一覧を取得する
    #[tracing::instrument(skip_all, fields(kind = %self.kind(), skip = query.skip, limit = query.limit))]
    pub async fn list(&mut self, query: ListQuery) -> Result<Page<EntityRecord>, ServiceError> {
        let query = match &self.customer_id {
            Some(customer_id) => query.with_condition(FIELD_CUSTOMER_ID, customer_id.as_str()),
            None => query,
        };
        Ok(self.repo.list(&query).await?)
    }

    /// ID で 1 件取得する
    #[tracing::instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn get(&mut self, id: &str) -> Result<EntityRecord, ServiceError> {
        let id = EntityId::new(id)?;
        self.fetch_owned(&id).await
    }

    /// フィルタに一致する最初の 1 件を取得する
    #[tracing::instrument(skip_all, fields(kind = %self.kind()))]
    pub async fn find(&mut self, filter: Filter) -> Result<Option<EntityRecord>, ServiceError> {
        let filter = match &self.customer_id {
            Some(customer_id) => filter.with(FIELD_CUSTOMER_ID, customer_id.as_str()),
            None => filter,
        };
        Ok(self.repo.find(&filter).await?)
    }

    /// レコードを作成する
    ///
    /// 入力に `id` があれば小文字化して使用し、なければ種別の接頭辞付きで採番する。
    /// 同じ ID のレコードが既に存在する場合は `AlreadyExists`。
    #[tracing::instrument(skip_all, fields(kind = %self.kind(), id = tracing::field::Empty))]
    pub async fn create(&mut self, input: Attributes) -> Result<EntityRecord, ServiceError> {
        let kind = self.kind();
        let id = match input.get(FIELD_ID) {
            None | Some(Value::Null) => EntityId::generate(kind),
            Some(Value::String(raw)) if !raw.trim().is_empty() => EntityId::new(raw.as_str())?,
            Some(_) => {
                return Err(ServiceError::Validation(
                    "id は空でない文字列である必要があります".to_string(),
                ));
            }
        };
        tracing::Span::current().record("id", id.as_str());

        if self.repo.get(&id).await?.is_some() {
            return Err(ServiceError::AlreadyExists {
                entity: kind.to_string(),
                id:     id.to_string(),
            });
        }

        let record = EntityRecord::new(
            kind,
            id,
            self.business_id().clone(),
            self.customer_id.clone(),
            input,
            self.clock.now(),
        );
        self.repo.create(&record).await?;

        tracing::info!("レコードを作成");
        Ok(record)
    }

    /// レコードを部分更新する
    ///
    /// ID・事業者 ID などのキーフィールドは入力に含まれていても更新しない。
    #[tracing::instrument(skip(self, input), fields(kind = %self.kind()))]
    pub async fn update(&mut self, id: &str, input: Attributes) -> Result<EntityRecord, ServiceError> {
        let patch = EntityPatch::new(input)?;
        let id = EntityId::new(id)?;
        self.apply(&id, &patch).await
    }

    /// レコードを削除する
    ///
    /// 論理削除は何度実行しても同じ結果になる。
    #[tracing::instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn delete(&mut self, id: &str, permanent: bool) -> Result<(), ServiceError> {
        let id = EntityId::new(id)?;

        if !permanent {
            self.apply(&id, &EntityPatch::soft_delete()).await?;
            tracing::info!("レコードを論理削除");
            return Ok(());
        }

        if self.customer_id.is_some() {
            self.fetch_owned(&id).await?;
        }
        if !self.repo.delete(&id).await? {
            return Err(self.not_found(&id));
        }
        tracing::info!("レコードを物理削除");
        Ok(())
    }

    pub(crate) async fn apply(
        &mut self,
        id: &EntityId,
        patch: &EntityPatch,
    ) -> Result<EntityRecord, ServiceError> {
        if self.customer_id.is_some() {
            self.fetch_owned(id).await?;
        }
        let now = self.clock.now();
        self.repo
            .update(id, patch, now)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// 取得したレコードが顧客スコープに含まれることを確認する
    async fn fetch_owned(&mut self, id: &EntityId) -> Result<EntityRecord, ServiceError> {
        let record = self.repo.get(id).await?.ok_or_else(|| self.not_found(id))?;

        match &self.customer_id {
            Some(customer_id) if record.customer_id() != Some(customer_id) => Err(self.not_found(id)),
            _ => Ok(record),
        }
    }

    fn not_found(&self, id: &EntityId) -> ServiceError {
        ServiceError::NotFound {
            entity: self.kind().to_string(),
            id:     id.to_string(),
        }
    }
}

/// 顧客が存在し、削除されていないことを確認する
async fn ensure_customer(
    store: &dyn StoreProvider,
    business_id: &BusinessId,
    customer_id: &EntityId,
) -> Result<(), ServiceError> {
    let customer = {
        let mut customers = store
            .entity_repository(EntityKind::Customer, business_id)
            .await?;
        customers.get(customer_id).await?
    };

    match customer {
        Some(customer) if !customer.is_deleted() => Ok(()),
        _ => Err(ServiceError::InvalidPrincipal(customer_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use salesdesk_infra::mock::{HandleKind, InMemoryStore};
    use serde_json::json;

    use super::*;
    use crate::usecase::test_support::*;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    async fn open(store: &InMemoryStore, kind: EntityKind) -> EntityUseCase {
        EntityUseCase::open(store, clock(), kind, &business_id(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_idを省略すると種別の接頭辞付きで採番される() {
        // Given
        let store = store_with_business();
        let mut sut = open(&store, EntityKind::Campaign).await;

        // When
        let created = sut.create(attrs(json!({"title": "Summer"}))).await.unwrap();

        // Then
        assert!(created.id().as_str().starts_with("camp_"));
        assert_eq!(created.business_id(), &business_id());
        assert_eq!(created.created_at(), now());
        assert_eq!(created.attribute("title"), Some(&json!("Summer")));
    }

    #[tokio::test]
    async fn test_明示したidは小文字化され大文字小文字を問わず取得できる() {
        // Given
        let store = store_with_business();
        let mut sut = open(&store, EntityKind::Brand).await;

        // When
        let created = sut
            .create(attrs(json!({"id": "BRND_Acme", "name": "Acme"})))
            .await
            .unwrap();
        let fetched = sut.get("brnd_ACME").await.unwrap();
        let duplicate = sut.create(attrs(json!({"id": "brnd_acme"}))).await;

        // Then
        assert_eq!(created.id().as_str(), "brnd_acme");
        assert_eq!(fetched, created);
        assert!(matches!(duplicate, Err(ServiceError::AlreadyExists { id, .. }) if id == "brnd_acme"));
        assert_eq!(store.record_count(EntityKind::Brand), 1);
    }

    #[rstest]
    #[case(json!({"id": 42}))]
    #[case(json!({"id": "  "}))]
    #[tokio::test]
    async fn test_不正なidはバリデーションエラー(#[case] input: Value) {
        let store = store_with_business();
        let mut sut = open(&store, EntityKind::Brand).await;

        let result = sut.create(attrs(input)).await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_更新でキーフィールドは変更されない() {
        // Given
        let store = store_with_business();
        store.add_record(record(EntityKind::Offer, "offr_1", json!({"title": "old"})));
        let mut sut = open(&store, EntityKind::Offer).await;

        // When
        let updated = sut
            .update(
                "offr_1",
                attrs(json!({"title": "new", "id": "offr_2", "business_id": "biz_x"})),
            )
            .await
            .unwrap();

        // Then
        assert_eq!(updated.id().as_str(), "offr_1");
        assert_eq!(updated.business_id(), &business_id());
        assert_eq!(updated.attribute("title"), Some(&json!("new")));
    }

    #[tokio::test]
    async fn test_存在しないレコードの更新はnot_found() {
        let store = store_with_business();
        let mut sut = open(&store, EntityKind::Offer).await;

        let result = sut.update("offr_none", attrs(json!({"title": "x"}))).await;

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_論理削除は冪等() {
        // Given
        let store = store_with_business();
        store.add_record(record(EntityKind::Coupon, "coup_1", json!({"code": "SAVE10"})));
        let mut sut = open(&store, EntityKind::Coupon).await;

        // When
        sut.delete("coup_1", false).await.unwrap();
        sut.delete("coup_1", false).await.unwrap();

        // Then
        let stored = sut.get("coup_1").await.unwrap();
        assert!(stored.is_deleted());
        assert_eq!(stored.attribute("code"), Some(&json!("SAVE10")));
    }

    #[tokio::test]
    async fn test_物理削除はレコードを取り除く() {
        // Given
        let store = store_with_business();
        store.add_record(record(EntityKind::Coupon, "coup_1", json!({})));
        let mut sut = open(&store, EntityKind::Coupon).await;

        // When
        sut.delete("coup_1", true).await.unwrap();
        let again = sut.delete("coup_1", true).await;

        // Then
        assert_eq!(store.record_count(EntityKind::Coupon), 0);
        assert!(matches!(again, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_一覧と検索() {
        // Given
        let store = store_with_business();
        for (id, color, price) in [("prod_a", "red", 300), ("prod_b", "red", 100), ("prod_c", "blue", 200)] {
            store.add_record(record(EntityKind::Product, id, json!({"color": color, "price": price})));
        }
        let mut sut = open(&store, EntityKind::Product).await;

        // When
        let page = sut
            .list(ListQuery::parse(r#"{"color": "red"}"#, "-price", 0, 0).unwrap())
            .await
            .unwrap();
        let found = sut.find(Filter::parse(r#"{"color": "blue"}"#).unwrap()).await.unwrap();
        let missing = sut.find(Filter::parse(r#"{"color": "green"}"#).unwrap()).await.unwrap();

        // Then
        let ids: Vec<_> = page.items.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["prod_a", "prod_b"]);
        assert_eq!(page.total, 2);
        assert_eq!(found.unwrap().id().as_str(), "prod_c");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_存在しない事業者では開けずハンドルも残らない() {
        let store = InMemoryStore::new();

        let result = EntityUseCase::open(&store, clock(), EntityKind::Banner, &business_id(), None).await;

        assert!(matches!(result, Err(ServiceError::InvalidTenant(_))));
        assert_eq!(store.tracker().acquired(HandleKind::EntityRepository), 0);
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_汎用サービスでは顧客を扱えない() {
        // Given
        let store = store_with_business();

        // When
        let result = EntityUseCase::open(&store, clock(), EntityKind::Customer, &business_id(), None).await;

        // Then
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.tracker().total_acquired(), 0);
    }

    #[tokio::test]
    async fn test_サービスのドロップでハンドルが返却される() {
        let store = store_with_business();

        {
            let mut sut = open(&store, EntityKind::Page).await;
            let _ = sut.get("page_none").await;
            assert_eq!(store.tracker().outstanding(), 1);
        }

        assert_eq!(store.tracker().total_acquired(), store.tracker().total_released());
    }

    mod customer_owned {
        use pretty_assertions::assert_eq;

        use super::*;

        fn store_with_customers() -> InMemoryStore {
            let store = store_with_business();
            store.add_record(record(EntityKind::Customer, "cust_alice", json!({})));
            store.add_record(record(EntityKind::Customer, "cust_bob", json!({})));
            store
        }

        async fn open_for(store: &InMemoryStore, customer_id: &str) -> EntityUseCase {
            EntityUseCase::open(
                store,
                clock(),
                EntityKind::CustomerCart,
                &business_id(),
                Some(customer_id),
            )
            .await
            .unwrap()
        }

        #[tokio::test]
        async fn test_作成時に顧客idが付与され一覧は顧客で絞り込まれる() {
            // Given
            let store = store_with_customers();
            let mut alice = open_for(&store, "cust_alice").await;
            let mut bob = open_for(&store, "cust_bob").await;

            // When
            let cart = alice.create(attrs(json!({"items": []}))).await.unwrap();
            bob.create(attrs(json!({"items": []}))).await.unwrap();
            let page = alice.list(ListQuery::default()).await.unwrap();

            // Then
            assert_eq!(cart.customer_id().map(EntityId::as_str), Some("cust_alice"));
            assert_eq!(page.total, 1);
            assert_eq!(page.items[0].id(), cart.id());
        }

        #[tokio::test]
        async fn test_他の顧客のレコードは取得も削除もできない() {
            let store = store_with_customers();
            let mut alice = open_for(&store, "cust_alice").await;
            let cart = alice.create(attrs(json!({}))).await.unwrap();
            let mut bob = open_for(&store, "cust_bob").await;

            let get = bob.get(cart.id().as_str()).await;
            let delete = bob.delete(cart.id().as_str(), true).await;

            assert!(matches!(get, Err(ServiceError::NotFound { .. })));
            assert!(matches!(delete, Err(ServiceError::NotFound { .. })));
            assert!(alice.get(cart.id().as_str()).await.is_ok());
        }

        #[rstest]
        #[case::未登録("cust_nobody")]
        #[case::削除済み("cust_gone")]
        #[tokio::test]
        async fn test_無効な顧客ではinvalid_principal(#[case] customer_id: &str) {
            // Given
            let store = store_with_customers();
            let gone = record(EntityKind::Customer, "cust_gone", json!({}))
                .patched(&EntityPatch::soft_delete(), now());
            store.add_record(gone);

            // When
            let result = EntityUseCase::open(
                &store,
                clock(),
                EntityKind::CustomerOrder,
                &business_id(),
                Some(customer_id),
            )
            .await;

            // Then
            assert!(matches!(result, Err(ServiceError::InvalidPrincipal(_))));
            assert_eq!(store.tracker().outstanding(), 0);
        }

        #[tokio::test]
        async fn test_顧客に従属しない種別に顧客idは指定できない() {
            let store = store_with_customers();

            let result = EntityUseCase::open(
                &store,
                clock(),
                EntityKind::Brand,
                &business_id(),
                Some("cust_alice"),
            )
            .await;

            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
    }
}
