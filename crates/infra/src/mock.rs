//! # テスト用インメモリストア
//!
//! ユースケーステストで使用するインメモリの [`StoreProvider`] 実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! salesdesk-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! [`ConnectionTracker`] はハンドルを開いた回数とドロップした回数を種類ごとに数える。
//! テストではユースケースの全経路でコネクションが返却されたこと、
//! 特定のストアに一切アクセスしなかったことを検証できる。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salesdesk_domain::{
    client::{ClientId, ClientRecord},
    customer::{Customer, LoginKey},
    entity::{EntityId, EntityKind, EntityPatch, EntityRecord},
    password::{PasswordHash, PasswordVerifyResult, PlainPassword},
    query::{Filter, ListQuery, Page},
    tenant::{Business, BusinessId},
};

use crate::{
    error::InfraError,
    password::PasswordHasher,
    repository::{
        ClientRepository,
        CredentialStore,
        EntityRepository,
        TenantRegistry,
        credential_store::verify_customer,
    },
    store::StoreProvider,
};

// ===== ConnectionTracker =====

/// ハンドルの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    TenantRegistry,
    ClientRepository,
    CredentialStore,
    EntityRepository,
}

#[derive(Debug, Default)]
struct TrackerState {
    acquired: HashMap<HandleKind, usize>,
    released: HashMap<HandleKind, usize>,
}

/// ハンドルの取得・返却回数の記録
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl ConnectionTracker {
    fn lease(&self, kind: HandleKind) -> Lease {
        *self.state.lock().unwrap().acquired.entry(kind).or_default() += 1;
        Lease {
            tracker: self.clone(),
            kind,
        }
    }

    pub fn acquired(&self, kind: HandleKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .acquired
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    pub fn released(&self, kind: HandleKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .released
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_acquired(&self) -> usize {
        self.state.lock().unwrap().acquired.values().sum()
    }

    pub fn total_released(&self) -> usize {
        self.state.lock().unwrap().released.values().sum()
    }

    /// 返却されていないハンドルの数
    pub fn outstanding(&self) -> usize {
        self.total_acquired() - self.total_released()
    }
}

/// ドロップ時に返却を記録するガード
#[derive(Debug)]
struct Lease {
    tracker: ConnectionTracker,
    kind:    HandleKind,
}

impl Drop for Lease {
    fn drop(&mut self) {
        *self
            .tracker
            .state
            .lock()
            .unwrap()
            .released
            .entry(self.kind)
            .or_default() += 1;
    }
}

// ===== StubPasswordHasher =====

/// `hashed:<平文>` 形式でハッシュ化するスタブ
///
/// Argon2id の計算コストをテストから除くために使用する。
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPasswordHasher;

impl PasswordHasher for StubPasswordHasher {
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

// ===== InMemoryStore =====

type RecordKey = (BusinessId, EntityKind, EntityId);

#[derive(Default)]
struct StoreState {
    businesses: HashMap<BusinessId, Business>,
    clients:    HashMap<ClientId, ClientRecord>,
    records:    HashMap<RecordKey, EntityRecord>,
}

/// インメモリの StoreProvider
#[derive(Clone)]
pub struct InMemoryStore {
    state:   Arc<Mutex<StoreState>>,
    tracker: ConnectionTracker,
    hasher:  Arc<dyn PasswordHasher>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_hasher(Arc::new(StubPasswordHasher))
    }

    pub fn with_hasher(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            tracker: ConnectionTracker::default(),
            hasher,
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn add_business(&self, business: Business) {
        self.state
            .lock()
            .unwrap()
            .businesses
            .insert(business.id().clone(), business);
    }

    pub fn add_client(&self, client: ClientRecord) {
        self.state
            .lock()
            .unwrap()
            .clients
            .insert(client.client_id().clone(), client);
    }

    /// レコードを直接投入する（既存の同一キーは上書き）
    pub fn add_record(&self, record: EntityRecord) {
        let key = (record.business_id().clone(), record.kind(), record.id().clone());
        self.state.lock().unwrap().records.insert(key, record);
    }

    /// 保存されているレコードを直接参照する
    pub fn record(&self, business_id: &BusinessId, kind: EntityKind, id: &EntityId) -> Option<EntityRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(business_id.clone(), kind, id.clone()))
            .cloned()
    }

    pub fn record_count(&self, kind: EntityKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .keys()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl StoreProvider for InMemoryStore {
    async fn tenant_registry(&self) -> Result<Box<dyn TenantRegistry>, InfraError> {
        Ok(Box::new(InMemoryTenantRegistry {
            state:  Arc::clone(&self.state),
            _lease: self.tracker.lease(HandleKind::TenantRegistry),
        }))
    }

    async fn client_repository(&self) -> Result<Box<dyn ClientRepository>, InfraError> {
        Ok(Box::new(InMemoryClientRepository {
            state:  Arc::clone(&self.state),
            _lease: self.tracker.lease(HandleKind::ClientRepository),
        }))
    }

    async fn credential_store(
        &self,
        business_id: &BusinessId,
    ) -> Result<Box<dyn CredentialStore>, InfraError> {
        Ok(Box::new(InMemoryCredentialStore {
            state:       Arc::clone(&self.state),
            business_id: business_id.clone(),
            hasher:      Arc::clone(&self.hasher),
            _lease:      self.tracker.lease(HandleKind::CredentialStore),
        }))
    }

    async fn entity_repository(
        &self,
        kind: EntityKind,
        business_id: &BusinessId,
    ) -> Result<Box<dyn EntityRepository>, InfraError> {
        Ok(Box::new(InMemoryEntityRepository {
            state: Arc::clone(&self.state),
            business_id: business_id.clone(),
            kind,
            _lease: self.tracker.lease(HandleKind::EntityRepository),
        }))
    }
}

struct InMemoryTenantRegistry {
    state:  Arc<Mutex<StoreState>>,
    _lease: Lease,
}

#[async_trait]
impl TenantRegistry for InMemoryTenantRegistry {
    async fn find_by_id(&mut self, id: &BusinessId) -> Result<Option<Business>, InfraError> {
        Ok(self.state.lock().unwrap().businesses.get(id).cloned())
    }
}

struct InMemoryClientRepository {
    state:  Arc<Mutex<StoreState>>,
    _lease: Lease,
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find_by_id(&mut self, id: &ClientId) -> Result<Option<ClientRecord>, InfraError> {
        Ok(self.state.lock().unwrap().clients.get(id).cloned())
    }
}

struct InMemoryCredentialStore {
    state:       Arc<Mutex<StoreState>>,
    business_id: BusinessId,
    hasher:      Arc<dyn PasswordHasher>,
    _lease:      Lease,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    fn business_id(&self) -> &BusinessId {
        &self.business_id
    }

    async fn authenticate(
        &mut self,
        login_key: LoginKey,
        login_value: &str,
        password: &PlainPassword,
    ) -> Result<Option<Customer>, InfraError> {
        let record = {
            let state = self.state.lock().unwrap();
            let mut candidates: Vec<_> = state
                .records
                .values()
                .filter(|r| r.business_id() == &self.business_id && r.kind() == EntityKind::Customer)
                .filter(|r| {
                    r.attribute(login_key.attribute_name())
                        .and_then(serde_json::Value::as_str)
                        == Some(login_value)
                })
                .cloned()
                .collect();
            candidates.sort_by(|a, b| {
                a.is_deleted()
                    .cmp(&b.is_deleted())
                    .then_with(|| a.created_at().cmp(&b.created_at()))
                    .then_with(|| a.id().as_str().cmp(b.id().as_str()))
            });
            candidates.into_iter().next()
        };

        verify_customer(self.hasher.as_ref(), record, password)
    }
}

struct InMemoryEntityRepository {
    state:       Arc<Mutex<StoreState>>,
    business_id: BusinessId,
    kind:        EntityKind,
    _lease:      Lease,
}

impl InMemoryEntityRepository {
    fn key(&self, id: &EntityId) -> RecordKey {
        (self.business_id.clone(), self.kind, id.clone())
    }

    fn matching(&self, filter: &Filter) -> Vec<EntityRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.business_id() == &self.business_id && r.kind() == self.kind)
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn business_id(&self) -> &BusinessId {
        &self.business_id
    }

    async fn list(&mut self, query: &ListQuery) -> Result<Page<EntityRecord>, InfraError> {
        let mut records = self.matching(&query.filter);
        records.sort_by(|a, b| query.sort.compare(a, b));

        let total = records.len() as u64;
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .effective_limit()
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        Ok(Page {
            items: records.into_iter().skip(skip).take(limit).collect(),
            total,
            skip: query.skip,
            limit: query.limit,
        })
    }

    async fn get(&mut self, id: &EntityId) -> Result<Option<EntityRecord>, InfraError> {
        Ok(self.state.lock().unwrap().records.get(&self.key(id)).cloned())
    }

    async fn find(&mut self, filter: &Filter) -> Result<Option<EntityRecord>, InfraError> {
        Ok(self
            .matching(filter)
            .into_iter()
            .min_by(|a, b| a.id().as_str().cmp(b.id().as_str())))
    }

    async fn create(&mut self, record: &EntityRecord) -> Result<(), InfraError> {
        let key = self.key(record.id());
        let mut state = self.state.lock().unwrap();
        if state.records.contains_key(&key) {
            return Err(InfraError::conflict(self.kind.as_str(), record.id().as_str()));
        }
        state.records.insert(key, record.clone());
        Ok(())
    }

    async fn update(
        &mut self,
        id: &EntityId,
        patch: &EntityPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<EntityRecord>, InfraError> {
        let key = self.key(id);
        let mut state = self.state.lock().unwrap();
        let Some(current) = state.records.remove(&key) else {
            return Ok(None);
        };
        let updated = current.patched(patch, now);
        state.records.insert(key, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&mut self, id: &EntityId) -> Result<bool, InfraError> {
        Ok(self.state.lock().unwrap().records.remove(&self.key(id)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn business_id() -> BusinessId {
        BusinessId::new("biz_1").unwrap()
    }

    fn record(kind: EntityKind, id: &str, attributes: serde_json::Value) -> EntityRecord {
        EntityRecord::new(
            kind,
            EntityId::new(id).unwrap(),
            business_id(),
            None,
            attributes.as_object().cloned().unwrap(),
            DateTime::from_timestamp(0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ハンドルのドロップで返却が記録される() {
        let store = InMemoryStore::new();

        {
            let _registry = store.tenant_registry().await.unwrap();
            let _repo = store.entity_repository(EntityKind::Brand, &business_id()).await.unwrap();
            assert_eq!(store.tracker().outstanding(), 2);
        }

        assert_eq!(store.tracker().acquired(HandleKind::TenantRegistry), 1);
        assert_eq!(store.tracker().released(HandleKind::EntityRepository), 1);
        assert_eq!(store.tracker().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_同じidの作成はconflictになる() {
        let store = InMemoryStore::new();
        let mut repo = store.entity_repository(EntityKind::Brand, &business_id()).await.unwrap();
        let brand = record(EntityKind::Brand, "brnd_1", json!({"name": "Acme"}));

        repo.create(&brand).await.unwrap();
        let result = repo.create(&brand).await;

        assert!(result.unwrap_err().as_conflict().is_some());
    }

    #[tokio::test]
    async fn test_リポジトリは種別と事業者でスコープされる() {
        let store = InMemoryStore::new();
        store.add_record(record(EntityKind::Brand, "x_1", json!({})));
        store.add_record(record(EntityKind::Coupon, "x_2", json!({})));
        let other = EntityRecord::new(
            EntityKind::Brand,
            EntityId::new("x_3").unwrap(),
            BusinessId::new("biz_2").unwrap(),
            None,
            Default::default(),
            DateTime::from_timestamp(0, 0).unwrap(),
        );
        store.add_record(other);

        let mut repo = store.entity_repository(EntityKind::Brand, &business_id()).await.unwrap();
        let page = repo.list(&ListQuery::default()).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id().as_str(), "x_1");
    }

    #[tokio::test]
    async fn test_一覧はソートとページングを適用する() {
        let store = InMemoryStore::new();
        for (id, rank) in [("prod_a", 3), ("prod_b", 1), ("prod_c", 2)] {
            store.add_record(record(EntityKind::Product, id, json!({"rank": rank})));
        }
        let mut repo = store.entity_repository(EntityKind::Product, &business_id()).await.unwrap();

        let page = repo
            .list(&ListQuery::parse("", "rank", 1, 1).unwrap())
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id().as_str(), "prod_c");
    }

    #[tokio::test]
    async fn test_資格情報ストアはログインidとパスワードで照合する() {
        let store = InMemoryStore::new();
        store.add_record(record(
            EntityKind::Customer,
            "cust_1",
            json!({"customer_login_id": "alice", "customer_password": "hashed:pw"}),
        ));
        let mut credentials = store.credential_store(&business_id()).await.unwrap();

        let found = credentials
            .authenticate(LoginKey::LoginId, "alice", &PlainPassword::new("pw"))
            .await
            .unwrap();
        let wrong = credentials
            .authenticate(LoginKey::LoginId, "alice", &PlainPassword::new("bad"))
            .await
            .unwrap();

        assert_eq!(found.unwrap().id().as_str(), "cust_1");
        assert!(wrong.is_none());
    }
}
