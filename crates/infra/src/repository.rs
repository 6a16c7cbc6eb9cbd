//! # リポジトリ実装
//!
//! プラットフォーム DB とリージョン DB へのアクセスをトレイトの背後に隠す。
//!
//! すべてのリポジトリはコネクションを所有するハンドルとして
//! [`StoreProvider`](crate::store::StoreProvider) から開かれ、
//! ドロップ時にコネクションをプールへ返却する。

pub mod client_repository;
pub mod credential_store;
pub mod entity_repository;
pub mod tenant_registry;

pub use client_repository::{ClientRepository, PostgresClientRepository};
pub use credential_store::{CredentialStore, PostgresCredentialStore};
pub use entity_repository::{EntityRepository, PostgresEntityRepository};
pub use tenant_registry::{PostgresTenantRegistry, TenantRegistry};
