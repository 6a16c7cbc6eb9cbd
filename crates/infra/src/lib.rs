//! # Salesdesk インフラ層
//!
//! データベースとパスワードハッシュの具体実装を提供する。
//!
//! ## 責務
//!
//! - **データベース接続**: プラットフォーム DB とリージョン DB の接続プール、
//!   事業者スコープ付きコネクション（RLS）
//! - **リポジトリ実装**: 事業者レジストリ、クライアント、顧客資格情報、汎用エンティティ
//! - **ストア**: リポジトリハンドルを開く [`StoreProvider`]
//! - **パスワード**: Argon2id によるハッシュ化と照合
//!
//! ## 依存関係
//!
//! ```text
//! sales-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - 接続プール、マイグレーション、テナントコネクション
//! - [`error`] - インフラ層エラー定義
//! - [`password`] - パスワードハッシュ
//! - [`repository`] - リポジトリトレイトと PostgreSQL 実装
//! - [`store`] - リポジトリハンドルのプロバイダ
//! - `mock` - インメモリストア（`test-utils` feature）
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use salesdesk_infra::{Argon2PasswordHasher, PostgresStoreProvider, db};
//!
//! let platform = db::create_pool("postgres://localhost/platform", 10).await?;
//! let region = db::create_pool("postgres://localhost/region", 10).await?;
//! let store = PostgresStoreProvider::new(platform, region, Arc::new(Argon2PasswordHasher::new()));
//! ```

pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod password;
pub mod repository;
pub mod store;

pub use error::{InfraError, InfraErrorKind};
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use store::{PostgresStoreProvider, StoreProvider};
