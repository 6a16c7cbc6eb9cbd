//! # Salesdesk ドメイン層
//!
//! 販売バックエンドのドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **エンティティ**: 事業者（テナント）にスコープされたレコード（顧客、キャンペーン等）
//! - **値オブジェクト**: 識別子やパスワードなど、生成時に検証される不変オブジェクト
//! - **ドメインサービス**: クライアント種別からテナントを解決するスコープ解決
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! sales-service → infra → domain
//!        ↘                  ↑
//!          ─────────────────┘
//! ```
//!
//! ドメイン層はインフラ層（DB、外部サービス）に一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`auth`] - 認証リクエストと認証結果（グラント）
//! - [`client`] - クライアントアプリケーションとスコープ解決
//! - [`clock`] - 時刻プロバイダ
//! - [`customer`] - 顧客（認証主体）
//! - [`entity`] - エンティティ種別、識別子、汎用レコード
//! - [`error`] - ドメインエラー
//! - [`password`] - パスワード値オブジェクト
//! - [`query`] - 一覧取得の条件とページ
//! - [`tenant`] - 事業者（テナント）
//!
//! ## 使用例
//!
//! ```rust
//! use salesdesk_domain::entity::{EntityId, EntityKind};
//!
//! let id = EntityId::generate(EntityKind::Campaign);
//! assert!(id.as_str().starts_with("camp_"));
//! ```

#[macro_use]
mod macros;

pub mod auth;
pub mod client;
pub mod clock;
pub mod customer;
pub mod entity;
pub mod error;
pub mod password;
pub mod query;
pub mod tenant;

pub use error::DomainError;
