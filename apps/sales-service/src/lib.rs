//! # Sales Service
//!
//! 事業者（テナント）ごとに分離された EC 販売データの CRUD と、
//! 顧客の認証フローを提供する。
//!
//! ## 役割
//!
//! - **認証フロー**: クライアント認証、テナント解決、グラント分岐、顧客認証
//! - **エンティティ CRUD**: バナーからテスティモニアルまで、すべての販売エンティティ
//! - **顧客サービス**: パスワードのハッシュ化を伴う顧客レコードの管理
//!
//! HTTP ハンドラは持たない。呼び出し元は [`SalesContext`] からユースケースを取得し、
//! エラーは [`ServiceError::to_response`] で RFC 9457 形式に変換する。
//!
//! ## 環境変数
//!
//! [`config`] を参照。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use salesdesk_domain::{auth::AuthRequest, entity::EntityKind, query::ListQuery};
//! use salesdesk_sales_service::SalesContext;
//!
//! let ctx = SalesContext::bootstrap().await?;
//!
//! let request = AuthRequest::new("dream_pos", "secret", "password").with_credentials("alice", "pw");
//! let grant = ctx.authentication_flow().authenticate(&request).await?;
//!
//! let mut products = ctx.entity_service(EntityKind::Product, "biz_dream", None).await?;
//! let page = products.list(ListQuery::parse(r#"{"color":"red"}"#, "-price", 0, 20)?).await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod usecase;

pub use config::{AuthSettings, SalesConfig};
pub use context::SalesContext;
pub use error::ServiceError;
