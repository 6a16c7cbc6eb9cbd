//! # PostgreSQL データベース接続管理
//!
//! プラットフォーム DB（事業者・クライアント）とリージョン DB（事業者配下の販売データ）の
//! 接続プールを作成し、テナントスコープ付きコネクションを提供する。
//!
//! ## コネクションの寿命
//!
//! リポジトリはプールから借りたコネクションを所有し、リポジトリのドロップ時に
//! コネクションがプールへ返却される。ユースケースがどの経路（成功・失敗）で
//! 終了しても、借りたコネクションは必ず返却される。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use salesdesk_infra::db;
//!
//! let pool = db::create_pool("postgres://localhost/salesdesk", 10).await?;
//! db::run_migrations(&pool).await?;
//! ```

use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

use salesdesk_domain::tenant::BusinessId;
use sqlx::{PgConnection, PgPool, Postgres, pool::PoolConnection, postgres::PgPoolOptions};

/// RLS 用の `after_release` フックを含む `PgPoolOptions` を返す
///
/// コネクションがプールに返却される際、`app.tenant_id` セッション変数を
/// 空文字列にリセットする。別の事業者の処理に前の事業者 ID が残らない。
pub fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new().after_release(|conn, _meta| {
        Box::pin(async move {
            sqlx::query("SELECT set_config('app.tenant_id', '', false)")
                .execute(&mut *conn)
                .await?;
            Ok(true)
        })
    })
}

/// データベースマイグレーションを実行する
///
/// 適用済みのマイグレーションはスキップされる。
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// PostgreSQL 接続プールを作成する
///
/// 起動時に一度だけ呼び出し、作成したプールを共有する。
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    pool_options()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// テナントスコープ付き DB コネクション
///
/// 取得時に `app.tenant_id` セッション変数へ事業者 ID を設定する。
/// RLS ポリシーがこの変数を参照して事業者間のデータを分離する。
/// ドロップ時（プールへの返却時）に [`pool_options`] のフックが変数をリセットする。
pub struct TenantConnection {
    conn:        PoolConnection<Postgres>,
    business_id: BusinessId,
}

impl TenantConnection {
    pub async fn acquire(pool: &PgPool, business_id: &BusinessId) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, false)")
            .bind(business_id.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(Self {
            conn,
            business_id: business_id.clone(),
        })
    }

    pub fn business_id(&self) -> &BusinessId {
        &self.business_id
    }
}

impl Deref for TenantConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for TenantConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
