//! # EntityRepository
//!
//! 事業者配下の販売エンティティ（キャンペーン、ブランド、顧客など）の永続化を担当する。
//!
//! すべての種別を `sales_records` テーブルの 1 つのスキーマで扱い、
//! `kind` カラムで区別する。リポジトリは 1 つの種別・1 つの事業者にスコープされた
//! テナントコネクションを所有し、ドロップ時にコネクションを返却する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salesdesk_domain::{
    entity::{Attributes, EntityId, EntityKind, EntityPatch, EntityRecord},
    query::{Filter, ListQuery, Page, Sort, SortDirection},
    tenant::BusinessId,
};
use sqlx::{PgConnection, Postgres, QueryBuilder, types::Json};

use crate::{db::TenantConnection, error::InfraError};

/// エンティティリポジトリトレイト
///
/// 実装は 1 つの [`EntityKind`] と 1 つの事業者にスコープされる。
#[async_trait]
pub trait EntityRepository: Send {
    fn kind(&self) -> EntityKind;

    fn business_id(&self) -> &BusinessId;

    /// 条件に一致するレコードをページ単位で取得する
    async fn list(&mut self, query: &ListQuery) -> Result<Page<EntityRecord>, InfraError>;

    async fn get(&mut self, id: &EntityId) -> Result<Option<EntityRecord>, InfraError>;

    /// フィルタに一致する最初のレコード（ID 順）を取得する
    async fn find(&mut self, filter: &Filter) -> Result<Option<EntityRecord>, InfraError>;

    /// レコードを作成する
    ///
    /// 同じ ID のレコードが既に存在する場合は `Conflict` を返す。
    async fn create(&mut self, record: &EntityRecord) -> Result<(), InfraError>;

    /// 部分更新を適用し、更新後のレコードを返す（存在しなければ `None`）
    async fn update(
        &mut self,
        id: &EntityId,
        patch: &EntityPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<EntityRecord>, InfraError>;

    /// 物理削除する。削除した場合は `true`
    async fn delete(&mut self, id: &EntityId) -> Result<bool, InfraError>;
}

/// `sales_records` の行
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    kind:        String,
    id:          String,
    business_id: String,
    customer_id: Option<String>,
    is_deleted:  bool,
    attributes:  Json<Attributes>,
    created_at:  DateTime<Utc>,
    updated_at:  DateTime<Utc>,
}

impl TryFrom<RecordRow> for EntityRecord {
    type Error = InfraError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<EntityKind>()
            .map_err(|e| InfraError::unexpected(format!("不正な kind: {} ({e})", row.kind)))?;

        Ok(EntityRecord::from_db(
            kind,
            EntityId::new(row.id)?,
            BusinessId::new(row.business_id)?,
            row.customer_id.map(EntityId::new).transpose()?,
            row.is_deleted,
            row.attributes.0,
            row.created_at,
            row.updated_at,
        ))
    }
}

pub(crate) const RECORD_COLUMNS: &str =
    "kind, id, business_id, customer_id, is_deleted, attributes, created_at, updated_at";

/// 事業者・種別のスコープとフィルタ条件を WHERE 句として追加する
fn push_scope<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    business_id: &'a BusinessId,
    kind: EntityKind,
    filter: &'a Filter,
) {
    builder
        .push(" WHERE business_id = ")
        .push_bind(business_id.as_str())
        .push(" AND kind = ")
        .push_bind(kind.as_str());

    let mut contained = Attributes::new();
    for (key, value) in filter.conditions() {
        match key.as_str() {
            "id" | "business_id" | "kind" | "customer_id" => match value.as_str() {
                Some(text) => {
                    // エンティティ ID は小文字で保存されている
                    let text = match key.as_str() {
                        "id" | "customer_id" => text.to_lowercase(),
                        _ => text.to_string(),
                    };
                    builder.push(format_args!(" AND {key} = ")).push_bind(text);
                }
                None if value.is_null() && key == "customer_id" => {
                    builder.push(" AND customer_id IS NULL");
                }
                None => {
                    builder.push(" AND FALSE");
                }
            },
            "is_deleted" => match value.as_bool() {
                Some(flag) => {
                    builder.push(" AND is_deleted = ").push_bind(flag);
                }
                None => {
                    builder.push(" AND FALSE");
                }
            },
            "created_at" | "updated_at" => match value.as_str() {
                Some(text) => {
                    builder
                        .push(format_args!(" AND {key} = CAST("))
                        .push_bind(text)
                        .push(" AS timestamptz)");
                }
                None => {
                    builder.push(" AND FALSE");
                }
            },
            _ => {
                contained.insert(key.clone(), value.clone());
            }
        }
    }

    if !contained.is_empty() {
        builder.push(" AND attributes @> ").push_bind(Json(contained));
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, sort: &Sort) {
    builder.push(" ORDER BY ");
    for key in sort.keys() {
        // フィールド名は Sort::parse で英数字とアンダースコアに制限済み
        match key.field() {
            column @ ("id" | "business_id" | "kind" | "customer_id" | "is_deleted" | "created_at"
            | "updated_at") => {
                builder.push(column);
            }
            field => {
                builder.push(format_args!("attributes -> '{field}'"));
            }
        }
        builder.push(match key.direction() {
            SortDirection::Ascending => " ASC, ",
            SortDirection::Descending => " DESC, ",
        });
    }
    builder.push("id ASC");
}

/// レコードを 1 件取得する（ID 指定）
pub(crate) async fn fetch_record(
    conn: &mut PgConnection,
    business_id: &BusinessId,
    kind: EntityKind,
    id: &EntityId,
) -> Result<Option<EntityRecord>, InfraError> {
    let row = sqlx::query_as::<_, RecordRow>(&format!(
        "SELECT {RECORD_COLUMNS} FROM sales_records WHERE business_id = $1 AND kind = $2 AND id = $3"
    ))
    .bind(business_id.as_str())
    .bind(kind.as_str())
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;

    row.map(EntityRecord::try_from).transpose()
}

/// PostgreSQL 実装の EntityRepository
pub struct PostgresEntityRepository {
    conn: TenantConnection,
    kind: EntityKind,
}

impl PostgresEntityRepository {
    pub fn new(conn: TenantConnection, kind: EntityKind) -> Self {
        Self { conn, kind }
    }
}

#[async_trait]
impl EntityRepository for PostgresEntityRepository {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn business_id(&self) -> &BusinessId {
        self.conn.business_id()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn list(&mut self, query: &ListQuery) -> Result<Page<EntityRecord>, InfraError> {
        let business_id = self.conn.business_id().clone();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM sales_records");
        push_scope(&mut count, &business_id, self.kind, &query.filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&mut *self.conn).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {RECORD_COLUMNS} FROM sales_records"));
        push_scope(&mut select, &business_id, self.kind, &query.filter);
        push_order(&mut select, &query.sort);
        select
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.skip).unwrap_or(i64::MAX));
        if let Some(limit) = query.effective_limit() {
            select
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = select.build_query_as::<RecordRow>().fetch_all(&mut *self.conn).await?;
        let items = rows
            .into_iter()
            .map(EntityRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            skip: query.skip,
            limit: query.limit,
        })
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn get(&mut self, id: &EntityId) -> Result<Option<EntityRecord>, InfraError> {
        let business_id = self.conn.business_id().clone();
        fetch_record(&mut self.conn, &business_id, self.kind, id).await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find(&mut self, filter: &Filter) -> Result<Option<EntityRecord>, InfraError> {
        let business_id = self.conn.business_id().clone();

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {RECORD_COLUMNS} FROM sales_records"));
        push_scope(&mut select, &business_id, self.kind, filter);
        select.push(" ORDER BY id ASC LIMIT 1");

        let row = select
            .build_query_as::<RecordRow>()
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(EntityRecord::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn create(&mut self, record: &EntityRecord) -> Result<(), InfraError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sales_records (
                kind, id, business_id, customer_id, is_deleted, attributes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (business_id, kind, id) DO NOTHING
            "#,
        )
        .bind(record.kind().as_str())
        .bind(record.id().as_str())
        .bind(record.business_id().as_str())
        .bind(record.customer_id().map(EntityId::as_str))
        .bind(record.is_deleted())
        .bind(Json(record.attributes()))
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(self.kind.as_str(), record.id().as_str()));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn update(
        &mut self,
        id: &EntityId,
        patch: &EntityPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<EntityRecord>, InfraError> {
        let business_id = self.conn.business_id().clone();
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            UPDATE sales_records
            SET attributes = attributes || $4,
                is_deleted = COALESCE($5, is_deleted),
                updated_at = $6
            WHERE business_id = $1 AND kind = $2 AND id = $3
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(business_id.as_str())
        .bind(self.kind.as_str())
        .bind(id.as_str())
        .bind(Json(patch.attributes()))
        .bind(patch.is_deleted())
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(EntityRecord::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn delete(&mut self, id: &EntityId) -> Result<bool, InfraError> {
        let business_id = self.conn.business_id().clone();
        let result = sqlx::query(
            "DELETE FROM sales_records WHERE business_id = $1 AND kind = $2 AND id = $3",
        )
        .bind(business_id.as_str())
        .bind(self.kind.as_str())
        .bind(id.as_str())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
