//! # エンティティ
//!
//! 事業者配下で管理される販売エンティティの共通モデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 用途 |
//! |---|------------|------|
//! | [`EntityKind`] | エンティティ種別 | キャンペーン、ブランド、顧客など |
//! | [`EntityId`] | エンティティ ID | `<接頭辞>_<一意な接尾辞>` 形式、常に小文字 |
//! | [`EntityRecord`] | レコード | 固定フィールド + 任意属性 |
//! | [`EntityPatch`] | 部分更新 | 属性の上書きと論理削除フラグ |
//!
//! ## 設計方針
//!
//! 種別ごとに同一の CRUD を複製するのではなく、単一の汎用レコードを
//! 種別で区別して扱う。テナント境界・識別子・論理削除フラグ・タイムスタンプは
//! 型付きフィールドで保持し、種別固有の項目は属性マップに格納する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{DomainError, tenant::BusinessId};

/// 種別固有の任意属性
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// レコードの固定フィールド名（属性マップには格納しない）
pub const RESERVED_FIELDS: [&str; 7] = [
    "id",
    "kind",
    "business_id",
    "customer_id",
    "is_deleted",
    "created_at",
    "updated_at",
];

/// 論理削除フラグのフィールド名
pub const FIELD_IS_DELETED: &str = "is_deleted";

// =========================================================================
// EntityKind（エンティティ種別）
// =========================================================================

/// エンティティ種別
///
/// 文字列表現（snake_case）は永続化時の `kind` カラムにも使用する。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Banner,
    Blog,
    Brand,
    Callback,
    Campaign,
    Catalogue,
    Category,
    Coupon,
    Customer,
    CustomerCart,
    CustomerOrder,
    CustomerReview,
    CustomerType,
    CustomerWishlist,
    Dealer,
    Discount,
    Firmness,
    MaterialType,
    Media,
    Navigation,
    Offer,
    Otp,
    Page,
    Payment,
    Policy,
    Preference,
    Product,
    ProductPreference,
    ProductUnit,
    Quiz,
    Rating,
    Region,
    Service,
    State,
    Testimonial,
}

impl EntityKind {
    /// 自動採番時の ID 接頭辞
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Banner => "bnr",
            Self::Blog => "blo",
            Self::Brand => "brnd",
            Self::Callback => "clbk",
            Self::Campaign => "camp",
            Self::Catalogue => "catlg",
            Self::Category => "catg",
            Self::Coupon => "coup",
            Self::Customer => "cust",
            Self::CustomerCart => "crt",
            Self::CustomerOrder => "cust_order",
            Self::CustomerReview => "reviw",
            Self::CustomerType => "ctyp",
            Self::CustomerWishlist => "wish",
            Self::Dealer => "dealr",
            Self::Discount => "disc",
            Self::Firmness => "firms",
            Self::MaterialType => "mate",
            Self::Media => "media",
            Self::Navigation => "nav",
            Self::Offer => "offr",
            Self::Otp => "otp",
            Self::Page => "page",
            Self::Payment => "pay",
            Self::Policy => "pol",
            Self::Preference => "pre",
            Self::Product => "prod",
            Self::ProductPreference => "prodpre",
            Self::ProductUnit => "prdut",
            Self::Quiz => "quiz",
            Self::Rating => "rati",
            Self::Region => "rgn",
            Self::Service => "serv",
            Self::State => "stat",
            Self::Testimonial => "tes",
        }
    }

    /// 顧客に従属するエンティティか
    ///
    /// カート・注文・レビュー・ウィッシュリストは顧客 ID でさらにスコープされる。
    pub fn is_customer_owned(self) -> bool {
        matches!(
            self,
            Self::CustomerCart | Self::CustomerOrder | Self::CustomerReview | Self::CustomerWishlist
        )
    }

    /// snake_case の文字列表現
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

// =========================================================================
// EntityId（エンティティ ID）
// =========================================================================

/// エンティティ ID
///
/// # 不変条件
///
/// - 空文字列ではない、最大 128 文字
/// - 常に小文字（呼び出し元が指定した ID も小文字化して保存・検索する）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
#[display("{_0}")]
pub struct EntityId(String);

impl EntityId {
    /// 外部から受け取った ID を正規化して作成する
    ///
    /// 前後の空白をトリミングし、小文字化する。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_lowercase();

        if value.is_empty() {
            return Err(DomainError::Validation("ID は必須です".to_string()));
        }

        if value.chars().count() > 128 {
            return Err(DomainError::Validation(
                "ID は 128 文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 種別の接頭辞付きで新しい ID を採番する
    pub fn generate(kind: EntityKind) -> Self {
        Self(format!("{}_{}", kind.id_prefix(), Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =========================================================================
// EntityRecord（汎用レコード）
// =========================================================================

/// 事業者にスコープされたエンティティレコード
///
/// # 不変条件
///
/// - `business_id` は作成後に変更されない
/// - `customer_id` は顧客従属エンティティのみが持つ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    kind:        EntityKind,
    id:          EntityId,
    business_id: BusinessId,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<EntityId>,
    is_deleted:  bool,
    #[serde(flatten)]
    attributes:  Attributes,
    created_at:  DateTime<Utc>,
    updated_at:  DateTime<Utc>,
}

impl EntityRecord {
    /// 新しいレコードを作成する
    ///
    /// 属性マップに含まれる固定フィールド名のキーは取り除く。
    pub fn new(
        kind: EntityKind,
        id: EntityId,
        business_id: BusinessId,
        customer_id: Option<EntityId>,
        attributes: Attributes,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id,
            business_id,
            customer_id,
            is_deleted: false,
            attributes: strip_reserved(attributes),
            created_at: now,
            updated_at: now,
        }
    }

    /// データベースからレコードを復元する
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        kind: EntityKind,
        id: EntityId,
        business_id: BusinessId,
        customer_id: Option<EntityId>,
        is_deleted: bool,
        attributes: Attributes,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id,
            business_id,
            customer_id,
            is_deleted,
            attributes,
            created_at,
            updated_at,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn business_id(&self) -> &BusinessId {
        &self.business_id
    }

    pub fn customer_id(&self) -> Option<&EntityId> {
        self.customer_id.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 固定フィールドと属性を同じ名前空間で参照する（フィルタ・ソート用）
    pub fn field_value(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "business_id" => Some(self.business_id.as_str().into()),
            "kind" => Some(self.kind.as_str().into()),
            "customer_id" => self.customer_id.as_ref().map(|id| id.as_str().into()),
            FIELD_IS_DELETED => Some(self.is_deleted.into()),
            "created_at" => Some(self.created_at.to_rfc3339().into()),
            "updated_at" => Some(self.updated_at.to_rfc3339().into()),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// 部分更新を適用した新しいインスタンスを返す
    pub fn patched(self, patch: &EntityPatch, now: DateTime<Utc>) -> Self {
        let mut attributes = self.attributes;
        for (key, value) in &patch.attributes {
            attributes.insert(key.clone(), value.clone());
        }
        Self {
            attributes,
            is_deleted: patch.is_deleted.unwrap_or(self.is_deleted),
            updated_at: now,
            ..self
        }
    }

    /// 指定した属性を取り除いた新しいインスタンスを返す
    ///
    /// パスワードハッシュなど、読み取り経路で返してはならない属性に使用する。
    pub fn without_attribute(mut self, key: &str) -> Self {
        self.attributes.remove(key);
        self
    }
}

// =========================================================================
// EntityPatch（部分更新）
// =========================================================================

/// レコードの部分更新
///
/// 論理削除もこの部分更新（`is_deleted = true`）として表現する。
/// そのためリポジトリ層では論理削除と通常の更新を区別しない。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    attributes: Attributes,
    is_deleted: Option<bool>,
}

impl EntityPatch {
    /// 入力マップから部分更新を作成する
    ///
    /// - キーフィールド（ID、事業者 ID 等）は更新対象から除外する
    /// - `is_deleted` は真偽値のみ受け付ける
    pub fn new(mut input: Attributes) -> Result<Self, DomainError> {
        let is_deleted = match input.remove(FIELD_IS_DELETED) {
            None => None,
            Some(serde_json::Value::Bool(flag)) => Some(flag),
            Some(_) => {
                return Err(DomainError::Validation(
                    "is_deleted は真偽値である必要があります".to_string(),
                ));
            }
        };

        Ok(Self {
            attributes: strip_reserved(input),
            is_deleted,
        })
    }

    /// 論理削除用の部分更新
    pub fn soft_delete() -> Self {
        Self {
            attributes: Attributes::new(),
            is_deleted: Some(true),
        }
    }

    /// 単一の属性を上書きする部分更新
    pub fn set(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(key.into(), value.into());
        Self {
            attributes,
            is_deleted: None,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn is_deleted(&self) -> Option<bool> {
        self.is_deleted
    }
}

fn strip_reserved(mut attributes: Attributes) -> Attributes {
    for key in RESERVED_FIELDS {
        attributes.remove(key);
    }
    attributes
}
