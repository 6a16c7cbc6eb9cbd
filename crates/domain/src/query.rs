//! # 一覧取得の条件
//!
//! エンティティ一覧取得（List）のフィルタ、ソート、ページングを表現する。
//!
//! - フィルタ: JSON オブジェクト。各キーとの完全一致で絞り込む
//! - ソート: `name,-created_at` のようなカンマ区切り。`-` 接頭辞で降順
//! - ページング: `skip` 件を読み飛ばし、最大 `limit` 件を返す（`limit = 0` は無制限）

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use crate::{DomainError, entity::{Attributes, EntityRecord}};

/// 一致条件によるフィルタ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Attributes);

impl Filter {
    /// JSON 文字列からフィルタを作成する
    ///
    /// 空文字列は「条件なし」として扱う。
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::default());
        }

        match serde_json::from_str::<Value>(input) {
            Ok(Value::Object(map)) => Self::from_map(map),
            Ok(_) => Err(DomainError::Validation(
                "フィルタは JSON オブジェクトである必要があります".to_string(),
            )),
            Err(e) => Err(DomainError::Validation(format!(
                "フィルタの JSON が不正です: {e}"
            ))),
        }
    }

    pub fn from_map(map: Attributes) -> Result<Self, DomainError> {
        if let Some(key) = map.keys().find(|key| !is_valid_field_name(key)) {
            return Err(DomainError::Validation(format!(
                "フィルタのフィールド名が不正です: {key}"
            )));
        }
        Ok(Self(map))
    }

    /// 条件を 1 つ追加した新しいフィルタを返す
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn conditions(&self) -> &Attributes {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// レコードがすべての条件を満たすか
    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| record.field_value(key).as_ref() == Some(expected))
    }
}

/// ソート方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// ソートキー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    field:     String,
    direction: SortDirection,
}

impl SortKey {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

/// ソート指定（複数キー）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort(Vec<SortKey>);

impl Sort {
    /// `name,-created_at` 形式の文字列を解析する
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let mut keys = Vec::new();
        for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (field, direction) = match token.strip_prefix('-') {
                Some(field) => (field, SortDirection::Descending),
                None => (token.trim_start_matches('+'), SortDirection::Ascending),
            };
            if !is_valid_field_name(field) {
                return Err(DomainError::Validation(format!(
                    "ソートのフィールド名が不正です: {field}"
                )));
            }
            keys.push(SortKey {
                field: field.to_string(),
                direction,
            });
        }
        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// 2 つのレコードをソート指定に従って比較する
    ///
    /// 全キーが等しい場合は ID で比較し、結果を決定的にする。
    pub fn compare(&self, a: &EntityRecord, b: &EntityRecord) -> Ordering {
        self.0
            .iter()
            .map(|key| {
                let ordering =
                    compare_values(a.field_value(&key.field).as_ref(), b.field_value(&key.field).as_ref());
                match key.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id().as_str().cmp(b.id().as_str()))
    }
}

/// 一覧取得の条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub sort:   Sort,
    pub skip:   u64,
    pub limit:  u64,
}

impl ListQuery {
    /// 呼び出し元が渡す文字列形式の条件から作成する
    pub fn parse(filter: &str, sort: &str, skip: u64, limit: u64) -> Result<Self, DomainError> {
        Ok(Self {
            filter: Filter::parse(filter)?,
            sort: Sort::parse(sort)?,
            skip,
            limit,
        })
    }

    /// フィルタ条件を追加した新しいクエリを返す
    pub fn with_condition(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            filter: self.filter.with(key, value),
            ..self
        }
    }

    /// 件数上限（`None` は無制限）
    pub fn effective_limit(&self) -> Option<u64> {
        (self.limit > 0).then_some(self.limit)
    }
}

/// 一覧取得の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// フィルタに一致した総件数（ページング前）
    pub total: u64,
    pub skip:  u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip:  self.skip,
            limit: self.limit,
        }
    }
}

/// フィールド名として使用できる文字列か（英数字とアンダースコアのみ）
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// JSON 値の比較
///
/// 欠損 < null < bool < 数値 < 文字列 < その他 の順に並べる。
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == rank(b) => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}
