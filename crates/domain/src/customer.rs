//! # 顧客
//!
//! 事業者配下の顧客（エンドユーザー、認証主体）を定義する。
//!
//! 顧客は [`EntityKind::Customer`] のレコードとして保存され、ログイン ID・
//! パスワードハッシュ・検証済みフラグなどの固定項目は属性マップ内の
//! 予約キーに格納される。[`Customer`] はそのうち認証に必要な項目の型付きビュー。

use crate::{
    DomainError,
    entity::{EntityId, EntityKind, EntityRecord},
    password::PasswordHash,
    tenant::BusinessId,
};

pub const FIELD_LOGIN_ID: &str = "customer_login_id";
pub const FIELD_PHONE: &str = "customer_phone";
pub const FIELD_EMAIL: &str = "customer_email";
pub const FIELD_PASSWORD: &str = "customer_password";
pub const FIELD_IS_VERIFIED: &str = "is_verified";

/// ログインに使用するキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoginKey {
    LoginId,
    Phone,
    Email,
}

impl LoginKey {
    /// 顧客レコード上の属性名
    pub fn attribute_name(self) -> &'static str {
        match self {
            Self::LoginId => FIELD_LOGIN_ID,
            Self::Phone => FIELD_PHONE,
            Self::Email => FIELD_EMAIL,
        }
    }

    /// スコープパラメータ `login_type` の値から解決する
    pub fn from_login_type(value: &str) -> Option<Self> {
        match value {
            "login_id" => Some(Self::LoginId),
            "phone" => Some(Self::Phone),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

/// 顧客の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerStatus {
    Active,
    /// 論理削除済み
    Inactive,
    /// 検証済みフラグが明示的に false
    Unverified,
}

/// 顧客（認証用ビュー）
#[derive(Debug, Clone)]
pub struct Customer {
    id:            EntityId,
    business_id:   BusinessId,
    login_id:      Option<String>,
    password_hash: Option<PasswordHash>,
    is_deleted:    bool,
    is_verified:   Option<bool>,
}

impl Customer {
    /// 顧客レコードから型付きビューを作成する
    pub fn from_record(record: &EntityRecord) -> Result<Self, DomainError> {
        if record.kind() != EntityKind::Customer {
            return Err(DomainError::Validation(format!(
                "顧客レコードではありません: {}",
                record.kind()
            )));
        }

        let is_verified = match record.attribute(FIELD_IS_VERIFIED) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Bool(flag)) => Some(*flag),
            Some(_) => {
                return Err(DomainError::Validation(
                    "is_verified は真偽値である必要があります".to_string(),
                ));
            }
        };

        Ok(Self {
            id: record.id().clone(),
            business_id: record.business_id().clone(),
            login_id: string_attribute(record, FIELD_LOGIN_ID),
            password_hash: string_attribute(record, FIELD_PASSWORD).map(PasswordHash::new),
            is_deleted: record.is_deleted(),
            is_verified,
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn business_id(&self) -> &BusinessId {
        &self.business_id
    }

    pub fn login_id(&self) -> Option<&str> {
        self.login_id.as_deref()
    }

    pub fn password_hash(&self) -> Option<&PasswordHash> {
        self.password_hash.as_ref()
    }

    /// ログイン可否の判定に使う状態
    ///
    /// 論理削除済みを未検証より優先する。検証済みフラグが
    /// 存在しない顧客は検証済みとみなす。
    pub fn status(&self) -> CustomerStatus {
        if self.is_deleted {
            CustomerStatus::Inactive
        } else if self.is_verified == Some(false) {
            CustomerStatus::Unverified
        } else {
            CustomerStatus::Active
        }
    }
}

fn string_attribute(record: &EntityRecord, key: &str) -> Option<String> {
    record
        .attribute(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
