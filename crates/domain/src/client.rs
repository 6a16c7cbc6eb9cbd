//! # クライアントアプリケーションとスコープ解決
//!
//! 認証要求を送ってくるクライアントアプリケーションと、
//! クライアント種別・スコープからテナント（事業者）を解決するルールを定義する。
//!
//! ## テナント解決ルール
//!
//! | クライアント種別 | クライアントスコープ | テナント |
//! |----------------|-------------------|---------|
//! | `common_app` | `platform` | なし（プラットフォームレベル） |
//! | `common_app` | その他 | スコープパラメータ `business_id`（必須） |
//! | `business_app` | 任意 | クライアントスコープそのもの |
//! | その他 | - | 拒否 |
//!
//! クライアント種別とスコープは必ず認証済みのクライアントレコードから取得し、
//! 認証要求に含まれる値は使用しない。

use std::collections::HashMap;

use crate::{DomainError, password::PasswordHash, tenant::BusinessId};

/// プラットフォームレベルのクライアントスコープ
pub const CLIENT_SCOPE_PLATFORM: &str = "platform";

/// スコープパラメータ: 事業者 ID
pub const SCOPE_BUSINESS_ID: &str = "business_id";

/// スコープパラメータ: ログイン種別（`login_id` / `phone` / `email`）
pub const SCOPE_LOGIN_TYPE: &str = "login_type";

define_string_id! {
    /// クライアント ID
    pub struct ClientId {
        label: "クライアント ID",
        max_length: 128,
    }
}

/// クライアント種別
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientType {
    /// 複数事業者で共用されるアプリ（Web、モバイル等）
    CommonApp,
    /// 特定の事業者専用のアプリ
    BusinessApp,
    /// 未対応の種別（レコードの値をそのまま保持する）
    Other(String),
}

impl ClientType {
    pub fn parse(value: &str) -> Self {
        match value {
            "common_app" => Self::CommonApp,
            "business_app" => Self::BusinessApp,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CommonApp => "common_app",
            Self::BusinessApp => "business_app",
            Self::Other(value) => value,
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// クライアントスコープ
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{_0}")]
pub struct ClientScope(String);

impl ClientScope {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_platform(&self) -> bool {
        self.0 == CLIENT_SCOPE_PLATFORM
    }
}

/// 登録済みクライアント
#[derive(Debug, Clone)]
pub struct ClientRecord {
    client_id:    ClientId,
    client_type:  ClientType,
    client_scope: ClientScope,
    secret_hash:  PasswordHash,
    is_active:    bool,
}

impl ClientRecord {
    pub fn from_db(
        client_id: ClientId,
        client_type: ClientType,
        client_scope: ClientScope,
        secret_hash: PasswordHash,
        is_active: bool,
    ) -> Self {
        Self {
            client_id,
            client_type,
            client_scope,
            secret_hash,
            is_active,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn client_type(&self) -> &ClientType {
        &self.client_type
    }

    pub fn client_scope(&self) -> &ClientScope {
        &self.client_scope
    }

    pub fn secret_hash(&self) -> &PasswordHash {
        &self.secret_hash
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// スコープパラメータ
///
/// 認証要求の `scope` に含まれる空白区切りの `key:value` トークン。
/// 区切り文字を含まないトークンは無視する。同じキーが複数回現れた場合は先勝ち。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeParams(HashMap<String, String>);

impl ScopeParams {
    pub fn parse(scope: &str) -> Self {
        let mut params = HashMap::new();
        for token in scope.split_whitespace() {
            if let Some((key, value)) = token.split_once(':')
                && !key.is_empty()
            {
                params
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
        Self(params)
    }

    /// 値を持つパラメータを取得する（空文字列は未指定とみなす）
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// まだ指定されていないキーに値を補う
    pub fn with_default(mut self, key: &str, value: &str) -> Self {
        if self.get(key).is_none() && !value.trim().is_empty() {
            self.0.insert(key.to_string(), value.to_string());
        }
        self
    }
}

/// 認証済みクライアントとスコープパラメータからテナントを解決する
///
/// `Ok(None)` はプラットフォームレベル（テナントなし）を表す。
/// この関数はリポジトリに一切アクセスしない。
pub fn resolve_tenant(
    client_type: &ClientType,
    client_scope: &ClientScope,
    params: &ScopeParams,
) -> Result<Option<BusinessId>, DomainError> {
    match client_type {
        ClientType::CommonApp if client_scope.is_platform() => Ok(None),
        ClientType::CommonApp => {
            let value = params
                .get(SCOPE_BUSINESS_ID)
                .ok_or(DomainError::MissingParameter(SCOPE_BUSINESS_ID))?;
            BusinessId::new(value).map(Some)
        }
        ClientType::BusinessApp => {
            if client_scope.as_str().trim().is_empty() {
                Ok(None)
            } else {
                BusinessId::new(client_scope.as_str()).map(Some)
            }
        }
        ClientType::Other(value) => Err(DomainError::UnsupportedClientType(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_スコープ文字列をkey_valueトークンに分解する() {
        let params = ScopeParams::parse("business_id:biz_1  login_type:phone openid");

        assert_eq!(params.get("business_id"), Some("biz_1"));
        assert_eq!(params.get("login_type"), Some("phone"));
        assert_eq!(params.get("openid"), None);
    }

    #[test]
    fn test_同じキーは先勝ち() {
        let params = ScopeParams::parse("business_id:a business_id:b");
        assert_eq!(params.get("business_id"), Some("a"));
    }

    #[test]
    fn test_with_defaultは未指定のキーだけを補う() {
        let params = ScopeParams::parse("business_id:from_scope")
            .with_default("business_id", "explicit")
            .with_default("login_type", "email");

        assert_eq!(params.get("business_id"), Some("from_scope"));
        assert_eq!(params.get("login_type"), Some("email"));
    }

    #[test]
    fn test_common_appのplatformスコープはテナントなし() {
        let result = resolve_tenant(
            &ClientType::CommonApp,
            &ClientScope::new("platform"),
            &ScopeParams::parse("business_id:ignored"),
        );

        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_common_appはスコープパラメータから事業者idを取得する() {
        let result = resolve_tenant(
            &ClientType::CommonApp,
            &ClientScope::new("web"),
            &ScopeParams::parse("business_id:biz_42"),
        );

        assert_eq!(result.unwrap(), Some(BusinessId::new("biz_42").unwrap()));
    }

    #[rstest]
    #[case("")]
    #[case("login_type:phone")]
    #[case("business_id:")]
    fn test_common_appで事業者idがなければmissing_parameter(#[case] scope: &str) {
        let result = resolve_tenant(
            &ClientType::CommonApp,
            &ClientScope::new("web"),
            &ScopeParams::parse(scope),
        );

        assert!(matches!(
            result,
            Err(DomainError::MissingParameter(SCOPE_BUSINESS_ID))
        ));
    }

    #[test]
    fn test_business_appはクライアントスコープをそのまま事業者idとする() {
        let result = resolve_tenant(
            &ClientType::BusinessApp,
            &ClientScope::new("Biz_Acme"),
            &ScopeParams::parse("business_id:other"),
        );

        assert_eq!(result.unwrap(), Some(BusinessId::new("Biz_Acme").unwrap()));
    }

    #[test]
    fn test_未対応のクライアント種別は拒否される() {
        let result = resolve_tenant(
            &ClientType::parse("partner_app"),
            &ClientScope::new("x"),
            &ScopeParams::default(),
        );

        assert!(matches!(result, Err(DomainError::UnsupportedClientType(t)) if t == "partner_app"));
    }

    #[test]
    fn test_クライアント種別の文字列変換() {
        assert_eq!(ClientType::parse("business_app"), ClientType::BusinessApp);
        assert_eq!(ClientType::CommonApp.as_str(), "common_app");
        assert_eq!(ClientType::parse("x").to_string(), "x");
    }
}
