//! # Sales Service エラー定義
//!
//! ユースケースが返す分類済みエラーと、RFC 9457 エラーレスポンスへの変換を定義する。
//!
//! | エラー | ステータス | コード |
//! |-------|-----------|-------|
//! | `MissingParameter` | 400 | `missing-parameter` |
//! | `Validation` | 400 | `validation-error` |
//! | `InvalidTenant` | 401 | `invalid-tenant` |
//! | `InvalidPrincipal` | 401 | `invalid-principal` |
//! | `AuthenticationFailed` | 401 | `authentication-failed` |
//! | `NotFound` | 404 | `not-found` |
//! | `AlreadyExists` | 409 | `already-exists` |
//! | `ClientAuthFailure` | 417 | `client-auth-failure` |
//! | `GrantNotSupported` | 417 | `grant-not-supported` |
//! | `Database` / `Internal` | 500 | `internal-error` |

use salesdesk_domain::DomainError;
use salesdesk_infra::InfraError;
use salesdesk_shared::ErrorResponse;
use thiserror::Error;

/// Sales Service で発生するエラー
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 必須パラメータの欠落
    #[error("必須パラメータがありません: {0}")]
    MissingParameter(String),

    /// 事業者が存在しない
    #[error("事業者が見つかりません: {0}")]
    InvalidTenant(String),

    /// 指定された顧客が存在しない
    #[error("顧客が見つかりません: {0}")]
    InvalidPrincipal(String),

    /// クライアントアプリケーションの認証失敗
    #[error("クライアント認証に失敗しました")]
    ClientAuthFailure,

    /// 顧客に対して許可されないグラント種別
    #[error("未対応のグラント種別です: {0}")]
    GrantNotSupported(String),

    /// 顧客認証の失敗
    ///
    /// ログイン ID 不明、パスワード不一致、削除済み、未検証を区別しない。
    /// 理由はログにのみ残す。
    #[error("認証に失敗しました")]
    AuthenticationFailed,

    #[error("{entity} が見つかりません: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} は既に存在します: {id}")]
    AlreadyExists { entity: String, id: String },

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー: {0}")]
    Database(#[source] InfraError),

    #[error("内部エラー: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP 相当のステータスコード
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingParameter(_) | Self::Validation(_) => 400,
            Self::InvalidTenant(_) | Self::InvalidPrincipal(_) | Self::AuthenticationFailed => 401,
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } => 409,
            Self::ClientAuthFailure | Self::GrantNotSupported(_) => 417,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// 安定したエラーコード（エラーレスポンスの type URI 末尾）
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing-parameter",
            Self::InvalidTenant(_) => "invalid-tenant",
            Self::InvalidPrincipal(_) => "invalid-principal",
            Self::ClientAuthFailure => "client-auth-failure",
            Self::GrantNotSupported(_) => "grant-not-supported",
            Self::AuthenticationFailed => "authentication-failed",
            Self::NotFound { .. } => "not-found",
            Self::AlreadyExists { .. } => "already-exists",
            Self::Validation(_) => "validation-error",
            Self::Database(_) | Self::Internal(_) => "internal-error",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "Missing Parameter",
            Self::InvalidTenant(_) => "Invalid Business",
            Self::InvalidPrincipal(_) => "Invalid Customer",
            Self::ClientAuthFailure => "Client Authentication Failed",
            Self::GrantNotSupported(_) => "Grant Not Supported",
            Self::AuthenticationFailed => "Authentication Failed",
            Self::NotFound { .. } => "Not Found",
            Self::AlreadyExists { .. } => "Already Exists",
            Self::Validation(_) => "Validation Error",
            Self::Database(_) | Self::Internal(_) => "Internal Server Error",
        }
    }

    /// RFC 9457 エラーレスポンスに変換する
    ///
    /// 500 系は内部情報を含めず固定の detail を返し、詳細はログに出力する。
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            Self::Database(e) => {
                tracing::error!(
                    error.category = "infrastructure",
                    error.kind = "database",
                    "データベースエラー: {e}\nSpanTrace:\n{}",
                    e.span_trace()
                );
                ErrorResponse::internal_error()
            }
            Self::Internal(msg) => {
                tracing::error!(error.category = "infrastructure", error.kind = "internal", "内部エラー: {msg}");
                ErrorResponse::internal_error()
            }
            other => ErrorResponse::new(other.code(), other.title(), other.status(), other.to_string()),
        }
    }
}

impl From<InfraError> for ServiceError {
    fn from(error: InfraError) -> Self {
        match error.as_conflict() {
            Some((entity, id)) => Self::AlreadyExists {
                entity: entity.to_string(),
                id:     id.to_string(),
            },
            None => Self::Database(error),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::MissingParameter(name) => Self::MissingParameter(name.to_string()),
            DomainError::UnsupportedClientType(client_type) => {
                tracing::warn!(%client_type, "未対応のクライアント種別からの認証要求");
                Self::ClientAuthFailure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ServiceError::MissingParameter("business_id".into()), 400, "missing-parameter")]
    #[case(ServiceError::InvalidTenant("biz_x".into()), 401, "invalid-tenant")]
    #[case(ServiceError::InvalidPrincipal("cust_x".into()), 401, "invalid-principal")]
    #[case(ServiceError::ClientAuthFailure, 417, "client-auth-failure")]
    #[case(ServiceError::GrantNotSupported("client_credentials".into()), 417, "grant-not-supported")]
    #[case(ServiceError::AuthenticationFailed, 401, "authentication-failed")]
    #[case(ServiceError::NotFound { entity: "brand".into(), id: "brnd_1".into() }, 404, "not-found")]
    #[case(ServiceError::AlreadyExists { entity: "brand".into(), id: "brnd_1".into() }, 409, "already-exists")]
    #[case(ServiceError::Validation("bad".into()), 400, "validation-error")]
    #[case(ServiceError::Internal("boom".into()), 500, "internal-error")]
    fn test_エラーのステータスとコード(
        #[case] error: ServiceError,
        #[case] status: u16,
        #[case] code: &str,
    ) {
        let response = error.to_response();

        assert_eq!(error.status(), status);
        assert_eq!(error.code(), code);
        assert_eq!(response.status, status);
        assert_eq!(response.code(), code);
    }

    #[test]
    fn test_内部エラーのdetailに内部情報を含めない() {
        let response = ServiceError::Internal("connection refused at 10.0.0.3".into()).to_response();
        assert!(!response.detail.contains("10.0.0.3"));
    }

    #[test]
    fn test_インフラの競合はalready_existsに変換される() {
        let error: ServiceError = InfraError::conflict("campaign", "camp_1").into();
        assert!(matches!(error, ServiceError::AlreadyExists { ref id, .. } if id == "camp_1"));
    }

    #[test]
    fn test_未対応のクライアント種別はクライアント認証失敗に変換される() {
        let error: ServiceError = DomainError::UnsupportedClientType("partner_app".into()).into();
        assert!(matches!(error, ServiceError::ClientAuthFailure));
    }

    #[test]
    fn test_認証失敗のdetailはログインidの存在を示さない() {
        let response = ServiceError::AuthenticationFailed.to_response();
        assert_eq!(response.detail, "認証に失敗しました");
    }
}
