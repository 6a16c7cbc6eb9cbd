//! # ドメイン層エラー定義
//!
//! ビジネスルール違反やドメイン固有の例外状態を表現するエラー型。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値の検証失敗 |
//! | `MissingParameter` | 400 Bad Request | 必須パラメータの欠落 |
//! | `UnsupportedClientType` | 417 Expectation Failed | 未対応のクライアント種別 |
//!
//! ## 使用例
//!
//! ```rust
//! use salesdesk_domain::DomainError;
//!
//! fn require(name: &'static str, value: Option<&str>) -> Result<(), DomainError> {
//!     value.map(|_| ()).ok_or(DomainError::MissingParameter(name))
//! }
//!
//! assert!(require("business_id", None).is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
///
/// サービス層でこのエラーを受け取り、分類済みのサービスエラーに変換する。
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 入力値がビジネスルールに違反している場合に使用する。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 必須パラメータの欠落
    ///
    /// スコープパラメータなど、処理に必要な値が渡されなかった場合に使用する。
    #[error("必須パラメータがありません: {0}")]
    MissingParameter(&'static str),

    /// 未対応のクライアント種別
    ///
    /// スコープ解決の対象外となるクライアントからの認証要求。
    #[error("未対応のクライアント種別です: {0}")]
    UnsupportedClientType(String),
}
