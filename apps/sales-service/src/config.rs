//! # Sales Service 設定
//!
//! 環境変数から Sales Service の設定を読み込む。
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `PLATFORM_DATABASE_URL` | **Yes** | プラットフォーム DB（事業者・クライアント） |
//! | `REGION_DATABASE_URL` | No | リージョン DB（販売データ）。未設定時はプラットフォーム DB |
//! | `DATABASE_MAX_CONNECTIONS` | No | プールごとの最大接続数（デフォルト: 10） |
//! | `AUTH_ALTERNATE_LOGIN_KEYS` | No | 電話番号・メールでのログインを許可（デフォルト: false） |
//! | `LOG_FORMAT` | No | `json` / `pretty`（デフォルト: pretty） |

use std::env;

use salesdesk_shared::observability::LogFormat;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("環境変数 {0} が設定されていません")]
    Missing(&'static str),

    #[error("環境変数 {name} の値が不正です: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// 認証フローの設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthSettings {
    /// スコープパラメータ `login_type` による電話番号・メールでのログインを許可する
    pub alternate_login_keys: bool,
}

/// Sales Service の設定
#[derive(Debug, Clone)]
pub struct SalesConfig {
    pub platform_database_url: String,
    pub region_database_url:   String,
    pub max_connections:       u32,
    pub auth:                  AuthSettings,
    pub log_format:            LogFormat,
}

impl SalesConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let platform_database_url = lookup("PLATFORM_DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("PLATFORM_DATABASE_URL"))?;

        let region_database_url = lookup("REGION_DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| platform_database_url.clone());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: "DATABASE_MAX_CONNECTIONS",
                    value,
                })?,
        };

        let alternate_login_keys = match lookup("AUTH_ALTERNATE_LOGIN_KEYS") {
            None => false,
            Some(value) => parse_flag(&value).ok_or(ConfigError::Invalid {
                name: "AUTH_ALTERNATE_LOGIN_KEYS",
                value,
            })?,
        };

        let log_format = match lookup("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(value) => LogFormat::parse(&value).ok_or(ConfigError::Invalid {
                name: "LOG_FORMAT",
                value,
            })?,
        };

        Ok(Self {
            platform_database_url,
            region_database_url,
            max_connections,
            auth: AuthSettings {
                alternate_login_keys,
            },
            log_format,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
