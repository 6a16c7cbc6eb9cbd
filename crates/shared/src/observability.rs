//! # Observability 基盤
//!
//! トレーシングの初期化とログ出力形式を提供する。
//! 初期化は起動時に呼び出し側が一度だけ行う。出力形式の読み取りは設定層の責務とする。

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1 行 1 イベントの JSON
    Json,
    /// 開発用の整形出力
    #[default]
    Pretty,
}

impl LogFormat {
    /// 大文字小文字を区別せずにパースする
    ///
    /// 未知の値は `None`。
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// サービス名（初期化ログに出力）
    pub service_name: String,
    pub log_format:   LogFormat,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
        }
    }
}

/// トレーシングを初期化する
///
/// ログレベルは `RUST_LOG` で指定する。未設定なら `info,salesdesk=debug`。
/// `ErrorLayer` を登録するため、インフラ層エラーは発生箇所の SpanTrace を保持する。
/// 2 回目以降の呼び出しは何もしない。
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,salesdesk=debug".into());

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    let initialized = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .is_ok();

    if initialized {
        tracing::debug!(service = %config.service_name, "トレーシングを初期化しました");
    }
}
