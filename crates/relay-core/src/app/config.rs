//! DispatcherConfig - Dispatcher の設定
//!
//! JSON から読み込む。未知のフィールドはエラーにする（typo を起動時に検出）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// DispatcherConfig は Dispatcher の動作設定
///
/// # 使用例
/// ```ignore
/// let config = DispatcherConfig::from_json(r#"{ "name": "billing", "warn_on_unhandled": true }"#)?;
/// let dispatcher = Dispatcher::new(factory).with_config(config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Recorded on every dispatch span.
    pub name: String,
    /// Log unhandled messages at `warn` instead of `debug`.
    pub warn_on_unhandled: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "dispatcher".to_string(),
            warn_on_unhandled: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid dispatcher config: {0}")]
    Invalid(#[from] serde_json::Error),
}

impl DispatcherConfig {
    /// 省略したフィールドは default 値になる。
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("{}", "dispatcher", false)]
    #[case::name_only(r#"{"name":"billing"}"#, "billing", false)]
    #[case::full(r#"{"name":"audit","warn_on_unhandled":true}"#, "audit", true)]
    fn from_json_fills_defaults(#[case] json: &str, #[case] name: &str, #[case] warn: bool) {
        let config = DispatcherConfig::from_json(json).unwrap();
        assert_eq!(config.name, name);
        assert_eq!(config.warn_on_unhandled, warn);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = DispatcherConfig::from_json(r#"{"workers":4}"#).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }
}
