//! Errors - 登録・選択・実行のエラー型
//!
//! 「handler がない」はエラーではない。`handled = false` の通常の結果として扱う。

use thiserror::Error;

/// Boxed foreign error, used for handler and release failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a [`Handler`](crate::typed::Handler).
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("handling was cancelled")]
    Cancelled,

    /// More than one sub-handler of a concurrent composite failed.
    #[error("{} of {total} composite handlers failed", .failures.len())]
    Aggregate {
        failures: Vec<HandlerError>,
        total: usize,
    },
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Terminal error of a dispatch stream.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler for {message_type} failed")]
    Handler {
        message_type: &'static str,
        #[source]
        source: HandlerError,
    },

    /// The selector returned a handler bound to a different message type.
    #[error("selector returned a handler of the wrong type for {message_type}")]
    TypeMismatch { message_type: &'static str },

    /// Releasing the per-message selector failed. `handled` is the outcome
    /// that had already been computed for the message.
    #[error("releasing the handler selector failed after dispatching {message_type} (handled={handled})")]
    Release {
        message_type: &'static str,
        handled: bool,
        #[source]
        source: BoxError,
    },

    #[error("dispatch task terminated abnormally")]
    Task(#[from] tokio::task::JoinError),
}

/// Invalid registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(
        "handler type {handler_type} has no default constructor; register an instance or a factory instead"
    )]
    NoDefaultConstructor { handler_type: &'static str },
}
