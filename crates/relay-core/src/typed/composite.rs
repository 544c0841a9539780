//! CompositeHandler - 1 つの message を複数の handler に配る
//!
//! # 学習ポイント
//! - 逐次実行（最初の失敗で停止、各 handler の前にキャンセル確認）
//! - 並行実行（`join_all` で全員の完了を待ってから失敗を報告）

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::handler::{Handler, HandlerType, MessageTypes};
use crate::app::CancelToken;
use crate::domain::{HandlerError, Message};

/// How a composite runs its sub-handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One after another, in order; the first failure stops the rest.
    #[default]
    Sequential,
    /// All at once; every sub-handler runs to completion before failures
    /// are reported.
    Concurrent,
}

/// CompositeHandler は複数の `Handler<M>` を 1 つの `Handler<M>` として扱う
///
/// # 使用例
/// ```ignore
/// let fan_out = CompositeHandler::concurrent(vec![
///     Arc::new(AuditHandler) as Arc<dyn Handler<OrderPlaced>>,
///     Arc::new(MailHandler::new(smtp)),
/// ]);
/// registry.register_instance(Arc::new(fan_out));
/// ```
///
/// 空の composite は何もせず成功する。
pub struct CompositeHandler<M: Message> {
    handlers: Vec<Arc<dyn Handler<M>>>,
    mode: ExecutionMode,
}

impl<M: Message> CompositeHandler<M> {
    pub fn new(handlers: Vec<Arc<dyn Handler<M>>>, mode: ExecutionMode) -> Self {
        Self { handlers, mode }
    }

    /// 登録順に 1 つずつ実行
    pub fn sequential(handlers: Vec<Arc<dyn Handler<M>>>) -> Self {
        Self::new(handlers, ExecutionMode::Sequential)
    }

    /// 全員を同時に実行
    pub fn concurrent(handlers: Vec<Arc<dyn Handler<M>>>) -> Self {
        Self::new(handlers, ExecutionMode::Concurrent)
    }

    /// 実行モード
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// sub-handler の数
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    async fn handle_sequentially(&self, message: &M, cancel: &CancelToken) -> Result<(), HandlerError> {
        for (index, handler) in self.handlers.iter().enumerate() {
            if cancel.is_cancelled() {
                trace!(index, "composite cancelled before sub-handler");
                return Err(HandlerError::Cancelled);
            }
            handler.handle(message, cancel).await?;
        }
        Ok(())
    }

    async fn handle_concurrently(&self, message: &M, cancel: &CancelToken) -> Result<(), HandlerError> {
        let results = join_all(
            self.handlers
                .iter()
                .map(|handler| handler.handle(message, cancel)),
        )
        .await;

        let total = results.len();
        let mut failures: Vec<HandlerError> = results.into_iter().filter_map(Result::err).collect();
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(HandlerError::Aggregate { failures, total }),
        }
    }
}

#[async_trait]
impl<M: Message> Handler<M> for CompositeHandler<M> {
    async fn handle(&self, message: &M, cancel: &CancelToken) -> Result<(), HandlerError> {
        match self.mode {
            ExecutionMode::Sequential => self.handle_sequentially(message, cancel).await,
            ExecutionMode::Concurrent => self.handle_concurrently(message, cancel).await,
        }
    }
}

impl<M: Message> HandlerType for CompositeHandler<M> {
    fn message_types(types: &mut MessageTypes<Self>) {
        types.add::<M>();
    }
}
