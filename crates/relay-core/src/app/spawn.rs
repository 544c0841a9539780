//! DispatchHandle - tokio task 上で動く dispatch の制御

use tokio::task::JoinHandle;

use super::CancelToken;
use crate::domain::{DispatchError, DispatchSummary};

/// DispatchHandle は spawn した dispatch を制御する
///
/// [`Dispatcher::spawn`](super::Dispatcher::spawn) が返す。
///
/// # 使用例
/// ```ignore
/// let handle = dispatcher.spawn(messages);
/// // ...
/// handle.cancel();
/// let summary = handle.join().await?;
/// println!("{} handled", summary.handled);
/// ```
///
/// Dropping the handle detaches the task; it keeps running until its source
/// ends or the token is cancelled.
#[derive(Debug)]
pub struct DispatchHandle {
    cancel: CancelToken,
    task: JoinHandle<Result<DispatchSummary, DispatchError>>,
}

impl DispatchHandle {
    pub(crate) fn new(
        cancel: CancelToken,
        task: JoinHandle<Result<DispatchSummary, DispatchError>>,
    ) -> Self {
        Self { cancel, task }
    }

    /// Stops pulling new messages and cancels the in-flight handler.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// handler に渡しているものと同じ token。子 token を作るのに使う。
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// task が終了していれば true（`join` はすぐに返る）。
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the task. A handler or release failure ends the run and
    /// is returned here; a panicked task becomes [`DispatchError::Task`].
    pub async fn join(self) -> Result<DispatchSummary, DispatchError> {
        self.task.await?
    }
}
