//! CancelToken - subscription と handler で共有する協調キャンセル
//!
//! # 学習ポイント
//! - `tokio::sync::watch` による状態の通知
//! - 親子関係（子は祖先のキャンセルを観測する）

use std::sync::Arc;

use futures::future::select_all;
use tokio::sync::watch;

/// CancelToken は clone 可能なキャンセル信号
///
/// A child token observes its parent: cancelling the parent cancels every
/// descendant, cancelling a child leaves the parent untouched. The
/// dispatcher hands each subscription a child of the caller's token so
/// dropping the result stream never cancels anything the caller owns.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: watch::Sender<bool>,
    parent: Option<CancelToken>,
}

impl CancelToken {
    /// 親を持たない token を作成
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<CancelToken>) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner { state, parent }),
        }
    }

    /// この token のキャンセルを観測する子 token を作成
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    /// この token と子孫をキャンセル。何度呼んでもよい。
    pub fn cancel(&self) {
        self.inner.state.send_replace(true);
    }

    /// この token か祖先のどれかがキャンセル済みなら true
    pub fn is_cancelled(&self) -> bool {
        *self.inner.state.borrow()
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
    }

    /// Resolves once this token or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let mut receivers = Vec::new();
        let mut token = Some(self);
        while let Some(current) = token {
            receivers.push(current.inner.state.subscribe());
            token = current.inner.parent.as_ref();
        }

        let waits = receivers.iter_mut().map(|rx| {
            Box::pin(async move {
                // The sender lives in `Inner`, which `self` keeps alive.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            })
        });
        select_all(waits).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }

    #[test]
    fn parent_cancels_children_but_not_the_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel();
        assert!(!parent.is_cancelled());
        assert!(grandchild.is_cancelled());

        let sibling = parent.child();
        parent.cancel();
        assert!(sibling.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_wakes_on_ancestor_cancel() {
        let root = CancelToken::new();
        let leaf = root.child().child();

        let waiter = tokio::spawn({
            let leaf = leaf.clone();
            async move { leaf.cancelled().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        root.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
