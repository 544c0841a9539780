//! Dispatcher - message stream を順序付きの result stream に変換する
//!
//! # フロー（1 message ごと）
//! 1. SelectorFactory から selector を lease（factory 呼び出しは 1 回）
//! 2. message の具象型に対応する invocation shim をキャッシュから取得
//! 3. handler を解決して await、なければ `handled = false`
//! 4. 3 の結果に関係なく selector を release
//!
//! # 学習ポイント
//! - `futures::stream::unfold` による状態付き Stream
//! - `tokio::select!` によるキャンセル
//! - `tracing` の span で dispatch ごとの文脈を残す
//!
//! message は 1 件ずつ処理するので、i 番目の result は必ず i 番目の message に対応する。

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Fuse, Stream, StreamExt};
use tracing::{Instrument, Span, debug, debug_span, field, trace, warn};

use super::config::DispatcherConfig;
use super::lease::SelectorLease;
use super::shim::ShimCache;
use super::spawn::DispatchHandle;
use super::CancelToken;
use crate::domain::{
    DispatchError, DispatchResult, DispatchSummary, HandlerError, Message, MessageKind,
    SubscriptionId,
};
use crate::ports::SelectorFactory;

/// Dispatcher は selector factory を通して message を dispatch する
///
/// clone は安価で、clone 同士は shim キャッシュを共有する。
///
/// # 使用例
/// ```ignore
/// let dispatcher = Dispatcher::new(registry.into_selector_factory());
/// let mut results = dispatcher.run(stream::iter(messages));
///
/// while let Some(result) = results.next().await {
///     let result = result?;
///     println!("{} handled={}", result.message().type_name(), result.handled());
/// }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    selectors: SelectorFactory,
    shims: Arc<ShimCache>,
    config: Arc<DispatcherConfig>,
}

/// Outcome of one message, with a release failure kept apart from it.
struct Dispatched {
    result: Result<DispatchResult, DispatchError>,
    release: Option<DispatchError>,
}

impl Dispatcher {
    /// default 設定で Dispatcher を作成
    pub fn new(selectors: SelectorFactory) -> Self {
        Self {
            selectors,
            shims: Arc::new(ShimCache::new()),
            config: Arc::new(DispatcherConfig::default()),
        }
    }

    /// 設定を差し替える（キャッシュ済み shim はそのまま）
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// 現在の設定
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Message types seen so far, i.e. those with a cached shim.
    pub fn cached_message_types(&self) -> Vec<MessageKind> {
        self.shims.kinds()
    }

    /// Dispatches `messages` under a fresh cancellation token.
    pub fn run<S>(&self, messages: S) -> DispatchStream
    where
        S: Stream<Item = Arc<dyn Message>> + Send + 'static,
    {
        self.run_with_cancel(messages, &CancelToken::new())
    }

    /// Dispatches `messages` under a child of `cancel`.
    ///
    /// Cancelling `cancel` ends the returned stream; dropping the stream
    /// cancels only its own child token.
    pub fn run_with_cancel<S>(&self, messages: S, cancel: &CancelToken) -> DispatchStream
    where
        S: Stream<Item = Arc<dyn Message>> + Send + 'static,
    {
        let subscription = SubscriptionId::generate();
        let cancel = cancel.child();
        debug!(dispatcher = %self.config.name, %subscription, "dispatch stream started");

        let run = Run {
            dispatcher: self.clone(),
            upstream: Some(messages.boxed()),
            cancel: cancel.clone(),
            subscription,
            deferred: None,
        };

        DispatchStream {
            inner: stream::unfold(run, Run::step).boxed().fuse(),
            cancel,
            subscription,
        }
    }

    /// Dispatches a single message outside of any stream.
    ///
    /// A release failure after a successful dispatch is returned as
    /// [`DispatchError::Release`], which still carries `handled`.
    pub async fn dispatch(
        &self,
        message: Arc<dyn Message>,
        cancel: &CancelToken,
    ) -> Result<DispatchResult, DispatchError> {
        let dispatched = self.dispatch_one(message, cancel, None).await;
        match dispatched.release {
            Some(err) => Err(err),
            None => dispatched.result,
        }
    }

    /// Runs `messages` on a tokio task, handing every result to `on_result`.
    pub fn spawn<S, F>(&self, messages: S, mut on_result: F) -> DispatchHandle
    where
        S: Stream<Item = Arc<dyn Message>> + Send + 'static,
        F: FnMut(DispatchResult) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let mut results = self.run_with_cancel(messages, &cancel);

        let task = tokio::spawn(async move {
            let mut summary = DispatchSummary::start(results.subscription());
            while let Some(result) = results.next().await {
                let result = result?;
                summary.record(&result);
                on_result(result);
            }
            summary.finish(results.cancel_token().is_cancelled());
            debug!(
                subscription = %summary.subscription,
                dispatched = summary.dispatched,
                cancelled = summary.cancelled,
                "spawned dispatch finished"
            );
            Ok::<_, DispatchError>(summary)
        });

        DispatchHandle::new(cancel, task)
    }

    fn span(&self, subscription: Option<SubscriptionId>, kind: MessageKind) -> Span {
        let span = debug_span!(
            "dispatch",
            dispatcher = %self.config.name,
            subscription = field::Empty,
            message_type = kind.name(),
        );
        if let Some(subscription) = subscription {
            span.record("subscription", field::display(subscription));
        }
        span
    }

    async fn dispatch_one(
        &self,
        message: Arc<dyn Message>,
        cancel: &CancelToken,
        subscription: Option<SubscriptionId>,
    ) -> Dispatched {
        let kind = message.kind();
        let span = self.span(subscription, kind);
        self.dispatch_in_span(message, cancel, kind)
            .instrument(span)
            .await
    }

    async fn dispatch_in_span(
        &self,
        message: Arc<dyn Message>,
        cancel: &CancelToken,
        kind: MessageKind,
    ) -> Dispatched {
        let shim = self.shims.get_or_build(&*message);
        let lease = SelectorLease::acquire(&self.selectors);

        let outcome = match shim.invoke(lease.selector(), Arc::clone(&message), cancel.clone()) {
            Ok(Some(handling)) => {
                trace!("handler resolved");
                handling
                    .await
                    .map(|()| true)
                    .map_err(|source| DispatchError::Handler {
                        message_type: kind.name(),
                        source,
                    })
            }
            Ok(None) => {
                if self.config.warn_on_unhandled {
                    warn!("no handler for message");
                } else {
                    debug!("no handler for message");
                }
                Ok(false)
            }
            Err(err) => Err(err),
        };

        match (outcome, lease.release()) {
            (Ok(handled), Ok(())) => Dispatched {
                result: Ok(DispatchResult::new(message, handled)),
                release: None,
            },
            (Ok(handled), Err(source)) => Dispatched {
                result: Ok(DispatchResult::new(message, handled)),
                release: Some(DispatchError::Release {
                    message_type: kind.name(),
                    handled,
                    source,
                }),
            },
            (Err(err), Ok(())) => Dispatched {
                result: Err(err),
                release: None,
            },
            (Err(err), Err(release)) => {
                warn!(error = %release, "releasing handler selector failed after handler failure");
                Dispatched {
                    result: Err(err),
                    release: None,
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("cached_message_types", &self.shims.len())
            .finish_non_exhaustive()
    }
}

/// State of one subscription.
struct Run {
    dispatcher: Dispatcher,
    /// `None` once the stream has terminated; dropping it releases the source.
    upstream: Option<BoxStream<'static, Arc<dyn Message>>>,
    cancel: CancelToken,
    subscription: SubscriptionId,
    /// Release failure to emit after the result it belongs to.
    deferred: Option<DispatchError>,
}

type Item = Result<DispatchResult, DispatchError>;

impl Run {
    async fn step(mut self) -> Option<(Item, Self)> {
        if let Some(err) = self.deferred.take() {
            return Some((Err(err), self));
        }
        let mut upstream = self.upstream.take()?;

        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            next = upstream.next() => next,
        };
        let Some(message) = next else {
            debug!(subscription = %self.subscription, cancelled = self.cancel.is_cancelled(), "dispatch stream ended");
            return None;
        };

        let dispatched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            dispatched = self.dispatcher.dispatch_one(message, &self.cancel, Some(self.subscription)) => Some(dispatched),
        };

        match dispatched {
            None => {
                debug!(subscription = %self.subscription, "dispatch cancelled mid-message");
                None
            }
            Some(Dispatched {
                result:
                    Err(DispatchError::Handler {
                        source: HandlerError::Cancelled,
                        ..
                    }),
                ..
            }) if self.cancel.is_cancelled() => {
                debug!(subscription = %self.subscription, "handler observed cancellation");
                None
            }
            Some(Dispatched {
                result: Ok(result),
                release,
            }) => {
                match release {
                    Some(err) => self.deferred = Some(err),
                    None => self.upstream = Some(upstream),
                }
                Some((Ok(result), self))
            }
            Some(Dispatched { result: Err(err), .. }) => Some((Err(err), self)),
        }
    }
}

/// DispatchStream は 1 subscription の順序付き result stream
///
/// Ends when the source ends, after the first error, or when its token is
/// cancelled. Dropping the stream cancels its token and drops the source.
#[must_use = "streams do nothing unless polled"]
pub struct DispatchStream {
    inner: Fuse<BoxStream<'static, Item>>,
    cancel: CancelToken,
    subscription: SubscriptionId,
}

impl DispatchStream {
    /// ログと summary に記録される ID
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// The token passed to every handler of this subscription.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// 次の poll で stream を終了させる。処理中の handler にもキャンセルが届く。
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for DispatchStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for DispatchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
