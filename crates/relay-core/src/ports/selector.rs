//! HandlerSelector port - message の実行時の型から handler を解決する
//!
//! dispatcher は message ごとに 1 回 SelectorFactory から selector を取得する。
//! factory は毎回新しい selector（message ごとのリソース scope など）を返しても、
//! 同じ共有インスタンスを返してもよい。どちらも正しい構成。
//!
//! リソースを持つ selector は [`Release`] を公開し、dispatcher は message の
//! 結果が確定した後にちょうど 1 回 release を呼ぶ。

use std::any::Any;
use std::sync::Arc;

use crate::domain::{BoxError, Message, MessageKind};
use crate::typed::Handler;

/// HandlerSelector は message の handler を解決する
///
/// Returning `None` is the normal "no handler" answer, not an error.
pub trait HandlerSelector: Send + Sync {
    /// `message` の具象型に完全一致する handler を返す。
    fn select(&self, message: &dyn Message) -> Option<SelectedHandler>;

    /// The release capability, if this selector has one.
    fn releasable(&self) -> Option<&dyn Release> {
        None
    }
}

/// Optional disposal capability of a selector.
pub trait Release: Send + Sync {
    fn release(&self) -> Result<(), BoxError>;
}

impl dyn HandlerSelector + '_ {
    /// Typed lookup: the handler for `M`, if the selector has one.
    pub fn select_for<M: Message>(&self, message: &M) -> Option<Arc<dyn Handler<M>>> {
        self.select(message)?.downcast::<M>()
    }
}

/// A handler returned by a selector, with its message type erased.
pub struct SelectedHandler {
    kind: MessageKind,
    handler: Box<dyn Any + Send + Sync>,
}

impl SelectedHandler {
    pub fn new<M: Message>(handler: Arc<dyn Handler<M>>) -> Self {
        Self {
            kind: MessageKind::of::<M>(),
            handler: Box::new(handler),
        }
    }

    /// The message type the handler is bound to.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// `M` に束縛されていれば typed handler を返す。
    pub fn downcast<M: Message>(self) -> Option<Arc<dyn Handler<M>>> {
        self.handler
            .downcast::<Arc<dyn Handler<M>>>()
            .ok()
            .map(|handler| *handler)
    }
}

impl std::fmt::Debug for SelectedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedHandler")
            .field("message_type", &self.kind.name())
            .finish_non_exhaustive()
    }
}

/// Produces the selector used for a single message.
pub type SelectorFactory = Arc<dyn Fn() -> Arc<dyn HandlerSelector> + Send + Sync>;

/// closure を [`SelectorFactory`] に包む
///
/// # 使用例
/// ```ignore
/// let factory = selector_factory(move || Arc::new(ScopedSelector::open(&pool)) as Arc<dyn HandlerSelector>);
/// ```
pub fn selector_factory<F>(factory: F) -> SelectorFactory
where
    F: Fn() -> Arc<dyn HandlerSelector> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// A factory that always returns the same selector.
pub fn constant_selector(selector: Arc<dyn HandlerSelector>) -> SelectorFactory {
    Arc::new(move || Arc::clone(&selector))
}
