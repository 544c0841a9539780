//! InvocationShim - `Arc<dyn Message>` から `Handler<M>` への型ごとの呼び出し経路
//!
//! shim は具象 message type ごとに「どう呼ぶか」だけを知っている。
//! 「どの handler を呼ぶか」は覚えない。呼び出しのたびに selector に問い合わせる。
//!
//! # 学習ポイント
//! - 単相化された `fn` ポインタによる型消去
//! - DashMap による並行キャッシュ（`entry().or_insert` で更新を失わない）

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tracing::debug;

use super::CancelToken;
use crate::domain::{DispatchError, HandlerError, Message, MessageKind};
use crate::ports::HandlerSelector;

/// Future of one resolved handler invocation.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

type Invoke = fn(
    &dyn HandlerSelector,
    Arc<dyn Message>,
    CancelToken,
) -> Result<Option<HandlerFuture>, DispatchError>;

/// InvocationShim は 1 つの message type 用の呼び出し関数
///
/// `Copy` なので、キャッシュから取り出した後は lock を持たずに使える。
#[derive(Clone, Copy)]
pub struct InvocationShim {
    kind: MessageKind,
    invoke: Invoke,
}

impl InvocationShim {
    pub(crate) fn build<M: Message>() -> Self {
        Self {
            kind: MessageKind::of::<M>(),
            invoke: invoke::<M> as Invoke,
        }
    }

    /// この shim が扱う message type。
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Resolves the handler through `selector` and starts the call.
    ///
    /// `Ok(None)` means the selector had no handler; nothing was invoked.
    pub fn invoke(
        &self,
        selector: &dyn HandlerSelector,
        message: Arc<dyn Message>,
        cancel: CancelToken,
    ) -> Result<Option<HandlerFuture>, DispatchError> {
        (self.invoke)(selector, message, cancel)
    }
}

impl std::fmt::Debug for InvocationShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationShim")
            .field("message_type", &self.kind.name())
            .finish()
    }
}

fn invoke<M: Message>(
    selector: &dyn HandlerSelector,
    message: Arc<dyn Message>,
    cancel: CancelToken,
) -> Result<Option<HandlerFuture>, DispatchError> {
    let mismatch = || DispatchError::TypeMismatch {
        message_type: std::any::type_name::<M>(),
    };

    let Some(selected) = selector.select(&*message) else {
        return Ok(None);
    };
    let handler = selected.downcast::<M>().ok_or_else(mismatch)?;
    let message = message.downcast_arc::<M>().ok_or_else(mismatch)?;

    Ok(Some(Box::pin(async move {
        handler.handle(&message, &cancel).await
    })))
}

/// ShimCache は TypeId ごとの shim を保持する
///
/// dispatcher のすべての run で共有される。
///
/// # 内部実装
/// - `DashMap<TypeId, InvocationShim>`
/// - hit は読み取りのみ、miss は `entry().or_insert` で挿入
///
/// Concurrent first sightings of a type may both build a shim; the first
/// insert wins and the other build is discarded.
#[derive(Debug, Default)]
pub struct ShimCache {
    shims: DashMap<TypeId, InvocationShim>,
}

impl ShimCache {
    /// 空のキャッシュを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// `message` の具象型の shim を返す。初回のみ構築する。
    pub fn get_or_build(&self, message: &dyn Message) -> InvocationShim {
        let id = message.kind().id();
        if let Some(shim) = self.shims.get(&id).map(|entry| *entry) {
            return shim;
        }

        let shim = message.build_shim();
        debug!(message_type = shim.kind().name(), "built invocation shim");
        *self.shims.entry(id).or_insert(shim)
    }

    /// shim を構築済みの message type（順序は不定）
    pub fn kinds(&self) -> Vec<MessageKind> {
        self.shims.iter().map(|entry| entry.value().kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.shims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shims.is_empty()
    }
}
