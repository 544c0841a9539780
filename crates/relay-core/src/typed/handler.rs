//! Handler trait - 1 つの message type を非同期に処理する Handler の定義
//!
//! handler 構造体は処理する message type ごとに `Handler<M>` を実装し、
//! `HandlerType` でそれらを列挙する。registry は 1 回の登録ですべてを結びつける。
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<M>)
//! - 1 つの構造体が複数の `Handler<M>` を実装するパターン
//! - 関連関数で型の一覧を宣言する（リフレクションの代わり）

use std::marker::PhantomData;

use async_trait::async_trait;

use super::registry::{Install, install};
use crate::app::CancelToken;
use crate::domain::{HandlerError, Message, MessageKind};

/// Handles messages of type `M`.
///
/// ```ignore
/// struct AuditHandler;
///
/// #[async_trait]
/// impl Handler<OrderPlaced> for AuditHandler {
///     async fn handle(&self, message: &OrderPlaced, _cancel: &CancelToken) -> Result<(), HandlerError> {
///         tracing::info!(order_id = message.order_id, "audited");
///         Ok(())
///     }
/// }
/// ```
///
/// `cancel` fires when the subscription that produced the message is
/// cancelled; long-running handlers should watch it.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync {
    async fn handle(&self, message: &M, cancel: &CancelToken) -> Result<(), HandlerError>;
}

/// A handler type that declares which message types it supports.
///
/// ```ignore
/// impl HandlerType for AuditHandler {
///     fn message_types(types: &mut MessageTypes<Self>) {
///         types.add::<OrderPlaced>().add::<OrderCancelled>();
///     }
/// }
/// ```
pub trait HandlerType: Send + Sync + Sized + 'static {
    fn message_types(types: &mut MessageTypes<Self>);
}

/// The message types a [`HandlerType`] declared, with the code that binds
/// each of them in a registry.
pub struct MessageTypes<H> {
    entries: Vec<(MessageKind, Install<H>)>,
    _marker: PhantomData<fn() -> H>,
}

impl<H: HandlerType> MessageTypes<H> {
    pub(crate) fn of() -> Self {
        let mut types = Self {
            entries: Vec::new(),
            _marker: PhantomData,
        };
        H::message_types(&mut types);
        types
    }

    pub fn add<M: Message>(&mut self) -> &mut Self
    where
        H: Handler<M>,
    {
        self.entries
            .push((MessageKind::of::<M>(), install::<H, M> as Install<H>));
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = MessageKind> + '_ {
        self.entries.iter().map(|(kind, _)| *kind)
    }

    pub(crate) fn into_entries(self) -> Vec<(MessageKind, Install<H>)> {
        self.entries
    }
}
