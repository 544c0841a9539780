//! Message - ルーティングの鍵は値の具象型
//!
//! message は `Arc<dyn Message>` として dispatcher を流れる。dispatcher は
//! supertype や実装している trait を見ない。[`MessageKind`] に記録された
//! 具象型だけが意味を持つ。
//!
//! # 学習ポイント
//! - Sealed trait パターン（blanket impl で全 Message に自動実装）
//! - `Any` / `TypeId` による安全な downcast

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::app::shim::InvocationShim;

/// Marker for values that can be routed by the dispatcher.
///
/// ```ignore
/// #[derive(Debug)]
/// struct OrderPlaced {
///     order_id: u64,
/// }
///
/// impl Message for OrderPlaced {}
/// ```
pub trait Message: sealed::MessageType + Send + Sync + fmt::Debug + 'static {}

pub(crate) mod sealed {
    use super::*;

    /// Runtime type information every [`Message`] gets for free.
    pub trait MessageType {
        fn message_kind(&self) -> MessageKind;

        fn as_any(&self) -> &dyn Any;

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

        /// Builds the call path from a type-erased message to `Handler<Self>`.
        fn build_shim(&self) -> InvocationShim;
    }

    impl<M: Message> MessageType for M {
        fn message_kind(&self) -> MessageKind {
            MessageKind::of::<M>()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }

        fn build_shim(&self) -> InvocationShim {
            InvocationShim::build::<M>()
        }
    }
}

/// MessageKind は具象 message type の識別子（`TypeId` と型名）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKind {
    id: TypeId,
    name: &'static str,
}

impl MessageKind {
    pub fn of<M: Message>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// 比較とハッシュに使う `TypeId`
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// ログ用の型名
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl dyn Message {
    /// The concrete type of this message (not `Arc`, not `dyn Message`).
    pub fn kind(&self) -> MessageKind {
        sealed::MessageType::message_kind(self)
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is<M: Message>(&self) -> bool {
        self.kind().id() == TypeId::of::<M>()
    }

    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Recovers the typed `Arc` without copying the message.
    pub fn downcast_arc<M: Message>(self: Arc<Self>) -> Option<Arc<M>> {
        self.into_any().downcast::<M>().ok()
    }
}

/// Outcome of dispatching one message.
///
/// `handled` is true only if a handler was resolved and completed without
/// error. `message` is the same `Arc` that entered the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    message: Arc<dyn Message>,
    handled: bool,
}

impl DispatchResult {
    pub fn new(message: Arc<dyn Message>, handled: bool) -> Self {
        Self { message, handled }
    }

    pub fn message(&self) -> &Arc<dyn Message> {
        &self.message
    }

    /// handler が解決され、エラーなく完了したか
    pub fn handled(&self) -> bool {
        self.handled
    }

    pub fn into_message(self) -> Arc<dyn Message> {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Journal, Orphan, Ping, Pong};

    #[test]
    fn kind_is_the_concrete_type_behind_the_arc() {
        let message: Arc<dyn Message> = Arc::new(Ping::new(1, &Journal::default()));

        assert_eq!(message.kind(), MessageKind::of::<Ping>());
        assert_ne!(message.kind(), MessageKind::of::<Pong>());
        assert!(message.type_name().ends_with("Ping"));
    }

    #[test]
    fn kind_resolves_on_a_borrowed_trait_object() {
        let ping = Ping::new(1, &Journal::default());
        let message: &dyn Message = &ping;

        assert_eq!(message.kind().id(), TypeId::of::<Ping>());
        assert!(message.is::<Ping>());
        assert!(!message.is::<Pong>());
    }

    #[test]
    fn downcast_arc_keeps_pointer_identity() {
        let message: Arc<dyn Message> = Arc::new(Orphan);
        let raw = Arc::as_ptr(&message) as *const ();

        let typed = message.downcast_arc::<Orphan>().unwrap();
        assert_eq!(Arc::as_ptr(&typed) as *const (), raw);
    }

    #[test]
    fn downcast_arc_rejects_other_types() {
        let message: Arc<dyn Message> = Arc::new(Orphan);

        assert!(message.clone().downcast_arc::<Ping>().is_none());
        assert!(message.downcast_ref::<Orphan>().is_some());
    }
}
