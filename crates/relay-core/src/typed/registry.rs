//! HandlerRegistry - message type から handler factory への完全一致マッピング
//!
//! registry は crate 自身の [`HandlerSelector`] 実装。登録のたびに、handler が
//! 宣言した message type ごとに factory を 1 つ入れる。同じ message type への
//! 後の登録が前の登録を置き換え、他のマッピングには触れない（last wins）。
//!
//! # 学習ポイント
//! - HashMap での型消去された factory の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権
//!
//! Design:
//! - Built during initialization (`&mut self`).
//! - Shared immutably behind `Arc` once handed to a dispatcher.
//!
//! dispatch 中の変更はラッパーなしでは不可能。必要なアプリは registry を自前の
//! lock で包み、そのラッパーに `HandlerSelector` を実装する。

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::handler::{Handler, HandlerType, MessageTypes};
use super::scan::{HandlerDescriptor, HandlerModule};
use crate::domain::{Message, MessageKind, RegistryError};
use crate::ports::{HandlerSelector, SelectedHandler, SelectorFactory, constant_selector};

/// Produces a handler instance of type `H`.
pub(crate) type SharedFactory<H> = Arc<dyn Fn() -> Arc<H> + Send + Sync>;

/// Binds one message type of `H` into a factory table.
pub(crate) type Install<H> = fn(&mut Factories, &SharedFactory<H>);

pub(crate) type Factories = HashMap<TypeId, FactoryEntry>;

pub(crate) struct FactoryEntry {
    message_type: MessageKind,
    handler_type: &'static str,
    make: Box<dyn Fn() -> SelectedHandler + Send + Sync>,
}

pub(crate) fn install<H, M>(factories: &mut Factories, factory: &SharedFactory<H>)
where
    H: Handler<M> + HandlerType,
    M: Message,
{
    let factory = Arc::clone(factory);
    let message_type = MessageKind::of::<M>();
    factories.insert(
        message_type.id(),
        FactoryEntry {
            message_type,
            handler_type: std::any::type_name::<H>(),
            make: Box::new(move || {
                let handler: Arc<dyn Handler<M>> = factory();
                SelectedHandler::new::<M>(handler)
            }),
        },
    );
}

/// HandlerRegistry は message type ごとに handler factory を 1 つ持つ
///
/// # 使用例
/// ```ignore
/// let mut registry = HandlerRegistry::new();
/// registry
///     .register_type::<AuditHandler>()
///     .register_instance(Arc::new(MailHandler::new(smtp)));
///
/// assert!(registry.contains::<OrderPlaced>());
/// let dispatcher = Dispatcher::new(registry.into_selector_factory());
/// ```
///
/// # 内部実装
/// - `HashMap<TypeId, FactoryEntry>`
/// - lookup は完全一致のみ（supertype や trait へのフォールバックなし）
#[derive(Default)]
pub struct HandlerRegistry {
    factories: Factories,
}

impl HandlerRegistry {
    /// 空の registry を作成
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    fn bind<H: HandlerType>(&mut self, factory: SharedFactory<H>) -> &mut Self {
        for (kind, install) in MessageTypes::<H>::of().into_entries() {
            if let Some(previous) = self.factories.get(&kind.id()) {
                debug!(
                    message_type = kind.name(),
                    previous = previous.handler_type,
                    handler_type = std::any::type_name::<H>(),
                    "replacing handler registration"
                );
            } else {
                debug!(
                    message_type = kind.name(),
                    handler_type = std::any::type_name::<H>(),
                    "registering handler"
                );
            }
            install(&mut self.factories, &factory);
        }
        self
    }

    /// Registers `H`, constructing a new instance for every lookup.
    pub fn register_type<H: HandlerType + Default>(&mut self) -> &mut Self {
        self.bind::<H>(Arc::new(|| Arc::new(H::default())))
    }

    /// Registers one shared instance for every message type `H` supports.
    pub fn register_instance<H: HandlerType>(&mut self, handler: Arc<H>) -> &mut Self {
        self.bind::<H>(Arc::new(move || Arc::clone(&handler)))
    }

    /// Registers a factory that is called on every lookup.
    pub fn register_factory<H, F>(&mut self, factory: F) -> &mut Self
    where
        H: HandlerType,
        F: Fn() -> Arc<H> + Send + Sync + 'static,
    {
        self.bind::<H>(Arc::new(factory))
    }

    /// Registers a handler type known only through its descriptor.
    ///
    /// Fails if the described type cannot be default-constructed.
    pub fn register_descriptor(
        &mut self,
        descriptor: &HandlerDescriptor,
    ) -> Result<&mut Self, RegistryError> {
        descriptor.register_into(self)?;
        Ok(self)
    }

    /// Registers each descriptor in order, stopping at the first invalid one.
    pub fn register_descriptors(
        &mut self,
        descriptors: &[HandlerDescriptor],
    ) -> Result<&mut Self, RegistryError> {
        for descriptor in descriptors {
            self.register_descriptor(descriptor)?;
        }
        Ok(self)
    }

    /// Registers every default-constructible handler exported by `modules`,
    /// in module order and then export order. Returns how many handler
    /// types were registered.
    pub fn register_scan(&mut self, modules: &[&dyn HandlerModule]) -> usize {
        let mut registered = 0;
        for module in modules {
            for descriptor in module.exported_handlers() {
                match descriptor.register_into(self) {
                    Ok(()) => registered += 1,
                    Err(err) => debug!(
                        module = module.name(),
                        error = %err,
                        "skipping exported handler"
                    ),
                }
            }
        }
        registered
    }

    /// Typed lookup: a handler for `M` from the current registration.
    pub fn select<M: Message>(&self, message: &M) -> Option<Arc<dyn Handler<M>>> {
        HandlerSelector::select(self, message)?.downcast::<M>()
    }

    /// `M` に handler が登録されているか
    pub fn contains<M: Message>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<M>())
    }

    /// Name of the handler type currently bound to `M`.
    pub fn handler_type_for<M: Message>(&self) -> Option<&'static str> {
        self.factories
            .get(&TypeId::of::<M>())
            .map(|entry| entry.handler_type)
    }

    /// 登録済みの message type（順序は不定）
    pub fn registered_types(&self) -> Vec<MessageKind> {
        self.factories
            .values()
            .map(|entry| entry.message_type)
            .collect()
    }

    /// 登録済みの message type の数（handler 型の数ではない）
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Freezes the registry into a factory that hands out this registry
    /// for every message.
    pub fn into_selector_factory(self) -> SelectorFactory {
        constant_selector(Arc::new(self))
    }
}

impl HandlerSelector for HandlerRegistry {
    fn select(&self, message: &dyn Message) -> Option<SelectedHandler> {
        self.factories
            .get(&message.kind().id())
            .map(|entry| (entry.make)())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.factories
                    .values()
                    .map(|entry| (entry.message_type.name(), entry.handler_type)),
            )
            .finish()
    }
}
