//! Handler scan - module の export 一覧による handler の一括登録
//!
//! Rust には crate の公開型を実行時に列挙するリフレクションがない。handler を
//! まとめて拾ってほしい module は、明示的に一覧を公開する。
//!
//! # 使用例
//! ```ignore
//! pub struct BillingHandlers;
//!
//! impl HandlerModule for BillingHandlers {
//!     fn name(&self) -> &str {
//!         "billing"
//!     }
//!
//!     fn exported_handlers(&self) -> Vec<HandlerDescriptor> {
//!         vec![
//!             HandlerDescriptor::of::<InvoiceHandler>(),
//!             HandlerDescriptor::without_default::<LedgerHandler>(),
//!         ]
//!     }
//! }
//! ```
//!
//! `HandlerRegistry::register_scan` は default 構築できる handler を export 順に登録する。

use super::handler::HandlerType;
use super::registry::HandlerRegistry;
use crate::domain::RegistryError;

/// A handler type, described without naming it generically.
#[derive(Clone, Copy)]
pub struct HandlerDescriptor {
    handler_type: &'static str,
    register: Option<fn(&mut HandlerRegistry)>,
}

fn register_default<H: HandlerType + Default>(registry: &mut HandlerRegistry) {
    registry.register_type::<H>();
}

impl HandlerDescriptor {
    /// A handler type the registry can construct on demand.
    pub fn of<H: HandlerType + Default>() -> Self {
        Self {
            handler_type: std::any::type_name::<H>(),
            register: Some(register_default::<H> as fn(&mut HandlerRegistry)),
        }
    }

    /// A handler type with no parameterless construction path. It can only
    /// be registered by instance or factory; registering the descriptor
    /// itself fails.
    pub fn without_default<H: HandlerType>() -> Self {
        Self {
            handler_type: std::any::type_name::<H>(),
            register: None,
        }
    }

    /// handler の型名（`std::any::type_name`）
    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    /// registry が引数なしで構築できるか（`Default` 実装の有無）
    pub fn is_constructible(&self) -> bool {
        self.register.is_some()
    }

    pub(crate) fn register_into(&self, registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
        let register = self.register.ok_or(RegistryError::NoDefaultConstructor {
            handler_type: self.handler_type,
        })?;
        register(registry);
        Ok(())
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("handler_type", &self.handler_type)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// A unit of code that publishes its handler types for bulk registration.
pub trait HandlerModule {
    fn name(&self) -> &str;

    fn exported_handlers(&self) -> Vec<HandlerDescriptor>;
}
